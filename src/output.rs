use crate::error::ProcessingError;
use crate::timeline::MergedTable;
use arrow::array::{ArrayRef, Float64Array, StringArray, TimestampSecondArray, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use log::info;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

pub const MERGED_COLUMNS: [&str; 13] = [
    "timestamp",
    "historic_glucose",
    "scan_glucose",
    "sleep",
    "strength",
    "cardio",
    "nutrition",
    "meal",
    "protein",
    "fat",
    "carbs",
    "rate_of_change",
    "glucose_interpolated",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

fn export_error(e: impl std::fmt::Display) -> ProcessingError {
    ProcessingError::Export(e.to_string())
}

fn create_output(path: &Path) -> Result<File, ProcessingError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    // Create directory if it doesn't exist
    std::fs::create_dir_all(dir).map_err(export_error)?;
    File::create(path).map_err(export_error)
}

fn opt(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// One CSV row per timeline minute; nulls are empty cells.
pub fn write_merged_csv(table: &MergedTable, path: &Path) -> Result<(), ProcessingError> {
    info!("Writing merged table to {}", path.display());
    let file = create_output(path)?;
    let mut writer = csv::Writer::from_writer(file);

    writer.write_record(MERGED_COLUMNS).map_err(export_error)?;

    for row in table.rows() {
        writer
            .write_record(&[
                row.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                opt(row.historic_glucose),
                opt(row.scan_glucose),
                row.sleep.to_string(),
                row.strength.to_string(),
                row.cardio.to_string(),
                row.nutrition.to_string(),
                row.meal.unwrap_or_default().to_string(),
                opt(row.protein),
                opt(row.fat),
                opt(row.carbs),
                opt(row.rate_of_change),
                opt(row.glucose_interpolated),
            ])
            .map_err(export_error)?;
    }

    writer.flush().map_err(export_error)?;
    Ok(())
}

pub fn merged_schema() -> Schema {
    let value = |name: &str| Field::new(name, DataType::Float64, true);
    let flag = |name: &str| Field::new(name, DataType::UInt8, false);
    Schema::new(vec![
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Second, None),
            false,
        ),
        value("historic_glucose"),
        value("scan_glucose"),
        flag("sleep"),
        flag("strength"),
        flag("cardio"),
        flag("nutrition"),
        Field::new("meal", DataType::Utf8, true),
        value("protein"),
        value("fat"),
        value("carbs"),
        value("rate_of_change"),
        value("glucose_interpolated"),
    ])
}

pub fn to_record_batch(table: &MergedTable) -> Result<RecordBatch, ProcessingError> {
    let timestamps: Vec<i64> = table
        .timeline
        .iter()
        .map(|t| t.and_utc().timestamp())
        .collect();
    let values = |column: &[Option<f64>]| -> ArrayRef {
        Arc::new(Float64Array::from(column.to_vec()))
    };
    let flags = |column: &[u8]| -> ArrayRef { Arc::new(UInt8Array::from(column.to_vec())) };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampSecondArray::from(timestamps)),
        values(&table.historic_glucose),
        values(&table.scan_glucose),
        flags(&table.sleep),
        flags(&table.strength),
        flags(&table.cardio),
        flags(&table.nutrition),
        Arc::new(StringArray::from(
            table.meal.iter().map(|m| m.as_deref()).collect::<Vec<_>>(),
        )),
        values(&table.protein),
        values(&table.fat),
        values(&table.carbs),
        values(&table.rate_of_change),
        values(&table.glucose_interpolated),
    ];

    RecordBatch::try_new(Arc::new(merged_schema()), columns).map_err(export_error)
}

/// Arrow IPC file, readable with `inspect_feather` or any Feather reader.
pub fn write_merged_feather(table: &MergedTable, path: &Path) -> Result<(), ProcessingError> {
    info!("Writing merged table to {}", path.display());
    let batch = to_record_batch(table)?;
    let file = create_output(path)?;
    let mut writer = FileWriter::try_new(file, &batch.schema()).map_err(export_error)?;
    writer.write(&batch).map_err(export_error)?;
    writer.finish().map_err(export_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::ts;
    use crate::timeline::Timeline;
    use arrow::array::Array;
    use arrow::ipc::reader::FileReader;
    use tempfile::TempDir;

    fn small_table() -> MergedTable {
        let mut table = MergedTable::new(Timeline::between(
            ts("2024-01-01 00:00"),
            ts("2024-01-01 00:02"),
        ));
        table.historic_glucose[1] = Some(5.5);
        table.sleep[2] = 1;
        table.nutrition[0] = 1;
        table.meal[0] = Some("Snack".to_string());
        table
    }

    #[test]
    fn test_csv_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("merged.csv");
        write_merged_csv(&small_table(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], MERGED_COLUMNS.join(","));
        assert_eq!(lines[1], "2024-01-01 00:00,,,0,0,0,1,Snack,,,,,");
        assert_eq!(lines[2], "2024-01-01 00:01,5.5,,0,0,0,0,,,,,,");
        assert_eq!(lines[3], "2024-01-01 00:02,,,1,0,0,0,,,,,,");
    }

    #[test]
    fn test_feather_export_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged.feather");
        write_merged_feather(&small_table(), &path).unwrap();

        let reader = FileReader::try_new(File::open(&path).unwrap(), None).unwrap();
        assert_eq!(reader.schema().fields().len(), MERGED_COLUMNS.len());
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 3);

        let glucose = batches[0]
            .column_by_name("historic_glucose")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert!(glucose.is_null(0));
        assert_eq!(glucose.value(1), 5.5);
    }
}
