use crate::config::TrackerConfig;
use crate::error::DataLoadError;
use crate::{
    truncate_to_minute, GlucoseReading, MealEvent, SleepSession, SourceTables, TimePoint,
    WorkoutKind, WorkoutSession,
};
use chrono::{Duration, NaiveDateTime};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const GLUCOSE_TIMESTAMP: &str = "Device Timestamp";
const HISTORIC_GLUCOSE: &str = "Historic Glucose mmol/L";
const SCAN_GLUCOSE: &str = "Scan Glucose mmol/L";
const TIME_ASLEEP: &str = "Time asleep (seconds)";

// ISO first, then the day-first shapes written by LibreView and food loggers.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse any supported timestamp shape, keeping seconds.
pub fn parse_instant(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Parse any supported timestamp shape, truncated to the minute.
pub fn parse_timestamp(value: &str) -> Option<TimePoint> {
    parse_instant(value).map(truncate_to_minute)
}

/// Find `file_name` under `data_dir`, preferring the shallowest match.
pub fn locate_source(data_dir: &Path, file_name: &str) -> Result<PathBuf, DataLoadError> {
    WalkDir::new(data_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
        .min_by_key(|entry| entry.depth())
        .map(|entry| entry.into_path())
        .ok_or_else(|| {
            DataLoadError::NotFound(data_dir.join(file_name).display().to_string())
        })
}

fn read_source(path: &Path) -> Result<String, DataLoadError> {
    fs::read_to_string(path).map_err(|source| DataLoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Sleep Cycle exports use `;`, everything else `,`. Decide from the header line.
fn csv_reader(body: &str) -> csv::Reader<&[u8]> {
    let header = body.lines().next().unwrap_or_default();
    let delimiter = if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    };
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true) // Trailing empty cells are common in exports
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes())
}

struct Columns<'p> {
    headers: csv::StringRecord,
    path: &'p Path,
}

impl<'p> Columns<'p> {
    fn read(rdr: &mut csv::Reader<&[u8]>, path: &'p Path) -> Result<Self, DataLoadError> {
        let headers = rdr.headers().map_err(|e| csv_error(path, e))?.clone();
        Ok(Self { headers, path })
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == name)
    }

    fn require(&self, name: &str) -> Result<usize, DataLoadError> {
        self.find(name).ok_or_else(|| DataLoadError::MissingColumn {
            path: self.path.to_path_buf(),
            column: name.to_string(),
        })
    }
}

fn csv_error(path: &Path, source: csv::Error) -> DataLoadError {
    DataLoadError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize) -> &'r str {
    record.get(idx).unwrap_or_default().trim()
}

/// Point samples join on whole minutes, interval bounds keep their seconds.
fn timestamp_field(
    record: &csv::StringRecord,
    idx: usize,
    parse: fn(&str) -> Option<NaiveDateTime>,
    path: &Path,
    row: usize,
) -> Result<NaiveDateTime, DataLoadError> {
    let value = field(record, idx);
    parse(value).ok_or_else(|| DataLoadError::InvalidTimestamp {
        path: path.to_path_buf(),
        record: row,
        value: value.to_string(),
    })
}

fn number_field(
    record: &csv::StringRecord,
    idx: Option<usize>,
    column: &str,
    path: &Path,
    row: usize,
) -> Result<Option<f64>, DataLoadError> {
    let Some(idx) = idx else {
        return Ok(None);
    };
    let value = field(record, idx);
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| DataLoadError::InvalidNumber {
            path: path.to_path_buf(),
            record: row,
            column: column.to_string(),
            value: value.to_string(),
        })
}

fn optional_text(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    idx.map(|i| field(record, i))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// LibreView glucose export. Same-minute readings are averaged per column and
/// a zero average is treated as missing.
pub fn load_glucose_data(path: &Path) -> Result<Vec<GlucoseReading>, DataLoadError> {
    let contents = read_source(path)?;

    // LibreView puts a patient/metadata line above the real header.
    let body = match contents.split_once('\n') {
        Some((first, rest)) if !first.contains(GLUCOSE_TIMESTAMP) => rest,
        _ => contents.as_str(),
    };

    let mut rdr = csv_reader(body);
    let columns = Columns::read(&mut rdr, path)?;
    let ts_idx = columns.require(GLUCOSE_TIMESTAMP)?;
    let historic_idx = columns.require(HISTORIC_GLUCOSE)?;
    let scan_idx = columns.require(SCAN_GLUCOSE)?;

    let mut grouped: BTreeMap<TimePoint, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| csv_error(path, e))?;
        let row = i + 1;
        let ts = timestamp_field(&record, ts_idx, parse_timestamp, path, row)?;
        let historic = number_field(&record, Some(historic_idx), HISTORIC_GLUCOSE, path, row)?;
        let scan = number_field(&record, Some(scan_idx), SCAN_GLUCOSE, path, row)?;

        let entry = grouped.entry(ts).or_default();
        entry.0.extend(historic);
        entry.1.extend(scan);
    }

    let non_zero = |v: Option<f64>| v.filter(|&v| v != 0.0);
    let readings: Vec<GlucoseReading> = grouped
        .into_iter()
        .map(|(timestamp, (historic, scan))| GlucoseReading {
            timestamp,
            historic: non_zero(mean(&historic)),
            scan: non_zero(mean(&scan)),
        })
        .collect();

    info!("Loaded {} glucose minutes from {}", readings.len(), path.display());
    Ok(readings)
}

/// Sleep Cycle export: `Start`, `End`, optional `Sleep Quality` and
/// `Time asleep (seconds)`.
pub fn load_sleep_data(path: &Path) -> Result<Vec<SleepSession>, DataLoadError> {
    let contents = read_source(path)?;
    let mut rdr = csv_reader(&contents);
    let columns = Columns::read(&mut rdr, path)?;
    let start_idx = columns.require("Start")?;
    let end_idx = columns.require("End")?;
    let quality_idx = columns.find("Sleep Quality");
    let asleep_idx = columns.find(TIME_ASLEEP);

    let mut sessions = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| csv_error(path, e))?;
        let row = i + 1;
        let asleep = number_field(&record, asleep_idx, TIME_ASLEEP, path, row)?;
        sessions.push(SleepSession {
            start: timestamp_field(&record, start_idx, parse_instant, path, row)?,
            end: timestamp_field(&record, end_idx, parse_instant, path, row)?,
            quality: optional_text(&record, quality_idx),
            time_asleep: asleep.map(|secs| Duration::seconds(secs.round() as i64)),
        });
    }

    info!("Loaded {} sleep sessions from {}", sessions.len(), path.display());
    Ok(sessions)
}

/// Workout log: `start_time`, `end_time`, optional `type` / `workout_type`.
pub fn load_workout_data(path: &Path) -> Result<Vec<WorkoutSession>, DataLoadError> {
    let contents = read_source(path)?;
    let mut rdr = csv_reader(&contents);
    let columns = Columns::read(&mut rdr, path)?;
    let start_idx = columns.require("start_time")?;
    let end_idx = columns.require("end_time")?;
    let kind_idx = columns.find("type").or_else(|| columns.find("workout_type"));

    let mut workouts = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| csv_error(path, e))?;
        workouts.push(WorkoutSession {
            start: timestamp_field(&record, start_idx, parse_instant, path, i + 1)?,
            end: timestamp_field(&record, end_idx, parse_instant, path, i + 1)?,
            kind: kind_idx.and_then(|idx| WorkoutKind::parse(field(&record, idx))),
        });
    }

    info!("Loaded {} workouts from {}", workouts.len(), path.display());
    Ok(workouts)
}

#[derive(Clone, Copy)]
enum MealTime {
    Combined(usize),
    Split(usize, usize),
}

/// Food log with either a `Datetime`/`Timestamp` column or day-first `Date` +
/// `Time` columns. Meals logged in the same minute are combined.
pub fn load_nutrition_data(path: &Path) -> Result<Vec<MealEvent>, DataLoadError> {
    let contents = read_source(path)?;
    let mut rdr = csv_reader(&contents);
    let columns = Columns::read(&mut rdr, path)?;

    let meal_time = match columns.find("Datetime").or_else(|| columns.find("Timestamp")) {
        Some(idx) => MealTime::Combined(idx),
        None => MealTime::Split(columns.require("Date")?, columns.require("Time")?),
    };
    let meal_idx = columns.require("Meal")?;
    let protein_idx = columns.find("P_Macro");
    let fat_idx = columns.find("F_Macro");
    let carbs_idx = columns.find("C_Macro");

    let mut meals: BTreeMap<TimePoint, MealEvent> = BTreeMap::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| csv_error(path, e))?;
        let row = i + 1;

        let timestamp = match meal_time {
            MealTime::Combined(idx) => timestamp_field(&record, idx, parse_timestamp, path, row)?,
            MealTime::Split(date_idx, time_idx) => {
                let joined = format!("{} {}", field(&record, date_idx), field(&record, time_idx));
                match parse_timestamp(&joined) {
                    Some(ts) => ts,
                    None => {
                        return Err(DataLoadError::InvalidTimestamp {
                            path: path.to_path_buf(),
                            record: row,
                            value: joined,
                        })
                    }
                }
            }
        };

        let label = optional_text(&record, Some(meal_idx));
        if label.is_none() {
            debug!("Unlabeled food log row at {}", timestamp);
        }
        let meal = MealEvent {
            timestamp,
            label,
            protein: number_field(&record, protein_idx, "P_Macro", path, row)?,
            fat: number_field(&record, fat_idx, "F_Macro", path, row)?,
            carbs: number_field(&record, carbs_idx, "C_Macro", path, row)?,
        };

        match meals.get_mut(&timestamp) {
            Some(existing) => combine_meals(existing, meal),
            None => {
                meals.insert(timestamp, meal);
            }
        }
    }

    let meals: Vec<MealEvent> = meals.into_values().collect();
    info!("Loaded {} meals from {}", meals.len(), path.display());
    Ok(meals)
}

fn combine_meals(existing: &mut MealEvent, other: MealEvent) {
    let add = |a: Option<f64>, b: Option<f64>| match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    };
    existing.label = match (existing.label.take(), other.label) {
        (Some(a), Some(b)) => Some(format!("{}; {}", a, b)),
        (a, b) => a.or(b),
    };
    existing.protein = add(existing.protein, other.protein);
    existing.fat = add(existing.fat, other.fat);
    existing.carbs = add(existing.carbs, other.carbs);
}

/// Locate and load all four sources named in `config`.
pub fn load_all_data(config: &TrackerConfig) -> Result<SourceTables, DataLoadError> {
    let dir = &config.data_dir;
    let glucose = load_glucose_data(&locate_source(dir, &config.glucose_file)?)?;
    let sleep = load_sleep_data(&locate_source(dir, &config.sleep_file)?)?;
    let workouts = load_workout_data(&locate_source(dir, &config.workout_file)?)?;
    let nutrition = load_nutrition_data(&locate_source(dir, &config.nutrition_file)?)?;

    SourceTables::new(glucose, sleep, workouts, nutrition)
}
