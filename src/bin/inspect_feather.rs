use anyhow::{Context, Result};
use arrow::ipc::reader::FileReaderBuilder;
use glucose_tracker::output::MERGED_COLUMNS;
use std::fs::File;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        println!("Usage: {} <feather_file>", args[0]);
        std::process::exit(1);
    }

    let file = File::open(&args[1]).with_context(|| format!("Failed to open {}", args[1]))?;
    let reader = FileReaderBuilder::new().build(file)?;
    let schema = reader.schema();

    println!("\nSchema:");
    println!("{:#?}", schema);

    let missing: Vec<&str> = MERGED_COLUMNS
        .iter()
        .copied()
        .filter(|name| schema.field_with_name(name).is_err())
        .collect();
    if !missing.is_empty() {
        println!("\nNot a merged glucose table, missing columns: {:?}", missing);
    }

    let mut rows = 0;
    for batch in reader {
        rows += batch?.num_rows();
    }
    println!("\nRows: {}", rows);

    Ok(())
}
