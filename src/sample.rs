//! Deterministic sample exports in the four source formats.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use log::info;
use std::f64::consts::PI;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::config::TrackerConfig;

const MEALS: [(u32, &str, f64, f64, f64); 3] = [
    (8, "Breakfast", 25.0, 15.0, 45.0),
    (13, "Lunch", 35.0, 20.0, 55.0),
    (19, "Dinner", 38.0, 25.0, 50.0),
];
const SLEEP_QUALITY: [&str; 4] = ["Excellent", "Good", "Fair", "Poor"];
const WORKOUT_TYPES: [&str; 3] = ["Strength", "Cardio", "Mixed"];

fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
}

/// Baseline circadian wave plus a bump after each meal and a little
/// reproducible jitter.
fn sample_glucose(t: NaiveDateTime, i: usize) -> f64 {
    let minute = (t - t.date().and_time(NaiveTime::MIN)).num_minutes() as f64;
    let baseline = 6.5 + 0.8 * (2.0 * PI * (minute - 360.0) / 1440.0).sin();
    let meal_bump: f64 = MEALS
        .iter()
        .map(|(hour, ..)| {
            let since = minute - (*hour as f64 * 60.0 + 45.0);
            2.5 * (-(since * since) / (2.0 * 30.0 * 30.0)).exp()
        })
        .sum();
    let jitter = ((i * 7919) % 100) as f64 / 100.0 - 0.5;
    (baseline + meal_bump + jitter * 0.6).clamp(3.0, 15.0)
}

fn write_glucose(path: &Path, start: NaiveDate, days: i64) -> Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "Glucose Data,Generated on,{},Generated by,Sample", start.format("%d-%m-%Y"))?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record([
        "Device",
        "Serial Number",
        "Device Timestamp",
        "Record Type",
        "Historic Glucose mmol/L",
        "Scan Glucose mmol/L",
    ])?;

    let first = at(start, 0, 0);
    let count = (days * 1440 / 5) as usize;
    for i in 0..count {
        let t = first + Duration::minutes(5 * i as i64);
        let value = sample_glucose(t, i);
        let scan = if i % 6 == 0 {
            format!("{:.1}", value * 1.02)
        } else {
            String::new()
        };
        writer.write_record([
            "FreeStyle LibreLink".to_string(),
            "SAMPLE-0001".to_string(),
            t.format("%d-%m-%Y %H:%M").to_string(),
            "0".to_string(),
            format!("{:.1}", value),
            scan,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_sleep(path: &Path, start: NaiveDate, days: i64) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_path(path)?;
    writer.write_record([
        "Start",
        "End",
        "Sleep Quality",
        "Time in bed (seconds)",
        "Time asleep (seconds)",
    ])?;
    for day in 0..days {
        let sleep_start = at(start + Duration::days(day), 22, 30);
        let sleep_end = sleep_start + Duration::minutes(8 * 60 + 15);
        writer.write_record([
            sleep_start.format("%Y-%m-%d %H:%M:%S").to_string(),
            sleep_end.format("%Y-%m-%d %H:%M:%S").to_string(),
            SLEEP_QUALITY[day as usize % SLEEP_QUALITY.len()].to_string(),
            (8.25 * 3600.0).to_string(),
            (7.5 * 3600.0).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_workouts(path: &Path, start: NaiveDate) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["start_time", "end_time", "workout_type"])?;
    for (i, kind) in WORKOUT_TYPES.iter().enumerate() {
        let workout_start = at(start + Duration::days(1 + 2 * i as i64), 18, 0);
        let workout_end = workout_start + Duration::minutes(90);
        writer.write_record([
            workout_start.format("%Y-%m-%d %H:%M:%S").to_string(),
            workout_end.format("%Y-%m-%d %H:%M:%S").to_string(),
            kind.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_nutrition(path: &Path, start: NaiveDate, days: i64) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Date", "Time", "Meal", "P_Macro", "F_Macro", "C_Macro"])?;
    for day in 0..days {
        let date = start + Duration::days(day);
        for (hour, name, protein, fat, carbs) in MEALS {
            let shift = (day % 3) as f64 * 5.0;
            writer.write_record([
                date.format("%d/%m/%Y").to_string(),
                format!("{:02}:00", hour),
                format!("{} - Sample meal", name),
                (protein + shift).to_string(),
                (fat + shift / 2.0).to_string(),
                (carbs + shift).to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write `days` days of sample data starting at `start` into the files named
/// by `config`, inside `config.data_dir`.
pub fn write_sample_data(config: &TrackerConfig, start: NaiveDate, days: i64) -> Result<()> {
    let dir = &config.data_dir;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

    write_glucose(&dir.join(&config.glucose_file), start, days)?;
    write_sleep(&dir.join(&config.sleep_file), start, days)?;
    write_workouts(&dir.join(&config.workout_file), start)?;
    write_nutrition(&dir.join(&config.nutrition_file), start, days)?;

    info!("Sample data for {} days written to {}", days, dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_glucose_is_deterministic_and_bounded() {
        let t = at(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 8, 45);
        assert_eq!(sample_glucose(t, 3), sample_glucose(t, 3));
        for i in 0..500 {
            let v = sample_glucose(t + Duration::minutes(i), i as usize);
            assert!((3.0..=15.0).contains(&v));
        }
    }
}
