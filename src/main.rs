use anyhow::{Context, Result};
use chrono::{Duration, Local};
use clap::Parser;
use glucose_tracker::config::Args;
use glucose_tracker::metrics::{daily_summaries, GlucoseStats};
use glucose_tracker::output::{write_merged_csv, write_merged_feather};
use glucose_tracker::pipeline::GlucoseTracker;
use glucose_tracker::sample::write_sample_data;
use glucose_tracker::SourceTables;
use log::{debug, info};

const SAMPLE_DAYS: i64 = 7;

fn print_data_summary(sources: &SourceTables) {
    println!("\n{}", "=".repeat(60));
    println!("DATA SUMMARY");
    println!("{}", "=".repeat(60));

    let glucose = sources.glucose();
    println!("Glucose Data:");
    println!("   Records: {}", glucose.len());
    if let (Some(first), Some(last)) = (glucose.first(), glucose.last()) {
        println!(
            "   Date range: {} to {}",
            first.timestamp.date(),
            last.timestamp.date()
        );
    }
    let historic: Vec<Option<f64>> = glucose.iter().map(|r| r.historic).collect();
    let mean = GlucoseStats::from_series(&historic, &Default::default()).mean;
    println!("   Average glucose: {:.1} mmol/L", mean);

    let sleep = sources.sleep();
    println!("\nSleep Data:");
    println!("   Sleep sessions: {}", sleep.len());
    if !sleep.is_empty() {
        let total: i64 = sleep.iter().map(|s| s.sleep_duration().num_minutes()).sum();
        println!(
            "   Average sleep duration: {:.1} hours",
            total as f64 / sleep.len() as f64 / 60.0
        );
    }

    println!("\nWorkout Data:");
    println!("   Workout sessions: {}", sources.workouts().len());

    println!("\nNutrition Data:");
    let labeled = sources.nutrition().iter().filter(|m| m.label.is_some()).count();
    println!("   Meal entries: {}", labeled);
    if labeled < sources.nutrition().len() {
        println!("   Unlabeled entries: {}", sources.nutrition().len() - labeled);
    }
    println!("{}", "=".repeat(60));
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    let args = Args::parse();
    let config = args.resolve_config().context("Invalid configuration")?;
    debug!("Effective configuration: {:?}", config);

    if args.create_sample {
        let start = Local::now().date_naive() - Duration::days(SAMPLE_DAYS);
        write_sample_data(&config, start, SAMPLE_DAYS).context("Failed to create sample data")?;
        println!("Sample data written to {}", config.data_dir.display());
    }

    let mut tracker = GlucoseTracker::new(config);

    let sources = tracker.load_data().context("Failed to load data")?;
    print_data_summary(sources);

    tracker.process_data().context("Data merging failed")?;

    let report = tracker.validate()?;
    info!("Validation report:\n{}", report.to_json()?);
    println!(
        "\nMerged {} minutes, {:.1}% without glucose",
        report.total_records, report.missing_glucose_pct
    );

    if let Some(path) = &args.report_output {
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Validation report written to {}", path.display());
    }

    let table = tracker.processed()?;
    if args.summary {
        println!("\nDaily statistics:");
        for day in daily_summaries(table, &tracker.config().target_range) {
            println!(
                "  {}  mean {:>5.1}  median {:>5.1}  CV {:>5.1}%  TIR {:>5.1}%  sleep {}:{:02}h  meals {}",
                day.date,
                day.glucose.mean,
                day.glucose.median,
                day.glucose.cv,
                day.glucose.time_in_range,
                day.sleep_minutes / 60,
                day.sleep_minutes % 60,
                day.meals
            );
        }
    }

    if let Some(path) = &args.csv_output {
        write_merged_csv(table, path)?;
        println!("Merged table written to {}", path.display());
    }
    if let Some(path) = &args.feather_output {
        write_merged_feather(table, path)?;
        println!("Merged table written to {}", path.display());
    }

    if !args.no_dashboard {
        tracker
            .generate_dashboard(&args.dashboard)
            .context("Failed to generate dashboard")?;
        println!("Dashboard saved to: {}", args.dashboard.display());
    }

    Ok(())
}
