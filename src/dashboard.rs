//! SVG dashboard with one panel per calendar day.
//!
//! Each panel shows the raw historic glucose line over the shaded target band,
//! sleep/strength/cardio spans, meal markers and a statistics column.

use crate::config::TrackerConfig;
use crate::error::ProcessingError;
use crate::metrics::{daily_summaries, day_ranges, DailySummary};
use crate::timeline::MergedTable;
use chrono::Timelike;
use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

const MINUTES_PER_DAY: usize = 1440;
const MEAL_COLOR: RGBColor = RGBColor(255, 140, 0);
const SLEEP_COLOR: RGBColor = RGBColor(90, 90, 160);
const STRENGTH_COLOR: RGBColor = RGBColor(200, 60, 60);
const CARDIO_COLOR: RGBColor = RGBColor(160, 60, 200);

fn render_error(e: impl std::fmt::Display) -> ProcessingError {
    ProcessingError::Render(e.to_string())
}

/// Runs of consecutive set flags as inclusive `(first, last)` offsets.
fn flagged_runs(flags: &[u8]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    for (i, &flag) in flags.iter().enumerate() {
        match (flag != 0, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i - 1));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, flags.len() - 1));
    }
    runs
}

pub fn render_dashboard(
    table: &MergedTable,
    config: &TrackerConfig,
    output_path: &Path,
) -> Result<(), ProcessingError> {
    let days = daily_summaries(table, &config.target_range);
    if days.is_empty() {
        return Err(ProcessingError::Render("no days to plot".to_string()));
    }

    if let Some(dir) = output_path.parent() {
        std::fs::create_dir_all(dir).map_err(render_error)?;
    }

    let y_max = table
        .historic_glucose
        .iter()
        .flatten()
        .fold(15.0f64, |acc, &v| acc.max(v))
        .ceil()
        + 1.0;

    let (width, height) = config.figure_size;
    let root =
        SVGBackend::new(output_path, (width, height * days.len() as u32)).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let panels = root.split_evenly((days.len(), 1));
    for ((panel, day), rows) in panels.iter().zip(&days).zip(day_ranges(table)) {
        draw_day(panel, table, rows, day, config, y_max)?;
    }

    root.present().map_err(render_error)?;
    info!("Dashboard saved to {}", output_path.display());
    Ok(())
}

fn draw_day(
    panel: &DrawingArea<SVGBackend<'_>, Shift>,
    table: &MergedTable,
    rows: Range<usize>,
    day: &DailySummary,
    config: &TrackerConfig,
    y_max: f64,
) -> Result<(), ProcessingError> {
    let (width, _) = panel.dim_in_pixel();
    let (chart_area, stats_area) = panel.split_horizontally((width * 5 / 6) as i32);

    // Minute of day of the first row; only a timeline not starting at midnight shifts it.
    let offset = table.timeline.at(rows.start).time().num_seconds_from_midnight() as usize / 60;
    let x = |i: usize| (offset + i - rows.start) as f64;

    let mut chart = ChartBuilder::on(&chart_area)
        .caption(day.date.format("%A %d %B %Y").to_string(), ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(0f64..MINUTES_PER_DAY as f64, 0f64..y_max)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_labels(13)
        .x_label_formatter(&|m| format!("{:02}:{:02}", (*m as i64) / 60, (*m as i64) % 60))
        .y_desc("mmol/L")
        .draw()
        .map_err(render_error)?;

    let range = config.target_range;
    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(0.0, range.min), (MINUTES_PER_DAY as f64, range.max)],
            GREEN.mix(0.15).filled(),
        )))
        .map_err(render_error)?;

    let spans = [
        (&table.sleep[rows.clone()], SLEEP_COLOR.mix(0.15)),
        (&table.strength[rows.clone()], STRENGTH_COLOR.mix(0.2)),
        (&table.cardio[rows.clone()], CARDIO_COLOR.mix(0.2)),
    ];
    for (flags, color) in spans {
        chart
            .draw_series(flagged_runs(flags).into_iter().map(|(first, last)| {
                Rectangle::new(
                    [
                        (x(rows.start + first), 0.0),
                        (x(rows.start + last) + 1.0, y_max),
                    ],
                    color.filled(),
                )
            }))
            .map_err(render_error)?;
    }

    let glucose: Vec<(f64, f64)> = rows
        .clone()
        .filter_map(|i| table.historic_glucose[i].map(|v| (x(i), v)))
        .collect();
    chart
        .draw_series(LineSeries::new(glucose, BLUE.stroke_width(2)))
        .map_err(render_error)?;

    chart
        .draw_series(
            rows.clone()
                .filter(|&i| table.nutrition[i] != 0)
                .map(|i| Circle::new((x(i), y_max * 0.95), 5, MEAL_COLOR.filled())),
        )
        .map_err(render_error)?;

    let stats = &day.glucose;
    let lines = [
        "Statistics".to_string(),
        format!("Readings: {}", stats.count),
        format!("Mean: {:.1}", stats.mean),
        format!("Median: {:.1}", stats.median),
        format!("Std Dev: {:.1}", stats.std_dev),
        format!("CV: {:.1}%", stats.cv),
        format!("TIR: {:.1}%", stats.time_in_range),
        format!("Below: {:.1}%", stats.time_below_range),
        format!("Above: {:.1}%", stats.time_above_range),
        format!("Sleep: {}:{:02}h", day.sleep_minutes / 60, day.sleep_minutes % 60),
        format!("Meals: {}", day.meals),
    ];
    let font = ("sans-serif", 14).into_font();
    for (i, line) in lines.iter().enumerate() {
        stats_area
            .draw(&Text::new(line.as_str(), (10, 30 + 20 * i as i32), font.clone()))
            .map_err(render_error)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::ts;
    use crate::timeline::Timeline;
    use tempfile::TempDir;

    #[test]
    fn test_flagged_runs() {
        assert_eq!(flagged_runs(&[0, 1, 1, 0, 0, 1]), vec![(1, 2), (5, 5)]);
        assert_eq!(flagged_runs(&[1, 1, 1]), vec![(0, 2)]);
        assert!(flagged_runs(&[0, 0]).is_empty());
        assert!(flagged_runs(&[]).is_empty());
    }

    #[test]
    fn test_render_writes_svg() {
        let mut table = MergedTable::new(Timeline::between(
            ts("2024-01-01 00:00"),
            ts("2024-01-02 00:00"),
        ));
        for i in (0..table.len()).step_by(15) {
            table.historic_glucose[i] = Some(5.0 + (i % 120) as f64 / 30.0);
        }
        table.sleep[..360].fill(1);
        table.strength[1080..1140].fill(1);
        table.nutrition[780] = 1;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dash").join("dashboard.svg");
        render_dashboard(&table, &TrackerConfig::default(), &path).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("TIR"));
        // The closing midnight gets no panel of its own.
        assert_eq!(svg.matches("Statistics").count(), 1);
    }
}
