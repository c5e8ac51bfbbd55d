use crate::config::TargetRange;
use crate::timeline::MergedTable;
use crate::TimePoint;
use chrono::NaiveDate;
use log::debug;
use serde::Serialize;
use std::ops::Range;

/// First difference per elapsed minute. Row 0 and any row whose value or
/// predecessor is null yield null.
pub fn rate_of_change(timestamps: &[TimePoint], values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut roc = Vec::with_capacity(values.len());
    if values.is_empty() {
        return roc;
    }
    roc.push(None);

    for i in 1..values.len() {
        let minutes = (timestamps[i] - timestamps[i - 1]).num_seconds() as f64 / 60.0;
        let value = match (values[i - 1], values[i]) {
            (Some(prev), Some(curr)) if minutes != 0.0 => Some((curr - prev) / minutes),
            _ => None,
        };
        roc.push(value);
    }

    roc
}

/// Linear interpolation across null gaps, weighted by elapsed time between
/// the two nearest non-null neighbours. Leading and trailing nulls stay null.
pub fn interpolate_linear(timestamps: &[TimePoint], values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut interpolated = values.to_vec();
    let mut prev: Option<usize> = None;

    for i in 0..values.len() {
        if values[i].is_none() {
            continue;
        }
        if let Some(p) = prev {
            if i - p > 1 {
                let (t1, v1) = (timestamps[p], values[p].unwrap_or_default());
                let (t2, v2) = (timestamps[i], values[i].unwrap_or_default());
                let total_duration = (t2 - t1).num_seconds() as f64;

                for (j, slot) in interpolated.iter_mut().enumerate().take(i).skip(p + 1) {
                    let weight = (timestamps[j] - t1).num_seconds() as f64 / total_duration;
                    *slot = Some(v1 + (v2 - v1) * weight);
                }
            }
        }
        prev = Some(i);
    }

    interpolated
}

/// Fill the derived columns of a merged table from its historic glucose.
pub fn derive_metrics(table: &mut MergedTable) {
    let timestamps: Vec<TimePoint> = table.timeline.iter().collect();
    table.rate_of_change = rate_of_change(&timestamps, &table.historic_glucose);
    table.glucose_interpolated = interpolate_linear(&timestamps, &table.historic_glucose);

    debug!(
        "Derived metrics: {} interpolated values from {} readings",
        table.glucose_interpolated.iter().flatten().count(),
        table.historic_glucose.iter().flatten().count()
    );
}

/// Aggregate statistics of a glucose series. An empty series reports a count
/// of 0 and 0.0 for every statistic.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GlucoseStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    /// Coefficient of variation in percent.
    pub cv: f64,
    pub min: f64,
    pub max: f64,
    pub time_in_range: f64,
    pub time_below_range: f64,
    pub time_above_range: f64,
}

impl GlucoseStats {
    pub fn from_series(values: &[Option<f64>], range: &TargetRange) -> GlucoseStats {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        Self::from_values(&present, range)
    }

    pub fn from_values(values: &[f64], range: &TargetRange) -> GlucoseStats {
        let n = values.len();
        if n == 0 {
            return GlucoseStats::default();
        }

        let count = n as f64;
        let mean = values.iter().sum::<f64>() / count;
        let variance = values
            .iter()
            .map(|&x| {
                let diff = x - mean;
                diff * diff
            })
            .sum::<f64>()
            / count;
        let std_dev = variance.sqrt();

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = n / 2;
        let median = if n % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        let pct = |k: usize| k as f64 / count * 100.0;

        GlucoseStats {
            count: n,
            mean,
            median,
            std_dev,
            cv: if mean != 0.0 { std_dev / mean * 100.0 } else { 0.0 },
            min: sorted[0],
            max: sorted[n - 1],
            time_in_range: pct(values.iter().filter(|&&v| range.contains(v)).count()),
            time_below_range: pct(values.iter().filter(|&&v| v < range.min).count()),
            time_above_range: pct(values.iter().filter(|&&v| v > range.max).count()),
        }
    }
}

/// Percentage of non-null readings inside `range`; 0.0 for an empty series.
pub fn time_in_range(values: &[Option<f64>], range: &TargetRange) -> f64 {
    GlucoseStats::from_series(values, range).time_in_range
}

/// Per-calendar-day glucose statistics and activity totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub glucose: GlucoseStats,
    pub sleep_minutes: usize,
    pub strength_minutes: usize,
    pub cardio_minutes: usize,
    pub meals: usize,
}

/// Row ranges of each calendar date, in timeline order. The closing midnight
/// of a multi-day timeline is not a date of its own unless it holds a reading.
pub fn day_ranges(table: &MergedTable) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    let mut current = None;
    for (i, minute) in table.timeline.iter().enumerate() {
        let date = minute.date();
        if current != Some(date) {
            ranges.push(i..i);
            current = Some(date);
        }
        if let Some(range) = ranges.last_mut() {
            range.end = i + 1;
        }
    }

    let closing_only = ranges.len() > 1
        && ranges
            .last()
            .is_some_and(|last| last.len() == 1 && table.historic_glucose[last.start].is_none());
    if closing_only {
        ranges.pop();
    }
    ranges
}

pub fn daily_summaries(table: &MergedTable, range: &TargetRange) -> Vec<DailySummary> {
    day_ranges(table)
        .into_iter()
        .map(|rows| {
            let values: Vec<f64> = table.historic_glucose[rows.clone()]
                .iter()
                .flatten()
                .copied()
                .collect();
            let flagged = |column: &[u8]| -> usize {
                column[rows.clone()].iter().map(|&f| f as usize).sum()
            };
            DailySummary {
                date: table.timeline.at(rows.start).date(),
                glucose: GlucoseStats::from_values(&values, range),
                sleep_minutes: flagged(&table.sleep),
                strength_minutes: flagged(&table.strength),
                cardio_minutes: flagged(&table.cardio),
                meals: flagged(&table.nutrition),
            }
        })
        .collect()
}
