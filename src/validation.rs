use crate::timeline::{ActivityColumn, MergedTable};
use crate::TimePoint;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityCoverage {
    pub sleep: f64,
    pub strength: f64,
    pub cardio: f64,
    pub nutrition_events: usize,
}

/// Data-quality and coverage metrics of a merged table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub total_records: usize,
    pub date_range: Option<(TimePoint, TimePoint)>,
    pub missing_glucose_pct: f64,
    pub activity_coverage: ActivityCoverage,
}

impl ValidationReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub fn validate_processed_data(table: &MergedTable) -> ValidationReport {
    let total = table.len();
    let pct = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        }
    };
    let flagged = |column: ActivityColumn| {
        table
            .activity(column)
            .iter()
            .map(|&f| f as usize)
            .sum::<usize>()
    };

    ValidationReport {
        total_records: total,
        date_range: (total > 0).then(|| (table.timeline.start(), table.timeline.end())),
        missing_glucose_pct: pct(table.historic_glucose.iter().filter(|v| v.is_none()).count()),
        activity_coverage: ActivityCoverage {
            sleep: pct(flagged(ActivityColumn::Sleep)),
            strength: pct(flagged(ActivityColumn::Strength)),
            cardio: pct(flagged(ActivityColumn::Cardio)),
            nutrition_events: flagged(ActivityColumn::Nutrition),
        },
    }
}
