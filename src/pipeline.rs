use crate::alignment::{mark_intervals, mark_workouts, merge_glucose, merge_nutrition};
use crate::config::TrackerConfig;
use crate::dashboard;
use crate::data_loading;
use crate::error::{ProcessingError, TrackerError};
use crate::metrics::derive_metrics;
use crate::timeline::{ActivityColumn, MergedTable, Timeline};
use crate::validation::{validate_processed_data, ValidationReport};
use crate::SourceTables;
use log::{error, info};
use std::path::Path;

/// Build the merged per-minute table from loaded sources.
pub fn merge_all_data(sources: &SourceTables) -> Result<MergedTable, ProcessingError> {
    let timeline = Timeline::spanning(sources.glucose())?;
    let mut table = MergedTable::new(timeline);

    merge_glucose(&mut table, sources.glucose());
    merge_nutrition(&mut table, sources.nutrition());
    mark_intervals(&mut table, sources.sleep(), ActivityColumn::Sleep);
    mark_workouts(&mut table, sources.workouts());
    derive_metrics(&mut table);
    table.check_shape()?;

    info!(
        "Successfully merged data covering {} to {}",
        timeline.start(),
        timeline.end()
    );
    Ok(table)
}

/// Runs load → merge → render in order, refusing to skip a stage.
pub struct GlucoseTracker {
    config: TrackerConfig,
    sources: Option<SourceTables>,
    processed: Option<MergedTable>,
}

impl GlucoseTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            sources: None,
            processed: None,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn load_data(&mut self) -> Result<&SourceTables, TrackerError> {
        match data_loading::load_all_data(&self.config) {
            Ok(sources) => {
                info!("Data loaded successfully");
                self.processed = None;
                Ok(&*self.sources.insert(sources))
            }
            Err(e) => {
                error!("Failed to load data: {}", e);
                Err(e.into())
            }
        }
    }

    /// Use already loaded tables instead of reading the data directory.
    pub fn with_sources(mut self, sources: SourceTables) -> Self {
        self.sources = Some(sources);
        self.processed = None;
        self
    }

    pub fn process_data(&mut self) -> Result<&MergedTable, ProcessingError> {
        let sources = self.sources.as_ref().ok_or(ProcessingError::NoData)?;
        let merged = merge_all_data(sources).inspect_err(|e| error!("Failed to merge data: {}", e))?;
        Ok(&*self.processed.insert(merged))
    }

    pub fn processed(&self) -> Result<&MergedTable, ProcessingError> {
        self.processed.as_ref().ok_or(ProcessingError::NotProcessed)
    }

    pub fn validate(&self) -> Result<ValidationReport, ProcessingError> {
        Ok(validate_processed_data(self.processed()?))
    }

    pub fn generate_dashboard(&self, output_path: &Path) -> Result<(), ProcessingError> {
        let table = self.processed()?;
        dashboard::render_dashboard(table, &self.config, output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::ts;
    use crate::{GlucoseReading, MealEvent, SleepSession};

    fn sources() -> SourceTables {
        let glucose = ["2024-01-01 21:59", "2024-01-01 22:00", "2024-01-01 22:03"]
            .iter()
            .zip([5.0, 6.0, 9.0])
            .map(|(t, v)| GlucoseReading {
                timestamp: ts(t),
                historic: Some(v),
                scan: None,
            })
            .collect();
        let sleep = vec![SleepSession {
            start: ts("2024-01-01 22:00"),
            end: ts("2024-01-02 06:00"),
            quality: None,
            time_asleep: None,
        }];
        let meals = vec![MealEvent {
            timestamp: ts("2024-01-01 19:00"),
            label: Some("Dinner".to_string()),
            protein: None,
            fat: None,
            carbs: Some(60.0),
        }];
        SourceTables::new(glucose, sleep, vec![], meals).unwrap()
    }

    #[test]
    fn test_process_before_load_fails() {
        let mut tracker = GlucoseTracker::new(TrackerConfig::default());
        assert!(matches!(tracker.process_data(), Err(ProcessingError::NoData)));
        assert!(matches!(tracker.validate(), Err(ProcessingError::NotProcessed)));
    }

    #[test]
    fn test_merge_all_data() {
        let table = merge_all_data(&sources()).unwrap();
        assert_eq!(table.timeline.start(), ts("2024-01-01 00:00"));
        assert_eq!(table.timeline.end(), ts("2024-01-02 00:00"));

        let at = |t: &str| table.timeline.position(ts(t)).unwrap();
        assert_eq!(table.sleep[at("2024-01-01 21:59")], 0);
        assert_eq!(table.sleep[at("2024-01-01 22:00")], 1);
        assert_eq!(table.sleep[at("2024-01-02 00:00")], 1);
        assert_eq!(table.rate_of_change[at("2024-01-01 22:00")], Some(1.0));
        let interpolated = table.glucose_interpolated[at("2024-01-01 22:02")].unwrap();
        assert!((interpolated - 8.0).abs() < 1e-9);
        assert_eq!(table.nutrition[at("2024-01-01 19:00")], 1);
        assert_eq!(table.carbs[at("2024-01-01 19:00")], Some(60.0));
    }

    #[test]
    fn test_empty_glucose_aborts_merge() {
        let sources = SourceTables::new(vec![], vec![], vec![], vec![]).unwrap();
        let mut tracker = GlucoseTracker::new(TrackerConfig::default()).with_sources(sources);
        assert!(matches!(
            tracker.process_data(),
            Err(ProcessingError::EmptyGlucose)
        ));
        assert!(tracker.processed().is_err());
    }

    #[test]
    fn test_validate_after_processing() {
        let mut tracker = GlucoseTracker::new(TrackerConfig::default()).with_sources(sources());
        tracker.process_data().unwrap();
        let report = tracker.validate().unwrap();
        assert_eq!(report.total_records, 1441);
        assert_eq!(report.activity_coverage.nutrition_events, 1);
    }
}
