pub mod alignment;
pub mod config;
pub mod dashboard;
pub mod data_loading;
pub mod error;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod sample;
pub mod timeline;
pub mod validation;

use chrono::{Duration, NaiveDateTime, Timelike};
use error::DataLoadError;

/// Instant on the merged timeline. Point samples are truncated to the minute
/// so they join exactly; interval bounds keep their seconds.
pub type TimePoint = NaiveDateTime;

/// Drop seconds and sub-seconds so the instant lands on a timeline minute.
pub fn truncate_to_minute(ts: NaiveDateTime) -> TimePoint {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// A source row that covers a closed `[start, end]` span of time.
pub trait Interval {
    fn start(&self) -> TimePoint;
    fn end(&self) -> TimePoint;
}

/// A source row sampled at a single instant.
pub trait PointSample {
    fn timestamp(&self) -> TimePoint;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlucoseReading {
    pub timestamp: TimePoint,
    pub historic: Option<f64>, // mmol/L
    pub scan: Option<f64>,     // mmol/L
}

#[derive(Debug, Clone, PartialEq)]
pub struct SleepSession {
    pub start: TimePoint,
    pub end: TimePoint,
    pub quality: Option<String>,
    pub time_asleep: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkoutKind {
    Strength,
    Cardio,
    Other(String),
}

impl WorkoutKind {
    pub fn parse(label: &str) -> Option<WorkoutKind> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        Some(match label.to_ascii_lowercase().as_str() {
            "strength" => WorkoutKind::Strength,
            "cardio" => WorkoutKind::Cardio,
            _ => WorkoutKind::Other(label.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSession {
    pub start: TimePoint,
    pub end: TimePoint,
    pub kind: Option<WorkoutKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MealEvent {
    pub timestamp: TimePoint,
    /// `None` for food log rows without a meal name; their macros still merge.
    pub label: Option<String>,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub carbs: Option<f64>,
}

impl SleepSession {
    /// Time asleep when the export records it, otherwise time in bed.
    pub fn sleep_duration(&self) -> Duration {
        self.time_asleep.unwrap_or(self.end - self.start)
    }
}

impl Interval for SleepSession {
    fn start(&self) -> TimePoint {
        self.start
    }
    fn end(&self) -> TimePoint {
        self.end
    }
}

impl Interval for WorkoutSession {
    fn start(&self) -> TimePoint {
        self.start
    }
    fn end(&self) -> TimePoint {
        self.end
    }
}

impl PointSample for GlucoseReading {
    fn timestamp(&self) -> TimePoint {
        self.timestamp
    }
}

impl PointSample for MealEvent {
    fn timestamp(&self) -> TimePoint {
        self.timestamp
    }
}

/// The four loaded source tables. Immutable once constructed.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    glucose: Vec<GlucoseReading>,
    sleep: Vec<SleepSession>,
    workouts: Vec<WorkoutSession>,
    nutrition: Vec<MealEvent>,
}

impl SourceTables {
    /// Point tables must be strictly increasing in time and every interval
    /// must end no earlier than it starts.
    pub fn new(
        glucose: Vec<GlucoseReading>,
        sleep: Vec<SleepSession>,
        workouts: Vec<WorkoutSession>,
        nutrition: Vec<MealEvent>,
    ) -> Result<Self, DataLoadError> {
        check_strictly_increasing("glucose", &glucose)?;
        check_strictly_increasing("nutrition", &nutrition)?;
        check_intervals("sleep", &sleep)?;
        check_intervals("workouts", &workouts)?;

        Ok(Self {
            glucose,
            sleep,
            workouts,
            nutrition,
        })
    }

    pub fn glucose(&self) -> &[GlucoseReading] {
        &self.glucose
    }

    pub fn sleep(&self) -> &[SleepSession] {
        &self.sleep
    }

    pub fn workouts(&self) -> &[WorkoutSession] {
        &self.workouts
    }

    pub fn nutrition(&self) -> &[MealEvent] {
        &self.nutrition
    }
}

fn check_strictly_increasing<P: PointSample>(
    table: &'static str,
    rows: &[P],
) -> Result<(), DataLoadError> {
    match rows
        .windows(2)
        .position(|w| w[0].timestamp() >= w[1].timestamp())
    {
        Some(i) => Err(DataLoadError::Unordered {
            table,
            index: i + 1,
        }),
        None => Ok(()),
    }
}

fn check_intervals<I: Interval>(table: &'static str, rows: &[I]) -> Result<(), DataLoadError> {
    match rows.iter().position(|r| r.end() < r.start()) {
        Some(index) => Err(DataLoadError::InvalidInterval { table, index }),
        None => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::ts;
    use super::*;

    #[test]
    fn test_truncate_to_minute() {
        let t = NaiveDateTime::parse_from_str("2024-01-01 08:15:42.5", "%Y-%m-%d %H:%M:%S%.f")
            .unwrap();
        assert_eq!(truncate_to_minute(t), ts("2024-01-01 08:15"));
    }

    #[test]
    fn test_workout_kind_parse() {
        assert_eq!(WorkoutKind::parse("Strength"), Some(WorkoutKind::Strength));
        assert_eq!(WorkoutKind::parse(" cardio "), Some(WorkoutKind::Cardio));
        assert_eq!(
            WorkoutKind::parse("Mixed"),
            Some(WorkoutKind::Other("Mixed".to_string()))
        );
        assert_eq!(WorkoutKind::parse(""), None);
    }

    #[test]
    fn test_source_tables_reject_unordered_glucose() {
        let reading = |t| GlucoseReading {
            timestamp: ts(t),
            historic: Some(5.0),
            scan: None,
        };
        let err = SourceTables::new(
            vec![reading("2024-01-01 08:01"), reading("2024-01-01 08:00")],
            vec![],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, DataLoadError::Unordered { table: "glucose", index: 1 }));
    }

    #[test]
    fn test_sleep_duration_prefers_time_asleep() {
        let mut session = SleepSession {
            start: ts("2024-01-01 22:30"),
            end: ts("2024-01-02 06:45"),
            quality: None,
            time_asleep: Some(Duration::minutes(450)),
        };
        assert_eq!(session.sleep_duration(), Duration::minutes(450));

        session.time_asleep = None;
        assert_eq!(session.sleep_duration(), Duration::minutes(495));
    }

    #[test]
    fn test_source_tables_reject_reversed_interval() {
        let err = SourceTables::new(
            vec![],
            vec![SleepSession {
                start: ts("2024-01-02 06:00"),
                end: ts("2024-01-01 22:00"),
                quality: None,
                time_asleep: None,
            }],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidInterval { table: "sleep", index: 0 }));
    }
}
