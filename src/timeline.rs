use crate::error::ProcessingError;
use crate::{GlucoseReading, TimePoint};
use chrono::{Duration, NaiveTime};
use serde::Serialize;

const MINUTE_MS: i64 = 60_000;

/// Uniform per-minute index, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    start: TimePoint,
    len: usize,
}

impl Timeline {
    /// Span `[floor(min ts, day), ceil(max ts, day)]` of the glucose readings.
    pub fn spanning(glucose: &[GlucoseReading]) -> Result<Timeline, ProcessingError> {
        let min = glucose.iter().map(|r| r.timestamp).min();
        let max = glucose.iter().map(|r| r.timestamp).max();
        let (Some(min), Some(max)) = (min, max) else {
            return Err(ProcessingError::EmptyGlucose);
        };

        Ok(Self::between(floor_day(min), ceil_day(max)))
    }

    /// Minutes from `start` to `end` inclusive; `end` before `start` yields a
    /// single-minute timeline at `start`.
    pub fn between(start: TimePoint, end: TimePoint) -> Timeline {
        let span = (end - start).num_minutes().max(0) as usize;
        Timeline {
            start,
            len: span + 1,
        }
    }

    pub fn start(&self) -> TimePoint {
        self.start
    }

    pub fn end(&self) -> TimePoint {
        self.at(self.len - 1)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elapsed minutes between the first and the last entry.
    pub fn span_minutes(&self) -> i64 {
        self.len as i64 - 1
    }

    pub fn at(&self, index: usize) -> TimePoint {
        self.start + Duration::minutes(index as i64)
    }

    pub fn iter(&self) -> impl Iterator<Item = TimePoint> + '_ {
        (0..self.len).map(|i| self.at(i))
    }

    /// Row index of `t` if it falls exactly on a minute of this timeline.
    pub fn position(&self, t: TimePoint) -> Option<usize> {
        let offset_ms = (t - self.start).num_milliseconds();
        if offset_ms < 0 || offset_ms % MINUTE_MS != 0 {
            return None;
        }
        let index = (offset_ms / MINUTE_MS) as usize;
        (index < self.len).then_some(index)
    }

    /// Indices of every minute `m` with `start <= m <= end`, or `None` when
    /// the span misses the timeline.
    pub fn covered_range(&self, start: TimePoint, end: TimePoint) -> Option<(usize, usize)> {
        if end < start {
            return None;
        }
        let first = ceil_minutes(start - self.start).max(0);
        let last = floor_minutes(end - self.start).min(self.len as i64 - 1);
        (first <= last).then_some((first as usize, last as usize))
    }
}

fn floor_day(t: TimePoint) -> TimePoint {
    t.date().and_time(NaiveTime::MIN)
}

fn ceil_day(t: TimePoint) -> TimePoint {
    let floor = floor_day(t);
    if floor == t {
        t
    } else {
        floor + Duration::days(1)
    }
}

fn floor_minutes(d: Duration) -> i64 {
    d.num_milliseconds().div_euclid(MINUTE_MS)
}

fn ceil_minutes(d: Duration) -> i64 {
    -(-d.num_milliseconds()).div_euclid(MINUTE_MS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityColumn {
    Sleep,
    Strength,
    Cardio,
    Nutrition,
}

impl ActivityColumn {
    pub fn name(&self) -> &'static str {
        match self {
            ActivityColumn::Sleep => "sleep",
            ActivityColumn::Strength => "strength",
            ActivityColumn::Cardio => "cardio",
            ActivityColumn::Nutrition => "nutrition",
        }
    }
}

/// One row per timeline minute, stored column by column.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    pub timeline: Timeline,
    pub historic_glucose: Vec<Option<f64>>,
    pub scan_glucose: Vec<Option<f64>>,
    pub sleep: Vec<u8>,
    pub strength: Vec<u8>,
    pub cardio: Vec<u8>,
    pub nutrition: Vec<u8>,
    pub meal: Vec<Option<String>>,
    pub protein: Vec<Option<f64>>,
    pub fat: Vec<Option<f64>>,
    pub carbs: Vec<Option<f64>>,
    pub rate_of_change: Vec<Option<f64>>,
    pub glucose_interpolated: Vec<Option<f64>>,
}

/// Borrowed view of one merged row.
#[derive(Debug, Clone, Serialize)]
pub struct MergedRow<'a> {
    pub timestamp: TimePoint,
    pub historic_glucose: Option<f64>,
    pub scan_glucose: Option<f64>,
    pub sleep: u8,
    pub strength: u8,
    pub cardio: u8,
    pub nutrition: u8,
    pub meal: Option<&'a str>,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub carbs: Option<f64>,
    pub rate_of_change: Option<f64>,
    pub glucose_interpolated: Option<f64>,
}

impl MergedTable {
    /// Empty table over `timeline`: every value null, every flag 0.
    pub fn new(timeline: Timeline) -> Self {
        let n = timeline.len();
        Self {
            timeline,
            historic_glucose: vec![None; n],
            scan_glucose: vec![None; n],
            sleep: vec![0; n],
            strength: vec![0; n],
            cardio: vec![0; n],
            nutrition: vec![0; n],
            meal: vec![None; n],
            protein: vec![None; n],
            fat: vec![None; n],
            carbs: vec![None; n],
            rate_of_change: vec![None; n],
            glucose_interpolated: vec![None; n],
        }
    }

    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub fn activity(&self, column: ActivityColumn) -> &[u8] {
        match column {
            ActivityColumn::Sleep => &self.sleep,
            ActivityColumn::Strength => &self.strength,
            ActivityColumn::Cardio => &self.cardio,
            ActivityColumn::Nutrition => &self.nutrition,
        }
    }

    pub fn activity_mut(&mut self, column: ActivityColumn) -> &mut [u8] {
        match column {
            ActivityColumn::Sleep => &mut self.sleep,
            ActivityColumn::Strength => &mut self.strength,
            ActivityColumn::Cardio => &mut self.cardio,
            ActivityColumn::Nutrition => &mut self.nutrition,
        }
    }

    pub fn row(&self, i: usize) -> MergedRow<'_> {
        MergedRow {
            timestamp: self.timeline.at(i),
            historic_glucose: self.historic_glucose[i],
            scan_glucose: self.scan_glucose[i],
            sleep: self.sleep[i],
            strength: self.strength[i],
            cardio: self.cardio[i],
            nutrition: self.nutrition[i],
            meal: self.meal[i].as_deref(),
            protein: self.protein[i],
            fat: self.fat[i],
            carbs: self.carbs[i],
            rate_of_change: self.rate_of_change[i],
            glucose_interpolated: self.glucose_interpolated[i],
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = MergedRow<'_>> + '_ {
        (0..self.len()).map(|i| self.row(i))
    }

    /// Every column must have exactly one entry per timeline minute.
    pub fn check_shape(&self) -> Result<(), ProcessingError> {
        let expected = self.len();
        let lengths = [
            ("historic_glucose", self.historic_glucose.len()),
            ("scan_glucose", self.scan_glucose.len()),
            ("sleep", self.sleep.len()),
            ("strength", self.strength.len()),
            ("cardio", self.cardio.len()),
            ("nutrition", self.nutrition.len()),
            ("meal", self.meal.len()),
            ("protein", self.protein.len()),
            ("fat", self.fat.len()),
            ("carbs", self.carbs.len()),
            ("rate_of_change", self.rate_of_change.len()),
            ("glucose_interpolated", self.glucose_interpolated.len()),
        ];
        match lengths.iter().find(|(_, found)| *found != expected) {
            Some(&(column, found)) => Err(ProcessingError::ColumnLength {
                column,
                expected,
                found,
            }),
            None => Ok(()),
        }
    }
}
