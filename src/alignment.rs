//! Projection of the source tables onto the per-minute timeline.
//!
//! Interval sources (sleep, workouts) become 0/1 indicator columns, point
//! sources (glucose, meals) are left-joined on exact minute matches.

use crate::timeline::{ActivityColumn, MergedTable, Timeline};
use crate::{GlucoseReading, Interval, MealEvent, PointSample, WorkoutKind, WorkoutSession};
use log::debug;

/// Set `column` to 1 for every minute `m` with `start <= m <= end` of any
/// interval. Flags already set are never cleared.
pub fn mark_intervals<I: Interval>(table: &mut MergedTable, intervals: &[I], column: ActivityColumn) {
    if intervals.is_empty() {
        return;
    }

    let timeline = table.timeline;
    let flags = table.activity_mut(column);
    let mut marked = 0usize;

    for interval in intervals {
        if let Some((first, last)) = timeline.covered_range(interval.start(), interval.end()) {
            flags[first..=last].fill(1);
            marked += 1;
        }
    }

    debug!(
        "Marked {} of {} intervals into '{}'",
        marked,
        intervals.len(),
        column.name()
    );
}

/// Strength workouts go to the Strength column and cardio workouts to the
/// Cardio column. A workout table with no kinds at all is treated as strength.
pub fn mark_workouts(table: &mut MergedTable, workouts: &[WorkoutSession]) {
    if workouts.is_empty() {
        return;
    }

    if workouts.iter().all(|w| w.kind.is_none()) {
        mark_intervals(table, workouts, ActivityColumn::Strength);
        return;
    }

    let (strength, rest): (Vec<WorkoutSession>, Vec<WorkoutSession>) = workouts
        .iter()
        .cloned()
        .partition(|w| w.kind == Some(WorkoutKind::Strength));
    let cardio: Vec<WorkoutSession> = rest
        .into_iter()
        .filter(|w| w.kind == Some(WorkoutKind::Cardio))
        .collect();

    mark_intervals(table, &strength, ActivityColumn::Strength);
    mark_intervals(table, &cardio, ActivityColumn::Cardio);
}

/// Left join of `samples` onto `timeline`: entry `i` holds the sample whose
/// timestamp is exactly minute `i`, or `None`.
pub fn join_points<'a, P: PointSample>(timeline: &Timeline, samples: &'a [P]) -> Vec<Option<&'a P>> {
    let mut joined = vec![None; timeline.len()];
    let mut matched = 0usize;

    for sample in samples {
        if let Some(i) = timeline.position(sample.timestamp()) {
            joined[i] = Some(sample);
            matched += 1;
        }
    }

    debug!(
        "Joined {} of {} samples onto {} minutes",
        matched,
        samples.len(),
        timeline.len()
    );
    joined
}

pub fn merge_glucose(table: &mut MergedTable, glucose: &[GlucoseReading]) {
    let joined = join_points(&table.timeline, glucose);
    table.historic_glucose = joined.iter().map(|r| r.and_then(|r| r.historic)).collect();
    table.scan_glucose = joined.iter().map(|r| r.and_then(|r| r.scan)).collect();
}

/// Carries meal label and macros of every food log row over. Only rows with a
/// label set the Nutrition flag.
pub fn merge_nutrition(table: &mut MergedTable, meals: &[MealEvent]) {
    if meals.is_empty() {
        return;
    }

    let joined = join_points(&table.timeline, meals);
    table.meal = joined.iter().map(|m| m.and_then(|m| m.label.clone())).collect();
    table.protein = joined.iter().map(|m| m.and_then(|m| m.protein)).collect();
    table.fat = joined.iter().map(|m| m.and_then(|m| m.fat)).collect();
    table.carbs = joined.iter().map(|m| m.and_then(|m| m.carbs)).collect();
    table.nutrition = table.meal.iter().map(|m| m.is_some() as u8).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::ts;
    use crate::SleepSession;

    fn day_table() -> MergedTable {
        MergedTable::new(Timeline::between(
            ts("2024-01-01 00:00"),
            ts("2024-01-03 00:00"),
        ))
    }

    fn sleep(start: &str, end: &str) -> SleepSession {
        SleepSession {
            start: ts(start),
            end: ts(end),
            quality: None,
            time_asleep: None,
        }
    }

    #[test]
    fn test_sleep_interval_is_inclusive() {
        let mut table = day_table();
        mark_intervals(
            &mut table,
            &[sleep("2024-01-01 22:00", "2024-01-02 06:00")],
            ActivityColumn::Sleep,
        );

        let start = ts("2024-01-01 22:00");
        let end = ts("2024-01-02 06:00");
        for (i, minute) in table.timeline.iter().enumerate() {
            let expected = (start <= minute && minute <= end) as u8;
            assert_eq!(table.sleep[i], expected, "minute {}", minute);
        }
        assert_eq!(table.sleep.iter().map(|&f| f as usize).sum::<usize>(), 8 * 60 + 1);
    }

    #[test]
    fn test_marking_is_idempotent() {
        let interval = [sleep("2024-01-01 22:00", "2024-01-02 06:00")];
        let mut once = day_table();
        mark_intervals(&mut once, &interval, ActivityColumn::Sleep);

        let mut twice = day_table();
        mark_intervals(&mut twice, &interval, ActivityColumn::Sleep);
        mark_intervals(&mut twice, &interval, ActivityColumn::Sleep);

        assert_eq!(once.sleep, twice.sleep);
    }

    #[test]
    fn test_overlapping_intervals_never_unset() {
        let mut table = day_table();
        mark_intervals(
            &mut table,
            &[
                sleep("2024-01-01 01:00", "2024-01-01 03:00"),
                sleep("2024-01-01 02:00", "2024-01-01 04:00"),
            ],
            ActivityColumn::Sleep,
        );
        let first = table.timeline.position(ts("2024-01-01 01:00")).unwrap();
        let last = table.timeline.position(ts("2024-01-01 04:00")).unwrap();
        assert!(table.sleep[first..=last].iter().all(|&f| f == 1));
        assert_eq!(table.sleep[first - 1], 0);
        assert_eq!(table.sleep[last + 1], 0);
    }

    #[test]
    fn test_empty_intervals_leave_column_untouched() {
        let mut table = day_table();
        table.sleep[5] = 1;
        mark_intervals::<SleepSession>(&mut table, &[], ActivityColumn::Sleep);
        assert_eq!(table.sleep[5], 1);
        assert_eq!(table.sleep.iter().map(|&f| f as usize).sum::<usize>(), 1);
    }

    #[test]
    fn test_interval_outside_timeline_is_ignored() {
        let mut table = day_table();
        mark_intervals(
            &mut table,
            &[sleep("2024-02-01 22:00", "2024-02-02 06:00")],
            ActivityColumn::Sleep,
        );
        assert!(table.sleep.iter().all(|&f| f == 0));
    }

    #[test]
    fn test_workouts_split_by_kind() {
        let workout = |start: &str, end: &str, kind: Option<WorkoutKind>| WorkoutSession {
            start: ts(start),
            end: ts(end),
            kind,
        };
        let mut table = day_table();
        mark_workouts(
            &mut table,
            &[
                workout("2024-01-01 18:00", "2024-01-01 19:00", Some(WorkoutKind::Strength)),
                workout("2024-01-02 07:00", "2024-01-02 07:30", Some(WorkoutKind::Cardio)),
                workout(
                    "2024-01-02 12:00",
                    "2024-01-02 12:30",
                    Some(WorkoutKind::Other("Mixed".into())),
                ),
            ],
        );
        assert_eq!(table.strength.iter().map(|&f| f as usize).sum::<usize>(), 61);
        assert_eq!(table.cardio.iter().map(|&f| f as usize).sum::<usize>(), 31);
    }

    #[test]
    fn test_untyped_workouts_count_as_strength() {
        let mut table = day_table();
        mark_workouts(
            &mut table,
            &[WorkoutSession {
                start: ts("2024-01-01 18:00"),
                end: ts("2024-01-01 18:09"),
                kind: None,
            }],
        );
        assert_eq!(table.strength.iter().map(|&f| f as usize).sum::<usize>(), 10);
        assert!(table.cardio.iter().all(|&f| f == 0));
    }

    #[test]
    fn test_point_merge_leaves_unmatched_minutes_null() {
        let mut table = day_table();
        let glucose = vec![
            GlucoseReading {
                timestamp: ts("2024-01-01 08:00"),
                historic: Some(5.5),
                scan: Some(5.7),
            },
            GlucoseReading {
                timestamp: ts("2024-01-01 08:15"),
                historic: None,
                scan: Some(6.1),
            },
        ];
        merge_glucose(&mut table, &glucose);

        let at = |t: &str| table.timeline.position(ts(t)).unwrap();
        assert_eq!(table.historic_glucose[at("2024-01-01 08:00")], Some(5.5));
        assert_eq!(table.scan_glucose[at("2024-01-01 08:15")], Some(6.1));
        assert_eq!(table.historic_glucose[at("2024-01-01 08:15")], None);
        assert_eq!(table.historic_glucose[at("2024-01-01 08:01")], None);
        assert_eq!(
            table.historic_glucose.iter().filter(|v| v.is_some()).count(),
            1
        );
    }

    #[test]
    fn test_nutrition_flag_follows_meal_label() {
        let mut table = day_table();
        merge_nutrition(
            &mut table,
            &[MealEvent {
                timestamp: ts("2024-01-01 13:00"),
                label: Some("Lunch".to_string()),
                protein: Some(30.0),
                fat: None,
                carbs: Some(45.0),
            }],
        );
        let lunch = table.timeline.position(ts("2024-01-01 13:00")).unwrap();
        assert_eq!(table.nutrition[lunch], 1);
        assert_eq!(table.meal[lunch].as_deref(), Some("Lunch"));
        assert_eq!(table.carbs[lunch], Some(45.0));
        assert_eq!(table.fat[lunch], None);
        assert_eq!(table.nutrition.iter().map(|&f| f as usize).sum::<usize>(), 1);
        assert!(table.check_shape().is_ok());
    }

    #[test]
    fn test_unlabeled_meal_carries_macros_without_flag() {
        let mut table = day_table();
        merge_nutrition(
            &mut table,
            &[MealEvent {
                timestamp: ts("2024-01-01 10:30"),
                label: None,
                protein: None,
                fat: None,
                carbs: Some(20.0),
            }],
        );
        let snack = table.timeline.position(ts("2024-01-01 10:30")).unwrap();
        assert_eq!(table.carbs[snack], Some(20.0));
        assert_eq!(table.nutrition[snack], 0);
        assert_eq!(table.meal[snack], None);
        assert!(table.nutrition.iter().all(|&f| f == 0));
    }
}
