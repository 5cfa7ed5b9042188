use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::common::time::floor_to_hour;

/// Day-floor equi-join: for each left timestamp, the index of a right record
/// sharing the same calendar day, or `None`.
///
/// When several right records share a day, the last one in input order wins
/// (last-write-wins, applied consistently). Inputs are not reordered.
pub fn day_equijoin(left: &[NaiveDateTime], right: &[NaiveDateTime]) -> Vec<Option<usize>> {
    let mut by_day: HashMap<NaiveDate, usize> = HashMap::new();
    for (idx, ts) in right.iter().enumerate() {
        by_day.insert(ts.date(), idx); // later entries overwrite
    }
    left.iter().map(|ts| by_day.get(&ts.date()).copied()).collect()
}

/// Hour-floor backward asof join: for each left timestamp, the index of the
/// right record with the greatest floored hour that is <= the left's floored
/// hour. Never matches a future record; a left timestamp earlier than all
/// right records maps to `None`.
pub fn asof_backward_hourly(left: &[NaiveDateTime], right: &[NaiveDateTime]) -> Vec<Option<usize>> {
    // Sort the right side ascending by floored hour before aligning. The sort
    // is stable, so among equal hours the last input record sorts last and
    // wins the backward match.
    let mut keyed: Vec<(NaiveDateTime, usize)> = right
        .iter()
        .enumerate()
        .map(|(idx, &ts)| (floor_to_hour(ts), idx))
        .collect();
    keyed.sort_by_key(|(hour, _)| *hour);

    left.iter()
        .map(|&ts| {
            let target = floor_to_hour(ts);
            let upto = keyed.partition_point(|(hour, _)| *hour <= target);
            (upto > 0).then(|| keyed[upto - 1].1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::time::parse_timestamp;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn day_join_matches_same_day_only() {
        let left = [ts("2022-06-01T14:00"), ts("2022-06-03T09:00")];
        let right = [ts("2022-06-01T00:00"), ts("2022-06-02T00:00")];
        assert_eq!(day_equijoin(&left, &right), vec![Some(0), None]);
    }

    #[test]
    fn day_join_duplicate_days_last_write_wins() {
        let left = [ts("2022-06-01T14:00")];
        let right = [ts("2022-06-01T06:00"), ts("2022-06-01T18:00")];
        assert_eq!(day_equijoin(&left, &right), vec![Some(1)]);
        // Consistent across repeated runs.
        assert_eq!(day_equijoin(&left, &right), day_equijoin(&left, &right));
    }

    #[test]
    fn asof_matches_most_recent_not_future() {
        let left = [ts("2022-06-01T14:30")];
        let right = [
            ts("2022-06-01T12:00"),
            ts("2022-06-01T13:00"),
            ts("2022-06-01T15:00"),
        ];
        assert_eq!(asof_backward_hourly(&left, &right), vec![Some(1)]);
    }

    #[test]
    fn asof_equal_hour_matches() {
        // 14:30 floors to 14:00, equal keys match.
        let left = [ts("2022-06-01T14:30")];
        let right = [ts("2022-06-01T14:10")];
        assert_eq!(asof_backward_hourly(&left, &right), vec![Some(0)]);
    }

    #[test]
    fn asof_incident_before_all_weather_is_none() {
        let left = [ts("2022-05-31T23:00")];
        let right = [ts("2022-06-01T00:00")];
        assert_eq!(asof_backward_hourly(&left, &right), vec![None]);
    }

    #[test]
    fn asof_never_selects_future_record() {
        let left: Vec<_> = (0..24).map(|h| ts(&format!("2022-06-02T{h:02}:30"))).collect();
        let right: Vec<_> = (0..48).map(|h| {
            ts(&format!("2022-06-{:02}T{:02}:00", 1 + h / 24, h % 24))
        }).collect();
        for (l, m) in left.iter().zip(asof_backward_hourly(&left, &right)) {
            let idx = m.unwrap();
            assert!(floor_to_hour(right[idx]) <= floor_to_hour(*l));
        }
    }

    #[test]
    fn asof_handles_unsorted_right_input() {
        let left = [ts("2022-06-01T14:30")];
        let right = [ts("2022-06-01T14:00"), ts("2022-06-01T10:00")];
        assert_eq!(asof_backward_hourly(&left, &right), vec![Some(0)]);
    }
}
