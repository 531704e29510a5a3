//! Month-end trading-day markers.
//!
//! For each security the trading day closest to a calendar month end is the
//! last observation that falls in that month.

use chrono::{Datelike, NaiveDate};

use crate::timeline::SecurityTimeline;

/// Flags marking, per observation, whether it is the security's last trading
/// day of its calendar month.
pub fn month_end_flags(timeline: &SecurityTimeline) -> Vec<bool> {
    let observations = timeline.observations();
    observations
        .iter()
        .enumerate()
        .map(|(i, obs)| {
            observations
                .get(i + 1)
                .is_none_or(|next| !same_month(obs.date, next.date))
        })
        .collect()
}

/// Month-end trading days of a security, ascending.
pub fn month_end_dates(timeline: &SecurityTimeline) -> Vec<NaiveDate> {
    timeline
        .observations()
        .iter()
        .zip(month_end_flags(timeline))
        .filter_map(|(obs, flag)| flag.then_some(obs.date))
        .collect()
}

/// Number of calendar months in which the security traded.
pub fn month_count(timeline: &SecurityTimeline) -> usize {
    month_end_flags(timeline).into_iter().filter(|&f| f).count()
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}
