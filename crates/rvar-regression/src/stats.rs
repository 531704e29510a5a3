//! Window accounting.

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Counts of what the engine did with each security and window.
///
/// Per-window failures are only visible here; they are never logged
/// individually.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Securities processed
    pub securities: usize,
    /// Securities with fewer observations than the window length
    pub short_securities: usize,
    /// Full windows examined
    pub windows: usize,
    /// Records emitted
    pub records: usize,
    /// Windows whose design matrix was rank-deficient but were still fitted
    pub rank_deficient: usize,
    /// Windows omitted because the design matrix was rank-deficient
    pub singular_omitted: usize,
    /// Windows omitted because they contained a missing or non-finite value
    pub non_finite_omitted: usize,
}

impl EngineStats {
    /// Total windows omitted for any reason.
    pub const fn omitted(&self) -> usize {
        self.singular_omitted + self.non_finite_omitted
    }
}

impl AddAssign for EngineStats {
    fn add_assign(&mut self, rhs: Self) {
        self.securities += rhs.securities;
        self.short_securities += rhs.short_securities;
        self.windows += rhs.windows;
        self.records += rhs.records;
        self.rank_deficient += rhs.rank_deficient;
        self.singular_omitted += rhs.singular_omitted;
        self.non_finite_omitted += rhs.non_finite_omitted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate() {
        let mut total = EngineStats::default();
        total += EngineStats {
            securities: 2,
            windows: 10,
            records: 8,
            singular_omitted: 1,
            non_finite_omitted: 1,
            ..Default::default()
        };
        total += EngineStats {
            securities: 1,
            short_securities: 1,
            ..Default::default()
        };

        assert_eq!(total.securities, 3);
        assert_eq!(total.short_securities, 1);
        assert_eq!(total.records, 8);
        assert_eq!(total.omitted(), 2);
    }
}
