//! Pruning a statistics tree to a requested month/day/hour selection.
//!
//! Filtering always works on a copy; the cached tree a service handed out is
//! never mutated by display-side selections.

use crate::stats::tree::StatsTree;

/// A month/day/hour selection. Empty strings select everything at that
/// level. A day is only meaningful together with a month; a day without a
/// month is ignored, matching how the selection forms behave.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateSelector {
    /// `"01"`–`"12"`, or empty for all months.
    pub month: String,
    /// `"01"`–`"31"`, or empty for all days.
    pub day: String,
    /// `"00"`–`"23"`, or empty for all hours.
    pub hour: String,
}

impl DateSelector {
    /// Selector matching every day and hour.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Select one month (all its days).
    #[must_use]
    pub fn month(month: &str) -> Self {
        Self {
            month: month.to_string(),
            ..Self::default()
        }
    }

    /// Select a single day.
    #[must_use]
    pub fn day(month: &str, day: &str) -> Self {
        Self {
            month: month.to_string(),
            day: day.to_string(),
            ..Self::default()
        }
    }

    /// Whether the selection spans more than a single day.
    #[must_use]
    pub fn is_range(&self) -> bool {
        self.month.is_empty() || self.day.is_empty()
    }

    fn matches_date(&self, date_key: &str) -> bool {
        if self.month.is_empty() {
            return true;
        }
        // Date keys are zero-padded `YYYY-MM-DD`.
        let month = date_key.get(5..7).unwrap_or_default();
        if month != zero_pad(&self.month) {
            return false;
        }
        if self.day.is_empty() {
            return true;
        }
        date_key.get(8..10).unwrap_or_default() == zero_pad(&self.day)
    }

    fn matches_hour(&self, hour_key: &str) -> bool {
        self.hour.is_empty() || hour_key == zero_pad(&self.hour)
    }
}

/// Produce a pruned copy of the tree for display.
///
/// Days outside the selection are dropped. When `collect_hours` is false the
/// hours maps are stripped entirely to bound the response size; otherwise
/// each retained day keeps only the hours the selector admits.
#[must_use]
pub fn filter(tree: &StatsTree, selector: &DateSelector, collect_hours: bool) -> StatsTree {
    let mut result = StatsTree::default();

    for (date_key, day) in &tree.date {
        if !selector.matches_date(date_key) {
            continue;
        }
        let mut day = day.clone();
        if collect_hours {
            day.hours
                .retain(|hour_key, _| selector.matches_hour(hour_key));
        } else {
            day.hours.clear();
        }
        result.date.insert(date_key.clone(), day);
    }

    result
}

fn zero_pad(value: &str) -> String {
    format!("{value:0>2}")
}
