//! The three-level statistics tree: day → hour → minute.
//!
//! Every aggregation level is built from the same recursive unit, a
//! [`StatsNode`] carrying a line-count/value sum plus per-dimension value
//! tallies. Day and hour levels keep one named sub-node per counter and
//! keyword matcher; the minute level keeps only the sums — per-value
//! breakdowns are deliberately not collected at minute granularity.
//!
//! All maps are `BTreeMap` so zero-padded date, hour, and minute keys
//! iterate in chronological order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Recursive unit of the tree: a sum plus per-dimension value tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsNode {
    /// Count of contributing log lines, or the summed counter value.
    pub sum: u64,
    /// Dimension name → value → tally.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub breakdowns: BTreeMap<String, BTreeMap<String, u64>>,
}

impl StatsNode {
    /// Add to the node's sum.
    pub fn bump(&mut self, amount: u64) {
        self.sum = self.sum.saturating_add(amount);
    }

    /// Add to one dimension's per-value tally.
    pub fn bump_breakdown(&mut self, dimension: &str, value: &str, amount: u64) {
        let tally = self
            .breakdowns
            .entry(dimension.to_string())
            .or_default()
            .entry(value.to_string())
            .or_default();
        *tally = tally.saturating_add(amount);
    }
}

/// Statistics for one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStats {
    /// The day's own line count.
    #[serde(flatten)]
    pub node: StatsNode,
    /// Counter and matcher results, keyed by stat id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stats: BTreeMap<String, StatsNode>,
    /// Hour keys `"00"`–`"23"`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hours: BTreeMap<String, HourStats>,
}

impl DayStats {
    /// The stats bucket for one hour, created on first use.
    pub fn hour_mut(&mut self, hour: &str) -> &mut HourStats {
        self.hours.entry(hour.to_string()).or_default()
    }

    /// Named counter/matcher node, created on first use.
    pub fn stat_mut(&mut self, id: &str) -> &mut StatsNode {
        self.stats.entry(id.to_string()).or_default()
    }
}

/// Statistics for one hour of a day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourStats {
    /// The hour's own line count.
    #[serde(flatten)]
    pub node: StatsNode,
    /// Counter and matcher results, keyed by stat id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stats: BTreeMap<String, StatsNode>,
    /// Minute keys `"00"`–`"59"`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mins: BTreeMap<String, MinuteStats>,
}

impl HourStats {
    /// The stats bucket for one minute, created on first use.
    pub fn minute_mut(&mut self, minute: &str) -> &mut MinuteStats {
        self.mins.entry(minute.to_string()).or_default()
    }

    /// Named counter/matcher node, created on first use.
    pub fn stat_mut(&mut self, id: &str) -> &mut StatsNode {
        self.stats.entry(id.to_string()).or_default()
    }
}

/// Reduced statistics for one minute: sums only, no per-value breakdowns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinuteStats {
    /// The minute's own line count.
    pub sum: u64,
    /// Counter/matcher id → summed value or match count.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stats: BTreeMap<String, u64>,
}

impl MinuteStats {
    /// Add to the minute's line count.
    pub fn bump(&mut self, amount: u64) {
        self.sum = self.sum.saturating_add(amount);
    }

    /// Add to one stat's minute-level sum.
    pub fn bump_stat(&mut self, id: &str, amount: u64) {
        let slot = self.stats.entry(id.to_string()).or_default();
        *slot = slot.saturating_add(amount);
    }
}

/// The full aggregation tree, keyed by `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsTree {
    /// Day keys in zero-padded ISO form; ordering is chronological.
    #[serde(default)]
    pub date: BTreeMap<String, DayStats>,
}

impl StatsTree {
    /// The stats bucket for one day, created on first use.
    pub fn day_mut(&mut self, date: &str) -> &mut DayStats {
        self.date.entry(date.to_string()).or_default()
    }

    /// Whether no line has been folded in yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.date.is_empty()
    }
}

/// Flat value→count tallies over designated fields across a whole file.
pub type BriefStats = BTreeMap<String, BTreeMap<String, u64>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_keys_iterate_chronologically() {
        let mut tree = StatsTree::default();
        tree.day_mut("2024-05-10").node.bump(1);
        tree.day_mut("2024-05-02").node.bump(1);
        tree.day_mut("2023-12-31").node.bump(1);

        let keys: Vec<&str> = tree.date.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["2023-12-31", "2024-05-02", "2024-05-10"]);
    }

    #[test]
    fn breakdown_tallies_accumulate() {
        let mut node = StatsNode::default();
        node.bump_breakdown("Host", "a.example", 100);
        node.bump_breakdown("Host", "a.example", 50);
        node.bump_breakdown("Host", "b.example", 7);
        assert_eq!(node.breakdowns["Host"]["a.example"], 150);
        assert_eq!(node.breakdowns["Host"]["b.example"], 7);
    }

    #[test]
    fn minute_nodes_have_no_breakdown_map() {
        let mut minute = MinuteStats::default();
        minute.bump(1);
        minute.bump_stat("Bytes", 100);

        let json = serde_json::to_value(&minute).expect("minute should serialize");
        assert!(json.get("breakdowns").is_none());
        assert_eq!(json["sum"], 1);
        assert_eq!(json["stats"]["Bytes"], 100);
    }

    #[test]
    fn empty_collections_are_omitted_from_serialization() {
        let mut tree = StatsTree::default();
        tree.day_mut("2024-05-01").node.bump(1);

        let json = serde_json::to_value(&tree).expect("tree should serialize");
        let day = &json["date"]["2024-05-01"];
        assert_eq!(day["sum"], 1);
        assert!(day.get("stats").is_none());
        assert!(day.get("hours").is_none());
    }

    #[test]
    fn serde_round_trip_is_exact() {
        let mut tree = StatsTree::default();
        let day = tree.day_mut("2024-05-01");
        day.node.bump(3);
        day.stat_mut("Bytes").bump(350);
        day.stat_mut("Bytes").bump_breakdown("Host", "a.example", 350);
        let hour = day.hour_mut("10");
        hour.node.bump(2);
        hour.minute_mut("05").bump(1);
        hour.minute_mut("05").bump_stat("Bytes", 100);

        let encoded = serde_json::to_string(&tree).expect("encode");
        let decoded: StatsTree = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, tree);
    }
}
