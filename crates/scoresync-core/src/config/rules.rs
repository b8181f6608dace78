use serde::Deserialize;

use super::env::read_non_empty_env;

const ENV_RULE_VERSION: &str = "SCORESYNC_RULE_VERSION";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub rule_version: String,
    /// Starting stack per player, in hundreds of points.
    pub origin_point: i64,
    /// Return line used for point calculation, in hundreds of points.
    pub return_point: i64,
    /// Placement bonus by finishing position, before the first-place bonus.
    pub rank_point: Vec<i64>,
    /// Tied players share a rank and split its placement bonus.
    pub draw_split: bool,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            rule_version: String::new(),
            origin_point: 250,
            return_point: 300,
            rank_point: vec![30, 10, -10, -30],
            draw_split: false,
        }
    }
}

impl RuleConfig {
    pub(super) fn apply_env(&mut self) {
        if let Some(version) = read_non_empty_env(ENV_RULE_VERSION) {
            self.rule_version = version;
        }
    }

    /// Total of raw scores a correctly reported game must add up to.
    #[must_use]
    pub const fn pool(&self) -> Option<i64> {
        self.origin_point.checked_mul(4)
    }
}
