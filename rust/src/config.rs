//! Engine configuration - the tunable constants of the funnel model.
//!
//! Every constant the calculator, optimizer and projector rely on lives here
//! so a new "variant" of the model is a TOML file, not a code fork. Missing
//! keys fall back to the defaults below.
//!
//! ```toml
//! viral_coefficient = 0.04
//! ranking = "composite"
//!
//! [tiers]
//! three_channel = [0.5, 0.3, 0.2]
//!
//! [default_mix]
//! google_ads = 0.5
//! seo = 0.5
//!
//! [benchmarks.podcasts]
//! entry = { kind = "per_attendee", cost = 30.0 }
//! stages = [{ stage = "customers", rate = 0.05 }]
//! avg_customer_value = 1200.0
//! reach_efficiency = 0.7
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::benchmarks::{is_fraction, BenchmarkTable, ChannelBenchmark};
use crate::error::{EngineError, Result};
use crate::optimizer::RankingStrategy;
use crate::projection::MilestoneTargets;

/// Budget used to probe each candidate channel when ranking.
pub const DEFAULT_PROBE_BUDGET: f64 = 1000.0;
/// Months a plan's per-channel projection covers.
pub const DEFAULT_EVALUATION_MONTHS: u32 = 3;
/// LTV = average customer value x this multiplier.
pub const DEFAULT_RETENTION_MULTIPLIER: f64 = 3.0;
/// Per-customer monthly subscription price used for MRR.
pub const DEFAULT_MONTHLY_SUBSCRIPTION_VALUE: f64 = 149.0;
/// Share of cumulative customers referring one new customer per month.
pub const DEFAULT_VIRAL_COEFFICIENT: f64 = 0.05;
/// Allowed deviation of a channel mix from summing to 1.
pub const DEFAULT_MIX_TOLERANCE: f64 = 0.01;

/// Unconstrained split percentages by candidate count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocationTiers {
    pub two_channel: [f64; 2],
    pub three_channel: [f64; 3],
    /// Decay base applied per rank for four or more channels
    pub decay_base: f64,
}

impl Default for AllocationTiers {
    fn default() -> Self {
        Self {
            two_channel: [0.70, 0.30],
            three_channel: [0.60, 0.30, 0.10],
            decay_base: 0.7,
        }
    }
}

impl AllocationTiers {
    fn validate(&self) -> Result<()> {
        for (name, split) in [
            ("two_channel", &self.two_channel[..]),
            ("three_channel", &self.three_channel[..]),
        ] {
            if split.iter().any(|w| !is_fraction(*w)) {
                return Err(EngineError::invalid_config(format!(
                    "tiers.{name} weights must be in [0, 1]"
                )));
            }
            let sum: f64 = split.iter().sum();
            if (sum - 1.0).abs() > 1e-9 {
                return Err(EngineError::invalid_config(format!(
                    "tiers.{name} must sum to 1, got {sum}"
                )));
            }
            if split.windows(2).any(|w| w[1] > w[0]) {
                return Err(EngineError::invalid_config(format!(
                    "tiers.{name} must not increase down the ranking, got {split:?}"
                )));
            }
        }
        if !(self.decay_base > 0.0 && self.decay_base <= 1.0) {
            return Err(EngineError::invalid_config(format!(
                "tiers.decay_base must be in (0, 1], got {}",
                self.decay_base
            )));
        }
        Ok(())
    }
}

/// Reference allocation used when a projection gets no explicit mix.
pub fn default_channel_mix() -> BTreeMap<String, f64> {
    [
        ("linkedin_ads", 0.35),
        ("content_marketing", 0.30),
        ("email_marketing", 0.20),
        ("seo", 0.15),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub probe_budget: f64,
    pub probe_months: u32,
    pub evaluation_months: u32,
    pub retention_multiplier: f64,
    pub monthly_subscription_value: f64,
    pub viral_coefficient: f64,
    pub mix_tolerance: f64,
    pub ranking: RankingStrategy,
    pub tiers: AllocationTiers,
    pub default_mix: BTreeMap<String, f64>,
    pub milestones: MilestoneTargets,
    /// Memoized estimates kept per calculator (0 disables the cache)
    pub cache_capacity: usize,
    /// Channels added to or replacing the built-in table
    pub benchmarks: BTreeMap<String, ChannelBenchmark>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_budget: DEFAULT_PROBE_BUDGET,
            probe_months: 1,
            evaluation_months: DEFAULT_EVALUATION_MONTHS,
            retention_multiplier: DEFAULT_RETENTION_MULTIPLIER,
            monthly_subscription_value: DEFAULT_MONTHLY_SUBSCRIPTION_VALUE,
            viral_coefficient: DEFAULT_VIRAL_COEFFICIENT,
            mix_tolerance: DEFAULT_MIX_TOLERANCE,
            ranking: RankingStrategy::default(),
            tiers: AllocationTiers::default(),
            default_mix: default_channel_mix(),
            milestones: MilestoneTargets::default(),
            cache_capacity: 256,
            benchmarks: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| EngineError::invalid_config(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| EngineError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.probe_budget.is_finite() || self.probe_budget <= 0.0 {
            return Err(EngineError::invalid_config("probe_budget must be > 0"));
        }
        if self.probe_months == 0 || self.evaluation_months == 0 {
            return Err(EngineError::invalid_config(
                "probe_months and evaluation_months must be >= 1",
            ));
        }
        if !self.retention_multiplier.is_finite() || self.retention_multiplier < 0.0 {
            return Err(EngineError::invalid_config(
                "retention_multiplier must be >= 0",
            ));
        }
        if !self.monthly_subscription_value.is_finite() || self.monthly_subscription_value < 0.0
        {
            return Err(EngineError::invalid_config(
                "monthly_subscription_value must be >= 0",
            ));
        }
        if !is_fraction(self.viral_coefficient) {
            return Err(EngineError::invalid_config(
                "viral_coefficient must be in [0, 1]",
            ));
        }
        if !is_fraction(self.mix_tolerance) {
            return Err(EngineError::invalid_config("mix_tolerance must be in [0, 1]"));
        }
        self.tiers.validate()?;
        self.milestones.validate()?;
        for (id, benchmark) in &self.benchmarks {
            benchmark.validate(id)?;
        }
        Ok(())
    }

    /// Built-in benchmarks merged with this config's overrides.
    pub fn benchmark_table(&self) -> Result<BenchmarkTable> {
        BenchmarkTable::builtin().with_overrides(&self.benchmarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmarks::EntryCost;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tiers.three_channel, [0.60, 0.30, 0.10]);
        assert_eq!(config.viral_coefficient, 0.05);
        let mix_total: f64 = config.default_mix.values().sum();
        assert!((mix_total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            viral_coefficient = 0.02
            ranking = "composite"

            [tiers]
            three_channel = [0.5, 0.3, 0.2]
            "#,
        )
        .unwrap();
        assert_eq!(config.viral_coefficient, 0.02);
        assert_eq!(config.ranking, RankingStrategy::Composite);
        assert_eq!(config.tiers.three_channel, [0.5, 0.3, 0.2]);
        assert_eq!(config.tiers.two_channel, [0.7, 0.3]);
        assert_eq!(config.probe_budget, DEFAULT_PROBE_BUDGET);
    }

    #[test]
    fn test_benchmark_override_from_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [benchmarks.podcasts]
            entry = { kind = "per_attendee", cost = 30.0 }
            stages = [{ stage = "customers", rate = 0.05 }]
            avg_customer_value = 1200.0
            reach_efficiency = 0.7
            "#,
        )
        .unwrap();
        let table = config.benchmark_table().unwrap();
        let podcasts = table.lookup("podcasts").unwrap();
        assert_eq!(podcasts.entry, EntryCost::PerAttendee(30.0));
        assert!(table.contains("linkedin_ads"));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(EngineConfig::from_toml_str("viral_coefficient = 1.5").is_err());
        assert!(EngineConfig::from_toml_str("probe_budget = 0.0").is_err());
        assert!(EngineConfig::from_toml_str("[tiers]\ntwo_channel = [0.6, 0.3]").is_err());
        assert!(EngineConfig::from_toml_str("[tiers]\ndecay_base = 0.0").is_err());
        assert!(EngineConfig::from_toml_str("[tiers]\nthree_channel = [0.1, 0.3, 0.6]").is_err());
        assert!(EngineConfig::from_toml_str("[tiers]\ntwo_channel = [0.4, 0.6]").is_err());
        assert!(EngineConfig::from_toml_str("unknown_key = 1").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "evaluation_months = 6\ncache_capacity = 0\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.evaluation_months, 6);
        assert_eq!(config.cache_capacity, 0);
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            EngineConfig::load(&missing),
            Err(EngineError::ConfigRead { .. })
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "viral_coefficient = [").unwrap();
        assert!(matches!(
            EngineConfig::load(&broken),
            Err(EngineError::ConfigParse { .. })
        ));
    }
}
