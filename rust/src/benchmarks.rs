//! Channel benchmark table - static funnel constants per marketing channel.
//!
//! Each channel has exactly one entry cost (what a unit of spend buys first:
//! a click, a lead, an email send, an event attendee) followed by a chain of
//! stage conversion rates ending in customers. The entry cost picks which
//! funnel formula the ROI calculator walks.
//!
//! # Examples
//!
//! ```
//! use funnelcast_core::benchmarks::{BenchmarkTable, EntryCost};
//!
//! let table = BenchmarkTable::builtin();
//! let linkedin = table.lookup("linkedin_ads").unwrap();
//! assert_eq!(linkedin.entry, EntryCost::PerClick(8.50));
//! assert!(table.lookup("fax_blast").is_err());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// A step in a conversion chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Clicks,
    Leads,
    Sends,
    Opens,
    Attendees,
    Customers,
}

/// Unit cost of the first funnel stage. Exactly one applies per channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "cost", rename_all = "snake_case")]
pub enum EntryCost {
    PerClick(f64),
    PerLead(f64),
    PerSend(f64),
    PerAttendee(f64),
}

impl EntryCost {
    pub fn unit_cost(&self) -> f64 {
        match *self {
            Self::PerClick(c) | Self::PerLead(c) | Self::PerSend(c) | Self::PerAttendee(c) => c,
        }
    }

    /// Stage produced directly by spend.
    pub fn stage(&self) -> Stage {
        match self {
            Self::PerClick(_) => Stage::Clicks,
            Self::PerLead(_) => Stage::Leads,
            Self::PerSend(_) => Stage::Sends,
            Self::PerAttendee(_) => Stage::Attendees,
        }
    }
}

/// Conversion from the previous stage into `stage`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageRate {
    pub stage: Stage,
    pub rate: f64,
}

impl StageRate {
    pub const fn new(stage: Stage, rate: f64) -> Self {
        Self { stage, rate }
    }
}

/// Funnel constants for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBenchmark {
    pub entry: EntryCost,
    /// Ordered rates after the entry stage; the last one yields customers.
    pub stages: Vec<StageRate>,
    /// Average customer value in currency units
    pub avg_customer_value: f64,
    /// Fraction of nominal budget reaching an audience after fees/waste (0-1)
    pub reach_efficiency: f64,
}

impl ChannelBenchmark {
    /// Cost-per-click channel: clicks convert straight into customers.
    pub fn per_click(cpc: f64, conversion_rate: f64, value: f64, efficiency: f64) -> Self {
        Self {
            entry: EntryCost::PerClick(cpc),
            stages: vec![StageRate::new(Stage::Customers, conversion_rate)],
            avg_customer_value: value,
            reach_efficiency: efficiency,
        }
    }

    pub fn per_lead(cost_per_lead: f64, conversion_rate: f64, value: f64, efficiency: f64) -> Self {
        Self {
            entry: EntryCost::PerLead(cost_per_lead),
            stages: vec![StageRate::new(Stage::Customers, conversion_rate)],
            avg_customer_value: value,
            reach_efficiency: efficiency,
        }
    }

    pub fn per_attendee(cost: f64, conversion_rate: f64, value: f64, efficiency: f64) -> Self {
        Self {
            entry: EntryCost::PerAttendee(cost),
            stages: vec![StageRate::new(Stage::Customers, conversion_rate)],
            avg_customer_value: value,
            reach_efficiency: efficiency,
        }
    }

    /// Conversion rate of the final (customer) stage.
    pub fn customer_conversion_rate(&self) -> f64 {
        self.stages.last().map(|s| s.rate).unwrap_or(0.0)
    }

    /// Check the record's invariants.
    pub fn validate(&self, channel: &str) -> Result<()> {
        let invalid = |reason: String| EngineError::InvalidBenchmark {
            channel: channel.to_string(),
            reason,
        };

        let unit_cost = self.entry.unit_cost();
        if !unit_cost.is_finite() || unit_cost <= 0.0 {
            return Err(invalid(format!("unit cost must be > 0, got {unit_cost}")));
        }
        if !is_fraction(self.reach_efficiency) {
            return Err(invalid(format!(
                "reach efficiency must be in [0, 1], got {}",
                self.reach_efficiency
            )));
        }
        if !self.avg_customer_value.is_finite() || self.avg_customer_value < 0.0 {
            return Err(invalid(format!(
                "average customer value must be >= 0, got {}",
                self.avg_customer_value
            )));
        }
        if let Some(bad) = self.stages.iter().find(|s| !is_fraction(s.rate)) {
            return Err(invalid(format!(
                "{:?} rate must be in [0, 1], got {}",
                bad.stage, bad.rate
            )));
        }
        match self.stages.last() {
            Some(last) if last.stage == Stage::Customers => {}
            _ => return Err(invalid("stage chain must end in customers".to_string())),
        }
        if self.stages[..self.stages.len() - 1]
            .iter()
            .any(|s| s.stage == Stage::Customers)
        {
            return Err(invalid("customers must be the last stage only".to_string()));
        }
        Ok(())
    }
}

pub(crate) fn is_fraction(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Built-in B2B SaaS channel benchmarks
static BUILTIN_TABLE: Lazy<Arc<BenchmarkTable>> = Lazy::new(|| {
    let mut m = BTreeMap::new();

    // Paid click channels
    m.insert(
        "linkedin_ads".to_string(),
        ChannelBenchmark::per_click(8.50, 0.036, 2388.0, 0.85),
    );
    m.insert(
        "google_ads".to_string(),
        ChannelBenchmark::per_click(5.20, 0.035, 2100.0, 0.80),
    );
    m.insert(
        "social_media_ads".to_string(),
        ChannelBenchmark::per_click(3.80, 0.018, 1650.0, 0.82),
    );

    // Lead-priced channels
    m.insert(
        "content_marketing".to_string(),
        ChannelBenchmark::per_lead(92.0, 0.08, 3200.0, 0.90),
    );
    m.insert(
        "seo".to_string(),
        ChannelBenchmark::per_lead(65.0, 0.12, 2800.0, 0.92),
    );
    m.insert(
        "trade_shows".to_string(),
        ChannelBenchmark::per_lead(250.0, 0.22, 5500.0, 0.75),
    );

    // Events
    m.insert(
        "webinars".to_string(),
        ChannelBenchmark::per_attendee(45.0, 0.15, 4200.0, 0.88),
    );

    // Email: send -> open -> click -> convert
    m.insert(
        "email_marketing".to_string(),
        ChannelBenchmark {
            entry: EntryCost::PerSend(0.10),
            stages: vec![
                StageRate::new(Stage::Opens, 0.22),
                StageRate::new(Stage::Clicks, 0.03),
                StageRate::new(Stage::Customers, 0.015),
            ],
            avg_customer_value: 1850.0,
            reach_efficiency: 0.95,
        },
    );

    Arc::new(BenchmarkTable { channels: m })
});

/// Immutable channel id -> benchmark map
///
/// (De)serializes as a plain map; deserialization validates every record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, ChannelBenchmark>",
    into = "BTreeMap<String, ChannelBenchmark>"
)]
pub struct BenchmarkTable {
    channels: BTreeMap<String, ChannelBenchmark>,
}

impl TryFrom<BTreeMap<String, ChannelBenchmark>> for BenchmarkTable {
    type Error = EngineError;

    fn try_from(channels: BTreeMap<String, ChannelBenchmark>) -> Result<Self> {
        Self::from_records(channels)
    }
}

impl From<BenchmarkTable> for BTreeMap<String, ChannelBenchmark> {
    fn from(table: BenchmarkTable) -> Self {
        table.channels
    }
}

impl BenchmarkTable {
    /// Shared handle to the built-in table.
    pub fn builtin() -> Arc<BenchmarkTable> {
        Arc::clone(&BUILTIN_TABLE)
    }

    /// Build a table from records, validating each one.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, ChannelBenchmark)>,
    {
        let mut channels = BTreeMap::new();
        for (id, benchmark) in records {
            if id.trim().is_empty() {
                return Err(EngineError::invalid_config("channel id must not be empty"));
            }
            benchmark.validate(&id)?;
            channels.insert(id, benchmark);
        }
        if channels.is_empty() {
            return Err(EngineError::invalid_config(
                "benchmark table must contain at least one channel",
            ));
        }
        Ok(Self { channels })
    }

    /// Copy of this table with `overrides` replacing or adding channels.
    pub fn with_overrides(&self, overrides: &BTreeMap<String, ChannelBenchmark>) -> Result<Self> {
        let merged = self
            .channels
            .iter()
            .chain(overrides.iter())
            .map(|(id, b)| (id.clone(), b.clone()))
            .collect::<BTreeMap<_, _>>();
        Self::from_records(merged)
    }

    /// Look up a channel. Matching is exact and case-sensitive.
    pub fn lookup(&self, channel: &str) -> Result<&ChannelBenchmark> {
        self.channels
            .get(channel)
            .ok_or_else(|| EngineError::UnknownChannel {
                channel: channel.to_string(),
                valid: self.channel_ids(),
            })
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Sorted channel ids.
    pub fn channel_ids(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChannelBenchmark)> {
        self.channels.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Atomically swappable benchmark table.
///
/// Readers take an `Arc` snapshot and keep computing against it; `replace`
/// swaps the pointer, so a calculation never sees a half-updated table.
#[derive(Debug)]
pub struct SharedBenchmarks {
    current: RwLock<Arc<BenchmarkTable>>,
}

impl SharedBenchmarks {
    pub fn new(table: Arc<BenchmarkTable>) -> Self {
        Self {
            current: RwLock::new(table),
        }
    }

    pub fn snapshot(&self) -> Arc<BenchmarkTable> {
        Arc::clone(&self.current.read())
    }

    /// Install a new table, returning the previous one.
    pub fn replace(&self, table: BenchmarkTable) -> Arc<BenchmarkTable> {
        let mut guard = self.current.write();
        std::mem::replace(&mut *guard, Arc::new(table))
    }
}

impl Default for SharedBenchmarks {
    fn default() -> Self {
        Self::new(BenchmarkTable::builtin())
    }
}
