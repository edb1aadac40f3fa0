//! Single-channel ROI calculator.
//!
//! Converts (channel, budget, duration) into funnel stage counts and the
//! financial metrics derived from them. Every stage count is floored before
//! it feeds the next stage, so a fractional "half customer" never reaches
//! revenue. Small budgets legitimately produce zero customers.
//!
//! # Formula
//!
//! ```text
//! effective_budget  = budget * reach_efficiency
//! entry             = floor(effective_budget / unit_cost)
//! stage[n]          = floor(stage[n-1] * rate[n])          (last stage = customers)
//! revenue           = customers * avg_customer_value
//! roi_pct           = (revenue - budget) / budget * 100
//! cost_per_customer = budget / customers   (budget when customers == 0)
//! ltv_cac_ratio     = avg_customer_value * retention_multiplier / cost_per_customer
//! payback_months    = cost_per_customer / (avg_customer_value / 12)
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::benchmarks::{is_fraction, BenchmarkTable, ChannelBenchmark, Stage};
use crate::cache::{CacheStats, EstimateCache};
use crate::config::{EngineConfig, DEFAULT_RETENTION_MULTIPLIER};
use crate::error::{ensure_duration, ensure_positive_budget, EngineError, Result};

/// Absorbs binary representation error before flooring (17.999999999999998 -> 18).
const FLOOR_EPSILON: f64 = 1e-9;

/// Floor a fractional stage count to a non-negative integer.
///
/// Negative and NaN inputs count as zero; `None` when the count does not fit
/// in a `u64`.
pub(crate) fn floor_count(value: f64) -> Option<u64> {
    let floored = (value + FLOOR_EPSILON).floor();
    if floored.is_nan() || floored <= 0.0 {
        Some(0)
    } else if floored >= u64::MAX as f64 {
        None
    } else {
        Some(floored as u64)
    }
}

/// Title-case a channel id for human-readable output ("linkedin_ads" -> "Linkedin Ads").
pub fn channel_display_name(channel: &str) -> String {
    channel
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Count reached at one funnel stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCount {
    pub stage: Stage,
    pub count: u64,
}

/// Letter grade combining ROI and LTV:CAC
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PerformanceGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl PerformanceGrade {
    pub fn from_metrics(roi_pct: f64, ltv_cac_ratio: f64) -> Self {
        if roi_pct >= 400.0 && ltv_cac_ratio >= 4.0 {
            Self::APlus
        } else if roi_pct >= 300.0 && ltv_cac_ratio >= 3.0 {
            Self::A
        } else if roi_pct >= 200.0 && ltv_cac_ratio >= 2.0 {
            Self::B
        } else if roi_pct >= 100.0 {
            Self::C
        } else if roi_pct >= 0.0 {
            Self::D
        } else {
            Self::F
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::APlus => "A+ (Excellent)",
            Self::A => "A (Very Good)",
            Self::B => "B (Good)",
            Self::C => "C (Average)",
            Self::D => "D (Below Average)",
            Self::F => "F (Poor)",
        }
    }
}

fn recommendation(channel: &str, roi_pct: f64) -> String {
    if roi_pct > 200.0 {
        format!("Excellent ROI! Consider increasing budget for {channel} by 50-100%.")
    } else if roi_pct > 100.0 {
        format!(
            "Strong performance. {} is a profitable channel.",
            channel_display_name(channel)
        )
    } else if roi_pct > 0.0 {
        "Positive ROI but room for improvement. Optimize targeting and messaging.".to_string()
    } else {
        format!("Negative ROI. Consider pausing {channel} and testing a different approach.")
    }
}

/// Predicted performance of one channel at one budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiResult {
    pub channel: String,
    pub budget: f64,
    pub duration_months: u32,
    pub monthly_spend: f64,
    /// Budget left after platform fees/waste
    pub effective_budget: f64,
    /// Stage counts from the entry stage down to customers
    pub funnel: Vec<StageCount>,
    pub customers: u64,
    pub revenue: f64,
    pub net_profit: f64,
    pub roi_pct: f64,
    /// Revenue per unit of spend (ROAS)
    pub return_multiple: f64,
    /// Spend per prospect, where prospects are the stage just before customers
    pub cost_per_lead: f64,
    pub cost_per_customer: f64,
    pub ltv_cac_ratio: f64,
    pub payback_months: f64,
    pub grade: PerformanceGrade,
    pub recommendation: String,
}

impl RoiResult {
    /// First recorded count for `stage`, if the channel's funnel has it.
    pub fn stage_count(&self, stage: Stage) -> Option<u64> {
        self.funnel.iter().find(|s| s.stage == stage).map(|s| s.count)
    }
}

/// Caller-supplied replacements for a channel's benchmark values
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoiOverrides {
    /// Replaces the final (customer) conversion rate
    pub conversion_rate: Option<f64>,
    pub customer_value: Option<f64>,
}

impl RoiOverrides {
    fn validate(&self, channel: &str) -> Result<()> {
        if let Some(rate) = self.conversion_rate {
            if !is_fraction(rate) {
                return Err(EngineError::InvalidBenchmark {
                    channel: channel.to_string(),
                    reason: format!("conversion rate override must be in [0, 1], got {rate}"),
                });
            }
        }
        if let Some(value) = self.customer_value {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidBenchmark {
                    channel: channel.to_string(),
                    reason: format!("customer value override must be >= 0, got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Estimates channel ROI against one benchmark snapshot.
#[derive(Debug)]
pub struct RoiCalculator {
    benchmarks: Arc<BenchmarkTable>,
    retention_multiplier: f64,
    cache: Option<EstimateCache>,
}

impl RoiCalculator {
    pub fn new(benchmarks: Arc<BenchmarkTable>, config: &EngineConfig) -> Self {
        Self {
            benchmarks,
            retention_multiplier: config.retention_multiplier,
            cache: EstimateCache::new(config.cache_capacity),
        }
    }

    /// Calculator with default constants and no memoization.
    pub fn uncached(benchmarks: Arc<BenchmarkTable>) -> Self {
        Self {
            benchmarks,
            retention_multiplier: DEFAULT_RETENTION_MULTIPLIER,
            cache: None,
        }
    }

    pub fn benchmarks(&self) -> &BenchmarkTable {
        &self.benchmarks
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(EstimateCache::stats)
    }

    /// Expected performance of spending `budget` on `channel` over `duration_months`.
    pub fn estimate(&self, channel: &str, budget: f64, duration_months: u32) -> Result<RoiResult> {
        ensure_positive_budget("budget", budget)?;
        ensure_duration(duration_months)?;
        let benchmark = self.benchmarks.lookup(channel)?;

        if let Some(hit) = self
            .cache
            .as_ref()
            .and_then(|c| c.get(channel, budget, duration_months))
        {
            return Ok(hit);
        }

        let result = self.compute(
            channel,
            benchmark,
            budget,
            duration_months,
            &RoiOverrides::default(),
        )?;
        if let Some(cache) = &self.cache {
            cache.put(&result);
        }
        Ok(result)
    }

    /// Like [`estimate`](Self::estimate) with the conversion rate and/or
    /// customer value replaced. Never cached.
    pub fn estimate_with_overrides(
        &self,
        channel: &str,
        budget: f64,
        duration_months: u32,
        overrides: &RoiOverrides,
    ) -> Result<RoiResult> {
        ensure_positive_budget("budget", budget)?;
        ensure_duration(duration_months)?;
        let benchmark = self.benchmarks.lookup(channel)?;
        overrides.validate(channel)?;
        self.compute(channel, benchmark, budget, duration_months, overrides)
    }

    /// Estimate for a spend that may be zero (a constrained allocation can
    /// leave a candidate with nothing). Zero spend yields an empty funnel.
    pub(crate) fn estimate_allocation(
        &self,
        channel: &str,
        budget: f64,
        duration_months: u32,
    ) -> Result<RoiResult> {
        if budget > 0.0 {
            return self.estimate(channel, budget, duration_months);
        }
        ensure_duration(duration_months)?;
        let benchmark = self.benchmarks.lookup(channel)?;
        self.compute(
            channel,
            benchmark,
            0.0,
            duration_months,
            &RoiOverrides::default(),
        )
    }

    fn compute(
        &self,
        channel: &str,
        benchmark: &ChannelBenchmark,
        budget: f64,
        duration_months: u32,
        overrides: &RoiOverrides,
    ) -> Result<RoiResult> {
        let effective_budget = budget * benchmark.reach_efficiency;
        let avg_value = overrides
            .customer_value
            .unwrap_or(benchmark.avg_customer_value);

        let entry = benchmark.entry;
        let mut count = floor_count(effective_budget / entry.unit_cost()).ok_or_else(|| {
            EngineError::invalid_budget(format!(
                "{budget} buys more {:?} on {channel} than can be counted",
                entry.stage()
            ))
        })?;
        let mut funnel = Vec::with_capacity(benchmark.stages.len() + 1);
        funnel.push(StageCount {
            stage: entry.stage(),
            count,
        });
        let last = benchmark.stages.len().saturating_sub(1);
        for (i, step) in benchmark.stages.iter().enumerate() {
            let rate = match overrides.conversion_rate {
                Some(custom) if i == last => custom,
                _ => step.rate,
            };
            // Rates are fractions, so a stage never outgrows the one before it
            count = floor_count(count as f64 * rate).unwrap_or(count);
            funnel.push(StageCount {
                stage: step.stage,
                count,
            });
        }

        let customers = count;
        let prospects = funnel
            .len()
            .checked_sub(2)
            .map(|i| funnel[i].count)
            .unwrap_or(0);

        let revenue = customers as f64 * avg_value;
        let net_profit = revenue - budget;
        let (roi_pct, return_multiple) = if budget > 0.0 {
            (net_profit / budget * 100.0, revenue / budget)
        } else {
            (0.0, 0.0)
        };
        let cost_per_lead = if prospects > 0 {
            budget / prospects as f64
        } else {
            0.0
        };
        let cost_per_customer = if customers > 0 {
            budget / customers as f64
        } else {
            budget
        };
        let ltv_cac_ratio = if cost_per_customer > 0.0 {
            avg_value * self.retention_multiplier / cost_per_customer
        } else {
            0.0
        };
        let payback_months = if avg_value > 0.0 {
            cost_per_customer / (avg_value / 12.0)
        } else {
            0.0
        };

        trace!(channel, budget, customers, roi_pct, "Estimated channel ROI");

        Ok(RoiResult {
            channel: channel.to_string(),
            budget,
            duration_months,
            monthly_spend: budget / duration_months as f64,
            effective_budget,
            funnel,
            customers,
            revenue,
            net_profit,
            roi_pct,
            return_multiple,
            cost_per_lead,
            cost_per_customer,
            ltv_cac_ratio,
            payback_months,
            grade: PerformanceGrade::from_metrics(roi_pct, ltv_cac_ratio),
            recommendation: recommendation(channel, roi_pct),
        })
    }
}
