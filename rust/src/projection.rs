//! Month-by-month growth projection with referral feedback.
//!
//! Each month every channel in the mix is estimated at its slice of the
//! monthly budget for one month. On top of those organic customers, a viral
//! term proportional to the customers acquired through the previous month is
//! added, so the simulation is strictly sequential: month m depends on the
//! cumulative total through month m-1.

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{ensure_duration, ensure_positive_budget, EngineError, Result};
use crate::roi::{floor_count, RoiCalculator};

/// Thresholds the milestone scan looks for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MilestoneTargets {
    /// Cumulative customer counts
    pub customers: Vec<u64>,
    /// MRR levels in currency units
    pub mrr: Vec<f64>,
}

impl Default for MilestoneTargets {
    fn default() -> Self {
        Self {
            customers: vec![100],
            mrr: Vec::new(),
        }
    }
}

impl MilestoneTargets {
    pub fn validate(&self) -> Result<()> {
        if let Some(bad) = self.mrr.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(EngineError::invalid_config(format!(
                "MRR milestone must be >= 0, got {bad}"
            )));
        }
        Ok(())
    }
}

/// First month a condition held, or an explicit "not reached"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "month", rename_all = "snake_case")]
pub enum Milestone {
    Reached(u32),
    NotReached,
}

impl Milestone {
    pub fn month(self) -> Option<u32> {
        match self {
            Self::Reached(m) => Some(m),
            Self::NotReached => None,
        }
    }

    pub fn is_reached(self) -> bool {
        matches!(self, Self::Reached(_))
    }

    fn mark(&mut self, month: u32, condition: bool) {
        if condition && !self.is_reached() {
            *self = Self::Reached(month);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomerMilestone {
    pub customers: u64,
    pub milestone: Milestone,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MrrMilestone {
    pub mrr: f64,
    pub milestone: Milestone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestones {
    /// Cumulative revenue >= cumulative investment
    pub break_even: Milestone,
    /// MRR >= monthly marketing spend
    pub profitable_mrr: Milestone,
    pub customers: Vec<CustomerMilestone>,
    pub mrr: Vec<MrrMilestone>,
}

impl Milestones {
    /// Single forward pass over the series.
    pub fn scan(months: &[MonthRecord], monthly_budget: f64, targets: &MilestoneTargets) -> Self {
        let mut milestones = Self {
            break_even: Milestone::NotReached,
            profitable_mrr: Milestone::NotReached,
            customers: targets
                .customers
                .iter()
                .map(|&customers| CustomerMilestone {
                    customers,
                    milestone: Milestone::NotReached,
                })
                .collect(),
            mrr: targets
                .mrr
                .iter()
                .map(|&mrr| MrrMilestone {
                    mrr,
                    milestone: Milestone::NotReached,
                })
                .collect(),
        };

        for record in months {
            let m = record.month;
            milestones
                .break_even
                .mark(m, record.cumulative_revenue >= record.cumulative_investment);
            milestones
                .profitable_mrr
                .mark(m, record.mrr >= monthly_budget);
            for target in &mut milestones.customers {
                target
                    .milestone
                    .mark(m, record.cumulative_customers >= target.customers);
            }
            for target in &mut milestones.mrr {
                target.milestone.mark(m, record.mrr >= target.mrr);
            }
        }
        milestones
    }

    /// Month the given customer threshold was first met, if it was a target.
    pub fn customers_reached(&self, customers: u64) -> Option<Milestone> {
        self.customers
            .iter()
            .find(|c| c.customers == customers)
            .map(|c| c.milestone)
    }
}

/// One simulated month
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthRecord {
    /// 1-based month index
    pub month: u32,
    pub spend: f64,
    pub organic_customers: u64,
    pub viral_customers: u64,
    pub new_customers: u64,
    pub cumulative_customers: u64,
    pub mrr: f64,
    pub revenue: f64,
    pub cumulative_revenue: f64,
    pub cumulative_investment: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonTotals {
    pub total_investment: f64,
    pub total_customers: u64,
    pub total_revenue: f64,
    pub final_mrr: f64,
    pub total_roi_pct: f64,
}

/// Numeric column of the monthly series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesMetric {
    Spend,
    NewCustomers,
    CumulativeCustomers,
    Mrr,
    Revenue,
    CumulativeRevenue,
    CumulativeInvestment,
}

impl SeriesMetric {
    pub const ALL: [SeriesMetric; 7] = [
        Self::Spend,
        Self::NewCustomers,
        Self::CumulativeCustomers,
        Self::Mrr,
        Self::Revenue,
        Self::CumulativeRevenue,
        Self::CumulativeInvestment,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Spend => "spend",
            Self::NewCustomers => "new_customers",
            Self::CumulativeCustomers => "cumulative_customers",
            Self::Mrr => "mrr",
            Self::Revenue => "revenue",
            Self::CumulativeRevenue => "cumulative_revenue",
            Self::CumulativeInvestment => "cumulative_investment",
        }
    }

    fn value(self, record: &MonthRecord) -> f64 {
        match self {
            Self::Spend => record.spend,
            Self::NewCustomers => record.new_customers as f64,
            Self::CumulativeCustomers => record.cumulative_customers as f64,
            Self::Mrr => record.mrr,
            Self::Revenue => record.revenue,
            Self::CumulativeRevenue => record.cumulative_revenue,
            Self::CumulativeInvestment => record.cumulative_investment,
        }
    }
}

/// Full projection output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthReport {
    pub monthly_budget: f64,
    pub duration_months: u32,
    pub channel_mix: BTreeMap<String, f64>,
    pub months: Vec<MonthRecord>,
    pub milestones: Milestones,
    pub totals: HorizonTotals,
}

impl GrowthReport {
    pub fn column(&self, metric: SeriesMetric) -> Array1<f64> {
        self.months.iter().map(|r| metric.value(r)).collect()
    }

    pub fn final_month(&self) -> Option<&MonthRecord> {
        self.months.last()
    }
}

fn overflow_at(month: u32) -> EngineError {
    EngineError::count_overflow(format!(
        "cumulative customers exceed {} in month {month}",
        u64::MAX
    ))
}

/// Simulates compounding growth for a fixed channel mix.
pub struct GrowthProjector<'a> {
    calculator: &'a RoiCalculator,
    config: &'a EngineConfig,
}

impl<'a> GrowthProjector<'a> {
    pub fn new(calculator: &'a RoiCalculator, config: &'a EngineConfig) -> Self {
        Self { calculator, config }
    }

    /// Project with the configured milestone targets. `None` uses the default mix.
    pub fn project(
        &self,
        monthly_budget: f64,
        duration_months: u32,
        channel_mix: Option<&BTreeMap<String, f64>>,
    ) -> Result<GrowthReport> {
        self.project_with_targets(
            monthly_budget,
            duration_months,
            channel_mix,
            &self.config.milestones,
        )
    }

    pub fn project_with_targets(
        &self,
        monthly_budget: f64,
        duration_months: u32,
        channel_mix: Option<&BTreeMap<String, f64>>,
        targets: &MilestoneTargets,
    ) -> Result<GrowthReport> {
        ensure_positive_budget("monthly budget", monthly_budget)?;
        ensure_duration(duration_months)?;
        targets.validate()?;
        let mix = channel_mix.unwrap_or(&self.config.default_mix);
        self.validate_mix(mix)?;

        debug!(
            monthly_budget,
            duration_months,
            channels = mix.len(),
            "Projecting growth trajectory"
        );

        // Referred customers are valued at the mix-weighted average customer value
        let mut referral_value = 0.0;
        for (channel, pct) in mix {
            referral_value += pct * self.calculator.benchmarks().lookup(channel)?.avg_customer_value;
        }
        let mix_total: f64 = mix.values().sum();
        referral_value /= mix_total;

        let viral_coefficient = self.config.viral_coefficient;
        let subscription_value = self.config.monthly_subscription_value;

        let mut months = Vec::with_capacity(duration_months as usize);
        let mut cumulative_customers = 0u64;
        let mut cumulative_revenue = 0.0;
        let mut cumulative_investment = 0.0;

        for month in 1..=duration_months {
            let mut organic_customers = 0u64;
            let mut organic_revenue = 0.0;
            for (channel, pct) in mix.iter().filter(|(_, pct)| **pct > 0.0) {
                let result = self
                    .calculator
                    .estimate(channel, monthly_budget * pct, 1)?;
                organic_customers = organic_customers
                    .checked_add(result.customers)
                    .ok_or_else(|| overflow_at(month))?;
                organic_revenue += result.revenue;
            }

            let viral_customers = floor_count(cumulative_customers as f64 * viral_coefficient)
                .ok_or_else(|| overflow_at(month))?;
            let new_customers = organic_customers
                .checked_add(viral_customers)
                .ok_or_else(|| overflow_at(month))?;
            cumulative_customers = cumulative_customers
                .checked_add(new_customers)
                .ok_or_else(|| overflow_at(month))?;

            let revenue = organic_revenue + viral_customers as f64 * referral_value;
            cumulative_revenue += revenue;
            cumulative_investment += monthly_budget;

            months.push(MonthRecord {
                month,
                spend: monthly_budget,
                organic_customers,
                viral_customers,
                new_customers,
                cumulative_customers,
                mrr: cumulative_customers as f64 * subscription_value,
                revenue,
                cumulative_revenue,
                cumulative_investment,
            });
        }

        let milestones = Milestones::scan(&months, monthly_budget, targets);
        let totals = HorizonTotals {
            total_investment: cumulative_investment,
            total_customers: cumulative_customers,
            total_revenue: cumulative_revenue,
            final_mrr: cumulative_customers as f64 * subscription_value,
            total_roi_pct: (cumulative_revenue - cumulative_investment) / cumulative_investment
                * 100.0,
        };

        Ok(GrowthReport {
            monthly_budget,
            duration_months,
            channel_mix: mix.clone(),
            months,
            milestones,
            totals,
        })
    }

    fn validate_mix(&self, mix: &BTreeMap<String, f64>) -> Result<()> {
        if mix.is_empty() {
            return Err(EngineError::invalid_mix("channel mix is empty"));
        }
        if let Some((channel, pct)) = mix.iter().find(|(_, p)| !p.is_finite() || **p < 0.0) {
            return Err(EngineError::invalid_mix(format!(
                "share for '{channel}' must be >= 0, got {pct}"
            )));
        }
        let total: f64 = mix.values().sum();
        if (total - 1.0).abs() > self.config.mix_tolerance {
            return Err(EngineError::invalid_mix(format!(
                "shares must sum to 1 (±{}), got {total}",
                self.config.mix_tolerance
            )));
        }
        for channel in mix.keys() {
            self.calculator.benchmarks().lookup(channel)?;
        }
        Ok(())
    }
}
