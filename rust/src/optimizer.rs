//! Budget allocation across ranked channels.
//!
//! Candidates are ranked by probing each one at a fixed small budget, then
//! the total is split by a deterministic tiered rule (unconstrained) or by a
//! min-first, rank-greedy fill (constrained). This is a heuristic, not a
//! solver: the same inputs always produce the same plan.

use std::collections::{BTreeMap, HashSet};

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::decay::rank_decay_weights;
use crate::error::{ensure_positive_budget, EngineError, Result};
use crate::roi::{channel_display_name, RoiCalculator, RoiResult};

/// Amounts below this are treated as fully allocated.
const BUDGET_EPSILON: f64 = 1e-9;

/// How candidates are scored at the probe budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    /// Probe revenue / probe budget. Orders exactly like ROI % and is never negative.
    #[default]
    ReturnMultiple,
    /// 0.4 x ROI % + 0.3 x (20 x LTV:CAC) + 0.3 x (100 x customers per 1k spend)
    Composite,
}

impl RankingStrategy {
    fn score(self, probe: &RoiResult) -> f64 {
        match self {
            Self::ReturnMultiple => probe.return_multiple,
            Self::Composite => {
                let customers_per_1k = probe.customers as f64 / (probe.budget / 1000.0);
                probe.roi_pct * 0.4 + probe.ltv_cac_ratio * 20.0 * 0.3 + customers_per_1k * 100.0 * 0.3
            }
        }
    }
}

/// Allowed share of the total budget for one channel, in percent (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelConstraint {
    pub min_pct: f64,
    pub max_pct: f64,
}

impl ChannelConstraint {
    pub fn new(min_pct: f64, max_pct: f64) -> Self {
        Self { min_pct, max_pct }
    }

    fn validate(&self, channel: &str) -> Result<()> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(self.min_pct) || !in_range(self.max_pct) {
            return Err(EngineError::infeasible(format!(
                "{channel}: bounds must be within 0-100%, got ({}, {})",
                self.min_pct, self.max_pct
            )));
        }
        if self.min_pct > self.max_pct {
            return Err(EngineError::infeasible(format!(
                "{channel}: min {}% exceeds max {}%",
                self.min_pct, self.max_pct
            )));
        }
        Ok(())
    }
}

impl From<(f64, f64)> for ChannelConstraint {
    fn from((min_pct, max_pct): (f64, f64)) -> Self {
        Self::new(min_pct, max_pct)
    }
}

/// Probe result used to order candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelScore {
    pub channel: String,
    pub score: f64,
    pub probe_roi_pct: f64,
}

/// One channel's slice of the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAllocation {
    /// 1-based rank
    pub rank: usize,
    /// Fraction of the total budget (0-1)
    pub share: f64,
    pub budget: f64,
    pub projected: RoiResult,
}

/// Budget split plus projected results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub total_budget: f64,
    pub allocations: BTreeMap<String, ChannelAllocation>,
    /// Candidates best-first
    pub ranking: Vec<ChannelScore>,
    pub constrained: bool,
    pub evaluation_months: u32,
    pub total_expected_customers: u64,
    pub total_expected_revenue: f64,
    pub blended_roi_pct: f64,
    pub execution_priority: Vec<String>,
}

impl AllocationPlan {
    /// Sum of absolute channel budgets.
    pub fn allocated_total(&self) -> f64 {
        self.allocations.values().map(|a| a.budget).sum()
    }

    /// Channel share as a percentage of the total budget.
    pub fn share_pct(&self, channel: &str) -> Option<f64> {
        self.allocations.get(channel).map(|a| a.share * 100.0)
    }

    pub fn budget_for(&self, channel: &str) -> Option<f64> {
        self.allocations.get(channel).map(|a| a.budget)
    }
}

/// Allocates a total budget across candidate channels.
pub struct BudgetOptimizer<'a> {
    calculator: &'a RoiCalculator,
    config: &'a EngineConfig,
}

impl<'a> BudgetOptimizer<'a> {
    pub fn new(calculator: &'a RoiCalculator, config: &'a EngineConfig) -> Self {
        Self { calculator, config }
    }

    /// Split `total_budget` over `candidates`, optionally bounded per channel.
    pub fn optimize<S: AsRef<str>>(
        &self,
        total_budget: f64,
        candidates: &[S],
        constraints: Option<&BTreeMap<String, ChannelConstraint>>,
    ) -> Result<AllocationPlan> {
        ensure_positive_budget("total budget", total_budget)?;
        let candidates: Vec<&str> = candidates.iter().map(AsRef::as_ref).collect();
        self.validate_candidates(&candidates)?;
        let constraints = constraints.filter(|c| !c.is_empty());
        if let Some(constraints) = constraints {
            self.validate_constraints(&candidates, constraints)?;
        }

        debug!(
            total_budget,
            channels = candidates.len(),
            constrained = constraints.is_some(),
            "Optimizing budget allocation"
        );

        let ranking = self.rank(&candidates)?;
        let mut budgets = match constraints {
            Some(c) => allocate_constrained(total_budget, &ranking, c),
            None => {
                let weights = self.tier_weights(&ranking);
                weights.iter().map(|w| total_budget * w).collect()
            }
        };
        absorb_residue(total_budget, &mut budgets);

        let months = self.config.evaluation_months;
        let mut allocations = BTreeMap::new();
        let mut total_customers = 0u64;
        let mut total_revenue = 0.0;
        for (i, (score, budget)) in ranking.iter().zip(budgets.iter()).enumerate() {
            let projected = self
                .calculator
                .estimate_allocation(&score.channel, *budget, months)?;
            total_customers = total_customers
                .checked_add(projected.customers)
                .ok_or_else(|| {
                    EngineError::count_overflow(format!(
                        "expected customers across the plan exceed {}",
                        u64::MAX
                    ))
                })?;
            total_revenue += projected.revenue;
            allocations.insert(
                score.channel.clone(),
                ChannelAllocation {
                    rank: i + 1,
                    share: budget / total_budget,
                    budget: *budget,
                    projected,
                },
            );
        }

        let execution_priority = execution_priority(&ranking, &allocations);
        Ok(AllocationPlan {
            total_budget,
            allocations,
            ranking,
            constrained: constraints.is_some(),
            evaluation_months: months,
            total_expected_customers: total_customers,
            total_expected_revenue: total_revenue,
            blended_roi_pct: (total_revenue - total_budget) / total_budget * 100.0,
            execution_priority,
        })
    }

    /// Probe every candidate and sort best-first; ties break on channel id.
    pub fn rank(&self, candidates: &[&str]) -> Result<Vec<ChannelScore>> {
        let mut scores = candidates
            .iter()
            .map(|channel| {
                let probe = self.calculator.estimate(
                    channel,
                    self.config.probe_budget,
                    self.config.probe_months,
                )?;
                Ok(ChannelScore {
                    channel: channel.to_string(),
                    score: self.config.ranking.score(&probe),
                    probe_roi_pct: probe.roi_pct,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        scores.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.channel.cmp(&b.channel))
        });
        debug!(
            ranking = ?scores.iter().map(|s| s.channel.as_str()).collect::<Vec<_>>(),
            "Ranked candidate channels"
        );
        Ok(scores)
    }

    fn tier_weights(&self, ranking: &[ChannelScore]) -> Vec<f64> {
        let tiers = &self.config.tiers;
        match ranking.len() {
            1 => vec![1.0],
            2 => tiers.two_channel.to_vec(),
            3 => tiers.three_channel.to_vec(),
            _ => {
                let scores = Array1::from_iter(ranking.iter().map(|s| s.score));
                rank_decay_weights(&scores.view(), tiers.decay_base).to_vec()
            }
        }
    }

    fn validate_candidates(&self, candidates: &[&str]) -> Result<()> {
        if candidates.is_empty() {
            return Err(EngineError::invalid_budget(
                "at least one candidate channel is required",
            ));
        }
        let mut seen = HashSet::new();
        for channel in candidates {
            self.calculator.benchmarks().lookup(channel)?;
            if !seen.insert(*channel) {
                return Err(EngineError::invalid_budget(format!(
                    "channel '{channel}' listed more than once"
                )));
            }
        }
        Ok(())
    }

    fn validate_constraints(
        &self,
        candidates: &[&str],
        constraints: &BTreeMap<String, ChannelConstraint>,
    ) -> Result<()> {
        for (channel, constraint) in constraints {
            self.calculator.benchmarks().lookup(channel)?;
            if !candidates.contains(&channel.as_str()) {
                return Err(EngineError::infeasible(format!(
                    "constraint given for '{channel}', which is not a candidate"
                )));
            }
            constraint.validate(channel)?;
        }
        let min_total: f64 = constraints.values().map(|c| c.min_pct).sum();
        if min_total > 100.0 + BUDGET_EPSILON {
            return Err(EngineError::infeasible(format!(
                "minimum shares add up to {min_total}% of the budget"
            )));
        }
        Ok(())
    }
}

/// Minimums first, then rank-greedy up to each maximum, then any leftover
/// proportionally. Channels without a constraint are bounded by [0, 100]%.
fn allocate_constrained(
    total_budget: f64,
    ranking: &[ChannelScore],
    constraints: &BTreeMap<String, ChannelConstraint>,
) -> Vec<f64> {
    let bounds: Vec<ChannelConstraint> = ranking
        .iter()
        .map(|s| {
            constraints
                .get(&s.channel)
                .copied()
                .unwrap_or(ChannelConstraint::new(0.0, 100.0))
        })
        .collect();

    let mut allocation: Vec<f64> = bounds
        .iter()
        .map(|b| total_budget * b.min_pct / 100.0)
        .collect();
    let mut remaining = total_budget - allocation.iter().sum::<f64>();

    for (amount, bound) in allocation.iter_mut().zip(bounds.iter()) {
        if remaining <= BUDGET_EPSILON {
            break;
        }
        let room = total_budget * bound.max_pct / 100.0 - *amount;
        if room > 0.0 {
            let take = room.min(remaining);
            *amount += take;
            remaining -= take;
        }
    }

    if remaining > BUDGET_EPSILON {
        // Only reachable when the maxima add up to less than 100%
        warn!(
            remaining,
            "Channel maxima cannot absorb the full budget; spreading the rest proportionally"
        );
        let current: f64 = allocation.iter().sum();
        if current > 0.0 {
            for amount in allocation.iter_mut() {
                *amount += remaining * (*amount / current);
            }
        } else {
            let share = remaining / allocation.len() as f64;
            for amount in allocation.iter_mut() {
                *amount += share;
            }
        }
    }
    allocation
}

/// Push floating-point residue onto the largest slice so budgets sum exactly.
fn absorb_residue(total_budget: f64, budgets: &mut [f64]) {
    let residue = total_budget - budgets.iter().sum::<f64>();
    if let Some(largest) = budgets
        .iter_mut()
        .max_by(|a, b| a.total_cmp(b))
    {
        *largest += residue;
    }
}

fn execution_priority(
    ranking: &[ChannelScore],
    allocations: &BTreeMap<String, ChannelAllocation>,
) -> Vec<String> {
    ranking
        .iter()
        .filter_map(|s| allocations.get(&s.channel).filter(|a| a.budget > 0.0).map(|a| (s, a)))
        .enumerate()
        .map(|(i, (score, allocation))| {
            let name = channel_display_name(&score.channel);
            match i {
                0 => format!(
                    "1. Start with {name} (highest ROI: {:.1}%)",
                    allocation.projected.roi_pct
                ),
                1 => format!("2. Scale {name} after validating results"),
                2 => format!("3. Add {name} for diversification"),
                n => format!("{}. Test {name} with its {:.0}% share", n + 1, allocation.share * 100.0),
            }
        })
        .collect()
}
