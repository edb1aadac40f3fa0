//! Engine facade - explicit construction instead of module-level singletons.
//!
//! An `Engine` owns its configuration and a swappable benchmark table.
//! Each call binds a calculator to the current table snapshot, so replacing
//! benchmarks at runtime never affects a calculation already in flight.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::benchmarks::{BenchmarkTable, SharedBenchmarks};
use crate::cache::CacheStats;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::optimizer::{AllocationPlan, BudgetOptimizer, ChannelConstraint};
use crate::projection::{GrowthProjector, GrowthReport, MilestoneTargets};
use crate::roi::{RoiCalculator, RoiOverrides, RoiResult};

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    benchmarks: SharedBenchmarks,
    /// Calculator bound to the current snapshot; rebuilt on every swap
    calculator: RwLock<Arc<RoiCalculator>>,
}

impl Engine {
    /// Validate `config` and build its benchmark table (built-ins plus overrides).
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let table = Arc::new(config.benchmark_table()?);
        Ok(Self::assemble(config, table))
    }

    /// Engine over an explicit table; config benchmark overrides are ignored.
    pub fn with_benchmarks(config: EngineConfig, table: BenchmarkTable) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, Arc::new(table)))
    }

    fn assemble(config: EngineConfig, table: Arc<BenchmarkTable>) -> Self {
        let calculator = Arc::new(RoiCalculator::new(Arc::clone(&table), &config));
        Self {
            benchmarks: SharedBenchmarks::new(table),
            calculator: RwLock::new(calculator),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn benchmarks(&self) -> Arc<BenchmarkTable> {
        self.benchmarks.snapshot()
    }

    /// Calculator bound to the current benchmark snapshot.
    pub fn calculator(&self) -> Arc<RoiCalculator> {
        Arc::clone(&self.calculator.read())
    }

    /// Atomically install a new benchmark table.
    pub fn replace_benchmarks(&self, table: BenchmarkTable) {
        let mut calculator = self.calculator.write();
        self.benchmarks.replace(table);
        *calculator = Arc::new(RoiCalculator::new(
            self.benchmarks.snapshot(),
            &self.config,
        ));
        info!(
            channels = self.benchmarks.snapshot().len(),
            "Replaced channel benchmarks"
        );
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.calculator().cache_stats()
    }

    pub fn estimate(&self, channel: &str, budget: f64, duration_months: u32) -> Result<RoiResult> {
        self.calculator().estimate(channel, budget, duration_months)
    }

    pub fn estimate_with_overrides(
        &self,
        channel: &str,
        budget: f64,
        duration_months: u32,
        overrides: &RoiOverrides,
    ) -> Result<RoiResult> {
        self.calculator()
            .estimate_with_overrides(channel, budget, duration_months, overrides)
    }

    pub fn optimize<S: AsRef<str>>(
        &self,
        total_budget: f64,
        candidates: &[S],
        constraints: Option<&BTreeMap<String, ChannelConstraint>>,
    ) -> Result<AllocationPlan> {
        let calculator = self.calculator();
        BudgetOptimizer::new(&calculator, &self.config).optimize(
            total_budget,
            candidates,
            constraints,
        )
    }

    pub fn project(
        &self,
        monthly_budget: f64,
        duration_months: u32,
        channel_mix: Option<&BTreeMap<String, f64>>,
    ) -> Result<GrowthReport> {
        let calculator = self.calculator();
        GrowthProjector::new(&calculator, &self.config).project(
            monthly_budget,
            duration_months,
            channel_mix,
        )
    }

    pub fn project_with_targets(
        &self,
        monthly_budget: f64,
        duration_months: u32,
        channel_mix: Option<&BTreeMap<String, f64>>,
        targets: &MilestoneTargets,
    ) -> Result<GrowthReport> {
        let calculator = self.calculator();
        GrowthProjector::new(&calculator, &self.config).project_with_targets(
            monthly_budget,
            duration_months,
            channel_mix,
            targets,
        )
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::assemble(EngineConfig::default(), BenchmarkTable::builtin())
    }
}
