//! Funnelcast Core: budget allocation and growth projection for B2B go-to-market planning.
//!
//! This crate provides:
//! - Channel benchmarks (per-channel funnel constants)
//! - Single-channel ROI estimation (funnel walk with floored stage counts)
//! - Budget allocation (ranked tiers, rank decay, min/max constraints)
//! - Growth projection (monthly compounding with viral feedback, milestones)
//!
//! Consumed as a Rust library; Python bindings are available with the
//! `python` feature.
//!
//! # Examples
//!
//! ```
//! use funnelcast_core::Engine;
//!
//! let engine = Engine::default();
//! let roi = engine.estimate("linkedin_ads", 5000.0, 1).unwrap();
//! assert_eq!(roi.customers, 18);
//!
//! let plan = engine
//!     .optimize(10000.0, &["linkedin_ads", "google_ads", "seo"], None)
//!     .unwrap();
//! assert!((plan.allocated_total() - 10000.0).abs() < 0.01);
//! ```

pub mod benchmarks;
pub mod cache;
pub mod config;
pub mod decay;
pub mod engine;
pub mod error;
pub mod optimizer;
pub mod projection;
pub mod roi;

#[cfg(feature = "python")]
mod python;

pub use benchmarks::{BenchmarkTable, ChannelBenchmark, EntryCost, SharedBenchmarks, Stage, StageRate};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use optimizer::{AllocationPlan, BudgetOptimizer, ChannelAllocation, ChannelConstraint, RankingStrategy};
pub use projection::{GrowthProjector, GrowthReport, Milestone, MilestoneTargets, MonthRecord};
pub use roi::{RoiCalculator, RoiOverrides, RoiResult};
