use std::collections::BTreeMap;

use funnelcast_core::{
    BenchmarkTable, ChannelBenchmark, ChannelConstraint, Engine, EngineConfig, EngineError,
    Milestone, Stage,
};
use pretty_assertions::assert_eq;

fn constraints(entries: &[(&str, f64, f64)]) -> BTreeMap<String, ChannelConstraint> {
    entries
        .iter()
        .map(|(c, min, max)| (c.to_string(), ChannelConstraint::new(*min, *max)))
        .collect()
}

#[test]
fn linkedin_end_to_end() {
    let roi = Engine::default().estimate("linkedin_ads", 5000.0, 1).unwrap();
    assert_eq!(roi.effective_budget, 4250.0);
    assert_eq!(roi.stage_count(Stage::Clicks), Some(500));
    assert_eq!(roi.customers, 18);
    assert_eq!(roi.revenue, 42984.0);
    assert!((roi.roi_pct - 759.68).abs() < 1e-9);
    assert_eq!(roi.monthly_spend, 5000.0);
}

#[test]
fn three_channels_split_sixty_thirty_ten() {
    let plan = Engine::default()
        .optimize(10000.0, &["seo", "linkedin_ads", "google_ads"], None)
        .unwrap();
    let order: Vec<&str> = plan.ranking.iter().map(|s| s.channel.as_str()).collect();
    assert_eq!(order, vec!["google_ads", "linkedin_ads", "seo"]);
    assert!((plan.budget_for("google_ads").unwrap() - 6000.0).abs() < 0.1);
    assert!((plan.budget_for("linkedin_ads").unwrap() - 3000.0).abs() < 0.1);
    assert!((plan.budget_for("seo").unwrap() - 1000.0).abs() < 0.1);
    assert_eq!(plan.allocations["google_ads"].rank, 1);
    assert_eq!(plan.execution_priority.len(), 3);
    assert!(plan.execution_priority[0].starts_with("1. Start with Google Ads"));
}

#[test]
fn two_channels_split_seventy_thirty() {
    let plan = Engine::default()
        .optimize(5000.0, &["seo", "google_ads"], None)
        .unwrap();
    assert!((plan.share_pct("google_ads").unwrap() - 70.0).abs() < 1e-9);
    assert!((plan.share_pct("seo").unwrap() - 30.0).abs() < 1e-9);
}

#[test]
fn single_channel_gets_everything() {
    let plan = Engine::default()
        .optimize(7321.55, &["webinars"], None)
        .unwrap();
    assert_eq!(plan.allocations.len(), 1);
    assert_eq!(plan.budget_for("webinars"), Some(7321.55));
    assert_eq!(plan.share_pct("webinars"), Some(100.0));
}

#[test]
fn plan_totals_aggregate_channel_projections() {
    let plan = Engine::default()
        .optimize(
            20000.0,
            &["linkedin_ads", "google_ads", "seo", "webinars", "email_marketing"],
            None,
        )
        .unwrap();
    let customers: u64 = plan.allocations.values().map(|a| a.projected.customers).sum();
    let revenue: f64 = plan.allocations.values().map(|a| a.projected.revenue).sum();
    assert_eq!(plan.total_expected_customers, customers);
    assert!((plan.total_expected_revenue - revenue).abs() < 1e-6);
    assert!(
        (plan.blended_roi_pct - (revenue - 20000.0) / 20000.0 * 100.0).abs() < 1e-9
    );
    assert!(plan
        .allocations
        .values()
        .all(|a| a.projected.duration_months == plan.evaluation_months));
}

#[test]
fn minimums_are_honoured_for_weak_channels() {
    let plan = Engine::default()
        .optimize(
            10000.0,
            &["google_ads", "trade_shows"],
            Some(&constraints(&[("trade_shows", 25.0, 40.0)])),
        )
        .unwrap();
    assert!((plan.share_pct("trade_shows").unwrap() - 25.0).abs() < 0.1);
    assert!((plan.share_pct("google_ads").unwrap() - 75.0).abs() < 0.1);
}

#[test]
fn maxima_cap_the_top_channel() {
    let plan = Engine::default()
        .optimize(
            10000.0,
            &["google_ads", "seo"],
            Some(&constraints(&[("google_ads", 0.0, 50.0)])),
        )
        .unwrap();
    assert!((plan.share_pct("google_ads").unwrap() - 50.0).abs() < 0.1);
    assert!((plan.share_pct("seo").unwrap() - 50.0).abs() < 0.1);
}

#[test]
fn unknown_channel_lists_valid_ids() {
    let err = Engine::default()
        .estimate("not_a_channel", 1000.0, 3)
        .unwrap_err();
    match &err {
        EngineError::UnknownChannel { channel, valid } => {
            assert_eq!(channel, "not_a_channel");
            assert_eq!(valid.len(), 8);
            assert!(valid.contains(&"linkedin_ads".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("Available channels:"));
}

#[test]
fn negative_budget_is_rejected() {
    let err = Engine::default()
        .optimize(-5.0, &["linkedin_ads"], None)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidBudget { .. }));
    assert!(matches!(
        Engine::default().estimate("seo", f64::NAN, 3),
        Err(EngineError::InvalidBudget { .. })
    ));
}

#[test]
fn inverted_constraint_is_infeasible() {
    let err = Engine::default()
        .optimize(
            1000.0,
            &["linkedin_ads"],
            Some(&constraints(&[("linkedin_ads", 60.0, 40.0)])),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::InfeasibleConstraint { .. }));
}

#[test]
fn minimums_over_one_hundred_are_infeasible() {
    let err = Engine::default()
        .optimize(
            1000.0,
            &["linkedin_ads", "seo"],
            Some(&constraints(&[("linkedin_ads", 60.0, 80.0), ("seo", 50.0, 60.0)])),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::InfeasibleConstraint { .. }));
}

#[test]
fn mix_must_sum_to_one() {
    let mix: BTreeMap<String, f64> = [("seo".to_string(), 0.5), ("google_ads".to_string(), 0.4)]
        .into_iter()
        .collect();
    let err = Engine::default().project(5000.0, 6, Some(&mix)).unwrap_err();
    assert!(matches!(err, EngineError::InvalidMix { .. }));
    assert_eq!(err.kind(), "invalid_mix");
}

#[test]
fn projection_with_zero_duration_is_rejected() {
    assert!(matches!(
        Engine::default().project(5000.0, 0, None),
        Err(EngineError::InvalidDuration { months: 0 })
    ));
}

#[test]
fn small_budget_never_breaks_even() {
    let report = Engine::default().project(100.0, 12, None).unwrap();
    assert_eq!(report.totals.total_customers, 0);
    assert_eq!(report.milestones.break_even, Milestone::NotReached);
    assert_eq!(report.milestones.profitable_mrr, Milestone::NotReached);
}

#[test]
fn custom_benchmarks_drive_every_operation() {
    let table = BenchmarkTable::from_records(vec![
        (
            "partner_referrals".to_string(),
            ChannelBenchmark::per_lead(40.0, 0.25, 3000.0, 1.0),
        ),
        (
            "podcast_ads".to_string(),
            ChannelBenchmark::per_click(2.0, 0.01, 1000.0, 0.9),
        ),
    ])
    .unwrap();
    let config = EngineConfig {
        default_mix: [
            ("partner_referrals".to_string(), 0.5),
            ("podcast_ads".to_string(), 0.5),
        ]
        .into_iter()
        .collect(),
        ..EngineConfig::default()
    };
    let engine = Engine::with_benchmarks(config, table).unwrap();

    // 1000 / 40 = 25 leads, 25 * 0.25 = 6 customers
    let roi = engine.estimate("partner_referrals", 1000.0, 1).unwrap();
    assert_eq!(roi.stage_count(Stage::Leads), Some(25));
    assert_eq!(roi.customers, 6);

    let plan = engine
        .optimize(4000.0, &["partner_referrals", "podcast_ads"], None)
        .unwrap();
    assert_eq!(plan.ranking[0].channel, "partner_referrals");

    let report = engine.project(4000.0, 3, None).unwrap();
    assert_eq!(report.months[0].organic_customers, 12 + 9);
    assert!(matches!(
        engine.estimate("linkedin_ads", 1000.0, 1),
        Err(EngineError::UnknownChannel { .. })
    ));
}
