use std::collections::BTreeMap;

use funnelcast_core::{ChannelConstraint, Engine, Milestone, Stage};
use proptest::prelude::*;
use proptest::sample::subsequence;
use proptest::test_runner::Config;

const CHANNELS: [&str; 8] = [
    "content_marketing",
    "email_marketing",
    "google_ads",
    "linkedin_ads",
    "seo",
    "social_media_ads",
    "trade_shows",
    "webinars",
];

fn channel() -> impl Strategy<Value = &'static str> {
    proptest::sample::select(CHANNELS.to_vec())
}

fn candidates() -> impl Strategy<Value = Vec<&'static str>> {
    subsequence(CHANNELS.to_vec(), 1..=CHANNELS.len())
}

proptest! {
    #![proptest_config(Config::with_cases(64))]

    #[test]
    fn estimate_is_deterministic(channel in channel(), budget in 1.0f64..500_000.0, months in 1u32..24) {
        let engine = Engine::default();
        let first = engine.estimate(channel, budget, months).unwrap();
        let fresh = Engine::default().estimate(channel, budget, months).unwrap();
        let cached = engine.estimate(channel, budget, months).unwrap();
        prop_assert_eq!(&first, &fresh);
        prop_assert_eq!(&first, &cached);
    }

    #[test]
    fn more_budget_never_loses_customers(
        channel in channel(),
        low in 1.0f64..200_000.0,
        extra in 0.0f64..200_000.0,
    ) {
        let engine = Engine::default();
        let a = engine.estimate(channel, low, 1).unwrap();
        let b = engine.estimate(channel, low + extra, 1).unwrap();
        prop_assert!(b.customers >= a.customers);
        prop_assert!(b.revenue >= a.revenue);
    }

    #[test]
    fn funnel_stages_never_grow(channel in channel(), budget in 1.0f64..1_000_000.0) {
        let result = Engine::default().estimate(channel, budget, 3).unwrap();
        prop_assert_eq!(result.funnel.last().map(|s| s.stage), Some(Stage::Customers));
        for pair in result.funnel.windows(2) {
            prop_assert!(pair[1].count <= pair[0].count, "{:?}", result.funnel);
        }
    }

    #[test]
    fn allocation_conserves_budget(total in 1.0f64..5_000_000.0, candidates in candidates()) {
        let plan = Engine::default().optimize(total, &candidates, None).unwrap();
        prop_assert!((plan.allocated_total() - total).abs() <= 0.01);
        prop_assert_eq!(plan.allocations.len(), candidates.len());
        for channel in plan.allocations.keys() {
            prop_assert!(candidates.contains(&channel.as_str()));
        }
    }

    #[test]
    fn allocation_is_deterministic(total in 100.0f64..1_000_000.0, candidates in candidates()) {
        let a = Engine::default().optimize(total, &candidates, None).unwrap();
        let b = Engine::default().optimize(total, &candidates, None).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn shares_follow_rank(total in 100.0f64..1_000_000.0, candidates in candidates()) {
        let plan = Engine::default().optimize(total, &candidates, None).unwrap();
        let shares: Vec<f64> = plan
            .ranking
            .iter()
            .map(|s| plan.allocations[&s.channel].share)
            .collect();
        for pair in shares.windows(2) {
            prop_assert!(pair[1] <= pair[0] + 1e-9, "{:?}", shares);
        }
    }

    #[test]
    fn constrained_shares_stay_in_bounds(
        total in 1_000.0f64..1_000_000.0,
        bounds in proptest::collection::vec(
            (0.0f64..25.0).prop_flat_map(|min| (Just(min), min..=100.0)),
            3,
        ),
    ) {
        // The fourth candidate is unbounded, so every map here is feasible
        let candidates = ["linkedin_ads", "google_ads", "seo", "webinars"];
        let constraints: BTreeMap<String, ChannelConstraint> = candidates
            .iter()
            .zip(bounds.iter())
            .map(|(c, (min, max))| (c.to_string(), ChannelConstraint::new(*min, *max)))
            .collect();

        let plan = Engine::default()
            .optimize(total, &candidates, Some(&constraints))
            .unwrap();
        prop_assert!(plan.constrained);
        prop_assert!((plan.allocated_total() - total).abs() <= 0.01);
        for (channel, c) in &constraints {
            let pct = plan.share_pct(channel).unwrap();
            prop_assert!(pct >= c.min_pct - 0.1 && pct <= c.max_pct + 0.1,
                "{channel}: {pct} not in [{}, {}]", c.min_pct, c.max_pct);
        }
    }

    #[test]
    fn projection_accumulates_monotonically(
        monthly in 100.0f64..200_000.0,
        months in 1u32..36,
    ) {
        let report = Engine::default().project(monthly, months, None).unwrap();
        prop_assert_eq!(report.months.len(), months as usize);
        for pair in report.months.windows(2) {
            prop_assert!(pair[1].cumulative_customers >= pair[0].cumulative_customers);
            prop_assert!(pair[1].cumulative_revenue >= pair[0].cumulative_revenue);
            prop_assert!(pair[1].cumulative_investment > pair[0].cumulative_investment);
        }
    }

    #[test]
    fn break_even_matches_series(monthly in 100.0f64..100_000.0, months in 1u32..24) {
        let report = Engine::default().project(monthly, months, None).unwrap();
        let first = report
            .months
            .iter()
            .find(|m| m.cumulative_revenue >= m.cumulative_investment)
            .map(|m| m.month);
        prop_assert_eq!(report.milestones.break_even.month(), first);

        let last = report.final_month().unwrap();
        if last.cumulative_revenue >= last.cumulative_investment {
            prop_assert!(matches!(report.milestones.break_even, Milestone::Reached(m) if m <= months));
        }
    }
}
