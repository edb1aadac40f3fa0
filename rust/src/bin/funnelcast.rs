//! funnelcast - plan marketing budgets from the command line

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use funnelcast_core::{ChannelConstraint, Engine, EngineConfig, MilestoneTargets};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "funnelcast",
    version,
    about = "Budget allocation and growth projection for B2B go-to-market planning",
    long_about = "Estimate channel ROI, split a budget across channels and project\n\
                  month-by-month growth from built-in (or configured) channel benchmarks.\n\
                  \n\
                  Examples:\n\
                    funnelcast channels\n\
                    funnelcast estimate linkedin_ads 5000 --months 1\n\
                    funnelcast optimize 10000 linkedin_ads google_ads seo\n\
                    funnelcast optimize 10000 seo google_ads -c seo=20:50\n\
                    funnelcast project 10000 --months 12 --mix seo=0.5 --mix google_ads=0.5"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML file overriding engine constants and benchmarks
    #[arg(long, global = true, env = "FUNNELCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// List known channel ids
    Channels,
    /// Estimate ROI for one channel
    Estimate {
        channel: String,
        budget: f64,
        #[arg(long, short = 'm', default_value = "3")]
        months: u32,
    },
    /// Allocate a total budget across channels
    Optimize {
        total_budget: f64,
        #[arg(required = true)]
        channels: Vec<String>,
        /// Share bounds as channel=min:max (percent)
        #[arg(long = "constraint", short = 'c', value_parser = parse_constraint)]
        constraints: Vec<(String, ChannelConstraint)>,
    },
    /// Project monthly growth for a channel mix
    Project {
        monthly_budget: f64,
        #[arg(long, short = 'm', default_value = "12")]
        months: u32,
        /// Channel share as channel=fraction (repeatable; default mix if omitted)
        #[arg(long = "mix", value_parser = parse_share)]
        mix: Vec<(String, f64)>,
        /// Cumulative customer milestones to report
        #[arg(long = "customers", value_delimiter = ',')]
        customer_targets: Vec<u64>,
        /// MRR milestones to report
        #[arg(long = "mrr", value_delimiter = ',')]
        mrr_targets: Vec<f64>,
    },
}

fn parse_constraint(raw: &str) -> Result<(String, ChannelConstraint), String> {
    let (channel, bounds) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected channel=min:max, got '{raw}'"))?;
    let (min, max) = bounds
        .split_once(':')
        .ok_or_else(|| format!("expected min:max, got '{bounds}'"))?;
    let min: f64 = min.trim().parse().map_err(|e| format!("bad min '{min}': {e}"))?;
    let max: f64 = max.trim().parse().map_err(|e| format!("bad max '{max}': {e}"))?;
    Ok((channel.trim().to_string(), ChannelConstraint::new(min, max)))
}

fn parse_share(raw: &str) -> Result<(String, f64), String> {
    let (channel, share) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected channel=fraction, got '{raw}'"))?;
    let share: f64 = share
        .trim()
        .parse()
        .map_err(|e| format!("bad share '{share}': {e}"))?;
    Ok((channel.trim().to_string(), share))
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let engine = Engine::new(config).context("Invalid engine configuration")?;

    match cli.command {
        Command::Channels => {
            for channel in engine.benchmarks().channel_ids() {
                println!("{channel}");
            }
        }
        Command::Estimate {
            channel,
            budget,
            months,
        } => {
            print_json(&engine.estimate(&channel, budget, months)?)?;
        }
        Command::Optimize {
            total_budget,
            channels,
            constraints,
        } => {
            let constraints: BTreeMap<String, ChannelConstraint> = constraints.into_iter().collect();
            let plan = engine.optimize(
                total_budget,
                &channels,
                Some(&constraints).filter(|c| !c.is_empty()),
            )?;
            print_json(&plan)?;
        }
        Command::Project {
            monthly_budget,
            months,
            mix,
            customer_targets,
            mrr_targets,
        } => {
            let mut seen = BTreeMap::new();
            for (channel, share) in mix {
                if seen.insert(channel.clone(), share).is_some() {
                    bail!("channel '{channel}' given more than once in --mix");
                }
            }
            let mix = (!seen.is_empty()).then_some(seen);

            let mut targets = engine.config().milestones.clone();
            if !customer_targets.is_empty() || !mrr_targets.is_empty() {
                targets = MilestoneTargets {
                    customers: customer_targets,
                    mrr: mrr_targets,
                };
            }
            let report =
                engine.project_with_targets(monthly_budget, months, mix.as_ref(), &targets)?;
            print_json(&report)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_constraint() {
        let (channel, c) = parse_constraint("seo=20:50").unwrap();
        assert_eq!(channel, "seo");
        assert_eq!(c, ChannelConstraint::new(20.0, 50.0));
        assert!(parse_constraint("seo").is_err());
        assert!(parse_constraint("seo=20").is_err());
        assert!(parse_constraint("seo=a:50").is_err());
    }

    #[test]
    fn test_parse_share() {
        assert_eq!(parse_share("google_ads=0.5").unwrap(), ("google_ads".to_string(), 0.5));
        assert!(parse_share("google_ads").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
