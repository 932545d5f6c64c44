//! Quill chain simulator.
//!
//! Builds a ledger from a JSON genesis (or the built-in development genesis),
//! applies blocks at the configured interval with optional seeded user
//! activity between them, and prints a JSON summary of the final state.

mod activity;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use quill_core::operations::VirtualOperation;
use quill_core::types::{AccountName, Timestamp};
use quill_node_lib::history::AppliedOperation;
use quill_node_lib::query::{BudgetJson, GlobalPropertiesJson, RewardFundJson, WitnessJson};
use quill_node_lib::{
    ChainNode, GenesisState, LogFormat, NodeConfig, NodeError, OperationHistory, VirtualOperationObserver,
};

use crate::activity::{Activity, ActivityStats};

#[derive(Parser, Debug)]
#[command(name = "quill-node", version, about = "Quill chain simulator")]
struct Args {
    /// Config file (TOML). Defaults to the user config directory; missing is fine.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Genesis file (JSON). Overrides the config's `genesis`.
    #[arg(long)]
    genesis: Option<PathBuf>,

    /// Number of blocks to apply
    #[arg(long, default_value_t = 100)]
    blocks: u64,

    /// Seed for synthetic posting, voting, and budget activity
    #[arg(long)]
    activity_seed: Option<u64>,

    /// Percentage of slots left empty (0-100)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    missed_slot_percent: u8,

    /// Include this account's recent operations in the summary
    #[arg(long)]
    trace_account: Option<AccountName>,

    /// Log level; overrides the config
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json"); overrides the config
    #[arg(long)]
    log_format: Option<String>,
}

/// Counts committed virtual operations by kind.
#[derive(Default)]
struct OperationCounter(Mutex<BTreeMap<&'static str, u64>>);

impl VirtualOperationObserver for OperationCounter {
    fn on_block_operations(&self, _block_num: u64, _block_time: Timestamp, ops: &[VirtualOperation]) {
        let mut counts = self.0.lock();
        for op in ops {
            *counts.entry(op.name()).or_default() += 1;
        }
    }
}

#[derive(Serialize)]
struct Summary {
    blocks_applied: u64,
    blocks_rejected: u64,
    missed_slots: u64,
    properties: GlobalPropertiesJson,
    reward_fund: Option<RewardFundJson>,
    top_witnesses: Vec<WitnessJson>,
    active_witnesses: Vec<AccountName>,
    top_budgets: Vec<BudgetJson>,
    operations: BTreeMap<&'static str, u64>,
    activity: Option<ActivityStats>,
    account_history: Option<Vec<AppliedOperation>>,
    state_digest: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = NodeConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &args.log_format {
        config.log_format = if format == "json" { LogFormat::Json } else { LogFormat::Text };
    }
    if args.genesis.is_some() {
        config.genesis = args.genesis.clone();
    }
    init_logging(&config.log_level, config.log_format);

    info!("Quill simulator v{}", env!("CARGO_PKG_VERSION"));
    let genesis = match &config.genesis {
        Some(path) => GenesisState::load(path).with_context(|| format!("failed to load genesis {}", path.display()))?,
        None => GenesisState::development(),
    };
    let ledger = genesis.build(&config.params).context("failed to build genesis state")?;
    let node = ChainNode::new(ledger, config.params.clone())?;

    let counter = Arc::new(OperationCounter::default());
    let history = Arc::new(OperationHistory::new(args.blocks.max(1) as usize));
    node.subscribe(counter.clone());
    node.subscribe(history.clone());

    let mut activity = args.activity_seed.map(Activity::new);
    let mut slot_rng = StdRng::seed_from_u64(args.activity_seed.unwrap_or_default());
    let interval = config.params.block_interval_secs;
    let (mut applied, mut rejected, mut missed) = (0u64, 0u64, 0u64);

    while applied < args.blocks {
        if let Some(activity) = activity.as_mut() {
            let now = node.head_block_time();
            node.with_ledger_mut(|ledger| activity.step(ledger, &config.params, now))?;
        }

        let mut block_time = node.next_slot_time();
        while slot_rng.gen_range(0..100u8) < args.missed_slot_percent.min(99) {
            block_time += interval;
            missed += 1;
        }
        match node.apply_block(block_time) {
            Ok(_) => applied += 1,
            Err(err @ NodeError::BlockRejected { .. }) => {
                // The chain cannot advance past a block its own tasks reject.
                warn!(error = %err, "stopping simulation");
                rejected += 1;
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let summary = Summary {
        blocks_applied: applied,
        blocks_rejected: rejected,
        missed_slots: missed,
        properties: node.get_global_properties(),
        reward_fund: node.get_reward_fund(),
        top_witnesses: node.get_witnesses_by_vote(None, 10),
        active_witnesses: node.get_active_witnesses(),
        top_budgets: node.get_top_budgets(10),
        operations: counter.0.lock().clone(),
        activity: activity.map(|a| a.stats),
        account_history: args.trace_account.as_ref().map(|name| history.account_history(name)),
        state_digest: node.state_digest()?.to_string(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Initialize tracing subscriber with the given filter and output format.
///
/// Logs go to stderr so the JSON summary on stdout stays machine-readable.
fn init_logging(level_str: &str, format: LogFormat) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init(),
    }
}
