//! # Run Subcommand
//!
//! Wall-clock worker loop. A planner tick runs one worker pass over every
//! fabricating chain and renders what it planned; a slower revival tick
//! sweeps for stalled chains. The loop exits on Ctrl-C, or once nothing is
//! left fabricating when the production has a stop time.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use nexus_core::{Access, AccountId, Timestamp, UserRole};
use nexus_fabric::{Collaborators, Fabric, FabricationConfig, WorkOutcome};
use nexus_state::ChainState;

use crate::{bootstrap_chain, render_segment, ProductionPlan};

/// Arguments for `nexus run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Production length in seconds. Runs until interrupted when absent.
    #[arg(long)]
    pub seconds: Option<i64>,

    /// Length of each rendered segment in seconds.
    #[arg(long, default_value_t = 8)]
    pub segment_seconds: i64,

    /// Embed key for the production.
    #[arg(long, default_value = "live")]
    pub embed_key: String,

    /// Milliseconds between worker passes.
    #[arg(long, default_value_t = 1_000)]
    pub work_interval_ms: u64,

    /// Milliseconds between revival sweeps.
    #[arg(long, default_value_t = 10_000)]
    pub revive_interval_ms: u64,
}

/// Run the worker loop on a fresh runtime.
pub fn run_worker(args: &RunArgs, config: &FabricationConfig) -> Result<u8> {
    let runtime = tokio::runtime::Runtime::new().context("start tokio runtime")?;
    runtime.block_on(worker_loop(args.clone(), config.clone()))
}

async fn worker_loop(args: RunArgs, config: FabricationConfig) -> Result<u8> {
    let fabric = Fabric::new(Collaborators::in_memory(), config);
    let owner = Access::new([UserRole::Engineer], [AccountId::new()]);
    let worker = Access::internal();

    let start = Timestamp::now();
    let chain = bootstrap_chain(
        &fabric,
        &owner,
        &ProductionPlan {
            name: "Live".into(),
            start_at: start,
            stop_at: args.seconds.map(|s| start.plus_seconds(s)).transpose()?,
            embed_key: Some(args.embed_key.clone()),
        },
    )?;
    tracing::info!(chain_id = %chain.id, "worker loop started");

    let mut work = tokio::time::interval(Duration::from_millis(args.work_interval_ms));
    let mut revive = tokio::time::interval(Duration::from_millis(args.revive_interval_ms));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = work.tick() => {
                for (chain, outcome) in fabric.work_all(&worker)? {
                    match outcome {
                        WorkOutcome::Created(segment) => {
                            render_segment(&fabric, &worker, &segment, args.segment_seconds)?;
                        }
                        WorkOutcome::Completed => {
                            tracing::info!(chain_id = %chain.id, "production complete");
                        }
                        WorkOutcome::Idle | WorkOutcome::Lost => {}
                    }
                }
                if args.seconds.is_some()
                    && fabric.chains.read_all_in_state(&worker, ChainState::Fabricate)?.is_empty()
                {
                    tracing::info!("nothing left fabricating");
                    return Ok(0);
                }
            }
            _ = revive.tick() => {
                let revived = fabric.revival.check_and_revive_all(&worker)?;
                for chain in &revived {
                    tracing::warn!(chain_id = %chain.id, "revival sweep replaced a chain");
                }
            }
            signal = &mut shutdown => {
                signal.context("listen for Ctrl-C")?;
                tracing::info!("interrupted; stopping worker loop");
                return Ok(0);
            }
        }
    }
}
