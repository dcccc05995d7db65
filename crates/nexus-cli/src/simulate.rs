//! # Simulate Subcommand
//!
//! Fabricates one production on a simulated clock. Each tick runs a worker
//! pass and a revival sweep, renders every newly planned segment, then
//! moves the clock forward. With `--stall-after N` the first chain stops
//! rendering after N segments, so the revival sweep replaces it.
//!
//! The run ends when no chain is fabricating; the report goes to stdout.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use nexus_core::{Access, AccountId, ChainId, Timestamp, UserRole};
use nexus_fabric::{
    Clock, Collaborators, Fabric, FabricationConfig, FixedClock, WorkOutcome,
};
use nexus_state::{ChainState, ChainType, SegmentState};

use crate::{bootstrap_chain, render_segment, ProductionPlan};

/// Arguments for `nexus simulate`.
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Simulated start time (RFC 3339, UTC). Defaults to now.
    #[arg(long)]
    pub start: Option<String>,

    /// Length of the production in seconds.
    #[arg(long, default_value_t = 120)]
    pub seconds: i64,

    /// Length of each rendered segment in seconds.
    #[arg(long, default_value_t = 8)]
    pub segment_seconds: i64,

    /// Simulated seconds per tick.
    #[arg(long, default_value_t = 5)]
    pub tick_seconds: i64,

    /// Stop rendering the first chain after this many segments.
    #[arg(long)]
    pub stall_after: Option<u64>,

    /// Embed key for the production.
    #[arg(long, default_value = "simulation")]
    pub embed_key: String,

    /// Give up after this many ticks.
    #[arg(long, default_value_t = 10_000)]
    pub max_ticks: u64,
}

/// Final state of one chain.
#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub id: ChainId,
    pub state: ChainState,
    #[serde(rename = "type")]
    pub chain_type: ChainType,
    pub embed_key: Option<String>,
    pub start_at: Timestamp,
    pub stop_at: Option<Timestamp>,
    pub segments: usize,
    pub dubbed: usize,
}

/// Outcome of a simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub ticks: u64,
    pub finished_at: Timestamp,
    pub revivals: usize,
    pub chains: Vec<ChainReport>,
}

/// Run the simulation and print the report as JSON.
pub fn run_simulate(args: &SimulateArgs, config: &FabricationConfig) -> Result<u8> {
    let report = simulate(args, config)?;
    let json = serde_json::to_string_pretty(&report).context("serialize report")?;
    println!("{json}");
    let completed = report
        .chains
        .iter()
        .any(|c| c.state == ChainState::Complete);
    Ok(if completed { 0 } else { 2 })
}

/// Drive one production until no chain is left fabricating.
pub fn simulate(args: &SimulateArgs, config: &FabricationConfig) -> Result<SimulationReport> {
    if args.seconds <= 0 || args.segment_seconds <= 0 || args.tick_seconds <= 0 {
        bail!("--seconds, --segment-seconds and --tick-seconds must be positive");
    }
    let start = match &args.start {
        Some(raw) => Timestamp::parse(raw).with_context(|| format!("invalid --start {raw:?}"))?,
        None => Timestamp::now(),
    };

    let clock = Arc::new(FixedClock::new(start));
    let collaborators = Collaborators {
        clock: clock.clone(),
        ..Collaborators::in_memory()
    };
    let fabric = Fabric::new(collaborators, config.clone());

    let owner = Access::new([UserRole::Engineer], [AccountId::new()]);
    let worker = Access::internal();
    let first = bootstrap_chain(
        &fabric,
        &owner,
        &ProductionPlan {
            name: "Simulation".into(),
            start_at: start,
            stop_at: Some(start.plus_seconds(args.seconds)?),
            embed_key: Some(args.embed_key.clone()),
        },
    )?;
    let mut chain_ids = vec![first.id];
    let mut revivals = 0;

    let mut ticks = 0;
    loop {
        if ticks >= args.max_ticks {
            bail!("production still fabricating after {ticks} ticks");
        }
        ticks += 1;

        for (chain, outcome) in fabric.work_all(&worker)? {
            match outcome {
                WorkOutcome::Created(segment) => {
                    let stalled = chain.id == first.id
                        && args.stall_after.is_some_and(|n| segment.offset >= n);
                    if stalled {
                        tracing::debug!(
                            chain_id = %chain.id,
                            offset = segment.offset,
                            "leaving segment unrendered"
                        );
                    } else {
                        render_segment(&fabric, &worker, &segment, args.segment_seconds)?;
                    }
                }
                WorkOutcome::Completed => {
                    tracing::info!(chain_id = %chain.id, "production complete");
                }
                WorkOutcome::Idle | WorkOutcome::Lost => {}
            }
        }

        for revived in fabric.revival.check_and_revive_all(&worker)? {
            revivals += 1;
            chain_ids.push(revived.id);
        }

        let fabricating = fabric.chains.read_all_in_state(&worker, ChainState::Fabricate)?;
        if fabricating.is_empty() {
            break;
        }
        clock.advance_seconds(args.tick_seconds)?;
    }

    let mut chains = Vec::with_capacity(chain_ids.len());
    for id in chain_ids {
        let chain = fabric.chains.read_one(&worker, id)?;
        let segments = fabric.gateway().read_segments(id, 0, usize::MAX)?;
        chains.push(ChainReport {
            id,
            state: chain.state,
            chain_type: chain.chain_type,
            embed_key: chain.embed_key,
            start_at: chain.start_at,
            stop_at: chain.stop_at,
            segments: segments.len(),
            dubbed: segments
                .iter()
                .filter(|s| s.state == SegmentState::Dubbed)
                .count(),
        });
    }

    Ok(SimulationReport {
        ticks,
        finished_at: clock.now(),
        revivals,
        chains,
    })
}
