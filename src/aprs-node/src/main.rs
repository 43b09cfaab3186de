// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod aprsis;
mod channel;
mod config;
mod igate;
mod pipeline;
mod stations;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use aprs_app::{init_logging, ConfigFile};
use aprs_core::channel::ReceiverSet;
use aprs_core::infra::DuplicateDetector;
use aprs_core::{DynResult, Position};
use aprs_packet_log::PacketLogger;

use channel::{register_builtin_channels_on, Channel, ChannelContext, ChannelRegistry};
use config::NodeConfig;
use igate::Igate;
use pipeline::Pipeline;
use stations::StationStore;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - APRS network node");
const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Node callsign (overrides [general].callsign)
    #[arg(short = 'c', long = "callsign")]
    callsign: Option<String>,
}

fn build_igate(cfg: &NodeConfig, callsign: Option<&str>) -> DynResult<Option<Igate>> {
    if !cfg.igate.enabled {
        return Ok(None);
    }
    let Some(callsign) = callsign else {
        return Err("[igate] enabled but no callsign configured".into());
    };
    let own_position = match (cfg.general.latitude, cfg.general.longitude) {
        (Some(lat), Some(lon)) => Some(Position::new(lat, lon)),
        _ => None,
    };
    Ok(Some(Igate::new(cfg.igate.clone(), callsign, own_position)?))
}

/// Build every configured channel and wire failover to backups.
fn build_channels(
    cfg: &NodeConfig,
    registry: &ChannelRegistry,
    ctx: &ChannelContext,
    pipeline: &Pipeline,
) -> DynResult<Vec<Arc<dyn Channel>>> {
    let mut by_id: HashMap<String, Arc<dyn Channel>> = HashMap::new();
    let mut channels = Vec::new();
    for ch in &cfg.channels {
        let channel = registry.new_instance(ch, &ch.channel_type, &ch.id, ctx)?;
        pipeline.attach(&channel);
        by_id.insert(ch.id.clone(), channel.clone());
        channels.push(channel);
    }

    for ch in &cfg.channels {
        let (Some(channel), Some(backup_id)) = (by_id.get(&ch.id), ch.backup.as_deref()) else {
            continue;
        };
        let Some(backup) = by_id.get(backup_id) else {
            continue;
        };
        let backup = Arc::downgrade(backup);
        channel.set_failure_handler(Arc::new(move |id: &str, reason: &str| {
            let Some(backup) = backup.upgrade() else {
                return;
            };
            warn!(
                "Channel {} failed ({}), activating backup {}",
                id,
                reason,
                backup.id()
            );
            if let Err(e) = backup.activate() {
                error!("Channel {}: activation failed: {}", backup.id(), e);
            }
        }));
    }
    Ok(channels)
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let mut registry = ChannelRegistry::new();
    register_builtin_channels_on(&mut registry);

    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", NodeConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = NodeConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        NodeConfig::load_from_default_paths()?
    };
    if let Some(callsign) = cli.callsign.clone() {
        cfg.general.callsign = Some(callsign);
    }
    cfg.validate()
        .map_err(|e| format!("Invalid node configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let callsign = cfg
        .general
        .callsign
        .as_deref()
        .map(|c| c.trim().to_ascii_uppercase());
    info!(
        "Starting aprs-node (callsign: {}, channels: {})",
        callsign.as_deref().unwrap_or("none"),
        cfg.channels.len()
    );

    let packet_log = match PacketLogger::from_config(&cfg.packet_log) {
        Ok(v) => v,
        Err(e) => {
            warn!("Packet logging disabled: {}", e);
            None
        }
    };
    let igate = build_igate(&cfg, callsign.as_deref())?;
    if igate.is_some() {
        info!(
            "IGate enabled (rf: {}, inet: {})",
            cfg.igate.rf_channel.as_deref().unwrap_or("-"),
            cfg.igate.inet_channel.as_deref().unwrap_or("-")
        );
    }

    let stations = Arc::new(StationStore::new());
    let pipeline = Arc::new(Pipeline::new(&cfg, stations, igate, packet_log));

    let mut receivers = ReceiverSet::new();
    receivers.register(pipeline.clone());
    let ctx = ChannelContext {
        callsign: callsign.clone(),
        receivers: Arc::new(receivers),
        dedup: Arc::new(Mutex::new(DuplicateDetector::new(
            chrono::Duration::seconds(i64::from(cfg.dedup.window_secs)),
            cfg.dedup.max_entries,
        ))),
    };

    let channels = build_channels(&cfg, &registry, &ctx, &pipeline)?;
    for (channel, ch) in channels.iter().zip(&cfg.channels) {
        if !ch.enabled {
            info!("Channel {} ({}) disabled", ch.id, ch.channel_type);
            continue;
        }
        if let Err(e) = channel.activate() {
            error!("Channel {}: activation failed: {}", ch.id, e);
        }
    }

    let mut task_handles: Vec<JoinHandle<()>> = Vec::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let stats_pipeline = pipeline.clone();
    let stats_channels = channels.clone();
    let stats_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        tokio::select! {
            _ = run_stats(stats_pipeline, stats_channels) => {}
            _ = wait_for_shutdown(stats_shutdown_rx) => {}
        }
    }));

    let sweep_pipeline = pipeline.clone();
    let sweep_cfg = cfg.topology.clone();
    let sweep_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        tokio::select! {
            _ = run_topology_sweep(sweep_pipeline, sweep_cfg) => {}
            _ = wait_for_shutdown(sweep_shutdown_rx) => {}
        }
    }));

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    for channel in &channels {
        channel.deactivate();
    }
    let _ = shutdown_tx.send(true);
    tokio::time::sleep(Duration::from_millis(400)).await;

    for handle in &task_handles {
        if !handle.is_finished() {
            handle.abort();
        }
    }
    for handle in task_handles {
        let _ = handle.await;
    }
    info!("{}", pipeline.stats_line());
    Ok(())
}

async fn run_stats(pipeline: Arc<Pipeline>, channels: Vec<Arc<dyn Channel>>) {
    let mut interval = tokio::time::interval(STATS_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        let states: Vec<String> = channels
            .iter()
            .map(|c| format!("{}={}", c.id(), c.state()))
            .collect();
        info!("{} [{}]", pipeline.stats_line(), states.join(" "));
    }
}

async fn run_topology_sweep(pipeline: Arc<Pipeline>, cfg: config::TopologyConfig) {
    let period = Duration::from_secs(u64::from(cfg.sweep_interval_mins.max(1)) * 60);
    let primary_max_age = chrono::Duration::hours(i64::from(cfg.primary_max_age_hours));
    let remove_age = chrono::Duration::hours(i64::from(cfg.remove_age_hours));
    let mut interval = tokio::time::interval(period);
    interval.tick().await;
    loop {
        interval.tick().await;
        let removed = pipeline.sweep(chrono::Utc::now(), primary_max_age, remove_age);
        if removed > 0 {
            info!("Topology sweep removed {} edges", removed);
        }
    }
}

async fn wait_for_shutdown(mut shutdown_rx: watch::Receiver<bool>) {
    if *shutdown_rx.borrow() {
        return;
    }
    while shutdown_rx.changed().await.is_ok() {
        if *shutdown_rx.borrow() {
            break;
        }
    }
}
