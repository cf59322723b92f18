use anyhow::Context;
use clap::Parser;
use doorcore::notify::NotificationLink;
use log::{info, warn};
use status_bridge::bridge::StatusBridge;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::AgentConfig;
use workflow::runner::Runner;

mod adapters;
mod generator;
mod status_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Camera agent that watches a door and reports its state")]
struct Args {
    /// Load the agent config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Actuator controller host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 80)]
    port: u16,
    /// Seconds of countdown before the first capture
    #[arg(long, default_value_t = 10)]
    countdown: u32,
    /// Milliseconds between captures
    #[arg(long, default_value_t = 5000)]
    interval: u64,
    /// Replay still images from this directory instead of synthetic frames
    #[arg(long)]
    frames: Option<PathBuf>,
    /// Write processed captures to this directory
    #[arg(long)]
    output: Option<PathBuf>,
    /// Probe the actuator controller once and exit
    #[arg(long, default_value_t = false)]
    probe: bool,
    /// Keep the status bridge up while the loop runs
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = if let Some(path) = &args.config {
        AgentConfig::load(path)?
    } else {
        AgentConfig::from_args(
            args.host.clone(),
            args.port,
            args.countdown,
            args.interval,
            args.frames.clone(),
            args.output.clone(),
        )
    };

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating agent runtime")?;

    if args.probe {
        return runtime.block_on(probe(config));
    }
    runtime.block_on(run(config, args.serve))
}

async fn probe(config: AgentConfig) -> anyhow::Result<()> {
    let link = NotificationLink::new(config.endpoint);
    let outcome = link.test_connectivity().await;
    println!("{}", link.status().status_text);
    outcome.context("probing actuator controller")
}

async fn run(config: AgentConfig, serve: bool) -> anyhow::Result<()> {
    let runner = Runner::build(&config).await?;
    let handle = runner.orchestrator.handle();

    if serve {
        let bridge = StatusBridge::new(handle.clone(), runner.link.clone());
        let addr = SocketAddr::from(([127, 0, 0, 1], config.bridge_port));
        tokio::spawn(bridge.serve(addr));
    }

    let mut status_rx = handle.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            info!(
                "door {} | {} | {} | {}",
                status.door_state, status.capture_status, status.inference_status, status.save_status
            );
        }
    });

    let mut link_rx = runner.link.subscribe();
    tokio::spawn(async move {
        while link_rx.changed().await.is_ok() {
            let text = link_rx.borrow_and_update().status_text.clone();
            info!("controller: {}", text);
        }
    });

    let loop_task = tokio::spawn(runner.orchestrator.run());
    handle.start().context("starting capture")?;
    info!("agent running (Ctrl+C to stop)...");

    signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
    if let Err(err) = handle.shutdown() {
        warn!("control loop already stopped: {}", err);
    }
    loop_task.await.context("joining control loop")?;

    let metrics = handle.metrics();
    println!(
        "Stopped -> cycles {} completed, {} failed, {} discarded, {} notifications",
        metrics.cycles_completed,
        metrics.cycles_failed,
        metrics.results_discarded,
        metrics.notifications_dispatched
    );
    Ok(())
}
