// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ike-liveness-probe - simulated IKE liveness checks
//!
//! Runs one session against an in-memory peer that drops a configurable share
//! of requests, then prints the liveness status stream and metric records.

use clap::Parser;
use colored::*;
use crossbeam::channel::{self, Receiver, Sender};
use ike_session::liveness::ThreadExecutor;
use ike_session::{
    spawn_session, AlarmDispatcher, LivenessMetricsSink, LivenessObserver, LivenessStatus,
    MonotonicClock, SessionConfig, SessionContext, SessionEvent, SessionId, SessionWorker,
    Transport,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const SESSION_ID: SessionId = 1;

/// IKE liveness check simulator
#[derive(Parser, Debug)]
#[command(name = "ike-liveness-probe")]
#[command(version = "0.1.0")]
#[command(about = "Run liveness checks against a lossy simulated peer")]
struct Args {
    /// Number of on-demand liveness checks
    #[arg(short = 'n', long, default_value = "5")]
    checks: u32,

    /// Probability that the peer drops a request (0.0 - 1.0)
    #[arg(short, long, default_value = "0.3")]
    loss: f64,

    /// Peer response delay in milliseconds
    #[arg(long, default_value = "20")]
    rtt: u64,

    /// Pause between checks in milliseconds
    #[arg(short, long, default_value = "200")]
    interval: u64,

    /// Retransmission timeouts in milliseconds (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    timeouts: Option<Vec<u32>>,

    /// Background DPD delay in seconds (disabled when omitted)
    #[arg(long)]
    dpd_delay: Option<u32>,

    /// TOML session configuration; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fixed seed for the loss simulation
    #[arg(long)]
    seed: Option<u64>,
}

/// Transport side: hands requests to the simulated peer.
struct PeerLink(Sender<u32>);

impl Transport for PeerLink {
    fn send_liveness_request(&self, session_id: SessionId, message_id: u32) {
        eprintln!(
            "    {} session {} -> INFORMATIONAL id={}",
            "send".dimmed(),
            session_id,
            message_id
        );
        let _ = self.0.send(message_id);
    }

    fn send_nat_keepalive(&self, session_id: SessionId) {
        eprintln!("    {} session {} -> NAT keepalive", "send".dimmed(), session_id);
    }
}

struct StatusPrinter(Sender<LivenessStatus>);

impl LivenessObserver for StatusPrinter {
    fn on_liveness_status_changed(&self, status: LivenessStatus) {
        let label = match status {
            LivenessStatus::Success => status.to_string().green().bold(),
            LivenessStatus::Failure => status.to_string().red().bold(),
            _ => status.to_string().cyan(),
        };
        eprintln!("{} {}", ">>>".bold(), label);
        let _ = self.0.send(status);
    }
}

struct MetricPrinter;

impl LivenessMetricsSink for MetricPrinter {
    fn on_liveness_check_completed(&self, elapsed_millis: i32, overlap_count: u32, success: bool) {
        eprintln!(
            "    {} elapsed={}ms overlapping={} success={}",
            "metric".yellow(),
            elapsed_millis,
            overlap_count,
            success
        );
    }
}

fn main() {
    // Initialize logger for RUST_LOG-based debug output
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default().without_dpd(),
    };
    if let Some(timeouts) = &args.timeouts {
        config = config.with_retransmit_timeouts_ms(timeouts.clone())?;
    }
    if let Some(secs) = args.dpd_delay {
        config = config.with_dpd_delay_secs(secs)?;
    }
    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&args.loss) {
        return Err(format!("loss must be within 0.0..=1.0, got {}", args.loss).into());
    }

    let config = load_config(args)?;
    // Upper bound for one check: the whole schedule plus the peer delay.
    let check_budget = Duration::from_millis(
        config
            .retransmit_timeouts_ms
            .iter()
            .map(|t| u64::from(*t))
            .sum::<u64>()
            + args.rtt
            + 1000,
    );

    eprintln!("{} IKE liveness probe", ">>>".green().bold());
    eprintln!(
        "    checks={}, loss={:.2}, rtt={}ms, timeouts={:?}",
        args.checks, args.loss, args.rtt, config.retransmit_timeouts_ms
    );

    let (request_tx, request_rx) = channel::unbounded();
    let (status_tx, status_rx) = channel::unbounded();
    let dispatcher = Arc::new(AlarmDispatcher::new());
    let ctx = SessionContext {
        session_id: SESSION_ID,
        config,
        clock: Arc::new(MonotonicClock::new()),
        transport: Arc::new(PeerLink(request_tx)),
        observer: Arc::new(StatusPrinter(status_tx)),
        executor: Arc::new(ThreadExecutor::spawn("ike-probe-cb")?),
        metrics_sink: Arc::new(MetricPrinter),
        dispatcher,
    };
    let worker = spawn_session(ctx)?;

    let peer = {
        let worker = Arc::clone(&worker);
        let link = LossyLink::new(args.loss, args.seed);
        let rtt = Duration::from_millis(args.rtt);
        std::thread::Builder::new()
            .name("ike-probe-peer".into())
            .spawn(move || run_peer(&request_rx, &worker, link, rtt))?
    };

    let mut successes = 0u32;
    let mut failures = 0u32;
    for check in 0..args.checks {
        eprintln!("{}", format!("--- check {}/{} ---", check + 1, args.checks).dimmed());
        worker.post(SessionEvent::LivenessCheckRequested)?;

        match wait_terminal(&status_rx, check_budget) {
            Some(LivenessStatus::Success) => successes += 1,
            Some(_) => {
                failures += 1;
                eprintln!("{}", "    peer declared dead, session closed".red());
                break;
            }
            None => {
                return Err("no liveness outcome within the retransmission budget".into());
            }
        }
        std::thread::sleep(Duration::from_millis(args.interval));
    }

    let _ = worker.post(SessionEvent::Close);
    worker.shutdown();
    let _ = peer.join();

    println!();
    println!("{}", "=== IKE Liveness Probe Results ===".bold());
    println!("  {} {}", "Succeeded:".cyan(), successes);
    println!("  {} {}", "Failed:".cyan(), failures);
    Ok(())
}

fn wait_terminal(statuses: &Receiver<LivenessStatus>, budget: Duration) -> Option<LivenessStatus> {
    loop {
        let status = statuses.recv_timeout(budget).ok()?;
        if status.is_terminal() {
            return Some(status);
        }
    }
}

/// Loss model of the simulated link. Owns its generator so a seed
/// reproduces the same drops on whichever thread draws from it.
struct LossyLink {
    rng: fastrand::Rng,
    loss: f64,
}

impl LossyLink {
    fn new(loss: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self { rng, loss }
    }

    fn drops(&mut self) -> bool {
        self.rng.f64() < self.loss
    }
}

/// Answer each request after `rtt` unless the link drops it.
fn run_peer(requests: &Receiver<u32>, worker: &SessionWorker, mut link: LossyLink, rtt: Duration) {
    for message_id in requests {
        if link.drops() {
            log::debug!("[Peer] dropping request {}", message_id);
            continue;
        }
        std::thread::sleep(rtt);
        if worker
            .post(SessionEvent::ResponseReceived { message_id })
            .is_err()
        {
            break;
        }
    }
}
