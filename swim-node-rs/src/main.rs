//! SWIM Node - local membership simulation
//!
//! Drives a membership registry with simulated probe outcomes and consumes
//! both event streams concurrently.

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::Duration;
use swim_core::{
    EventReceiver, MembershipEvent, NodeAddress, NodeState, Registry, RegistryConfig,
    StateChanged,
};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, info_span, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Local SWIM membership simulation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host used for the local and simulated peer addresses
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port of the local node; peers use the following ports
    #[arg(short, long, default_value = "7946")]
    port: u16,

    /// Number of peers seeded at startup
    #[arg(short, long, default_value = "5")]
    nodes: u16,

    /// Number of probe rounds to run
    #[arg(short, long, default_value = "50")]
    rounds: usize,

    /// Capacity of both event channels
    #[arg(short, long, default_value = "100")]
    capacity: usize,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Probability that a probe goes unanswered
    #[arg(long, default_value = "0.2", value_parser = parse_probability)]
    loss_rate: f64,

    /// Probability that a probed peer leaves gracefully
    #[arg(long, default_value = "0.02", value_parser = parse_probability)]
    leave_rate: f64,

    /// Probability that a new peer joins in a round
    #[arg(long, default_value = "0.05", value_parser = parse_probability)]
    join_rate: f64,

    /// Consecutive missed probes before a peer is declared dead
    #[arg(long, default_value = "3")]
    suspect_limit: u32,

    /// Delay between probe rounds in milliseconds
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print the final membership as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // RUST_LOG takes precedence over --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    let local = NodeAddress::new(args.host.clone(), args.port);
    info!("SWIM node {} starting simulation", local);

    let config = RegistryConfig::new().with_capacity(args.capacity);
    let registry = Registry::with_span(config, info_span!("registry", local = %local));

    let events_task = spawn_event_consumer(registry.membership_events());
    let changes_task = spawn_change_consumer(registry.state_changes());

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut next_port = args.port;
    for _ in 0..args.nodes {
        next_port = next_port.wrapping_add(1);
        join_peer(&registry, NodeAddress::new(args.host.clone(), next_port))?;
    }

    let mut missed: HashMap<NodeAddress, u32> = HashMap::new();
    let mut ticker = interval(Duration::from_millis(args.interval_ms));

    for round in 0..args.rounds {
        ticker.tick().await;

        if rng.gen_bool(args.join_rate) {
            next_port = next_port.wrapping_add(1);
            join_peer(&registry, NodeAddress::new(args.host.clone(), next_port))?;
        }

        let Some(target) = registry.next(Some(&local)) else {
            warn!("Round {}: no probe targets left", round);
            break;
        };

        let roll: f64 = rng.gen();
        let new_state = if roll < args.leave_rate {
            missed.remove(&target);
            NodeState::Left
        } else if roll < args.leave_rate + args.loss_rate {
            let count = missed.entry(target.clone()).or_insert(0);
            *count += 1;
            if *count >= args.suspect_limit {
                missed.remove(&target);
                NodeState::Dead
            } else {
                NodeState::Suspicion
            }
        } else {
            missed.remove(&target);
            NodeState::Healthy
        };

        debug!("Round {}: probed {} -> {}", round, target, new_state);
        registry.change_node_state(&target, new_state)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&registry.snapshot())?);
    } else {
        println!("{}", registry.describe());
    }

    // Dropping the registry closes both channels so the consumers finish
    drop(registry);
    let events = events_task.await?;
    let changes = changes_task.await?;
    info!("Simulation done: {} membership events, {} state changes", events, changes);

    Ok(())
}

/// Parse a probability in [0, 1]
fn parse_probability(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("`{}` is not a number", s))?;

    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("`{}` is not a probability between 0 and 1", s))
    }
}

/// Add a peer and confirm it healthy, producing its join event
fn join_peer(registry: &Registry, peer: NodeAddress) -> swim_core::Result<()> {
    registry.add_node(peer.clone());
    registry.change_node_state(&peer, NodeState::Healthy)
}

fn spawn_event_consumer(rx: EventReceiver<MembershipEvent>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut count = 0;
        while let Some(event) = rx.recv().await {
            count += 1;
            match event {
                MembershipEvent::Join(node) => info!("Member joined: {}", node),
                MembershipEvent::Leave(node) => info!("Member left: {}", node),
            }
        }
        if rx.dropped() > 0 {
            warn!("{} membership events dropped under backpressure", rx.dropped());
        }
        count
    })
}

fn spawn_change_consumer(rx: EventReceiver<StateChanged>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut count = 0;
        while let Some(change) = rx.recv().await {
            count += 1;
            if change.new_state == NodeState::Suspicion {
                debug!("Suspicion raised for {}", change.node);
            }
            debug!("State change: {}", change);
        }
        count
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let args = Args::try_parse_from(["swim-node"]).unwrap();
        assert_eq!(args.interval_ms, 10);
        assert_eq!(args.join_rate, 0.05);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(Args::try_parse_from(["swim-node", "--interval-ms", "0"]).is_err());
        assert!(Args::try_parse_from(["swim-node", "--interval-ms", "1"]).is_ok());
    }

    #[test]
    fn test_invalid_rates_rejected() {
        for flag in ["--join-rate", "--loss-rate", "--leave-rate"] {
            for value in ["NaN", "inf", "-0.1", "1.5", "often"] {
                assert!(
                    Args::try_parse_from(["swim-node", flag, value]).is_err(),
                    "{} {} accepted",
                    flag,
                    value
                );
            }
            assert!(Args::try_parse_from(["swim-node", flag, "1"]).is_ok());
            assert!(Args::try_parse_from(["swim-node", flag, "0"]).is_ok());
        }
    }

    #[test]
    fn test_parse_probability() {
        assert_eq!(parse_probability("0.25"), Ok(0.25));
        assert!(parse_probability("NaN").is_err());
        assert!(parse_probability("-inf").is_err());
    }
}
