//! Headless frame loop driving an animated parameter.
//!
//! Usage:
//!   cargo run --bin hello_animation -- [frames]
//!
//! A clock source is advanced once per frame inside a transaction. The
//! rotation angle and the heading derived from it are pulled once per frame
//! and printed as one JSON object per line.

use std::f64::consts::TAU;

use adaptive_core::{Adaptive, AdaptiveGraph};
use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

const FRAME_RATE: f64 = 60.0;
/// Full turns per second.
const ROTATION_SPEED: f64 = 0.25;

#[derive(Parser, Debug)]
#[command(name = "hello_animation", about = "Drive an animated parameter through a headless frame loop")]
struct Args {
    /// Number of frames to render
    #[arg(default_value_t = 8)]
    frames: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        // Keep stdout for program output.
        .with_writer(std::io::stderr)
        .init();

    let Args { frames } = Args::parse();

    let graph = AdaptiveGraph::new();

    let time = graph.source(0.0_f64);
    let speed = graph.constant(ROTATION_SPEED);
    let angle = time.map2(&speed, |t, speed| (t * speed * TAU) % TAU)?;
    let heading = angle.map(|a| (a.cos(), a.sin()))?;

    info!(frames, rate = FRAME_RATE, "starting animation");

    for frame in 0..frames {
        let now = f64::from(frame) / FRAME_RATE;
        graph.transact(|tx| tx.set(&time, now))?;

        let (x, y) = heading.get_value()?;
        println!(
            "{}",
            serde_json::json!({
                "frame": frame,
                "time": now,
                "angle": angle.get_value()?,
                "heading": [x, y],
            })
        );
    }

    debug!(snapshot = %graph.snapshot().to_json_pretty()?, "final graph");
    info!(
        angle_evaluations = angle.evaluation_count(),
        heading_evaluations = heading.evaluation_count(),
        "animation finished"
    );

    Ok(())
}
