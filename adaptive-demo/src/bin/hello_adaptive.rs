//! The smallest useful graph: two sources and two derived values.
//!
//! Usage:
//!   cargo run --bin hello_adaptive
//!
//! Prints `D: 3`, changes `a` in a transaction, then prints `D: 7`.

use adaptive_core::{Adaptive, AdaptiveGraph};
use anyhow::Result;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        // Keep stdout for program output.
        .with_writer(std::io::stderr)
        .init();

    let graph = AdaptiveGraph::new();

    let a = graph.source(1);
    let b = graph.source(1);
    let c = a.map(|va| va * 2)?;
    let d = b.map2(&c, |vb, vc| vb + vc)?;

    println!("D: {}", d.get_value()?);

    let summary = graph
        .begin_transaction()
        .and_then(|tx| {
            tx.set(&a, 3)?;
            Ok(tx.commit())
        })?;
    info!(
        written = summary.written,
        invalidated = summary.invalidated,
        "changed a to 3"
    );

    println!("D: {}", d.get_value()?);

    Ok(())
}
