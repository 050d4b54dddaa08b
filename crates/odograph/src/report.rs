//! Terminal reporting: the run summary and the stats table.

use colored::Colorize;

use odograph_graph::loader::GraphStats;

use crate::pipeline::LoadOutcome;

/// Final summary after a load.
pub fn print_outcome(outcome: &LoadOutcome) {
    println!("\n{}\n", "✓ Load finished".bold().green());
    println!(
        "  modules: {} discovered, {} processed",
        outcome.modules_discovered, outcome.modules_processed
    );
    println!(
        "  parsed: {} models, {} views",
        outcome.models_parsed, outcome.views_parsed
    );
    println!(
        "  written: {} nodes, {} relationships in {} batches",
        outcome.metrics.nodes_written,
        outcome.metrics.relationships_written,
        outcome.metrics.batches_processed
    );
    if outcome.metrics.errors > 0 {
        println!(
            "  {}",
            format!("{} rows lost to failed batches", outcome.metrics.errors).red()
        );
    }
    print_stats(&outcome.stats);
}

/// Node counts per label.
pub fn print_stats(stats: &GraphStats) {
    println!("\n{}", "Graph statistics".bold());
    let rows = [
        ("Modules", stats.modules),
        ("Models", stats.models),
        ("Views", stats.views),
        ("Fields", stats.fields),
    ];
    for (label, count) in rows {
        println!("  {:<10} {}", label.cyan(), count.to_string().magenta());
    }
}
