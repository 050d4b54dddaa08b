//! The end-to-end run: scan, select, parse in parallel, transform, load,
//! commit state.
//!
//! Any single file, module or batch may fail without aborting the run. The
//! only fatal conditions are a missing corpus root and an unreachable graph
//! store; a state write failure is logged and the previous state survives.

use std::panic::AssertUnwindSafe;
use std::sync::mpsc;

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use odograph_core::changes::{relevant_files, ChangeDetector};
use odograph_core::config::{AnalyzerConfig, FileFilter};
use odograph_core::error::CoreError;
use odograph_core::model_parser::{ModelInfo, ModelParser};
use odograph_core::scanner::{ModuleInfo, ModuleScanner};
use odograph_core::state::StateStore;
use odograph_core::transform;
use odograph_core::view_parser::{ViewInfo, ViewParser};
use odograph_graph::loader::{GraphLoader, GraphStats, LoadMetrics};
use odograph_graph::store::GraphStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Re-parse everything, ignoring incremental state.
    pub full: bool,
    /// Clear the graph before loading.
    pub clear: bool,
}

/// What a run did, for reporting.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub modules_discovered: usize,
    pub modules_processed: usize,
    pub models_parsed: usize,
    pub views_parsed: usize,
    pub strategy_reason: String,
    pub metrics: LoadMetrics,
    pub stats: GraphStats,
}

/// Parse one module: models and views. One unit of worker-pool work.
pub fn parse_module(
    module: &ModuleInfo,
    filter: &FileFilter,
) -> (Vec<ModelInfo>, Vec<ViewInfo>) {
    let models = ModelParser::new(module.name.as_str()).parse_directory(&module.path, filter);
    let views = ViewParser::new(module.name.as_str()).parse_directory(&module.path);
    (models, views)
}

/// Run the full pipeline against `store`.
pub fn run_load<S: GraphStore>(
    config: &AnalyzerConfig,
    store: S,
    options: LoadOptions,
) -> Result<LoadOutcome> {
    // 1. Discover modules; a missing root is fatal.
    let scanner = ModuleScanner::new(&config.source_path)?;
    let modules = scanner.scan();
    println!("{} {} modules found", "✓".green(), modules.len());

    let mut state = StateStore::open(config.state_file());

    // 2. Select work.
    let (to_process, strategy_reason) = if options.full {
        (modules.clone(), "full reload requested".to_string())
    } else {
        let detector = ChangeDetector::new(&state, &config.filter, config.full_reload_threshold);
        let strategy = detector.strategy(&modules);
        (strategy.modules, strategy.reason)
    };
    println!("{} {}", "Strategy:".yellow(), strategy_reason);

    let mut loader = GraphLoader::new(store, config.batch_size);
    loader.ensure_schema();

    // Nothing changed and nothing to clear: leave the graph and the state
    // exactly as they are.
    if to_process.is_empty() && !options.clear {
        return Ok(LoadOutcome {
            modules_discovered: modules.len(),
            modules_processed: 0,
            models_parsed: 0,
            views_parsed: 0,
            strategy_reason,
            metrics: LoadMetrics::default(),
            stats: loader.stats(),
        });
    }

    // 3. Parse the selected modules on the worker pool.
    let (all_models, all_views) = parse_modules(config, &to_process)?;
    println!(
        "{} {} models and {} views parsed",
        "✓".green(),
        all_models.len(),
        all_views.len()
    );

    // 4. Transform. Module nodes cover the whole corpus so dependency
    // edges stay complete on incremental runs.
    let dataset = transform::organize(&modules, &all_models, &all_views);

    // 5. Load; an unreachable store is fatal and leaves the state alone.
    if options.clear || options.full {
        loader.clear().context("clearing graph")?;
        println!("{}", "Graph cleared".yellow());
    }
    let metrics = loader.load(&dataset).context("loading graph")?;
    let stats = loader.stats();

    // 6. Commit state only now that the load succeeded.
    for module in &to_process {
        let files = relevant_files(&config.filter, &module.path);
        state.record_files(&files);
        state.set_module_state(
            &module.name,
            serde_json::json!({ "path": module.path.display().to_string() }),
        );
    }
    if let Err(err) = state.save() {
        warn!(%err, "state not persisted; the next run will re-parse");
    }

    Ok(LoadOutcome {
        modules_discovered: modules.len(),
        modules_processed: to_process.len(),
        models_parsed: all_models.len(),
        views_parsed: all_views.len(),
        strategy_reason,
        metrics,
        stats,
    })
}

/// Fan the selected modules out over a bounded worker pool and drain
/// results in completion order. A worker panic skips its module.
fn parse_modules(
    config: &AnalyzerConfig,
    modules: &[ModuleInfo],
) -> Result<(Vec<ModelInfo>, Vec<ViewInfo>)> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_workers)
        .build()
        .map_err(|err| CoreError::WorkerPool(err.to_string()))?;

    let progress = ProgressBar::new(modules.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} parsing modules {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let (sender, receiver) = mpsc::channel();

    pool.scope(|scope| {
        for module in modules {
            let sender = sender.clone();
            let filter = &config.filter;
            scope.spawn(move |_| {
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    parse_module(module, filter)
                }));
                // The receiver outlives the scope; a send can only fail if
                // the drain loop itself died.
                let _ = sender.send((module.name.clone(), result));
            });
        }
    });
    drop(sender);

    let mut all_models = Vec::new();
    let mut all_views = Vec::new();
    for (name, result) in receiver {
        match result {
            Ok((models, views)) => {
                all_models.extend(models);
                all_views.extend(views);
            }
            Err(_) => warn!(module = %name, "parse worker panicked; module skipped"),
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok((all_models, all_views))
}
