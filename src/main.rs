//! launcher: interactive driver for the launcher core
//!
//! Reads commands from stdin and prints every result snapshot.

use anyhow::Result;
use launcher_core::{
    config,
    plugins::{catalog::CatalogPlugin, PluginRegistry},
    storage::JsonFileStore,
    ExecuteOutcome, Launcher, ResultsSnapshot, SelectedView, Settings,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = config::load()?;

    // Initialize logging
    let default_level = if settings.general.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting launcher v{}", launcher_core::VERSION);

    let registry = build_registry(&settings);
    let store = match settings.storage.data_dir {
        Some(ref dir) => JsonFileStore::new(dir),
        None => JsonFileStore::default_location()?,
    };
    info!("Launcher state lives in {}", store.dir().display());

    let mut launcher = Launcher::new(
        &settings,
        Arc::new(registry),
        Arc::new(store),
        Handle::current(),
    );
    launcher.show();

    let mut snapshots = launcher.subscribe();
    let printer = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            print_snapshot(&snapshot);
        }
    });

    print_usage();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Quit => break,
            Command::Text(text) => {
                launcher.set_query_text(text);
            }
            Command::Next => {
                launcher.select_next();
                print_selection(&launcher);
            }
            Command::Prev => {
                launcher.select_prev();
                print_selection(&launcher);
            }
            Command::NextPage => {
                launcher.select_next_page();
                print_selection(&launcher);
            }
            Command::PrevPage => {
                launcher.select_prev_page();
                print_selection(&launcher);
            }
            Command::Select(index) => {
                launcher.select_result(index);
                print_selection(&launcher);
            }
            Command::Exec => match launcher.execute_selected() {
                ExecuteOutcome::Nothing => println!("(nothing to execute)"),
                ExecuteOutcome::Executed { hide } => {
                    if hide {
                        println!("(window hidden)");
                        launcher.show();
                    }
                    print_selection(&launcher);
                }
                ExecuteOutcome::Requeried(_) => println!("> {}", launcher.query_text()),
            },
            Command::History => {
                launcher.load_history();
                print_selection(&launcher);
            }
            Command::Menu => {
                launcher.load_context_menu();
                print_selection(&launcher);
            }
            Command::Escape => {
                launcher.escape();
                if !launcher.is_visible() {
                    println!("(window hidden)");
                    launcher.show();
                }
                print_selection(&launcher);
            }
            Command::Pin => {
                let index = launcher.selected_index();
                if !launcher.set_top_most(index) {
                    println!("(nothing to pin)");
                }
            }
            Command::Unpin => {
                let index = launcher.selected_index();
                if !launcher.unset_top_most(index) {
                    println!("(not pinned)");
                }
            }
            Command::Save => {
                if launcher.save() {
                    println!("(saved)");
                }
            }
            Command::Stats => print_stats(&launcher),
            Command::Unknown(command) => {
                println!("unknown command: {}", command);
                print_usage();
            }
        }
    }

    launcher.save();
    printer.abort();
    info!("Launcher stopped");
    Ok(())
}

/// Register one catalog plugin per configured catalog
fn build_registry(settings: &Settings) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    for catalog in &settings.catalogs {
        let plugin = CatalogPlugin::new(catalog, settings.search.search_precision);
        registry.register_with_config(Arc::new(plugin), settings.get_plugin(&catalog.id));
    }
    for plugin in &settings.plugins {
        if !registry.contains(&plugin.id) {
            warn!("Settings override for unknown plugin {}", plugin.id);
        }
    }
    info!("Loaded {} plugins", registry.len());
    registry
}

enum Command {
    Text(String),
    Next,
    Prev,
    NextPage,
    PrevPage,
    Select(i64),
    Exec,
    History,
    Menu,
    Escape,
    Pin,
    Unpin,
    Save,
    Stats,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let Some(command) = line.strip_prefix(':') else {
            return Self::Text(line.to_string());
        };
        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("n"), None) => Self::Next,
            (Some("p"), None) => Self::Prev,
            (Some("pgdn"), None) => Self::NextPage,
            (Some("pgup"), None) => Self::PrevPage,
            (Some("select"), Some(index)) => match index.parse() {
                Ok(index) => Self::Select(index),
                Err(_) => Self::Unknown(line.to_string()),
            },
            (Some("exec"), None) => Self::Exec,
            (Some("history"), None) => Self::History,
            (Some("menu"), None) => Self::Menu,
            (Some("esc"), None) => Self::Escape,
            (Some("pin"), None) => Self::Pin,
            (Some("unpin"), None) => Self::Unpin,
            (Some("save"), None) => Self::Save,
            (Some("stats"), None) => Self::Stats,
            (Some("quit"), None) | (Some("q"), None) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

fn print_snapshot(snapshot: &ResultsSnapshot) {
    if !snapshot.visible {
        println!("-- generation {}: no results --", snapshot.generation);
        return;
    }
    println!(
        "-- generation {}: {} results --",
        snapshot.generation,
        snapshot.len()
    );
    for (i, ranked) in snapshot.results.iter().enumerate() {
        let item = &ranked.item;
        println!(
            "{:>3}. {} {} [{}] {}",
            i, item.title, item.subtitle, item.plugin_id, ranked.score
        );
    }
}

fn print_selection(launcher: &Launcher) {
    let selected = launcher.selected_index();
    match launcher.view() {
        SelectedView::QueryResults => match launcher.selected_result() {
            Some(ranked) => println!("> [{}] {}", selected, ranked.item.title),
            None => println!("> (no selection)"),
        },
        SelectedView::ContextMenu => {
            println!("-- context menu --");
            for (i, item) in launcher.context_items().iter().enumerate() {
                let marker = if i == selected { '>' } else { ' ' };
                println!("{} {}. {}", marker, i, item.title);
            }
        }
        SelectedView::History => {
            println!("-- history --");
            for (i, entry) in launcher.history_results().iter().enumerate() {
                let marker = if i == selected { '>' } else { ' ' };
                println!(
                    "{} {}. {} ({})",
                    marker,
                    i,
                    entry.query,
                    entry.executed_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }
}

fn print_stats(launcher: &Launcher) {
    let metrics = launcher.metrics();
    println!(
        "rounds: {} dispatched, {} cancelled",
        metrics.total_rounds(),
        metrics.cancelled_rounds()
    );
    if let Some(round) = metrics.last_round() {
        println!(
            "last round: generation {}, {} results in {}ms",
            round.generation, round.result_count, round.elapsed_ms
        );
    }
    let mut stats: Vec<_> = metrics.plugin_stats().into_iter().collect();
    stats.sort_by(|a, b| a.0.cmp(&b.0));
    for (plugin, stats) in stats {
        println!(
            "{}: {} queries, {} failures, avg {}ms, {:.1}% reliable",
            plugin,
            stats.queries,
            stats.failures,
            stats.avg_response_time.unwrap_or(0),
            stats.reliability
        );
    }
}

/// Print usage information
fn print_usage() {
    println!(
        r#"launcher v{}
Type to search. Commands:
    :n / :p            select next / previous result
    :pgdn / :pgup      move one page
    :select N          select result N
    :exec              execute the selection
    :menu              toggle the context menu
    :history           toggle the history view
    :esc               leave the current view or hide the window
    :pin / :unpin      pin or unpin the selected result
    :save              persist history and usage
    :stats             show dispatch statistics
    :quit              save and exit

ENVIRONMENT VARIABLES:
    LAUNCHER_SETTINGS_PATH  Path to settings.yml
    LAUNCHER_DEBUG          Enable debug logging (true/false)
    LAUNCHER_DATA_DIR       Directory for history and usage files
    LAUNCHER_MAX_RESULTS    Results per page
    LAUNCHER_DEBOUNCE_MS    Keystroke debounce in milliseconds
    RUST_LOG                Log filter, overrides LAUNCHER_DEBUG"#,
        launcher_core::VERSION
    );
}
