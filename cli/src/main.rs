//! Command-line driver for the sortition core.
//!
//! Reads a single JSON or TOML fixture describing the pool, categories
//! and settings, runs the requested selection, and prints the resulting
//! panels and diagnostic log to stdout. No CSV/spreadsheet ingestion or
//! GUI glue lives here — those are out of scope (spec §1).

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use sortition_core::{driver, Categories, Pool, Settings};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sortition", about = "Draw a stratified random panel from a pool of respondents")]
struct Cli {
    /// Path to a JSON or TOML fixture with `pool`, `categories`, `panel_size` and `settings`.
    fixture: PathBuf,

    /// Suppress the human-readable summary and print only the panels as JSON.
    #[arg(long)]
    quiet: bool,
}

#[derive(Deserialize)]
struct Fixture {
    pool: Pool,
    categories: Categories,
    panel_size: u32,
    #[serde(default)]
    settings: Settings,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let fixture = load_fixture(&cli.fixture)?;

    let output = driver::run(&fixture.pool, &fixture.categories, fixture.panel_size, &fixture.settings)
        .context("selection failed")?;

    if !cli.quiet {
        for (i, panel) in output.panels.iter().enumerate() {
            println!("panel {}: {} members", i + 1, panel.len());
            for id in panel {
                println!("  {id}");
            }
        }
        for line in output.log.lines() {
            eprintln!("{line}");
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(
            &output
                .panels
                .iter()
                .map(|p| p.iter().map(|id| id.0.clone()).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        )?
    );

    Ok(())
}

fn load_fixture(path: &PathBuf) -> Result<Fixture> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture {}", path.display()))?;

    if path.extension().and_then(|e| e.to_str()) == Some("toml") {
        toml::from_str(&contents).context("parsing TOML fixture")
    } else {
        serde_json::from_str(&contents).context("parsing JSON fixture")
    }
}
