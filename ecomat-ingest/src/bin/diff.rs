//! ecomat-diff - Compare two promoted dataset versions
//!
//! Reads the service database and reports what changed between two
//! promoted releases, human-readable or as JSON. Read-only: it never
//! touches the pending slot or the current pointer.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use sqlx::SqlitePool;

use ecomat_common::config;
use ecomat_common::models::Material;
use ecomat_ingest::diff::{diff_versions, FieldChange, VersionDiff};
use ecomat_ingest::store::VersionStore;

/// Command-line arguments for ecomat-diff
#[derive(Parser, Debug)]
#[command(name = "ecomat-diff")]
#[command(about = "Compare the record sets of two promoted dataset versions")]
#[command(version)]
struct Args {
    /// Label of the baseline version, e.g. "2022/1:2025, Version 4"
    a: String,

    /// Label of the version to compare against the baseline
    b: String,

    /// Config file (TOML); defaults to the platform config directory
    #[arg(short, long, env = "ECOMAT_CONFIG")]
    config: Option<PathBuf>,

    /// Data folder holding the database
    #[arg(short, long, env = "ECOMAT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Emit machine-readable JSON instead of the report
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = config::load_config(args.config.as_deref()).context("Failed to load config")?;
    let data_dir = config::resolve_data_dir(args.data_dir.as_deref(), &config);
    let db_path = config::database_path(&data_dir);

    let pool = connect_readonly(&db_path).await?;
    let store = VersionStore::new(pool);

    let a_records = load_version(&store, &args.a).await?;
    let b_records = load_version(&store, &args.b).await?;

    let diff = diff_versions(&args.a, &a_records, &args.b, &b_records);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
    } else {
        print_report(&diff);
    }
    Ok(())
}

/// Connect with mode=ro so this tool can run alongside the service
async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        bail!(
            "Database not found: {}\nRun ecomat-ingest first to create it.",
            db_path.display()
        );
    }

    let db_url = format!("sqlite://{}?mode=ro", db_path.display());
    SqlitePool::connect(&db_url)
        .await
        .context("Failed to connect to database in read-only mode")
}

async fn load_version(store: &VersionStore, label: &str) -> Result<Vec<Material>> {
    match store.get_by_label(label).await {
        Ok(records) => Ok(records),
        Err(ecomat_common::Error::NotFound(_)) => {
            let known = store.history().await.unwrap_or_default();
            let mut message = format!("Version '{}' is not in history.", label);
            if known.is_empty() {
                message.push_str(" No versions have been promoted yet.");
            } else {
                message.push_str("\nKnown versions:");
                for version in known {
                    message.push_str(&format!("\n  {}", version.label));
                }
            }
            bail!(message)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_report(diff: &VersionDiff) {
    println!("Comparing '{}' -> '{}'", diff.a_label, diff.b_label);
    println!(
        "{} added, {} removed, {} changed, {} unchanged",
        diff.added.len(),
        diff.removed.len(),
        diff.changed.len(),
        diff.unchanged
    );

    if !diff.has_changes() {
        println!("\nNo differences.");
        return;
    }

    if !diff.added.is_empty() {
        println!("\nAdded:");
        for entry in &diff.added {
            println!("  + {} ({})", entry.name, entry.uuid);
        }
    }

    if !diff.removed.is_empty() {
        println!("\nRemoved:");
        for entry in &diff.removed {
            println!("  - {} ({})", entry.name, entry.uuid);
        }
    }

    if !diff.changed.is_empty() {
        println!("\nChanged:");
        for change in &diff.changed {
            println!("  ~ {} ({})", change.name, change.uuid);
            for field in &change.fields {
                print_field_change(field);
            }
        }
    }
}

fn print_field_change(change: &FieldChange) {
    match change {
        FieldChange::Numeric {
            field,
            old,
            new,
            absolute_delta,
            percent_delta,
        } => {
            let old = old.map_or_else(|| "-".to_string(), |v| v.to_string());
            let new = new.map_or_else(|| "-".to_string(), |v| v.to_string());
            match (absolute_delta, percent_delta) {
                (Some(abs), Some(pct)) => {
                    println!("      {}: {} -> {} ({:+} / {:+.1}%)", field, old, new, abs, pct)
                }
                (Some(abs), None) => println!("      {}: {} -> {} ({:+})", field, old, new, abs),
                _ => println!("      {}: {} -> {}", field, old, new),
            }
        }
        FieldChange::Text { field, old, new } => {
            println!(
                "      {}: '{}' -> '{}'",
                field,
                old.as_deref().unwrap_or("-"),
                new.as_deref().unwrap_or("-")
            );
        }
    }
}
