//! Argument parsing and dispatch for the `airspace` binary.

use airspace_core::{ExportFormat, NewSplit, PipelineConfig};
use airspace_server::persistence::{self, areas, splits};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::combine::{combine_records, load_records};
use crate::populate::{populate_areas, SectorTags};
use crate::split_file::write_split_files;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store sector outlines from `<dir>/<tag>/<id>.geojson` on each area
    Populate {
        /// SQLite database path
        #[arg(long, default_value = "data/airspace.db")]
        db: String,

        /// Directory holding `high/` and `low/` outline folders
        #[arg(long, default_value = "static/data/sectors")]
        dir: PathBuf,

        /// Comma-separated high sector ids
        #[arg(long, value_delimiter = ',')]
        high: Vec<String>,

        /// Comma-separated low sector ids
        #[arg(long, value_delimiter = ',')]
        low: Vec<String>,
    },

    /// Split a FeatureCollection into one file per feature id
    SplitGeojson {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },

    /// Create a split from a JSON description
    CreateSplit {
        #[arg(long, default_value = "data/airspace.db")]
        db: String,

        /// `{ "name": ..., "groups": [{ "name", "color", "areas": [ids] }] }`
        #[arg(long)]
        file: PathBuf,
    },

    /// Run the boundary pipeline over a JSON array of area records
    Combine {
        #[arg(long)]
        input: PathBuf,

        /// Export dialect (`crc`); prints the viewer map when omitted
        #[arg(long)]
        export: Option<ExportFormat>,

        /// Split name used in export metadata
        #[arg(long, default_value = "Split")]
        name: String,

        /// Comma-separated tags to export; all when omitted
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// JSON file overriding pipeline tolerances
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Populate { db, dir, high, low } => {
            let database = persistence::init_database(&db, 1).await?;
            let report = populate_areas(database.pool(), &dir, &SectorTags { high, low }).await?;

            println!("Updated {} areas", report.updated.len());
            if !report.untagged.is_empty() {
                println!("Untagged: {}", report.untagged.join(", "));
            }
            for (id, err) in &report.failed {
                eprintln!("Failed {}: {}", id, err);
            }
        }
        Command::SplitGeojson { input, out } => {
            for path in write_split_files(&input, &out)? {
                println!("Created {}", path.display());
            }
        }
        Command::CreateSplit { db, file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let split: NewSplit = serde_json::from_str(&raw)?;
            anyhow::ensure!(!split.groups.is_empty(), "At least one group is required");

            let database = persistence::init_database(&db, 1).await?;
            let requested: Vec<String> = split
                .groups
                .iter()
                .flat_map(|group| group.areas.iter().cloned())
                .collect();
            let missing = areas::missing_area_ids(database.pool(), &requested).await?;
            anyhow::ensure!(missing.is_empty(), "Unknown areas: {}", missing.join(", "));

            let id = splits::create_split(database.pool(), &split).await?;
            println!("Created split '{}' ({})", split.name, id);
        }
        Command::Combine {
            input,
            export,
            name,
            tags,
            config,
        } => {
            let pipeline = match config {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    serde_json::from_str(&raw)?
                }
                None => PipelineConfig::default(),
            };
            let polygons = load_records(&input)?;
            let rendered = combine_records(polygons, &pipeline, export, &name, &tags)?;
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
    }
    Ok(())
}
