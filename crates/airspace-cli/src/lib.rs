//! Airspace CLI - operator tools for split configurations.
//!
//! Subcommands of the `airspace` binary:
//! - populate: attach sector outlines from disk to stored areas
//! - split-geojson: break a boundary file into one file per id
//! - create-split: store a split described in a JSON file
//! - combine: run the boundary pipeline offline

pub mod cli;
pub mod combine;
pub mod populate;
pub mod split_file;

pub use cli::{run, Cli, Command};
pub use combine::{combine_records, load_records};
pub use populate::{populate_areas, PopulateReport, SectorTags};
pub use split_file::{split_feature_collection, write_split_files};
