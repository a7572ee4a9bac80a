//! rom CLI
//!
//! Catalog maintenance for the Rise of Machine AI tool directory.
//! Results go to stdout as JSON, progress goes to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rom_catalog::bookmarks::{run_bookmark, BookmarkArgs};
use rom_catalog::catalog::{DataPaths, DEFAULT_DATA_DIR};
use rom_catalog::enrich::{run_update_metadata, UpdateMetadataArgs};
use rom_catalog::listing::{run_list, ListArgs};
use rom_catalog::slug::{run_add_slugs, AddSlugsArgs};
use rom_catalog::slug_map::{run_slug_map, SlugMapArgs};
use rom_catalog::split::{run_merge_data, run_split_data, MergeDataArgs, SplitDataArgs};
use rom_catalog::validate::{run_check_data, CheckDataArgs};

#[derive(Parser)]
#[command(name = "rom")]
#[command(version)]
#[command(about = "Catalog tooling for the Rise of Machine AI tool directory")]
#[command(long_about = "Maintains the tool catalog: slugs, validation, split files, metadata enrichment.\n\nCommands:\n  add-slugs        Assign URL slugs to tools\n  check-data       Validate catalog integrity\n  split-data       Write one file per category\n  merge-data       Rebuild the catalog from category files\n  slug-map         Audit slug -> category mapping\n  update-metadata  Fetch page metadata and favicons\n  list             Filter, search and sort tools\n  bookmark         Manage saved tools")]
struct Cli {
    /// Data directory holding tools.json and friends
    #[arg(long, global = true, env = "ROM_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign URL slugs to tools that lack one
    AddSlugs(AddSlugsArgs),
    /// Validate URLs, referral tags, duplicates and split files
    CheckData(CheckDataArgs),
    /// Write one JSON file per category
    SplitData(SplitDataArgs),
    /// Rebuild tools.json from per-category files
    MergeData(MergeDataArgs),
    /// Generate slug-map.json and report duplicate slugs
    SlugMap(SlugMapArgs),
    /// Fetch titles, descriptions, social links and favicons
    UpdateMetadata(UpdateMetadataArgs),
    /// List tools with category filter, search and sort
    List(ListArgs),
    /// Add, remove, toggle or list bookmarks
    Bookmark(BookmarkArgs),
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let paths = DataPaths::new(cli.data_dir);

    match cli.command {
        Commands::AddSlugs(args) => run_add_slugs(args, &paths).await,
        Commands::CheckData(args) => run_check_data(args, &paths).await,
        Commands::SplitData(args) => run_split_data(args, &paths).await,
        Commands::MergeData(args) => run_merge_data(args, &paths).await,
        Commands::SlugMap(args) => run_slug_map(args, &paths).await,
        Commands::UpdateMetadata(args) => run_update_metadata(args, &paths).await,
        Commands::List(args) => run_list(args, &paths).await,
        Commands::Bookmark(args) => run_bookmark(args, &paths).await,
    }
}
