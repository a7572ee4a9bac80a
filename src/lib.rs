//! rom-catalog: Data tooling for the Rise of Machine AI tool catalog
//!
//! Commands:
//! - add-slugs: Assign URL slugs to tools
//! - check-data: Validate catalog integrity
//! - split-data / merge-data: Per-category files <-> single catalog
//! - slug-map: Audit slug -> category mapping
//! - update-metadata: Enrich tools with page metadata and favicons
//! - list: Filter, search, sort and page through tools
//! - bookmark: Saved tools

pub mod bookmarks;
pub mod catalog;
pub mod enrich;
pub mod listing;
pub mod schema;
pub mod search;
pub mod slug;
pub mod slug_map;
pub mod split;
pub mod validate;

pub use bookmarks::{Bookmarks, JsonFileStore, KeyValueStore, MemoryStore};
pub use catalog::{CatalogError, DataPaths};
pub use enrich::{enrich, EnrichConfig, EnrichOutcome, EnrichReport};
pub use listing::{list_tools, ListQuery, ListedTool, Paginator, SortMode, ViewState};
pub use schema::{Category, MetadataEntry, MetadataMap, SlugMap, Tool, ToolsFile};
pub use slug::{assign_slugs, slugify};
pub use validate::{validate_catalog, ValidateConfig, ValidationReport};
