//! bookmark command: Saved tools
//!
//! Bookmarks are a list of slugs kept under one key of a key-value store.
//! They are loaded once on construction and written through on every change.

use crate::catalog::{load_catalog, DataPaths};
use crate::listing::ListedTool;
use crate::schema::ToolsFile;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const STORAGE_KEY: &str = "rom_bookmarks";
pub const DEFAULT_STORE: &str = "bookmarks.json";

#[derive(Args)]
pub struct BookmarkArgs {
    #[command(subcommand)]
    pub action: BookmarkAction,

    /// Bookmark store file
    #[arg(long, global = true, env = "ROM_BOOKMARKS", default_value = DEFAULT_STORE)]
    pub store: PathBuf,
}

#[derive(Subcommand)]
pub enum BookmarkAction {
    /// Bookmark a tool
    Add { slug: String },
    /// Remove a bookmark
    Remove { slug: String },
    /// Flip the bookmark state of a tool
    Toggle { slug: String },
    /// List bookmarked tools
    List,
}

#[derive(Debug, Serialize)]
pub struct BookmarkOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmarked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ListedTool<'a>>>,
}

/// Minimal string key-value storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
}

/// In-process store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// A JSON object on disk; every `set` rewrites the file
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if the file does not exist
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        let json = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

type Listener = Box<dyn Fn(&[String]) + Send>;

pub struct Bookmarks<S: KeyValueStore> {
    store: S,
    slugs: Vec<String>,
    listeners: Vec<Listener>,
}

impl<S: KeyValueStore> Bookmarks<S> {
    /// Load bookmarks from `store`; unreadable data counts as none
    pub fn new(store: S) -> Self {
        let slugs = store
            .get(STORAGE_KEY)
            .and_then(|raw| match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(slugs) => Some(slugs),
                Err(e) => {
                    warn!("Failed to read bookmarks: {}", e);
                    None
                }
            })
            .unwrap_or_default();
        Self {
            store,
            slugs,
            listeners: Vec::new(),
        }
    }

    /// Called with the full slug list after every change
    pub fn on_change(&mut self, listener: impl Fn(&[String]) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn slugs(&self) -> &[String] {
        &self.slugs
    }

    pub fn count(&self) -> usize {
        self.slugs.len()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.slugs.iter().any(|s| s == slug)
    }

    /// Returns true if the slug was newly added
    pub fn add(&mut self, slug: &str) -> Result<bool> {
        if slug.is_empty() || self.contains(slug) {
            return Ok(false);
        }
        self.slugs.push(slug.to_string());
        self.save()?;
        Ok(true)
    }

    /// Returns true if the slug was present
    pub fn remove(&mut self, slug: &str) -> Result<bool> {
        let Some(index) = self.slugs.iter().position(|s| s == slug) else {
            return Ok(false);
        };
        self.slugs.remove(index);
        self.save()?;
        Ok(true)
    }

    /// Returns the new state (true = bookmarked)
    pub fn toggle(&mut self, slug: &str) -> Result<bool> {
        if self.contains(slug) {
            self.remove(slug)?;
            Ok(false)
        } else {
            self.add(slug)
        }
    }

    /// Bookmarked tools with their category, in catalog order
    pub fn bookmarked_tools<'a>(&self, catalog: &'a ToolsFile) -> Vec<ListedTool<'a>> {
        catalog
            .iter_tools()
            .filter(|(_, tool)| tool.slug().is_some_and(|s| self.contains(s)))
            .map(|(cat, tool)| ListedTool {
                tool,
                category: &cat.category,
            })
            .collect()
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn save(&mut self) -> Result<()> {
        let json = serde_json::to_string(&self.slugs)?;
        self.store.set(STORAGE_KEY, json)?;
        for listener in &self.listeners {
            listener(&self.slugs);
        }
        Ok(())
    }
}

pub async fn run_bookmark(args: BookmarkArgs, paths: &DataPaths) -> Result<()> {
    let mut bookmarks = Bookmarks::new(JsonFileStore::open(&args.store)?);

    let (slug, bookmarked, changed) = match &args.action {
        BookmarkAction::Add { slug } => {
            let changed = bookmarks.add(slug)?;
            (Some(slug.as_str()), Some(bookmarks.contains(slug)), Some(changed))
        }
        BookmarkAction::Remove { slug } => {
            let changed = bookmarks.remove(slug)?;
            (Some(slug.as_str()), Some(false), Some(changed))
        }
        BookmarkAction::Toggle { slug } => {
            let before = bookmarks.count();
            let state = bookmarks.toggle(slug)?;
            (Some(slug.as_str()), Some(state), Some(bookmarks.count() != before))
        }
        BookmarkAction::List => (None, None, None),
    };

    let catalog;
    let tools = if matches!(args.action, BookmarkAction::List) {
        catalog = load_catalog(&paths.catalog()).await?;
        Some(bookmarks.bookmarked_tools(&catalog))
    } else {
        None
    };

    let output = BookmarkOutput {
        slug,
        bookmarked,
        changed,
        count: bookmarks.count(),
        tools,
    };
    println!("{}", serde_json::to_string(&output)?);

    Ok(())
}
