//! list command: Browse the catalog the way the site does
//!
//! Search narrows the set first, then the category filter and sort apply,
//! then pagination reveals one page at a time.

use crate::bookmarks::{Bookmarks, JsonFileStore};
use crate::catalog::{load_catalog, DataPaths};
use crate::schema::{Tool, ToolsFile};
use crate::search;
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

pub const PAGE_SIZE: usize = 32;
/// Simulated latency before another page is revealed
pub const LOAD_DELAY: Duration = Duration::from_millis(300);
pub const ALL_CATEGORIES: &str = "all";

#[derive(Args)]
pub struct ListArgs {
    /// Category name, or "all"
    #[arg(short, long, default_value = ALL_CATEGORIES)]
    pub category: String,

    /// nameAsc, nameDesc, dateNewest, dateOldest or random
    #[arg(short, long, default_value = "nameAsc")]
    pub sort: String,

    /// Seed for random sort (default: current time)
    #[arg(long)]
    pub seed: Option<u32>,

    /// Fuzzy search query (at least 2 characters)
    #[arg(short = 'q', long)]
    pub search: Option<String>,

    /// Number of pages to reveal
    #[arg(long, default_value_t = 1)]
    pub pages: usize,

    /// Only list tools bookmarked in this store
    #[arg(long, value_name = "FILE")]
    pub bookmarks: Option<PathBuf>,
}

/// A tool together with the category it was listed under
#[derive(Debug, Clone, Copy)]
pub struct ListedTool<'a> {
    pub tool: &'a Tool,
    pub category: &'a str,
}

/// The tool's own keys plus `category`. The listed category replaces any
/// `category` key the tool carries.
impl Serialize for ListedTool<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut value = serde_json::to_value(self.tool).map_err(S::Error::custom)?;
        if let Value::Object(map) = &mut value {
            map.insert(
                "category".to_string(),
                Value::String(self.category.to_string()),
            );
        }
        value.serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortMode {
    #[default]
    NameAsc,
    NameDesc,
    DateNewest,
    DateOldest,
    Random,
}

impl SortMode {
    /// Accepts camelCase or kebab-case names; anything else is `NameAsc`
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "namedesc" => SortMode::NameDesc,
            "datenewest" => SortMode::DateNewest,
            "dateoldest" => SortMode::DateOldest,
            "random" => SortMode::Random,
            _ => SortMode::NameAsc,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// `None` or "all" lists every category
    pub category: Option<String>,
    pub sort: SortMode,
    pub seed: u32,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListOutput<'a> {
    pub total: usize,
    pub shown: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    pub tools: &'a [ListedTool<'a>],
}

pub async fn run_list(args: ListArgs, paths: &DataPaths) -> Result<()> {
    let catalog = load_catalog(&paths.catalog()).await?;

    let sort = SortMode::from_name(&args.sort);
    let seed = args
        .seed
        .unwrap_or_else(|| Utc::now().timestamp_millis() as u32);

    let query = ListQuery {
        category: Some(args.category),
        sort,
        seed,
        search: args.search,
    };

    let mut tools = list_tools(&catalog, &query);

    if let Some(path) = &args.bookmarks {
        let bookmarks = Bookmarks::new(JsonFileStore::open(path)?);
        tools.retain(|t| t.tool.slug().is_some_and(|s| bookmarks.contains(s)));
    }

    let mut paginator = Paginator::new(tools.len()).with_delay(Duration::ZERO);
    for _ in 1..args.pages.max(1) {
        if !paginator.load_more().await {
            break;
        }
    }

    let shown = paginator.page(&tools);
    let output = ListOutput {
        total: tools.len(),
        shown: shown.len(),
        seed: (sort == SortMode::Random).then_some(seed),
        tools: shown,
    };
    println!("{}", serde_json::to_string(&output)?);

    Ok(())
}

/// All tools in catalog order, optionally restricted to one category
pub fn flatten<'a>(catalog: &'a ToolsFile, category: Option<&str>) -> Vec<ListedTool<'a>> {
    let category = category.filter(|c| *c != ALL_CATEGORIES);
    catalog
        .tools
        .iter()
        .filter(|cat| category.map_or(true, |c| c == cat.category))
        .flat_map(|cat| {
            cat.content.iter().map(move |tool| ListedTool {
                tool,
                category: &cat.category,
            })
        })
        .collect()
}

/// Search, filter and sort the catalog
pub fn list_tools<'a>(catalog: &'a ToolsFile, query: &ListQuery) -> Vec<ListedTool<'a>> {
    let all = flatten(catalog, None);

    let mut tools: Vec<ListedTool<'a>> = match query.search.as_deref() {
        Some(q) if search::is_active(q) => {
            let hits = search::search(all, q);
            debug!("Search {:?} matched {} tools", q, hits.len());
            hits.into_iter().map(|hit| hit.tool).collect()
        }
        _ => all,
    };

    if let Some(category) = query.category.as_deref().filter(|c| *c != ALL_CATEGORIES) {
        tools.retain(|t| t.category == category);
    }

    sort_tools(&mut tools, query.sort, query.seed);
    tools
}

pub fn sort_tools(tools: &mut [ListedTool<'_>], mode: SortMode, seed: u32) {
    match mode {
        SortMode::NameAsc => tools.sort_by(|a, b| compare_titles(a.tool, b.tool)),
        SortMode::NameDesc => tools.sort_by(|a, b| compare_titles(b.tool, a.tool)),
        SortMode::DateNewest => {
            tools.sort_by_key(|t| std::cmp::Reverse(date_key(&t.tool.date_added)))
        }
        SortMode::DateOldest => tools.sort_by_key(|t| date_key(&t.tool.date_added)),
        SortMode::Random => seeded_shuffle(tools, seed),
    }
}

fn compare_titles(a: &Tool, b: &Tool) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.title.cmp(&b.title))
}

/// Milliseconds since the epoch; unparseable dates count as the epoch
pub fn date_key(date: &str) -> i64 {
    let date = date.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return dt.timestamp_millis();
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

/// Mulberry32 PRNG, bit-for-bit with the site's shuffle
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next value in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let a = self.state;
        let mut t = (a ^ (a >> 15)).wrapping_mul(1 | a);
        t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t)) ^ t;
        f64::from(t ^ (t >> 14)) / 4_294_967_296.0
    }
}

/// Fisher-Yates with Mulberry32; seed 0 behaves as 1
pub fn seeded_shuffle<T>(items: &mut [T], seed: u32) {
    let mut rng = Mulberry32::new(if seed == 0 { 1 } else { seed });
    for i in (1..items.len()).rev() {
        let j = (rng.next_f64() * (i + 1) as f64).floor() as usize;
        items.swap(i, j);
    }
}

/// Saved listing position, restored when navigating back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub filter: String,
    pub displayed_count: usize,
    pub scroll_y: f64,
}

/// Infinite-scroll pagination over a result list
#[derive(Debug, Clone)]
pub struct Paginator {
    total: usize,
    displayed: usize,
    page_size: usize,
    delay: Duration,
    loading: bool,
}

impl Paginator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            displayed: PAGE_SIZE.min(total),
            page_size: PAGE_SIZE,
            delay: LOAD_DELAY,
            loading: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self.displayed = self.page_size.min(self.total);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn displayed(&self) -> usize {
        self.displayed
    }

    pub fn has_more(&self) -> bool {
        self.displayed < self.total
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The visible prefix of `items`
    pub fn page<'s, T>(&self, items: &'s [T]) -> &'s [T] {
        &items[..self.displayed.min(items.len())]
    }

    /// New result set (filter changed): back to one page
    pub fn reset(&mut self, total: usize) {
        self.total = total;
        self.displayed = self.page_size.min(total);
        self.loading = false;
    }

    /// Sentinel became visible. Returns false if a load is already pending
    /// or nothing is left to show.
    pub fn begin_load(&mut self) -> bool {
        if self.loading || !self.has_more() {
            return false;
        }
        self.loading = true;
        true
    }

    pub fn finish_load(&mut self) {
        if self.loading {
            self.displayed = (self.displayed + self.page_size).min(self.total);
            self.loading = false;
        }
    }

    /// Reveal one more page after the simulated delay
    pub async fn load_more(&mut self) -> bool {
        if !self.begin_load() {
            return false;
        }
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.finish_load();
        true
    }

    pub fn save(&self, filter: &str, scroll_y: f64) -> ViewState {
        ViewState {
            filter: filter.to_string(),
            displayed_count: self.displayed,
            scroll_y,
        }
    }

    /// Apply a saved state for the same filter. Only ever grows the visible
    /// count. Returns the scroll offset to restore.
    pub fn restore(&mut self, saved: &ViewState, filter: &str) -> Option<f64> {
        if saved.filter != filter {
            return None;
        }
        if saved.displayed_count > self.displayed {
            self.displayed = saved.displayed_count.min(self.total);
        }
        Some(saved.scroll_y)
    }
}
