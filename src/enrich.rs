//! update-metadata command: Enrich tools with homepage metadata and favicons
//!
//! Tools are processed in fixed-size batches. Every request in a batch runs
//! concurrently with its own timeout; the next batch starts only once the
//! whole batch has settled. A failed fetch means "no metadata" for that tool
//! and never aborts the run. There are no retries.

use crate::catalog::{load_catalog, load_metadata_or_default, save_json, DataPaths};
use crate::schema::{MetadataEntry, MetadataMap, Tool, ToolsFile};
use anyhow::{Context, Result};
use clap::builder::TypedValueParser;
use clap::Args;
use futures::future::join_all;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const BATCH_SIZE: usize = 25;
pub const TIMEOUT_MS: u64 = 6000;
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons";
pub const FAVICON_SIZE: &str = "64";
pub const DEFAULT_FAVICON_DIR: &str = "public/favicons";
const PROGRESS_EVERY: usize = 50;

/// Path segments on twitter.com / x.com that are not accounts
const TWITTER_RESERVED: &[&str] = &[
    "intent", "share", "home", "i", "search", "hashtag", "explore", "login", "signup", "settings",
];

/// Path segments on github.com that are not owners
const GITHUB_RESERVED: &[&str] = &[
    "about",
    "features",
    "pricing",
    "login",
    "join",
    "marketplace",
    "sponsors",
    "topics",
    "collections",
    "enterprise",
    "site",
    "orgs",
    "settings",
];

#[derive(Args)]
pub struct UpdateMetadataArgs {
    /// Tools fetched concurrently per batch
    #[arg(long, default_value_t = BATCH_SIZE, value_parser = clap::value_parser!(u16).range(1..=500).map(usize::from))]
    pub batch_size: usize,

    /// Timeout per request in milliseconds
    #[arg(long, default_value_t = TIMEOUT_MS)]
    pub timeout: u64,

    /// User-Agent header sent with every request
    #[arg(long, default_value = USER_AGENT)]
    pub user_agent: String,

    /// Directory for <slug>.png favicons
    #[arg(long, default_value = DEFAULT_FAVICON_DIR)]
    pub favicon_dir: PathBuf,

    /// Favicon-by-domain service base URL
    #[arg(long, env = "ROM_FAVICON_SERVICE", default_value = FAVICON_SERVICE)]
    pub favicon_service: String,

    /// Skip favicon downloads
    #[arg(long)]
    pub no_favicons: bool,

    /// Ignore the existing cache and fetch every tool
    #[arg(long)]
    pub refresh: bool,

    /// Output file (default: <data-dir>/metadata.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Compute everything but don't write metadata.json
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub batch_size: usize,
    pub timeout_ms: u64,
    pub user_agent: String,
    /// `None` disables favicon downloads
    pub favicon_dir: Option<PathBuf>,
    pub favicon_service: String,
    /// Fetch even when the cache has a usable entry
    pub refresh: bool,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            timeout_ms: TIMEOUT_MS,
            user_agent: USER_AGENT.to_string(),
            favicon_dir: None,
            favicon_service: FAVICON_SERVICE.to_string(),
            refresh: false,
        }
    }
}

/// Run summary (compact)
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct EnrichReport {
    pub total: usize,
    pub reused: usize,
    pub fetched: usize,
    pub failed: usize,
    pub pruned: usize,
    pub favicons: usize,
}

#[derive(Debug)]
pub struct EnrichOutcome {
    pub metadata: MetadataMap,
    pub report: EnrichReport,
}

/// How a single tool was resolved
#[derive(Debug)]
enum Resolution {
    Reused(MetadataEntry),
    Fetched(MetadataEntry),
    Failed,
}

struct ToolResult {
    slug: String,
    resolution: Resolution,
    favicon_downloaded: bool,
}

pub async fn run_update_metadata(args: UpdateMetadataArgs, paths: &DataPaths) -> Result<()> {
    info!("Reading {}...", paths.catalog().display());
    let catalog = load_catalog(&paths.catalog()).await?;
    let output = args.output.unwrap_or_else(|| paths.metadata());
    let previous = load_metadata_or_default(&output).await;

    let config = EnrichConfig {
        batch_size: args.batch_size,
        timeout_ms: args.timeout,
        user_agent: args.user_agent,
        favicon_dir: (!args.no_favicons).then_some(args.favicon_dir),
        favicon_service: args.favicon_service,
        refresh: args.refresh,
    };

    let outcome = enrich(&catalog, &previous, &config).await?;

    info!(
        "Pruned {} stale keys. Metadata for {} tools.",
        outcome.report.pruned,
        outcome.metadata.len()
    );

    if args.dry_run {
        info!("Dry run - {} not modified", output.display());
    } else {
        save_json(&output, &outcome.metadata).await?;
        info!("Saved to {}", output.display());
    }

    println!("{}", serde_json::to_string(&outcome.report)?);

    Ok(())
}

/// Tools eligible for enrichment: those with both a slug and a URL
pub fn worklist(catalog: &ToolsFile) -> Vec<&Tool> {
    catalog
        .iter_tools()
        .map(|(_, tool)| tool)
        .filter(|tool| tool.slug().is_some() && tool.url().is_some())
        .collect()
}

/// Build a fresh metadata map for the catalog, reusing `previous` where possible
pub async fn enrich(
    catalog: &ToolsFile,
    previous: &MetadataMap,
    config: &EnrichConfig,
) -> Result<EnrichOutcome> {
    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .context("Failed to build HTTP client")?;

    if let Some(dir) = &config.favicon_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let tools = worklist(catalog);
    let live: HashSet<&str> = tools.iter().filter_map(|t| t.slug()).collect();

    let mut report = EnrichReport {
        total: tools.len(),
        pruned: previous.keys().filter(|k| !live.contains(k.as_str())).count(),
        ..Default::default()
    };
    let mut metadata = MetadataMap::new();

    info!(
        "Found {} tools. Starting metadata fetch (batch size: {})...",
        tools.len(),
        config.batch_size
    );

    let mut completed = 0;
    for batch in tools.chunks(config.batch_size.max(1)) {
        let results = join_all(
            batch
                .iter()
                .map(|tool| process_tool(&client, tool, previous, config)),
        )
        .await;

        for result in results {
            completed += 1;
            if completed % PROGRESS_EVERY == 0 {
                info!("Progress: {}/{}", completed, tools.len());
            }
            if result.favicon_downloaded {
                report.favicons += 1;
            }
            match result.resolution {
                Resolution::Reused(entry) => {
                    report.reused += 1;
                    metadata.insert(result.slug, entry);
                }
                Resolution::Fetched(entry) => {
                    report.fetched += 1;
                    metadata.insert(result.slug, entry);
                }
                Resolution::Failed => report.failed += 1,
            }
        }
    }

    Ok(EnrichOutcome { metadata, report })
}

async fn process_tool(
    client: &Client,
    tool: &Tool,
    previous: &MetadataMap,
    config: &EnrichConfig,
) -> ToolResult {
    // worklist() guarantees both
    let slug = tool.slug().unwrap_or_default().to_string();
    let url = tool.url().unwrap_or_default();

    let cached = previous
        .get(&slug)
        .filter(|entry| !config.refresh && entry.has_title());

    let metadata = async {
        match cached {
            Some(entry) => Resolution::Reused(entry.clone()),
            None => match fetch_metadata(client, url, &slug, config.timeout_ms).await {
                Some(entry) => Resolution::Fetched(entry),
                None => Resolution::Failed,
            },
        }
    };

    let favicon = async {
        match &config.favicon_dir {
            Some(dir) => fetch_favicon(client, url, &slug, dir, config).await,
            None => false,
        }
    };

    let (resolution, favicon_downloaded) = tokio::join!(metadata, favicon);

    ToolResult {
        slug,
        resolution,
        favicon_downloaded,
    }
}

/// Fetch a page and extract its metadata. Any failure yields `None`.
pub async fn fetch_metadata(
    client: &Client,
    url: &str,
    slug: &str,
    timeout_ms: u64,
) -> Option<MetadataEntry> {
    let response = match client
        .get(url)
        .timeout(Duration::from_millis(timeout_ms))
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            debug!("  -> {} failed: {}", truncate(url, 60), e);
            return None;
        }
    };

    if !response.status().is_success() {
        debug!("  -> {} returned {}", truncate(url, 60), response.status());
        return None;
    }

    if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
        let content_type = content_type.to_str().unwrap_or_default().to_lowercase();
        if !content_type.contains("text/html") {
            debug!("  -> {} is {}, skipping", truncate(url, 60), content_type);
            return None;
        }
    }

    let base = response.url().clone();
    let html = match response.text().await {
        Ok(html) => html,
        Err(e) => {
            debug!("  -> {} body failed: {}", truncate(url, 60), e);
            return None;
        }
    };

    parse_metadata(&html, &base, slug)
}

/// Download `<service>?domain=<host>&sz=64` into `<dir>/<slug>.png` unless it
/// is already there. Returns true when a new file was written.
pub async fn fetch_favicon(
    client: &Client,
    url: &str,
    slug: &str,
    dir: &Path,
    config: &EnrichConfig,
) -> bool {
    let path = dir.join(format!("{}.png", slug));
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return false;
    }

    let Some(host) = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
    else {
        return false;
    };

    let Ok(service) = Url::parse_with_params(
        &config.favicon_service,
        &[("domain", host.as_str()), ("sz", FAVICON_SIZE)],
    ) else {
        debug!("Invalid favicon service URL: {}", config.favicon_service);
        return false;
    };

    let response = match client
        .get(service)
        .timeout(Duration::from_millis(config.timeout_ms))
        .send()
        .await
    {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            debug!("Favicon for {} returned {}", slug, r.status());
            return false;
        }
        Err(e) => {
            debug!("Favicon for {} failed: {}", slug, e);
            return false;
        }
    };

    let bytes = match response.bytes().await {
        Ok(b) if !b.is_empty() => b,
        _ => return false,
    };

    match tokio::fs::write(&path, &bytes).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Failed to write {}: {}", path.display(), e);
            false
        }
    }
}

/// Extract metadata from an HTML document. `None` when the page has neither
/// a title nor a description.
pub fn parse_metadata(html: &str, base: &Url, slug: &str) -> Option<MetadataEntry> {
    let doc = Html::parse_document(html);

    let title = select_text(&doc, "title")
        .or_else(|| select_attr(&doc, "meta[property='og:title']", "content"));

    let description = select_attr(&doc, "meta[name='description']", "content")
        .or_else(|| select_attr(&doc, "meta[property='og:description']", "content"));

    if title.is_none() && description.is_none() {
        return None;
    }

    let og_image = select_attr(
        &doc,
        "meta[property='og:image'], meta[name='og:image']",
        "content",
    )
    .and_then(|src| base.join(&src).ok())
    .map(String::from);

    Some(MetadataEntry {
        slug: slug.to_string(),
        title,
        description,
        og_image,
        twitter_handle: extract_twitter_handle(&doc, base),
        github_url: extract_github_url(&doc, base),
    })
}

fn extract_twitter_handle(doc: &Html, base: &Url) -> Option<String> {
    let from_meta = [
        "meta[name='twitter:site'], meta[property='twitter:site']",
        "meta[name='twitter:creator'], meta[property='twitter:creator']",
    ]
    .into_iter()
    .filter_map(|sel| select_attr(doc, sel, "content"))
    .find_map(|value| normalize_handle(&value));

    from_meta.or_else(|| {
        anchor_urls(doc, base).find_map(|link| {
            let host = link.host_str()?.trim_start_matches("www.").trim_start_matches("mobile.");
            if host != "twitter.com" && host != "x.com" {
                return None;
            }
            let first = link.path_segments()?.next()?;
            if TWITTER_RESERVED.contains(&first.to_lowercase().as_str()) {
                return None;
            }
            normalize_handle(first)
        })
    })
}

/// `@name`, `name`, or a profile URL -> `name`, if it is a valid handle
fn normalize_handle(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let candidate = match Url::parse(raw) {
        Ok(u) => u.path_segments()?.next()?.to_string(),
        Err(_) => raw.trim_start_matches('@').to_string(),
    };
    let valid = !candidate.is_empty()
        && candidate.len() <= 15
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(candidate)
}

fn extract_github_url(doc: &Html, base: &Url) -> Option<String> {
    anchor_urls(doc, base).find_map(|link| {
        let host = link.host_str()?.trim_start_matches("www.");
        if host != "github.com" {
            return None;
        }
        let segments: Vec<&str> = link
            .path_segments()?
            .filter(|s| !s.is_empty())
            .take(2)
            .collect();
        let owner = segments.first()?;
        if GITHUB_RESERVED.contains(&owner.to_lowercase().as_str()) {
            return None;
        }
        Some(format!("https://github.com/{}", segments.join("/")))
    })
}

/// Absolute URLs of every `<a href>` in document order
fn anchor_urls<'a>(doc: &'a Html, base: &'a Url) -> impl Iterator<Item = Url> + 'a {
    let selector = Selector::parse("a[href]").ok();
    selector
        .into_iter()
        .flat_map(move |sel| {
            doc.select(&sel)
                .filter_map(|el| el.value().attr("href"))
                .filter_map(|href| base.join(href.trim()).ok())
                .collect::<Vec<_>>()
        })
}

fn select_text(doc: &Html, sel: &str) -> Option<String> {
    let selector = Selector::parse(sel).ok()?;
    doc.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn select_attr(doc: &Html, sel: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(sel).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max - 3).collect();
        format!("{}...", cut)
    }
}
