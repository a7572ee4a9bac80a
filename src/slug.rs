//! add-slugs command: Assign URL-safe slugs to tools
//!
//! Slugs are derived from titles and made unique across the whole catalog by
//! appending `-2`, `-3`, ... on collision. Existing slugs are never touched.

use crate::catalog::{load_catalog, save_catalog, DataPaths};
use crate::schema::ToolsFile;
use anyhow::Result;
use clap::Args;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::info;

/// Base used when a title has no slug-able characters
const FALLBACK_SLUG: &str = "tool";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());
static MULTI_DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"--+").unwrap());

#[derive(Args)]
pub struct AddSlugsArgs {
    /// Also sort each category's tools by title
    #[arg(long)]
    pub sort: bool,

    /// Report changes without writing tools.json
    #[arg(long)]
    pub dry_run: bool,
}

/// A slug generated during this run
#[derive(Debug, Clone, Serialize)]
pub struct AssignedSlug {
    pub title: String,
    pub category: String,
    pub slug: String,
    /// Base slug was taken and a numeric suffix was appended
    pub collision: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct SlugReport {
    pub total: usize,
    pub assigned: Vec<AssignedSlug>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sorted_categories: Vec<String>,
}

impl SlugReport {
    pub fn modified(&self) -> bool {
        !self.assigned.is_empty() || !self.sorted_categories.is_empty()
    }
}

pub async fn run_add_slugs(args: AddSlugsArgs, paths: &DataPaths) -> Result<()> {
    let path = paths.catalog();
    let mut catalog = load_catalog(&path).await?;

    let mut report = assign_slugs(&mut catalog);
    if args.sort {
        report.sorted_categories = sort_by_title(&mut catalog);
    }

    for assigned in &report.assigned {
        if assigned.collision {
            info!(
                "Generated unique slug for {}: {} (collision resolved)",
                assigned.title, assigned.slug
            );
        } else {
            info!("Generated slug for {}: {}", assigned.title, assigned.slug);
        }
    }
    for category in &report.sorted_categories {
        info!("Sorted tools in category: {}", category);
    }

    if report.modified() && !args.dry_run {
        save_catalog(&path, &catalog).await?;
        info!("Updated {}", path.display());
    } else if report.modified() {
        info!("Dry run - {} not modified", path.display());
    } else {
        info!("{} already up to date", path.display());
    }

    println!("{}", serde_json::to_string(&report)?);

    Ok(())
}

/// Convert a title into a URL-safe slug
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    let dashed = WHITESPACE.replace_all(lower.trim(), "-");
    let stripped = NON_WORD.replace_all(&dashed, "");
    let collapsed = MULTI_DASH.replace_all(&stripped, "-");
    collapsed.trim_matches('-').to_string()
}

/// First of `base`, `base-2`, `base-3`, ... not already in `used`
pub fn unique_slug(base: &str, used: &HashSet<String>) -> String {
    if !used.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Give every tool without a slug a unique one
pub fn assign_slugs(catalog: &mut ToolsFile) -> SlugReport {
    let mut used: HashSet<String> = catalog
        .iter_tools()
        .filter_map(|(_, tool)| tool.slug().map(String::from))
        .collect();

    let mut report = SlugReport {
        total: catalog.tool_count(),
        ..Default::default()
    };

    for category in &mut catalog.tools {
        for tool in &mut category.content {
            if tool.slug().is_some() {
                continue;
            }

            let mut base = slugify(&tool.title);
            if base.is_empty() {
                base = FALLBACK_SLUG.to_string();
            }
            let slug = unique_slug(&base, &used);

            used.insert(slug.clone());
            report.assigned.push(AssignedSlug {
                title: tool.title.clone(),
                category: category.category.clone(),
                collision: slug != base,
                slug: slug.clone(),
            });
            tool.slug = Some(slug);
        }
    }

    report
}

/// Sort each category by title, returning the categories whose order changed
pub fn sort_by_title(catalog: &mut ToolsFile) -> Vec<String> {
    let mut changed = Vec::new();

    for category in &mut catalog.tools {
        let before: Vec<String> = category.content.iter().map(|t| t.title.clone()).collect();
        category.content.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title))
        });
        let reordered = category
            .content
            .iter()
            .map(|t| &t.title)
            .ne(before.iter());
        if reordered {
            changed.push(category.category.clone());
        }
    }

    changed
}
