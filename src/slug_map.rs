//! slug-map command: Audit slug -> category mapping

use crate::catalog::{load_catalog, save_json, DataPaths};
use crate::schema::{SlugMap, ToolsFile};
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Args)]
pub struct SlugMapArgs {
    /// Output file (default: <data-dir>/slug-map.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// A slug used by more than one tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateSlug {
    pub slug: String,
    pub categories: Vec<String>,
    pub occurrences: usize,
}

#[derive(Debug, Serialize)]
pub struct SlugMapOutput {
    pub file: String,
    pub total_slugs: usize,
    pub unique_slugs: usize,
    pub duplicates: Vec<DuplicateSlug>,
}

pub async fn run_slug_map(args: SlugMapArgs, paths: &DataPaths) -> Result<()> {
    let catalog = load_catalog(&paths.catalog()).await?;
    let output = args.output.unwrap_or_else(|| paths.slug_map());

    let map = build_slug_map(&catalog);
    let duplicates = find_duplicate_slugs(&catalog, &map);

    save_json(&output, &map).await?;

    let total_slugs = catalog.iter_tools().filter(|(_, t)| t.slug().is_some()).count();
    info!("Generated slug map with {} entries", total_slugs);
    if duplicates.is_empty() {
        info!("No duplicate slugs found");
    } else {
        warn!("Found {} duplicate slugs:", duplicates.len());
        for dup in &duplicates {
            warn!(
                "  - {} ({}x): {}",
                dup.slug,
                dup.occurrences,
                dup.categories.join(", ")
            );
        }
    }

    let summary = SlugMapOutput {
        file: output.display().to_string(),
        total_slugs,
        unique_slugs: map.len(),
        duplicates,
    };
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}

/// slug -> categories, each category listed once in first-seen order
pub fn build_slug_map(catalog: &ToolsFile) -> SlugMap {
    let mut map = SlugMap::new();
    for (category, tool) in catalog.iter_tools() {
        let Some(slug) = tool.slug() else {
            continue;
        };
        let categories = map.entry(slug.to_string()).or_default();
        if !categories.contains(&category.category) {
            categories.push(category.category.clone());
        }
    }
    map
}

/// Slugs appearing more than once, whether across or within categories
pub fn find_duplicate_slugs(catalog: &ToolsFile, map: &SlugMap) -> Vec<DuplicateSlug> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, tool) in catalog.iter_tools() {
        if let Some(slug) = tool.slug() {
            *counts.entry(slug).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(slug, occurrences)| DuplicateSlug {
            slug: slug.to_string(),
            categories: map.get(slug).cloned().unwrap_or_default(),
            occurrences,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ToolsFile {
        serde_json::from_value(json!({
            "tools": [
                { "category": "Writing", "content": [
                    { "title": "Quill", "slug": "quill" },
                    { "title": "Echo", "slug": "echo" },
                    { "title": "Unslugged" }
                ]},
                { "category": "Audio", "content": [
                    { "title": "Echo", "slug": "echo" }
                ]},
                { "category": "Video", "content": [
                    { "title": "Reel", "slug": "reel" },
                    { "title": "Reel", "slug": "reel" }
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_build_slug_map() {
        let map = build_slug_map(&sample());
        assert_eq!(map.len(), 3);
        assert_eq!(map["echo"], ["Writing", "Audio"]);
        assert_eq!(map["reel"], ["Video"]);
        assert!(!map.contains_key(""));
    }

    #[test]
    fn test_find_duplicates_across_and_within() {
        let catalog = sample();
        let map = build_slug_map(&catalog);
        let dups = find_duplicate_slugs(&catalog, &map);
        assert_eq!(dups.len(), 2);
        assert_eq!(dups[0].slug, "echo");
        assert_eq!(dups[0].categories, ["Writing", "Audio"]);
        assert_eq!(dups[1].slug, "reel");
        assert_eq!(dups[1].occurrences, 2);
    }

    #[test]
    fn test_slug_map_json_shape() {
        let map = build_slug_map(&sample());
        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(value["quill"], json!(["Writing"]));
    }
}
