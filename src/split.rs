//! split-data / merge-data commands: Per-category catalog files
//!
//! `tools.json` is split into `tools/<category>.json`, one JSON array of tools
//! per category. Merging reverses it; content and order survive the trip.

use crate::catalog::{load_catalog, load_json, save_catalog, save_json, DataPaths};
use crate::schema::{Category, Tool, ToolsFile};
use anyhow::{bail, Context, Result};
use clap::Args;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::info;

/// Whitespace and characters that are not safe in a file name
static UNSAFE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\s/\\:*?"<>|\x00-\x1f]+"#).unwrap());

#[derive(Args)]
pub struct SplitDataArgs {
    /// Output directory (default: <data-dir>/tools)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct MergeDataArgs {
    /// Directory of split files (default: <data-dir>/tools)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output file (default: <data-dir>/tools.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// One category's tools, named by its file stem
#[derive(Debug, Clone, PartialEq)]
pub struct SplitFile {
    pub stem: String,
    pub tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
pub struct SplitOutput {
    pub dir: String,
    pub categories: usize,
    pub tools: usize,
}

pub async fn run_split_data(args: SplitDataArgs, paths: &DataPaths) -> Result<()> {
    let catalog = load_catalog(&paths.catalog()).await?;
    let output = args.output.unwrap_or_else(|| paths.split_dir());

    let files = split_catalog(&catalog)?;

    if !output.exists() {
        tokio::fs::create_dir_all(&output)
            .await
            .with_context(|| format!("Failed to create {}", output.display()))?;
        info!("Created directory: {}", output.display());
    }

    let mut tool_count = 0;
    for (category, file) in catalog.tools.iter().zip(&files) {
        save_json(&output.join(format!("{}.json", file.stem)), &file.tools).await?;
        tool_count += file.tools.len();
        info!(
            "Processed \"{}\" -> {}.json ({} tools)",
            category.category,
            file.stem,
            file.tools.len()
        );
    }

    info!(
        "Split {} tools into {} category files",
        tool_count,
        files.len()
    );

    let summary = SplitOutput {
        dir: output.display().to_string(),
        categories: files.len(),
        tools: tool_count,
    };
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}

pub async fn run_merge_data(args: MergeDataArgs, paths: &DataPaths) -> Result<()> {
    let input = args.input.unwrap_or_else(|| paths.split_dir());
    let output = args.output.unwrap_or_else(|| paths.catalog());

    let files = read_split_dir(&input).await?;
    if files.is_empty() {
        bail!("No split files found in {}", input.display());
    }

    // The current catalog supplies display names and ordering
    let template = if output.exists() {
        Some(load_catalog(&output).await?)
    } else {
        None
    };

    let merged = merge_split(files, template.as_ref());
    save_catalog(&output, &merged).await?;

    info!(
        "Merged {} tools from {} files into {}",
        merged.tool_count(),
        merged.tools.len(),
        output.display()
    );

    let summary = SplitOutput {
        dir: output.display().to_string(),
        categories: merged.tools.len(),
        tools: merged.tool_count(),
    };
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}

/// File stem for a category: lowercase, runs of whitespace or path
/// characters -> `-`, no leading or trailing `.`/`-`
pub fn category_file_stem(name: &str) -> String {
    UNSAFE_RUN
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches(|c| c == '.' || c == '-')
        .to_string()
}

/// One flat list per category, in catalog order
pub fn split_catalog(catalog: &ToolsFile) -> Result<Vec<SplitFile>> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut files = Vec::with_capacity(catalog.tools.len());

    for category in &catalog.tools {
        let stem = category_file_stem(&category.category);
        if stem.is_empty() {
            bail!(
                "Category \"{}\" has no usable file name",
                category.category
            );
        }
        if let Some(other) = seen.insert(stem.clone(), &category.category) {
            bail!(
                "Categories \"{}\" and \"{}\" both map to {}.json",
                other,
                category.category,
                stem
            );
        }
        files.push(SplitFile {
            stem,
            tools: category.content.clone(),
        });
    }

    Ok(files)
}

/// Rebuild the nested catalog. Categories known to `template` keep its names
/// and order; unknown files are appended by stem.
pub fn merge_split(files: Vec<SplitFile>, template: Option<&ToolsFile>) -> ToolsFile {
    let mut by_stem: HashMap<String, Vec<Tool>> = HashMap::new();
    let mut order: Vec<String> = Vec::with_capacity(files.len());
    for file in files {
        order.push(file.stem.clone());
        by_stem.insert(file.stem, file.tools);
    }

    let mut tools = Vec::new();
    if let Some(template) = template {
        for category in &template.tools {
            let stem = category_file_stem(&category.category);
            if let Some(content) = by_stem.remove(&stem) {
                tools.push(Category {
                    category: category.category.clone(),
                    content,
                });
            }
        }
    }

    order.sort();
    for stem in order {
        if let Some(content) = by_stem.remove(&stem) {
            tools.push(Category {
                category: stem,
                content,
            });
        }
    }

    ToolsFile { tools }
}

/// `<dir>/*.json` as (stem, path), sorted by stem
pub fn list_split_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let pattern = dir.join("*.json");
    let mut files = Vec::new();
    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.push((stem.to_string(), path.clone()));
        }
    }
    files.sort();
    Ok(files)
}

/// Read every split file; each must be an array of tools
pub async fn read_split_dir(dir: &Path) -> Result<Vec<SplitFile>> {
    let mut files = Vec::new();
    for (stem, path) in list_split_files(dir)? {
        let tools: Vec<Tool> = load_json(&path).await?;
        files.push(SplitFile { stem, tools });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample() -> ToolsFile {
        serde_json::from_value(json!({
            "tools": [
                { "category": "Image Generation", "content": [
                    { "title": "Zeta", "url": "https://z.ai", "slug": "zeta" },
                    { "title": "Alpha", "url": "https://a.ai", "slug": "alpha" }
                ]},
                { "category": "Writing", "content": [
                    { "title": "Quill", "url": "https://q.ai", "slug": "quill", "tag": "free" }
                ]},
                { "category": "Code  Assist", "content": [] }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_category_file_stem() {
        assert_eq!(category_file_stem("Image Generation"), "image-generation");
        assert_eq!(category_file_stem("Code  Assist"), "code-assist");
        assert_eq!(category_file_stem("Writing"), "writing");
        assert_eq!(category_file_stem("Text/Image"), "text-image");
        assert_eq!(category_file_stem("Audio & Music"), "audio-&-music");
        assert_eq!(category_file_stem("../../escape"), "escape");
        assert_eq!(category_file_stem(r"a\b: c?"), "a-b-c");
    }

    #[test]
    fn test_split_stems_stay_inside_dir() {
        let catalog: ToolsFile = serde_json::from_value(json!({
            "tools": [
                { "category": "Text/Image", "content": [{ "title": "T" }] },
                { "category": "../../escape", "content": [] }
            ]
        }))
        .unwrap();
        let files = split_catalog(&catalog).unwrap();
        let stems: Vec<_> = files.iter().map(|f| f.stem.as_str()).collect();
        assert_eq!(stems, ["text-image", "escape"]);

        let merged = merge_split(files, Some(&catalog));
        assert_eq!(merged, catalog);
    }

    #[test]
    fn test_split_rejects_unnamed_category() {
        let catalog: ToolsFile = serde_json::from_value(json!({
            "tools": [{ "category": " / ", "content": [] }]
        }))
        .unwrap();
        assert!(split_catalog(&catalog).is_err());
    }

    #[test]
    fn test_split_keeps_order_and_content() {
        let catalog = sample();
        let files = split_catalog(&catalog).unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].stem, "image-generation");
        assert_eq!(files[0].tools[0].title, "Zeta");
        assert_eq!(files[0].tools, catalog.tools[0].content);
        assert!(files[2].tools.is_empty());
    }

    #[test]
    fn test_split_rejects_stem_collision() {
        let catalog: ToolsFile = serde_json::from_value(json!({
            "tools": [
                { "category": "Writing", "content": [] },
                { "category": "writing", "content": [] }
            ]
        }))
        .unwrap();
        assert!(split_catalog(&catalog).is_err());
    }

    #[test]
    fn test_split_merge_roundtrip() {
        let catalog = sample();
        let files = split_catalog(&catalog).unwrap();
        let merged = merge_split(files, Some(&catalog));
        assert_eq!(merged, catalog);
    }

    #[test]
    fn test_merge_without_template_uses_stems() {
        let catalog = sample();
        let files = split_catalog(&catalog).unwrap();
        let merged = merge_split(files, None);
        let names: Vec<_> = merged.tools.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, ["code-assist", "image-generation", "writing"]);
        assert_eq!(merged.tool_count(), catalog.tool_count());
    }

    #[test]
    fn test_merge_appends_new_files() {
        let catalog = sample();
        let mut files = split_catalog(&catalog).unwrap();
        files.push(SplitFile {
            stem: "audio".to_string(),
            tools: vec![],
        });
        let merged = merge_split(files, Some(&catalog));
        assert_eq!(merged.tools.len(), 4);
        assert_eq!(merged.tools[3].category, "audio");
    }

    #[tokio::test]
    async fn test_read_split_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), r#"[{"title":"B"}]"#).unwrap();
        std::fs::write(dir.path().join("a.json"), "[]").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = read_split_dir(dir.path()).await.unwrap();
        let stems: Vec<_> = files.iter().map(|f| f.stem.as_str()).collect();
        assert_eq!(stems, ["a", "b"]);
        assert_eq!(files[1].tools[0].title, "B");
    }

    #[tokio::test]
    async fn test_read_split_dir_rejects_non_array() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), r#"{"title":"B"}"#).unwrap();
        assert!(read_split_dir(dir.path()).await.is_err());
    }
}
