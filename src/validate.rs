//! check-data command: Validate tools.json and the split category files
//!
//! Reports, never mutates. Exit status 1 when any issue is found.

use crate::catalog::{load_catalog, DataPaths};
use crate::schema::{Tool, ToolsFile};
use crate::split::{category_file_stem, list_split_files};
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use url::Url;

/// Referral parameter every outbound link must carry
pub const REQUIRED_REF: &str = "ref=riseofmachine.com";

const CATALOG_SOURCE: &str = "tools.json";

#[derive(Args)]
pub struct CheckDataArgs {
    /// Required referral query parameter (key=value)
    #[arg(long, default_value = REQUIRED_REF)]
    pub required_ref: String,

    /// Skip the split category files
    #[arg(long)]
    pub no_split: bool,
}

#[derive(Debug, Clone)]
pub struct ValidateConfig {
    pub required_ref: String,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            required_ref: REQUIRED_REF.to_string(),
        }
    }
}

/// Where a flagged tool lives
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolRef {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub category: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateUrl {
    pub url: String,
    pub tools: Vec<ToolRef>,
}

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub total_tools: usize,
    pub total_split_tools: usize,
    pub unique_urls: usize,
    pub missing_url: Vec<ToolRef>,
    pub missing_protocol: Vec<ToolRef>,
    pub missing_ref: Vec<ToolRef>,
    pub duplicates: Vec<DuplicateUrl>,
    pub invalid_structure: Vec<String>,
    pub out_of_sync: Vec<String>,
}

impl ValidationReport {
    pub fn issue_count(&self) -> usize {
        self.missing_url.len()
            + self.missing_protocol.len()
            + self.missing_ref.len()
            + self.duplicates.len()
            + self.invalid_structure.len()
            + self.out_of_sync.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }
}

/// A split file as read from disk, before its shape is trusted
#[derive(Debug, Clone)]
pub struct RawSplitFile {
    pub stem: String,
    pub content: Value,
}

pub async fn run_check_data(args: CheckDataArgs, paths: &DataPaths) -> Result<()> {
    let config = ValidateConfig {
        required_ref: args.required_ref,
    };

    info!("Checking {}...", paths.catalog().display());
    let catalog = load_catalog(&paths.catalog()).await?;

    let mut report = validate_catalog(&catalog, &config);

    if !args.no_split {
        let split_dir = paths.split_dir();
        if split_dir.is_dir() {
            info!("Checking split category files...");
            let files = read_raw_split_files(&split_dir).await?;
            validate_split_files(&mut report, &files, &config);
            check_split_sync(&mut report, &catalog, &files);
        }
    }

    println!("{}", serde_json::to_string(&report)?);
    log_report(&report);

    if !report.is_clean() {
        std::process::exit(1);
    }

    Ok(())
}

async fn read_raw_split_files(dir: &std::path::Path) -> Result<Vec<RawSplitFile>> {
    let mut files = Vec::new();
    for (stem, path) in list_split_files(dir)? {
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let content: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        files.push(RawSplitFile { stem, content });
    }
    Ok(files)
}

fn log_report(report: &ValidationReport) {
    info!(
        "Total tools processed: {} (+ {} split), unique URLs: {}",
        report.total_tools, report.total_split_tools, report.unique_urls
    );

    let sections: [(&str, &[ToolRef]); 3] = [
        ("Missing URLs", report.missing_url.as_slice()),
        ("Missing protocol (http/https)", report.missing_protocol.as_slice()),
        ("Missing ref parameter", report.missing_ref.as_slice()),
    ];
    for (label, tools) in sections {
        if tools.is_empty() {
            continue;
        }
        warn!("{} ({}):", label, tools.len());
        for tool in tools {
            warn!(
                "  - \"{}\" ({}) {}",
                tool.title,
                tool.source,
                tool.url.as_deref().unwrap_or("")
            );
        }
    }

    if !report.duplicates.is_empty() {
        warn!("Duplicate URLs ({}):", report.duplicates.len());
        for dup in &report.duplicates {
            warn!("  - {} ({} tools)", dup.url, dup.tools.len());
        }
    }
    for issue in report.invalid_structure.iter().chain(&report.out_of_sync) {
        warn!("  - {}", issue);
    }

    if report.is_clean() {
        info!("Data check passed! No issues found.");
    } else {
        warn!("Summary: {} issue(s) found", report.issue_count());
    }
}

/// Validate the nested catalog, including duplicate URL detection
pub fn validate_catalog(catalog: &ToolsFile, config: &ValidateConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut by_url: HashMap<&str, Vec<ToolRef>> = HashMap::new();
    let mut url_order: Vec<&str> = Vec::new();

    for (category, tool) in catalog.iter_tools() {
        report.total_tools += 1;
        validate_tool(&mut report, tool, &category.category, CATALOG_SOURCE, config);

        if let Some(url) = tool.url() {
            let entry = by_url.entry(url).or_default();
            if entry.is_empty() {
                url_order.push(url);
            }
            entry.push(tool_ref(tool, &category.category, CATALOG_SOURCE));
        }
    }

    report.unique_urls = by_url.len();

    let mut duplicates: Vec<DuplicateUrl> = url_order
        .into_iter()
        .filter_map(|url| {
            let tools = by_url.remove(url)?;
            (tools.len() > 1).then(|| DuplicateUrl {
                url: url.to_string(),
                tools,
            })
        })
        .collect();
    // Largest groups first, stable for equal counts
    duplicates.sort_by(|a, b| b.tools.len().cmp(&a.tools.len()));
    report.duplicates = duplicates;

    report
}

/// Per-tool checks shared by the catalog and split files
pub fn validate_tool(
    report: &mut ValidationReport,
    tool: &Tool,
    category: &str,
    source: &str,
    config: &ValidateConfig,
) {
    let Some(url) = tool.url() else {
        report.missing_url.push(tool_ref(tool, category, source));
        return;
    };

    if !has_http_scheme(url) {
        report.missing_protocol.push(tool_ref(tool, category, source));
    }
    if !has_required_ref(url, &config.required_ref) {
        report.missing_ref.push(tool_ref(tool, category, source));
    }
}

/// Validate split files; anything that isn't an array of tools is structural
pub fn validate_split_files(
    report: &mut ValidationReport,
    files: &[RawSplitFile],
    config: &ValidateConfig,
) {
    for file in files {
        let source = format!("{}.json", file.stem);
        let Value::Array(items) = &file.content else {
            report.invalid_structure.push(format!(
                "File: {} - Expected Array, got {}",
                source,
                json_type_name(&file.content)
            ));
            continue;
        };

        for (i, item) in items.iter().enumerate() {
            match serde_json::from_value::<Tool>(item.clone()) {
                Ok(tool) => {
                    report.total_split_tools += 1;
                    validate_tool(report, &tool, &file.stem, &source, config);
                }
                Err(e) => report
                    .invalid_structure
                    .push(format!("File: {} - item {} is not a tool: {}", source, i, e)),
            }
        }
    }
}

/// Compare split files against the catalog by slug list
pub fn check_split_sync(report: &mut ValidationReport, catalog: &ToolsFile, files: &[RawSplitFile]) {
    let split_slugs: HashMap<&str, Vec<Option<String>>> = files
        .iter()
        .filter_map(|file| {
            let items = file.content.as_array()?;
            let slugs = items
                .iter()
                .map(|item| item.get("slug").and_then(Value::as_str).map(String::from))
                .collect();
            Some((file.stem.as_str(), slugs))
        })
        .collect();

    for category in &catalog.tools {
        let stem = category_file_stem(&category.category);
        let Some(split) = split_slugs.get(stem.as_str()) else {
            report.out_of_sync.push(format!(
                "Category \"{}\" has no split file {}.json",
                category.category, stem
            ));
            continue;
        };

        let expected: Vec<Option<String>> = category
            .content
            .iter()
            .map(|t| t.slug.clone())
            .collect();
        if &expected != split {
            report.out_of_sync.push(format!(
                "File: {}.json - tools differ from \"{}\" in tools.json ({} vs {})",
                stem,
                category.category,
                split.len(),
                expected.len()
            ));
        }
    }

    let known: HashSet<String> = catalog
        .tools
        .iter()
        .map(|c| category_file_stem(&c.category))
        .collect();
    for file in files.iter().filter(|f| !known.contains(&f.stem)) {
        report.out_of_sync.push(format!(
            "File: {}.json has no matching category in tools.json",
            file.stem
        ));
    }
}

pub fn has_http_scheme(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Check the query string for `key=value`, falling back to a plain substring
/// match when the URL does not parse
pub fn has_required_ref(url: &str, required: &str) -> bool {
    let Some((key, value)) = required.split_once('=') else {
        return url.contains(required);
    };
    match Url::parse(url) {
        Ok(parsed) => parsed.query_pairs().any(|(k, v)| k == key && v == value),
        Err(_) => url.contains(required),
    }
}

fn tool_ref(tool: &Tool, category: &str, source: &str) -> ToolRef {
    ToolRef {
        title: tool.title.clone(),
        slug: tool.slug.clone(),
        category: category.to_string(),
        source: source.to_string(),
        url: tool.url().map(String::from),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Category;
    use serde_json::json;

    fn tool(title: &str, url: &str) -> Tool {
        serde_json::from_value(json!({
            "title": title,
            "url": url,
            "slug": crate::slug::slugify(title),
        }))
        .unwrap()
    }

    fn catalog(tools: Vec<Tool>) -> ToolsFile {
        ToolsFile {
            tools: vec![Category {
                category: "Writing".to_string(),
                content: tools,
            }],
        }
    }

    #[test]
    fn test_ftp_url_missing_protocol() {
        let report = validate_catalog(
            &catalog(vec![tool("Ftp", "ftp://example.com")]),
            &ValidateConfig::default(),
        );
        assert_eq!(report.missing_protocol.len(), 1);
        assert_eq!(report.missing_protocol[0].title, "Ftp");
    }

    #[test]
    fn test_ref_param_passes() {
        let report = validate_catalog(
            &catalog(vec![tool("Ok", "https://example.com/?ref=riseofmachine.com")]),
            &ValidateConfig::default(),
        );
        assert!(report.is_clean(), "{:?}", report);
    }

    #[test]
    fn test_missing_ref_flagged() {
        let report = validate_catalog(
            &catalog(vec![
                tool("NoRef", "https://example.com/"),
                tool("WrongRef", "https://other.com/?ref=elsewhere.com"),
                tool("InPath", "https://third.com/ref=riseofmachine.com"),
            ]),
            &ValidateConfig::default(),
        );
        assert_eq!(report.missing_ref.len(), 3);
    }

    #[test]
    fn test_ref_among_other_params() {
        assert!(has_required_ref(
            "https://x.ai/?utm_source=a&ref=riseofmachine.com",
            REQUIRED_REF
        ));
        assert!(has_required_ref("www.x.ai/?ref=riseofmachine.com", REQUIRED_REF));
    }

    #[test]
    fn test_empty_url_flagged_missing() {
        let report = validate_catalog(
            &catalog(vec![tool("Empty", ""), tool("Blank", "   ")]),
            &ValidateConfig::default(),
        );
        assert_eq!(report.missing_url.len(), 2);
        // A missing URL is not also a protocol/ref issue
        assert!(report.missing_protocol.is_empty());
        assert!(report.missing_ref.is_empty());
    }

    #[test]
    fn test_duplicate_urls_reported() {
        let dup = "https://same.ai/?ref=riseofmachine.com";
        let report = validate_catalog(
            &catalog(vec![
                tool("One", dup),
                tool("Two", "https://unique.ai/?ref=riseofmachine.com"),
                tool("Three", dup),
            ]),
            &ValidateConfig::default(),
        );
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].url, dup);
        assert_eq!(report.duplicates[0].tools.len(), 2);
        assert_eq!(report.unique_urls, 2);
        assert_eq!(report.issue_count(), 1);
    }

    #[test]
    fn test_duplicates_largest_first() {
        let a = "https://a.ai/?ref=riseofmachine.com";
        let b = "https://b.ai/?ref=riseofmachine.com";
        let report = validate_catalog(
            &catalog(vec![
                tool("A1", a),
                tool("A2", a),
                tool("B1", b),
                tool("B2", b),
                tool("B3", b),
            ]),
            &ValidateConfig::default(),
        );
        assert_eq!(report.duplicates[0].url, b);
        assert_eq!(report.duplicates[1].url, a);
    }

    #[test]
    fn test_split_file_not_array() {
        let mut report = ValidationReport::default();
        let files = vec![RawSplitFile {
            stem: "writing".to_string(),
            content: json!({ "tools": [] }),
        }];
        validate_split_files(&mut report, &files, &ValidateConfig::default());
        assert_eq!(report.invalid_structure.len(), 1);
        assert!(report.invalid_structure[0].contains("got object"));
    }

    #[test]
    fn test_split_tools_validated() {
        let mut report = ValidationReport::default();
        let files = vec![RawSplitFile {
            stem: "writing".to_string(),
            content: json!([
                { "title": "Good", "url": "https://g.ai/?ref=riseofmachine.com" },
                { "title": "Bad", "url": "g.ai" },
                42
            ]),
        }];
        validate_split_files(&mut report, &files, &ValidateConfig::default());
        assert_eq!(report.total_split_tools, 2);
        assert_eq!(report.missing_protocol.len(), 1);
        assert_eq!(report.missing_protocol[0].source, "writing.json");
        assert_eq!(report.missing_ref.len(), 1);
        assert_eq!(report.invalid_structure.len(), 1);
    }

    #[test]
    fn test_split_sync() {
        let file = catalog(vec![
            tool("One", "https://1.ai/?ref=riseofmachine.com"),
            tool("Two", "https://2.ai/?ref=riseofmachine.com"),
        ]);

        let mut report = ValidationReport::default();
        let in_sync = vec![RawSplitFile {
            stem: "writing".to_string(),
            content: serde_json::to_value(&file.tools[0].content).unwrap(),
        }];
        check_split_sync(&mut report, &file, &in_sync);
        assert!(report.out_of_sync.is_empty());

        let stale = vec![RawSplitFile {
            stem: "writing".to_string(),
            content: serde_json::to_value(&file.tools[0].content[..1]).unwrap(),
        }];
        check_split_sync(&mut report, &file, &stale);
        assert_eq!(report.out_of_sync.len(), 1);

        let mut report = ValidationReport::default();
        check_split_sync(&mut report, &file, &[]);
        assert!(report.out_of_sync[0].contains("no split file"));

        let mut report = ValidationReport::default();
        let leftover = vec![
            in_sync[0].clone(),
            RawSplitFile {
                stem: "old-category".to_string(),
                content: json!([{ "title": "Ghost", "slug": "ghost" }]),
            },
        ];
        check_split_sync(&mut report, &file, &leftover);
        assert_eq!(report.out_of_sync.len(), 1);
        assert!(report.out_of_sync[0].contains("old-category.json has no matching category"));
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert!(has_http_scheme("HTTPS://x.ai/?ref=riseofmachine.com"));
        assert!(has_http_scheme("Http://x.ai"));
        assert!(!has_http_scheme("ftp://x.ai"));
        assert!(!has_http_scheme("x.ai"));

        let report = validate_catalog(
            &catalog(vec![tool("Loud", "HTTPS://x.ai/?ref=riseofmachine.com")]),
            &ValidateConfig::default(),
        );
        assert!(report.is_clean());
    }
}
