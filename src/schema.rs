//! tools.json / metadata.json / slug-map.json schema
//!
//! Central data model shared by every maintenance command.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Root structure for tools.json
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsFile {
    pub tools: Vec<Category>,
}

/// A named group of tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub category: String,
    #[serde(default)]
    pub content: Vec<Tool>,
}

/// A single catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub title: String,
    /// Short description shown on the card
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub url: String,
    /// Date the tool was added, usually `YYYY-MM-DD`
    #[serde(rename = "date-added", default)]
    pub date_added: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Keys we don't model, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tool {
    /// Slug, if present and non-empty
    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref().filter(|s| !s.is_empty())
    }

    /// Trimmed URL, if non-empty
    pub fn url(&self) -> Option<&str> {
        let url = self.url.trim();
        (!url.is_empty()).then_some(url)
    }
}

impl ToolsFile {
    /// All tools paired with their category, in catalog order
    pub fn iter_tools(&self) -> impl Iterator<Item = (&Category, &Tool)> {
        self.tools
            .iter()
            .flat_map(|cat| cat.content.iter().map(move |tool| (cat, tool)))
    }

    pub fn tool_count(&self) -> usize {
        self.tools.iter().map(|c| c.content.len()).sum()
    }
}

/// Data scraped from a tool's homepage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    /// Handle without the leading `@`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
}

impl MetadataEntry {
    /// A cached entry is reusable once it has a non-empty title
    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// metadata.json: slug -> entry
pub type MetadataMap = BTreeMap<String, MetadataEntry>;

/// slug-map.json: slug -> categories it appears under
pub type SlugMap = BTreeMap<String, Vec<String>>;
