//! Weighted fuzzy search over listed tools

use crate::listing::ListedTool;
use std::cmp::Ordering;

/// Queries shorter than this (after trimming) do not filter anything
pub const MIN_QUERY_LEN: usize = 2;

/// Per-field similarity below this counts as no match
pub const MATCH_THRESHOLD: f64 = 0.85;

pub const TITLE_WEIGHT: f64 = 0.5;
pub const BODY_WEIGHT: f64 = 0.3;
pub const CATEGORY_WEIGHT: f64 = 0.1;
pub const TAG_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct SearchHit<'a> {
    pub tool: ListedTool<'a>,
    pub score: f64,
}

/// True when the query is long enough to search with
pub fn is_active(query: &str) -> bool {
    query.trim().chars().count() >= MIN_QUERY_LEN
}

/// Matching tools, best score first. Equal scores keep input order.
pub fn search<'a>(tools: Vec<ListedTool<'a>>, query: &str) -> Vec<SearchHit<'a>> {
    let query = query.trim().to_lowercase();
    let terms: Vec<&str> = query.split_whitespace().collect();
    if terms.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit<'a>> = tools
        .into_iter()
        .filter_map(|tool| {
            let score = score(&tool, &query, &terms);
            (score > 0.0).then_some(SearchHit { tool, score })
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits
}

/// Weighted sum of field similarities
fn score(tool: &ListedTool<'_>, query: &str, terms: &[&str]) -> f64 {
    let fields = [
        (TITLE_WEIGHT, tool.tool.title.as_str()),
        (BODY_WEIGHT, tool.tool.body.as_str()),
        (CATEGORY_WEIGHT, tool.category),
        (TAG_WEIGHT, tool.tool.tag.as_deref().unwrap_or("")),
    ];

    fields
        .iter()
        .map(|(weight, text)| weight * field_similarity(query, terms, text))
        .sum()
}

/// 1.0 for a substring hit on the whole query, otherwise the mean best
/// Jaro-Winkler similarity of each query term against the field's words.
/// Zero below the match threshold.
pub fn field_similarity(query: &str, terms: &[&str], text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    if text.contains(query) {
        return 1.0;
    }

    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() || terms.is_empty() {
        return 0.0;
    }

    let total: f64 = terms
        .iter()
        .map(|term| {
            if text.contains(term) {
                return 1.0;
            }
            words
                .iter()
                .map(|word| strsim::jaro_winkler(term, word))
                .fold(0.0, f64::max)
        })
        .sum();
    let similarity = total / terms.len() as f64;

    if similarity >= MATCH_THRESHOLD {
        similarity
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Tool;
    use serde_json::json;

    fn tool(title: &str, body: &str, tag: Option<&str>) -> Tool {
        serde_json::from_value(json!({ "title": title, "body": body, "tag": tag })).unwrap()
    }

    fn listed<'a>(tools: &'a [(Tool, &'a str)]) -> Vec<ListedTool<'a>> {
        tools
            .iter()
            .map(|(tool, category)| ListedTool {
                tool,
                category: *category,
            })
            .collect()
    }

    fn titles(hits: &[SearchHit<'_>]) -> Vec<String> {
        hits.iter().map(|h| h.tool.tool.title.clone()).collect()
    }

    #[test]
    fn test_is_active() {
        assert!(!is_active(""));
        assert!(!is_active(" a "));
        assert!(is_active("ai"));
    }

    #[test]
    fn test_title_outranks_body() {
        let data = vec![
            (tool("Notes Helper", "Writes image captions", None), "Writing"),
            (tool("Image Studio", "Edits photos", None), "Image"),
            (tool("Music Box", "Composes songs", None), "Audio"),
        ];
        let hits = search(listed(&data), "image");
        assert_eq!(titles(&hits), ["Image Studio", "Notes Helper"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_fuzzy_typo_matches() {
        let data = vec![
            (tool("Transcriber", "Speech to text", None), "Audio"),
            (tool("Painter", "Digital art", None), "Image"),
        ];
        let hits = search(listed(&data), "transcribr");
        assert_eq!(titles(&hits), ["Transcriber"]);
    }

    #[test]
    fn test_category_and_tag_fields() {
        let data = vec![
            (tool("Alpha", "Does things", Some("opensource")), "Productivity"),
            (tool("Beta", "Does other things", Some("paid")), "Video"),
        ];
        assert_eq!(titles(&search(listed(&data), "video")), ["Beta"]);
        assert_eq!(titles(&search(listed(&data), "opensource")), ["Alpha"]);
    }

    #[test]
    fn test_multi_word_query() {
        let data = vec![
            (tool("Voice Cloner", "Clone any voice", None), "Audio"),
            (tool("Voice Notes", "Memo recorder", None), "Productivity"),
        ];
        let hits = search(listed(&data), "voice clone");
        assert_eq!(hits[0].tool.tool.title, "Voice Cloner");
    }

    #[test]
    fn test_unrelated_query_matches_nothing() {
        let data = vec![(tool("Painter", "Digital art", None), "Image")];
        assert!(search(listed(&data), "spreadsheet").is_empty());
    }

    #[test]
    fn test_field_similarity_threshold() {
        assert_eq!(field_similarity("art", &["art"], "Digital art"), 1.0);
        assert_eq!(field_similarity("zzz", &["zzz"], "Digital art"), 0.0);
        assert_eq!(field_similarity("art", &["art"], ""), 0.0);
    }
}
