use std::path::Path;

use serde::{Deserialize, Serialize};

/// One ranked hit from the search provider. `content` starts empty and is
/// filled in exactly once during the scrape phase; on a failed fetch it
/// holds the error text instead of page content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(default)]
    pub content: String,
}

impl SearchResult {
    pub fn new(title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            content: String::new(),
        }
    }
}

/// The full output of a research run. Fields are filled in strict pipeline
/// order (search, scrape, initial research, analysis passes, synthesis) and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub question: String,
    pub web_results: Vec<SearchResult>,
    pub initial_research: String,
    pub analysis: Vec<String>,
    pub final_conclusions: String,
}

impl ResearchResult {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            web_results: Vec::new(),
            initial_research: String::new(),
            analysis: Vec::new(),
            final_conclusions: String::new(),
        }
    }
}

/// Write the full result as indented JSON. Non-ASCII text passes through
/// unescaped, so saved reports stay readable in any UTF-8 viewer.
pub fn write_results(path: &Path, results: &ResearchResult) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(results)?)?;
    Ok(())
}
