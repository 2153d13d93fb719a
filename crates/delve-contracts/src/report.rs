//! Plain-text rendering of results for the terminal.

use std::fmt::Write as _;

use crate::research::ResearchResult;

const BANNER_WIDTH: usize = 80;
const RULE_WIDTH: usize = 40;
const DESCRIPTION_RULE_WIDTH: usize = 50;

/// Render the labeled, delimited research report printed to stdout.
pub fn render_research_report(results: &ResearchResult) -> String {
    let mut out = String::new();
    let banner = "=".repeat(BANNER_WIDTH);
    let rule = "-".repeat(RULE_WIDTH);

    out.push_str("\nResearch Results:\n");
    let _ = writeln!(out, "{banner}");
    let _ = writeln!(out, "\nQuestion: {}", results.question);

    out.push_str("\nWeb Search Results:\n");
    let _ = writeln!(out, "{rule}");
    for (idx, result) in results.web_results.iter().enumerate() {
        let _ = writeln!(out, "\n{}. {}", idx + 1, result.title);
        let _ = writeln!(out, "   URL: {}", result.url);
        let _ = writeln!(out, "   Summary: {}", result.snippet);
    }

    out.push_str("\nInitial Research:\n");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{}", results.initial_research);

    for (idx, analysis) in results.analysis.iter().enumerate() {
        let _ = writeln!(out, "\nAnalysis Iteration {}:", idx + 1);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{analysis}");
    }

    out.push_str("\nFinal Conclusions:\n");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{}", results.final_conclusions);
    out
}

/// Render the delimited block printed by the image description tool.
pub fn render_description(description: &str) -> String {
    let rule = "-".repeat(DESCRIPTION_RULE_WIDTH);
    format!("\nImage Description:\n{rule}\n{description}\n{rule}\n")
}

#[cfg(test)]
mod tests {
    use super::{render_description, render_research_report};
    use crate::research::{ResearchResult, SearchResult};

    #[test]
    fn report_sections_appear_in_pipeline_order() {
        let mut results = ResearchResult::new("q");
        results.web_results.push(SearchResult::new(
            "First source",
            "https://example.org/a",
            "snippet a",
        ));
        results.initial_research = "initial body".to_string();
        results.analysis = vec!["pass one".to_string(), "pass two".to_string()];
        results.final_conclusions = "closing".to_string();

        let report = render_research_report(&results);
        let order = [
            "Research Results:",
            "Question: q",
            "Web Search Results:",
            "1. First source",
            "   URL: https://example.org/a",
            "Initial Research:",
            "initial body",
            "Analysis Iteration 1:",
            "pass one",
            "Analysis Iteration 2:",
            "pass two",
            "Final Conclusions:",
            "closing",
        ];
        let mut cursor = 0;
        for label in order {
            let found = report[cursor..]
                .find(label)
                .unwrap_or_else(|| panic!("missing `{label}` after offset {cursor}"));
            cursor += found + label.len();
        }
    }

    #[test]
    fn empty_analysis_renders_no_iteration_sections() {
        let results = ResearchResult::new("q");
        let report = render_research_report(&results);
        assert!(!report.contains("Analysis Iteration"));
        assert!(report.contains("Final Conclusions:"));
    }

    #[test]
    fn description_block_is_delimited() {
        let block = render_description("a red bicycle");
        assert!(block.starts_with("\nImage Description:\n"));
        assert_eq!(block.matches(&"-".repeat(50)).count(), 2);
        assert!(block.contains("a red bicycle"));
    }
}
