//! Prompt assembly and temporal analysis of search results.
//!
//! Web answers go stale quickly, so search context is wrapped in a template
//! that pins the model to the current year and asks it to cite timeframes.

use std::sync::LazyLock;

use regex::Regex;
use researcher_shared::Snippet;

/// System message for requests answered without web context.
pub const DIRECT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide direct and engaging responses.";

/// Years 2010–2029 as standalone words.
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b20[12]\d\b").expect("year regex"));

/// Result of inspecting search snippets for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentAnalysis {
    /// Year the request is made in.
    pub current_year: i32,
    /// Latest year mentioned in the snippets, if any.
    pub content_year: Option<i32>,
    /// Snippet bodies joined in rank order.
    pub raw_content: String,
    /// The user's query.
    pub query: String,
}

/// The last year in `text` between 2010 and 2029, in reading order.
pub fn extract_latest_year(text: &str) -> Option<i32> {
    YEAR_RE
        .find_iter(text)
        .last()
        .and_then(|m| m.as_str().parse().ok())
}

/// Join snippet bodies and note the most recent year they mention.
pub fn analyze_content(snippets: &[Snippet], query: &str, current_year: i32) -> ContentAnalysis {
    let raw_content = snippets
        .iter()
        .map(|s| s.body.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    ContentAnalysis {
        current_year,
        content_year: extract_latest_year(&raw_content),
        raw_content,
        query: query.to_string(),
    }
}

/// System message for requests answered with web context.
pub fn web_system_prompt(current_year: i32) -> String {
    format!(
        "You are an AI assistant in {current_year}. Provide accurate, time-aware responses based on the provided information."
    )
}

/// Wrap search context and the query in the time-aware template. The context
/// always precedes the query.
pub fn time_aware_prompt(analysis: &ContentAnalysis) -> String {
    let year = analysis.current_year;
    let recency = match analysis.content_year {
        Some(content_year) => {
            format!("\nThe most recent year mentioned in the sources is {content_year}.\n")
        }
        None => String::new(),
    };

    format!(
        "Based on the following information from {year}:\n\
         \n\
         {content}\n\
         {recency}\n\
         Please provide a factual response about \"{query}\" that:\n\
         1. Is accurate to the current year ({year})\n\
         2. Explicitly mentions relevant dates and timeframes\n\
         3. Synthesizes information from multiple sources\n\
         4. Provides context when discussing time-sensitive information\n\
         \n\
         Format the response as a clear, direct statement.",
        content = analysis.raw_content,
        query = analysis.query,
    )
}

/// Prefix `response` with "As of <year>, " unless it already names the year.
pub fn annotate_with_year(response: &str, current_year: i32) -> String {
    if response.contains(&current_year.to_string()) {
        response.to_string()
    } else {
        format!("As of {current_year}, {response}")
    }
}
