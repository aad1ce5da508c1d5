//! DuckDuckGo HTML results page parser.
//!
//! The no-JS endpoint renders each hit as a `.result` block:
//! - `.result__a`: title link (often a `//duckduckgo.com/l/?uddg=<target>` redirect)
//! - `.result__snippet`: short body text
//!
//! Sponsored blocks carry `.result--ad` and are skipped.

use std::sync::LazyLock;

use researcher_shared::{ResearcherError, Result, Snippet};
use scraper::{ElementRef, Html, Selector};
use url::Url;

// ---------------------------------------------------------------------------
// Selectors (compiled once)
// ---------------------------------------------------------------------------

static RESULT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.result").expect("result selector"));

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").expect("title selector"));

static SNIPPET_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result__snippet").expect("snippet selector"));

/// Results container or the explicit "no results" notice. One of these is
/// on every genuine results page, including empty ones.
static RESULTS_PAGE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#links, .results, .no-results").expect("results page selector")
});

/// Present on the bot-check page DuckDuckGo serves when it rate limits.
static ANOMALY_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".anomaly-modal, #challenge-form").expect("anomaly selector")
});

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Extract up to `max_results` snippets from a results page, in page order.
///
/// Hits without body text are dropped. A results page with no hits yields an
/// empty list; a bot-check page or anything that is not a results page is an
/// error.
pub(crate) fn parse_results(html: &str, max_results: usize) -> Result<Vec<Snippet>> {
    let doc = Html::parse_document(html);

    if doc.select(&ANOMALY_SEL).next().is_some() {
        return Err(ResearcherError::Search(
            "DuckDuckGo returned a bot-check page (rate limited)".into(),
        ));
    }

    let has_hits = doc.select(&RESULT_SEL).next().is_some();
    if !has_hits && doc.select(&RESULTS_PAGE_SEL).next().is_none() {
        return Err(ResearcherError::Search(
            "unrecognised DuckDuckGo results page".into(),
        ));
    }

    let snippets = doc
        .select(&RESULT_SEL)
        .filter(|el| !is_ad(el))
        .filter_map(|el| extract_snippet(&el))
        .take(max_results)
        .collect();

    Ok(snippets)
}

fn is_ad(el: &ElementRef<'_>) -> bool {
    el.value().classes().any(|c| c == "result--ad")
}

fn extract_snippet(el: &ElementRef<'_>) -> Option<Snippet> {
    let body = el
        .select(&SNIPPET_SEL)
        .next()
        .map(|s| collapse_whitespace(&s.text().collect::<String>()))
        .unwrap_or_default();

    if body.is_empty() {
        return None;
    }

    let title_el = el.select(&TITLE_SEL).next();
    let title = title_el
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .unwrap_or_default();
    let href = title_el
        .and_then(|t| t.value().attr("href"))
        .map(resolve_href);

    Some(Snippet { title, body, href })
}

/// Unwrap DuckDuckGo's `/l/?uddg=` redirect links to the target URL.
pub(crate) fn resolve_href(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };

    match Url::parse(&absolute) {
        Ok(url) if url.path() == "/l/" => url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())
            .unwrap_or(absolute),
        _ => absolute,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
