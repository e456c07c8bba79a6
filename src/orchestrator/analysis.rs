// Query analysis
//
// Keyword and intent heuristics that grade a query before routing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    VeryComplex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
            Complexity::VeryComplex => "very_complex",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Calculate,
    Explain,
    Compare,
    Analyze,
    Search,
    Recommend,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Calculate => "calculate",
            Intent::Explain => "explain",
            Intent::Compare => "compare",
            Intent::Analyze => "analyze",
            Intent::Search => "search",
            Intent::Recommend => "recommend",
            Intent::General => "general",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryAnalysis {
    pub query: String,
    pub complexity: Complexity,
    pub intent: Intent,
    pub keywords: Vec<String>,
    pub requires_calculation: bool,
    pub requires_documents: bool,
    pub requires_explanation: bool,
    pub requires_comparison: bool,
    pub requires_multi_hop: bool,
    pub requires_reasoning: bool,
}

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "what", "how", "why", "when", "where", "which", "who",
];

static MULTI_HOP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        "leads to",
        "causes",
        "results in",
        "relationship between",
        "if.*then",
        "impact on",
        "effect of",
        "consequence",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

pub fn analyze_query(query: &str) -> QueryAnalysis {
    let lower = query.to_lowercase();
    let lower = lower.trim();

    let requires_calculation = contains_any(lower, &["calculate", "compute", "score", "priority", "value"]);
    let requires_documents = contains_any(
        lower,
        &["document", "pdf", "source", "paper", "research", "policy", "mention", "reference"],
    );
    let requires_explanation =
        contains_any(lower, &["why", "how", "explain", "reason", "because", "rationale"]);
    let requires_comparison =
        contains_any(lower, &["compare", "difference", "versus", "vs", "better", "worse"]);
    let requires_multi_hop = MULTI_HOP_PATTERNS.iter().any(|re| re.is_match(lower));

    let mut complexity = Complexity::Simple;
    let mut requires_reasoning = false;

    if requires_documents {
        complexity = complexity.max(Complexity::Moderate);
    }
    if requires_explanation {
        complexity = complexity.max(Complexity::Moderate);
        requires_reasoning = true;
    }
    if requires_comparison {
        complexity = complexity.max(Complexity::Moderate);
        requires_reasoning = true;
    }
    if requires_multi_hop {
        complexity = complexity.max(Complexity::Complex);
        requires_reasoning = true;
    }

    let requirements = [
        requires_reasoning,
        requires_explanation,
        requires_documents,
        requires_comparison,
        requires_multi_hop,
    ]
    .iter()
    .filter(|&&b| b)
    .count();
    let multi_clause = lower.split(" and ").count() > 2 || lower.split(" or ").count() > 2;
    if requirements >= 3 || (requirements >= 2 && multi_clause) {
        complexity = Complexity::VeryComplex;
        requires_reasoning = true;
    }

    QueryAnalysis {
        query: query.to_string(),
        complexity,
        intent: detect_intent(lower),
        keywords: extract_keywords(lower),
        requires_calculation,
        requires_documents,
        requires_explanation,
        requires_comparison,
        requires_multi_hop,
        requires_reasoning,
    }
}

fn contains_any(query: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| query.contains(t))
}

fn detect_intent(query: &str) -> Intent {
    if contains_any(query, &["calculate", "compute", "score"]) {
        Intent::Calculate
    } else if contains_any(query, &["explain", "why", "how", "reason"]) {
        Intent::Explain
    } else if contains_any(query, &["compare", "difference", "versus", "vs"]) {
        Intent::Compare
    } else if contains_any(query, &["analyze", "analysis", "assess"]) {
        Intent::Analyze
    } else if contains_any(
        query,
        &["find", "search", "what documents", "which sources", "show me"],
    ) {
        Intent::Search
    } else if contains_any(query, &["recommend", "suggest", "should"]) {
        Intent::Recommend
    } else {
        Intent::General
    }
}

/// Top five non-stop-word terms.
fn extract_keywords(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .take(5)
        .map(|w| w.to_string())
        .collect()
}
