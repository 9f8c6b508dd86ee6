//! Classifier for raw marketplace order references.
//!
//! Input is a block of text with one `brand<TAB>token` (or `brand token`) pair
//! per line. Each token is matched against a declarative prefix table to decide
//! which marketplaces have work to do. Classification is pure: no I/O, and the
//! result does not depend on line order.

mod rules;
mod types;

pub use rules::{BrandExclusion, PrefixRule, RuleTable};
pub use types::{ClassificationResult, OrderLine};

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::BTreeSet;

/// Brand is everything before the final whitespace run.
static WHITESPACE_PAIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?)\s+(\S+)$").unwrap());

const ZERO_WIDTH: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

/// Parse one input row into a brand/token pair.
///
/// Tab-separated rows split on the first tab; other rows split on the last
/// whitespace run. Rows without both a brand and a token yield `None`.
pub fn parse_line(line: &str) -> Option<OrderLine> {
    if line.trim().is_empty() {
        return None;
    }

    let (brand, token) = match line.split_once('\t') {
        Some((left, right)) => (left, right),
        None => {
            let caps = WHITESPACE_PAIR.captures(line.trim())?;
            (caps.get(1)?.as_str(), caps.get(2)?.as_str())
        }
    };

    let brand = brand.trim();
    let token = clean_token(token);
    if brand.is_empty() || token.is_empty() {
        return None;
    }

    Some(OrderLine::new(brand, token))
}

/// Strip whitespace, quote characters and zero-width characters from a token.
pub fn clean_token(raw: &str) -> String {
    let without_zero_width: String = raw.chars().filter(|c| !ZERO_WIDTH.contains(c)).collect();
    without_zero_width
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Parse every valid row of `text`, skipping malformed ones.
pub fn parse_orders(text: &str) -> Vec<OrderLine> {
    text.lines().filter_map(parse_line).collect()
}

/// Classify raw input using the standard rule table.
pub fn classify(text: &str) -> ClassificationResult {
    classify_with(&RuleTable::standard(), text)
}

/// Classify raw input against a specific rule table.
pub fn classify_with(table: &RuleTable, text: &str) -> ClassificationResult {
    if text.trim().is_empty() {
        return ClassificationResult {
            marketplaces: BTreeSet::new(),
            valid_line_count: 0,
            diagnostic: "Input is empty".to_string(),
        };
    }

    let orders = parse_orders(text);
    let marketplaces: BTreeSet<_> = orders
        .iter()
        .flat_map(|line| table.marketplaces_for(line).collect::<Vec<_>>())
        .collect();

    ClassificationResult {
        marketplaces,
        valid_line_count: orders.len(),
        diagnostic: format!("Found {} valid lines", orders.len()),
    }
}
