//! Types produced by the classifier.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::marketplace::Marketplace;

/// One parsed input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    /// Brand name, trimmed, original case.
    pub brand: String,
    /// Order token with surrounding quotes and zero-width characters removed.
    /// Case is preserved; matching is case-insensitive.
    pub token: String,
}

impl OrderLine {
    pub fn new(brand: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            token: token.into(),
        }
    }

    /// Upper-cased token used for prefix matching.
    pub fn match_key(&self) -> String {
        self.token.to_uppercase()
    }
}

/// Outcome of classifying a block of raw input text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub marketplaces: BTreeSet<Marketplace>,
    pub valid_line_count: usize,
    pub diagnostic: String,
}

impl ClassificationResult {
    /// Selected marketplaces in canonical order.
    pub fn selected(&self) -> Vec<Marketplace> {
        self.marketplaces.iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.marketplaces.is_empty()
    }
}
