//! Declarative prefix rules mapping order tokens to marketplaces.

use crate::marketplace::Marketplace;

use super::types::OrderLine;

/// Token prefixes that identify one marketplace.
#[derive(Debug, Clone, Copy)]
pub struct PrefixRule {
    pub marketplace: Marketplace,
    /// Upper-case prefixes; tokens are upper-cased before comparison.
    pub prefixes: &'static [&'static str],
}

/// A brand-scoped override: tokens of `brand` with one of `prefixes`
/// never count toward `marketplace`.
#[derive(Debug, Clone, Copy)]
pub struct BrandExclusion {
    /// Upper-case brand name, compared after trimming and upper-casing.
    pub brand: &'static str,
    pub marketplace: Marketplace,
    pub prefixes: &'static [&'static str],
}

const STANDARD_RULES: &[PrefixRule] = &[
    PrefixRule {
        marketplace: Marketplace::Desty,
        prefixes: &["DST-", "1954", "1955", "1956"],
    },
    PrefixRule {
        marketplace: Marketplace::Ginee,
        prefixes: &["GN-", "GN"],
    },
    PrefixRule {
        marketplace: Marketplace::Lazada,
        prefixes: &["LZ-", "264", "273"],
    },
    PrefixRule {
        marketplace: Marketplace::Shopee,
        prefixes: &["SHOPEE", "25"],
    },
    PrefixRule {
        marketplace: Marketplace::Tiktok,
        prefixes: &["TTS", "579"],
    },
    PrefixRule {
        marketplace: Marketplace::Jubelio,
        prefixes: &["SP-", "TT-", "TP-", "LZ-"],
    },
];

const STANDARD_EXCLUSIONS: &[BrandExclusion] = &[BrandExclusion {
    brand: "FINALLY FOUND YOU",
    marketplace: Marketplace::Jubelio,
    prefixes: &["SHOPEE", "25", "TTS", "579"],
}];

/// The rule table evaluated by the classifier and by per-marketplace routing.
#[derive(Debug, Clone, Copy)]
pub struct RuleTable {
    rules: &'static [PrefixRule],
    exclusions: &'static [BrandExclusion],
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleTable {
    pub fn standard() -> Self {
        Self {
            rules: STANDARD_RULES,
            exclusions: STANDARD_EXCLUSIONS,
        }
    }

    pub fn rules(&self) -> &'static [PrefixRule] {
        self.rules
    }

    /// Prefixes registered for a marketplace.
    pub fn prefixes(&self, marketplace: Marketplace) -> &'static [&'static str] {
        self.rules
            .iter()
            .find(|r| r.marketplace == marketplace)
            .map(|r| r.prefixes)
            .unwrap_or(&[])
    }

    /// Whether `line` belongs to `marketplace`, honoring brand exclusions.
    pub fn accepts(&self, marketplace: Marketplace, line: &OrderLine) -> bool {
        let key = line.match_key();
        if !has_prefix(&key, self.prefixes(marketplace)) {
            return false;
        }

        let brand = line.brand.trim().to_uppercase();
        !self.exclusions.iter().any(|ex| {
            ex.marketplace == marketplace && ex.brand == brand && has_prefix(&key, ex.prefixes)
        })
    }

    /// All marketplaces a line belongs to.
    pub fn marketplaces_for<'a>(
        &'a self,
        line: &'a OrderLine,
    ) -> impl Iterator<Item = Marketplace> + 'a {
        self.rules
            .iter()
            .map(|r| r.marketplace)
            .filter(move |m| self.accepts(*m, line))
    }
}

fn has_prefix(key: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| key.starts_with(p))
}
