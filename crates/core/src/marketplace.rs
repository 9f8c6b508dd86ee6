//! The fixed set of marketplaces that orders are dispatched to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A sales channel with its own order-token convention and automation job.
///
/// Variant order is the canonical job order used when reporting selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Desty,
    Ginee,
    Lazada,
    Shopee,
    Tiktok,
    Jubelio,
}

impl Marketplace {
    /// All marketplaces in canonical order.
    pub const ALL: [Marketplace; 6] = [
        Marketplace::Desty,
        Marketplace::Ginee,
        Marketplace::Lazada,
        Marketplace::Shopee,
        Marketplace::Tiktok,
        Marketplace::Jubelio,
    ];

    /// Display name, as shown to operators.
    pub fn name(&self) -> &'static str {
        match self {
            Marketplace::Desty => "Desty",
            Marketplace::Ginee => "Ginee",
            Marketplace::Lazada => "Lazada",
            Marketplace::Shopee => "Shopee",
            Marketplace::Tiktok => "Tiktok",
            Marketplace::Jubelio => "Jubelio",
        }
    }

    /// Lowercase key used in configuration and URLs.
    pub fn key(&self) -> &'static str {
        match self {
            Marketplace::Desty => "desty",
            Marketplace::Ginee => "ginee",
            Marketplace::Lazada => "lazada",
            Marketplace::Shopee => "shopee",
            Marketplace::Tiktok => "tiktok",
            Marketplace::Jubelio => "jubelio",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown marketplace name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown marketplace: {0}")]
pub struct UnknownMarketplace(pub String);

impl FromStr for Marketplace {
    type Err = UnknownMarketplace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Marketplace::ALL
            .into_iter()
            .find(|m| m.key() == lowered)
            .ok_or_else(|| UnknownMarketplace(s.to_string()))
    }
}
