//! Brand name normalization used to locate brand folders.

use crate::marketplace::Marketplace;

const STANDARD_OVERRIDES: &[(&str, &str)] = &[
    ("HISTOIRE NATURELLE ID", "HISTOIRE"),
    ("HISTOIRE NATURELLE INDONESIA", "HISTOIRE"),
    ("HISTOIRE NATURELLE OFFICIAL STORE", "HISTOIRE"),
    ("HISTOIRE NATURELLE STORE", "HISTOIRE"),
    ("LUXCRIME ID", "LUXCRIME"),
    ("LUXCRIME OFFICIAL STORE", "LUXCRIME"),
    ("LUXCRIME OFFICIAL SHOP", "LUXCRIME"),
    ("LUXCRIME_ID", "LUXCRIME"),
    ("SKIN GAME", "SKINGAME"),
    ("SKIN GAME OFFICIAL", "SKINGAME"),
    ("SKIN GAME OFFICIAL SHOP", "SKINGAME"),
    ("SOMBONG MENS CARE", "SOMBONG"),
    ("SOMBONG OFFICIAL STORE", "SOMBONG"),
    ("SOMBONG.ID", "SOMBONG"),
    ("DOMMA", "DOMMA"),
    ("WITH DOMMA", "DOMMA"),
];

const STANDARD_PREFIXES: &[&str] = &["OFFICIAL STORE "];

const STANDARD_SUFFIXES: &[&str] = &[
    " ID",
    " OFFICIAL STORE",
    " OFFICIAL SHOP",
    " OFFICIAL",
    " SHOP",
    " STORE",
    " INDONESIA",
    " MENS CARE",
];

const ACCOUNT_PREFIXES: &[&str] = &["EBLO-"];

const ACCOUNT_SUFFIXES: &[&str] = &["-TTS"];

/// Turns a free-form brand name into the key matched against folder names.
#[derive(Debug, Clone, Copy)]
pub struct BrandNormalizer {
    overrides: &'static [(&'static str, &'static str)],
    prefixes: &'static [&'static str],
    suffixes: &'static [&'static str],
}

impl BrandNormalizer {
    /// Alias table plus storefront suffix stripping.
    pub fn standard() -> Self {
        Self {
            overrides: STANDARD_OVERRIDES,
            prefixes: STANDARD_PREFIXES,
            suffixes: STANDARD_SUFFIXES,
        }
    }

    /// Account-style names such as `EBLO-BRAND-TTS`.
    pub fn account() -> Self {
        Self {
            overrides: &[],
            prefixes: ACCOUNT_PREFIXES,
            suffixes: ACCOUNT_SUFFIXES,
        }
    }

    pub fn for_marketplace(marketplace: Marketplace) -> Self {
        match marketplace {
            Marketplace::Ginee | Marketplace::Jubelio => Self::account(),
            _ => Self::standard(),
        }
    }

    pub fn normalize(&self, brand: &str) -> String {
        let mut name = collapse_whitespace(brand).to_uppercase();

        if let Some((_, mapped)) = self.overrides.iter().find(|(alias, _)| *alias == name) {
            return (*mapped).to_string();
        }

        for prefix in self.prefixes {
            if let Some(rest) = name.strip_prefix(prefix) {
                name = rest.trim().to_string();
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for suffix in self.suffixes {
                if let Some(rest) = name.strip_suffix(suffix) {
                    name = rest.trim().to_string();
                    changed = true;
                    break;
                }
            }
        }

        collapse_whitespace(&name)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
