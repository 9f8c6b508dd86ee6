//! Routes classified orders to per-brand working folders.
//!
//! For each brand the router finds a subfolder of the marketplace's base
//! directory and writes the brand's order tokens to `orderlist.txt` there.
//! A folder counts as updated only when its order list actually changed;
//! only updated folders get an automation job.

mod brand;
mod orderlist;

pub use brand::BrandNormalizer;
pub use orderlist::{orderlist_path, render, write_if_changed, ORDERLIST_FILE};
pub(crate) use orderlist::write_atomic;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classifier::OrderLine;
use crate::marketplace::Marketplace;
use crate::metrics::ORDERLIST_WRITES;

/// Errors that stop routing for a whole marketplace.
#[derive(Debug, Error)]
pub enum RouteError {
    /// No base directory is configured for the marketplace.
    #[error("no base directory configured for {0}")]
    NoBaseDir(Marketplace),

    /// The base directory could not be listed.
    #[error("cannot read base directory {path}: {source}")]
    BaseDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A folder whose order list was rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatedFolder {
    pub marketplace: Marketplace,
    pub folder: PathBuf,
    /// Brands whose orders landed in this folder, in first-seen order.
    pub brands: Vec<String>,
    pub order_count: usize,
}

impl UpdatedFolder {
    /// Short folder name used to tag job output.
    pub fn label(&self) -> String {
        self.folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.folder.display().to_string())
    }
}

/// A brand with no matching folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedBrand {
    pub brand: String,
    pub normalized: String,
}

/// A folder whose order list could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedWrite {
    pub folder: PathBuf,
    pub error: String,
}

/// Everything one `route` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteOutcome {
    pub updated: Vec<UpdatedFolder>,
    pub unchanged: Vec<PathBuf>,
    pub unmatched: Vec<UnmatchedBrand>,
    pub failed: Vec<FailedWrite>,
}

/// Resolves brands to folders and maintains their order lists.
#[derive(Debug, Clone, Default)]
pub struct OrderRouter {
    base_dirs: BTreeMap<Marketplace, PathBuf>,
}

impl OrderRouter {
    pub fn new(base_dirs: BTreeMap<Marketplace, PathBuf>) -> Self {
        Self { base_dirs }
    }

    pub fn base_dir(&self, marketplace: Marketplace) -> Option<&Path> {
        self.base_dirs.get(&marketplace).map(PathBuf::as_path)
    }

    /// Route one marketplace's orders.
    ///
    /// Orders are grouped by trimmed brand. Brands that resolve to the same
    /// folder share one order list. Missing folders and failed writes are
    /// recorded in the outcome and do not stop other brands.
    pub fn route(
        &self,
        marketplace: Marketplace,
        orders: &[OrderLine],
    ) -> Result<RouteOutcome, RouteError> {
        let base_dir = self
            .base_dir(marketplace)
            .ok_or(RouteError::NoBaseDir(marketplace))?;
        let folders = list_folders(base_dir)?;
        let normalizer = BrandNormalizer::for_marketplace(marketplace);

        let mut outcome = RouteOutcome::default();
        let mut by_folder: Vec<(PathBuf, Vec<String>, Vec<String>)> = Vec::new();
        let mut folder_index: HashMap<PathBuf, usize> = HashMap::new();

        for (brand, tokens) in group_by_brand(orders) {
            let normalized = normalizer.normalize(&brand);
            let Some(folder) = find_folder(&folders, &normalized) else {
                warn!(%marketplace, brand = %brand, normalized = %normalized, "No folder matches brand");
                outcome.unmatched.push(UnmatchedBrand { brand, normalized });
                continue;
            };

            debug!(%marketplace, brand = %brand, folder = %folder.display(), "Resolved brand folder");
            match folder_index.get(&folder) {
                Some(&idx) => {
                    by_folder[idx].1.push(brand);
                    by_folder[idx].2.extend(tokens);
                }
                None => {
                    folder_index.insert(folder.clone(), by_folder.len());
                    by_folder.push((folder, vec![brand], tokens));
                }
            }
        }

        for (folder, brands, tokens) in by_folder {
            let content = render(&tokens);
            match write_if_changed(&folder, &content) {
                Ok(true) => {
                    ORDERLIST_WRITES
                        .with_label_values(&[marketplace.key()])
                        .inc();
                    info!(%marketplace, folder = %folder.display(), orders = tokens.len(), "Order list updated");
                    outcome.updated.push(UpdatedFolder {
                        marketplace,
                        folder,
                        brands,
                        order_count: tokens.len(),
                    });
                }
                Ok(false) => {
                    debug!(%marketplace, folder = %folder.display(), "Order list unchanged");
                    outcome.unchanged.push(folder);
                }
                Err(e) => {
                    warn!(%marketplace, folder = %folder.display(), error = %e, "Failed to write order list");
                    outcome.failed.push(FailedWrite {
                        folder,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }
}

/// Group tokens by trimmed brand, keeping first-seen order for both.
fn group_by_brand(orders: &[OrderLine]) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for order in orders {
        let brand = order.brand.trim().to_string();
        let token = order.token.trim().to_string();
        match index.get(&brand) {
            Some(&idx) => groups[idx].1.push(token),
            None => {
                index.insert(brand.clone(), groups.len());
                groups.push((brand, vec![token]));
            }
        }
    }

    groups
}

/// Subfolders of `base_dir`, sorted by name.
fn list_folders(base_dir: &Path) -> Result<Vec<(String, PathBuf)>, RouteError> {
    let unreadable = |source| RouteError::BaseDirUnreadable {
        path: base_dir.to_path_buf(),
        source,
    };

    let mut folders = Vec::new();
    for entry in std::fs::read_dir(base_dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        if path.is_dir() {
            folders.push((entry.file_name().to_string_lossy().to_lowercase(), path));
        }
    }
    folders.sort();
    Ok(folders)
}

/// First folder whose lower-cased name contains the normalized brand.
fn find_folder(folders: &[(String, PathBuf)], normalized: &str) -> Option<PathBuf> {
    if normalized.is_empty() {
        return None;
    }
    let needle = normalized.to_lowercase();
    folders
        .iter()
        .find(|(name, _)| name.contains(&needle))
        .map(|(_, path)| path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(folders: &[&str]) -> (TempDir, OrderRouter) {
        let dir = TempDir::new().unwrap();
        for name in folders {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        let mut base_dirs = BTreeMap::new();
        base_dirs.insert(Marketplace::Desty, dir.path().to_path_buf());
        base_dirs.insert(Marketplace::Ginee, dir.path().to_path_buf());
        (dir, OrderRouter::new(base_dirs))
    }

    #[test]
    fn test_route_is_idempotent() {
        let (dir, router) = setup(&["Desty Histoire", "Desty Luxcrime"]);
        let orders = vec![
            OrderLine::new("Histoire Naturelle ID", "DST-1"),
            OrderLine::new("Luxcrime Official Store", "DST-2"),
            OrderLine::new("Histoire Naturelle ID", "DST-3"),
        ];

        let first = router.route(Marketplace::Desty, &orders).unwrap();
        assert_eq!(first.updated.len(), 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("Desty Histoire").join(ORDERLIST_FILE))
                .unwrap(),
            "DST-1\nDST-3\n"
        );

        let second = router.route(Marketplace::Desty, &orders).unwrap();
        assert!(second.updated.is_empty());
        assert_eq!(second.unchanged.len(), 2);
    }

    #[test]
    fn test_unmatched_brand_does_not_stop_others() {
        let (_dir, router) = setup(&["acme store"]);
        let orders = vec![
            OrderLine::new("Nowhere Brand", "DST-1"),
            OrderLine::new("Acme", "DST-2"),
        ];

        let outcome = router.route(Marketplace::Desty, &orders).unwrap();
        assert_eq!(outcome.unmatched.len(), 1);
        assert_eq!(outcome.unmatched[0].brand, "Nowhere Brand");
        assert_eq!(outcome.updated.len(), 1);
        assert_eq!(outcome.updated[0].brands, vec!["Acme".to_string()]);
        assert_eq!(outcome.updated[0].label(), "acme store");
    }

    #[test]
    fn test_first_folder_in_name_order_wins() {
        let (dir, router) = setup(&["b-acme", "a-acme"]);
        let orders = vec![OrderLine::new("ACME", "DST-1")];

        let outcome = router.route(Marketplace::Desty, &orders).unwrap();
        assert_eq!(outcome.updated[0].folder, dir.path().join("a-acme"));
    }

    #[test]
    fn test_brands_sharing_a_folder_are_merged() {
        let (dir, router) = setup(&["LUXCRIME"]);
        let orders = vec![
            OrderLine::new("Luxcrime ID", "DST-1"),
            OrderLine::new("Luxcrime Official Shop", "DST-2"),
        ];

        let outcome = router.route(Marketplace::Desty, &orders).unwrap();
        assert_eq!(outcome.updated.len(), 1);
        assert_eq!(outcome.updated[0].order_count, 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("LUXCRIME").join(ORDERLIST_FILE)).unwrap(),
            "DST-1\nDST-2\n"
        );
    }

    #[test]
    fn test_account_normalizer_for_ginee() {
        let (_dir, router) = setup(&["ginee-acme"]);
        let orders = vec![OrderLine::new("EBLO-Acme-TTS", "123")];
        let outcome = router.route(Marketplace::Ginee, &orders).unwrap();
        assert_eq!(outcome.updated.len(), 1);
    }

    #[test]
    fn test_files_are_ignored_when_resolving() {
        let (dir, router) = setup(&[]);
        std::fs::write(dir.path().join("acme.txt"), "x").unwrap();
        let orders = vec![OrderLine::new("Acme", "DST-1")];
        let outcome = router.route(Marketplace::Desty, &orders).unwrap();
        assert_eq!(outcome.unmatched.len(), 1);
    }

    #[test]
    fn test_missing_base_dir() {
        let router = OrderRouter::new(BTreeMap::from([(
            Marketplace::Desty,
            PathBuf::from("/nonexistent/orderflow/base"),
        )]));
        let err = router
            .route(Marketplace::Desty, &[OrderLine::new("A", "DST-1")])
            .unwrap_err();
        assert!(matches!(err, RouteError::BaseDirUnreadable { .. }));

        let err = router
            .route(Marketplace::Shopee, &[OrderLine::new("A", "25")])
            .unwrap_err();
        assert!(matches!(err, RouteError::NoBaseDir(Marketplace::Shopee)));
    }
}
