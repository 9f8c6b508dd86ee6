//! Per-marketplace selection and token rewriting before routing.

use crate::classifier::{OrderLine, RuleTable};
use crate::config::MarketplaceSettings;
use crate::entity_cache::EntityIdCache;
use crate::marketplace::Marketplace;

/// Orders ready to route for one marketplace, plus operator notes.
#[derive(Debug, Default)]
pub(crate) struct PreparedOrders {
    pub orders: Vec<OrderLine>,
    pub notes: Vec<String>,
}

/// Select the lines that belong to `settings.marketplace` and rewrite
/// their tokens into what that marketplace's automation expects.
pub(crate) fn prepare(
    settings: &MarketplaceSettings,
    lines: &[OrderLine],
    rules: &RuleTable,
    cache: &EntityIdCache,
) -> PreparedOrders {
    let marketplace = settings.marketplace;
    let mut orders: Vec<OrderLine> = lines
        .iter()
        .filter(|line| rules.accepts(marketplace, line))
        .cloned()
        .collect();
    let mut notes = Vec::new();

    if marketplace == Marketplace::Ginee {
        for order in &mut orders {
            order.token = strip_ginee_prefix(&order.token).to_string();
        }
    }

    if settings.entity_lookup && !orders.is_empty() {
        notes.push(format!(
            "[*] Processing {} {} orders with entity id lookup",
            orders.len(),
            marketplace
        ));
        let ids: Vec<String> = orders.iter().map(|o| o.token.clone()).collect();
        let report = cache.lookup_with_report(&ids);
        if let Some(warning) = &report.warning {
            notes.push(format!("[!] WARNING: {warning}"));
        }
        notes.push(format!("[OK] {}", report.summary()));
        for order in &mut orders {
            if let Some(entity_id) = report.mapping.get(&order.token) {
                order.token = entity_id.clone();
            }
        }
    }

    PreparedOrders { orders, notes }
}

/// Ginee automation takes the numeric part only.
fn strip_ginee_prefix(token: &str) -> &str {
    let upper = token.to_ascii_uppercase();
    let rest = if upper.starts_with("GN-") {
        &token[3..]
    } else if upper.starts_with("GN") {
        &token[2..]
    } else {
        token
    };
    rest.trim()
}
