//! ============================================================================
//! Order Totals - Aggregate placed trinkets into order lines
//! ============================================================================

use std::collections::HashMap;

use crate::types::{OrderItem, OrderSummary, SlotMap, Trinket};

/// Spending budget shown alongside checkout
pub const MAX_BUDGET: f64 = 100.0;

/// Placed stickers needed before checkout unlocks
pub const CHECKOUT_UNLOCK_COUNT: usize = 3;

/// Count placed trinkets per id, in order of first appearance by slot index
pub fn order_items(slots: &SlotMap) -> Vec<OrderItem> {
    let mut items: Vec<OrderItem> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (_, id) in slots.occupied() {
        match positions.get(id) {
            Some(&pos) => items[pos].qty += 1,
            None => {
                positions.insert(id, items.len());
                items.push(OrderItem {
                    id: id.to_string(),
                    qty: 1,
                });
            }
        }
    }
    items
}

/// Order lines and total. Unknown ids are priced at 0.
pub fn derive_totals<'a>(
    slots: &SlotMap,
    lookup: impl Fn(&str) -> Option<&'a Trinket>,
    case_price: f64,
) -> OrderSummary {
    let items = order_items(slots);
    let trinkets: f64 = items
        .iter()
        .map(|item| lookup(&item.id).map_or(0.0, |t| t.price) * f64::from(item.qty))
        .sum();
    OrderSummary {
        placed_count: slots.placed_count(),
        total: round2(case_price + trinkets),
        items,
    }
}

/// Round to cents
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn checkout_unlocked(placed_count: usize) -> bool {
    placed_count >= CHECKOUT_UNLOCK_COUNT
}
