//! Pure inventory rules. No IO here; everything is deterministic over the
//! models in [`crate::structs`], so the dashboard and update handlers stay
//! trivially testable.

use std::str::FromStr;

use serde::Serialize;

use crate::structs::InventoryItem;

/// Quantity change applied on top of an edit. The form speaks "add" and
/// "delete"; "delete" removes stock, it does not delete the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustAction {
    Add,
    Remove,
}

impl FromStr for AdjustAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(AdjustAction::Add),
            "delete" => Ok(AdjustAction::Remove),
            other => Err(format!("Unknown action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockSummary {
    pub count: usize,
    pub ids: Vec<i64>,
}

pub fn is_low(item: &InventoryItem, threshold: i64) -> bool {
    item.quantity <= threshold
}

pub fn low_stock_summary(items: &[InventoryItem], threshold: i64) -> LowStockSummary {
    let ids: Vec<i64> = items
        .iter()
        .filter(|item| is_low(item, threshold))
        .map(|item| item.id)
        .collect();
    LowStockSummary {
        count: ids.len(),
        ids,
    }
}

/// Dashboard banner text. None at count zero; singular at exactly one.
pub fn low_stock_message(summary: &LowStockSummary) -> Option<String> {
    match summary.count {
        0 => None,
        1 => Some("1 item has low inventory".to_owned()),
        n => Some(format!("{n} items have low inventory")),
    }
}

/// Apply an add/remove delta to the item's quantity. Subtraction is
/// unchecked: removing more than is on hand drives the quantity negative,
/// which the store accepts (known limitation, see DESIGN.md).
pub fn apply_adjustment(mut item: InventoryItem, action: AdjustAction, delta: i64) -> InventoryItem {
    match action {
        AdjustAction::Add => item.quantity += delta,
        AdjustAction::Remove => item.quantity -= delta,
    }
    item
}
