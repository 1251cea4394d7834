//! Stock deltas for the line-item lifecycle.
//!
//! Every create, update, or delete of an invoice line item translates into
//! one or two ledger adjustments so that a product's stock stays consistent
//! with the quantities reserved by the items referencing it. The translation
//! is pure; applying the adjustments (and rolling them back together) is the
//! database layer's job.

use uuid::Uuid;

pub const REASON_ITEM_CREATED: &str = "invoice item created";
pub const REASON_ITEM_UPDATED: &str = "invoice item updated";
pub const REASON_ITEM_PRODUCT_CHANGED: &str = "invoice item product changed";
pub const REASON_ITEM_REMOVED: &str = "invoice item removed";

/// One pending ledger adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDelta {
    pub product_id: Uuid,
    pub adjustment: i32,
    pub reason: &'static str,
}

/// Translate a line-item transition into ledger adjustments.
///
/// `old` is the persisted prior state (product id, quantity), read before the
/// new values are written; `new` is the state about to be committed. A swap
/// releases the old product's reservation before taking from the new one,
/// and both adjustments must land in the same transaction. An update that
/// changes nothing produces no adjustment and therefore no ledger row.
pub fn line_item_deltas(old: Option<(Uuid, i32)>, new: Option<(Uuid, i32)>) -> Vec<StockDelta> {
    match (old, new) {
        (None, Some((product_id, quantity))) => vec![StockDelta {
            product_id,
            adjustment: -quantity,
            reason: REASON_ITEM_CREATED,
        }],
        (Some((product_id, quantity)), None) => vec![StockDelta {
            product_id,
            adjustment: quantity,
            reason: REASON_ITEM_REMOVED,
        }],
        (Some((old_product, old_quantity)), Some((new_product, new_quantity))) => {
            if old_product == new_product {
                let diff = new_quantity - old_quantity;
                if diff == 0 {
                    return Vec::new();
                }
                vec![StockDelta {
                    product_id: new_product,
                    adjustment: -diff,
                    reason: REASON_ITEM_UPDATED,
                }]
            } else {
                vec![
                    StockDelta {
                        product_id: old_product,
                        adjustment: old_quantity,
                        reason: REASON_ITEM_PRODUCT_CHANGED,
                    },
                    StockDelta {
                        product_id: new_product,
                        adjustment: -new_quantity,
                        reason: REASON_ITEM_PRODUCT_CHANGED,
                    },
                ]
            }
        }
        (None, None) => Vec::new(),
    }
}
