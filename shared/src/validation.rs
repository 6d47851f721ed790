//! Movement validation rules
//!
//! Pure checks run before any storage mutation. Every function here is
//! side-effect free: callers supply product existence and current stock
//! through closures, so the same rules apply to pre-flight checks and to
//! the re-check performed inside an open unit of work.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{InboundRequest, LineItem, OutboundRequest, TransferRequest};
use crate::types::ProductId;

/// Why a movement request was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MovementRejection {
    #[error("At least one line item is required")]
    EmptyItems,

    #[error("Line {line}: quantity {quantity} for Product ID {product_id} must be a positive integer")]
    NonPositiveQuantity {
        line: usize,
        product_id: ProductId,
        quantity: i64,
    },

    #[error("Line {line}: unit amount for Product ID {product_id} cannot be negative")]
    NegativeAmount { line: usize, product_id: ProductId },

    #[error("Line {line}: total quantity for Product ID {product_id} is too large")]
    QuantityOverflow { line: usize, product_id: ProductId },

    #[error("Line {line}: Product ID {product_id} not found")]
    UnknownProduct { line: usize, product_id: ProductId },

    #[error("Transfer quantity {0} must be a positive integer")]
    NonPositiveTransfer(i64),

    #[error("Source and destination warehouse must differ")]
    SameWarehouse,

    #[error("Insufficient stock for Product ID {product_id}. Available: {available}")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },
}

impl MovementRejection {
    /// Request field the rejection points at
    pub fn field(&self) -> &'static str {
        match self {
            MovementRejection::EmptyItems => "items",
            MovementRejection::NonPositiveQuantity { .. } => "items.quantity",
            MovementRejection::NegativeAmount { .. } => "items.unit_amount",
            MovementRejection::QuantityOverflow { .. } => "items.quantity",
            MovementRejection::UnknownProduct { .. } => "items.product_id",
            MovementRejection::NonPositiveTransfer(_) => "quantity",
            MovementRejection::SameWarehouse => "to_warehouse_id",
            MovementRejection::InsufficientStock { .. } => "items.quantity",
        }
    }

    pub fn is_insufficient_stock(&self) -> bool {
        matches!(self, MovementRejection::InsufficientStock { .. })
    }
}

/// Shape checks shared by inbound and outbound line lists.
///
/// Lines are numbered from 1 in error messages. Per-product totals must
/// fit in an `i64`.
pub fn validate_lines(
    items: &[LineItem],
    is_known: impl Fn(ProductId) -> bool,
) -> Result<(), MovementRejection> {
    if items.is_empty() {
        return Err(MovementRejection::EmptyItems);
    }

    for (idx, item) in items.iter().enumerate() {
        let line = idx + 1;
        if item.quantity <= 0 {
            return Err(MovementRejection::NonPositiveQuantity {
                line,
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }
        if matches!(item.unit_amount, Some(amount) if amount < Decimal::ZERO) {
            return Err(MovementRejection::NegativeAmount {
                line,
                product_id: item.product_id,
            });
        }
        if !is_known(item.product_id) {
            return Err(MovementRejection::UnknownProduct {
                line,
                product_id: item.product_id,
            });
        }
    }

    requested_totals(items).map(|_| ())
}

/// Validate an inbound receipt
pub fn validate_inbound(
    request: &InboundRequest,
    is_known: impl Fn(ProductId) -> bool,
) -> Result<(), MovementRejection> {
    validate_lines(&request.items, is_known)
}

/// Validate an outbound shipment against current stock.
///
/// Lines naming the same product are checked against their running total,
/// so two lines of 30 against 50 units fail on the second line.
pub fn validate_outbound(
    request: &OutboundRequest,
    is_known: impl Fn(ProductId) -> bool,
    available: impl Fn(ProductId) -> i64,
) -> Result<(), MovementRejection> {
    validate_lines(&request.items, is_known)?;

    let mut running: Vec<(ProductId, i64)> = Vec::new();
    for (idx, item) in request.items.iter().enumerate() {
        let requested = match running.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, total)) => {
                *total = add_line(*total, idx + 1, item)?;
                *total
            }
            None => {
                running.push((item.product_id, item.quantity));
                item.quantity
            }
        };
        ensure_available(item.product_id, available(item.product_id), requested)?;
    }

    Ok(())
}

/// Transfer checks that need no stock information
pub fn validate_transfer_shape(request: &TransferRequest) -> Result<(), MovementRejection> {
    if request.from_warehouse_id == request.to_warehouse_id {
        return Err(MovementRejection::SameWarehouse);
    }
    if request.quantity <= 0 {
        return Err(MovementRejection::NonPositiveTransfer(request.quantity));
    }
    Ok(())
}

/// Validate a transfer request and the source warehouse's stock
pub fn validate_transfer(
    request: &TransferRequest,
    source_available: i64,
) -> Result<(), MovementRejection> {
    validate_transfer_shape(request)?;
    ensure_available(request.product_id, source_available, request.quantity)
}

/// Fail when `requested` exceeds `available`
pub fn ensure_available(
    product_id: ProductId,
    available: i64,
    requested: i64,
) -> Result<(), MovementRejection> {
    if available < requested {
        return Err(MovementRejection::InsufficientStock {
            product_id,
            available,
            requested,
        });
    }
    Ok(())
}

/// Total requested quantity per product, in first-seen order
pub fn requested_totals(items: &[LineItem]) -> Result<Vec<(ProductId, i64)>, MovementRejection> {
    let mut totals: Vec<(ProductId, i64)> = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        match totals.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, total)) => *total = add_line(*total, idx + 1, item)?,
            None => totals.push((item.product_id, item.quantity)),
        }
    }
    Ok(totals)
}

fn add_line(total: i64, line: usize, item: &LineItem) -> Result<i64, MovementRejection> {
    total
        .checked_add(item.quantity)
        .ok_or(MovementRejection::QuantityOverflow {
            line,
            product_id: item.product_id,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn outbound(items: Vec<LineItem>) -> OutboundRequest {
        OutboundRequest {
            warehouse_id: 1,
            customer_id: None,
            reference: "SO-1".to_string(),
            date: None,
            document_url: None,
            items,
        }
    }

    fn inbound(items: Vec<LineItem>) -> InboundRequest {
        InboundRequest {
            warehouse_id: 1,
            supplier_id: None,
            reference: "PO-1".to_string(),
            date: None,
            items,
        }
    }

    #[test]
    fn test_empty_items_rejected() {
        let err = validate_inbound(&inbound(vec![]), |_| true).unwrap_err();
        assert_eq!(err, MovementRejection::EmptyItems);
        assert_eq!(err.field(), "items");
    }

    #[test]
    fn test_zero_and_negative_quantities_rejected() {
        let err = validate_inbound(&inbound(vec![LineItem::new(1, 5), LineItem::new(2, 0)]), |_| true)
            .unwrap_err();
        assert_eq!(
            err,
            MovementRejection::NonPositiveQuantity { line: 2, product_id: 2, quantity: 0 }
        );

        let err = validate_inbound(&inbound(vec![LineItem::new(1, -3)]), |_| true).unwrap_err();
        assert!(matches!(err, MovementRejection::NonPositiveQuantity { line: 1, .. }));
    }

    #[test]
    fn test_negative_cost_rejected_zero_cost_allowed() {
        let ok = inbound(vec![LineItem::new(1, 5).with_unit_amount(Decimal::ZERO)]);
        assert!(validate_inbound(&ok, |_| true).is_ok());

        let bad = inbound(vec![LineItem::new(1, 5).with_unit_amount(Decimal::new(-1, 2))]);
        assert_eq!(
            validate_inbound(&bad, |_| true).unwrap_err(),
            MovementRejection::NegativeAmount { line: 1, product_id: 1 }
        );
    }

    #[test]
    fn test_unknown_product_names_line() {
        let req = inbound(vec![LineItem::new(1, 5), LineItem::new(99, 1)]);
        let err = validate_inbound(&req, |id| id == 1).unwrap_err();
        assert_eq!(err, MovementRejection::UnknownProduct { line: 2, product_id: 99 });
    }

    #[test]
    fn test_outbound_fails_fast_on_first_short_line() {
        let stock: HashMap<ProductId, i64> = [(1, 10), (2, 3)].into_iter().collect();
        let req = outbound(vec![LineItem::new(1, 10), LineItem::new(2, 4)]);
        let err = validate_outbound(&req, |_| true, |id| stock.get(&id).copied().unwrap_or(0))
            .unwrap_err();
        assert_eq!(
            err,
            MovementRejection::InsufficientStock { product_id: 2, available: 3, requested: 4 }
        );
        assert_eq!(err.to_string(), "Insufficient stock for Product ID 2. Available: 3");
    }

    #[test]
    fn test_outbound_repeated_product_uses_running_total() {
        let req = outbound(vec![LineItem::new(1, 30), LineItem::new(1, 30)]);
        let err = validate_outbound(&req, |_| true, |_| 50).unwrap_err();
        assert_eq!(
            err,
            MovementRejection::InsufficientStock { product_id: 1, available: 50, requested: 60 }
        );
    }

    #[test]
    fn test_transfer_rules() {
        let same = TransferRequest { product_id: 1, from_warehouse_id: 2, to_warehouse_id: 2, quantity: 1 };
        assert_eq!(validate_transfer(&same, 10).unwrap_err(), MovementRejection::SameWarehouse);

        let zero = TransferRequest { product_id: 1, from_warehouse_id: 1, to_warehouse_id: 2, quantity: 0 };
        assert_eq!(validate_transfer(&zero, 10).unwrap_err(), MovementRejection::NonPositiveTransfer(0));

        let ok = TransferRequest { quantity: 10, ..zero.clone() };
        assert!(validate_transfer(&ok, 10).is_ok());

        let short = TransferRequest { quantity: 11, ..zero };
        assert!(validate_transfer(&short, 10).unwrap_err().is_insufficient_stock());
    }

    #[test]
    fn test_requested_totals_preserves_first_seen_order() {
        let items = vec![LineItem::new(7, 1), LineItem::new(3, 2), LineItem::new(7, 4)];
        assert_eq!(requested_totals(&items).unwrap(), vec![(7, 5), (3, 2)]);
    }

    #[test]
    fn test_line_totals_that_overflow_are_rejected() {
        let req = inbound(vec![LineItem::new(1, i64::MAX), LineItem::new(2, 1), LineItem::new(1, 1)]);
        let err = validate_inbound(&req, |_| true).unwrap_err();
        assert_eq!(err, MovementRejection::QuantityOverflow { line: 3, product_id: 1 });
        assert_eq!(err.field(), "items.quantity");

        let single = inbound(vec![LineItem::new(1, i64::MAX)]);
        assert!(validate_inbound(&single, |_| true).is_ok());

        let req = outbound(vec![LineItem::new(1, i64::MAX), LineItem::new(1, i64::MAX)]);
        let err = validate_outbound(&req, |_| true, |_| i64::MAX).unwrap_err();
        assert_eq!(err, MovementRejection::QuantityOverflow { line: 2, product_id: 1 });
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// An outbound passes exactly when every product's total fits its stock
        #[test]
        fn prop_outbound_accepted_iff_totals_fit(
            lines in prop::collection::vec((1i64..=4, 1i64..=20), 1..8),
            stock in prop::collection::vec(0i64..=40, 4)
        ) {
            let items: Vec<LineItem> = lines.iter().map(|(p, q)| LineItem::new(*p, *q)).collect();
            let available = |id: ProductId| stock[(id - 1) as usize];
            let fits = requested_totals(&items)
                .unwrap()
                .iter()
                .all(|(id, total)| *total <= available(*id));

            let result = validate_outbound(&outbound(items), |_| true, available);
            prop_assert_eq!(result.is_ok(), fits);
        }
    }
}
