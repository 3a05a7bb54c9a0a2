use crate::models::{Item, Order};

// ============================================================================
// Order Validation
// ============================================================================
//
// The ingestion pipeline and the lookup service only need a pass/fail signal;
// the concrete field rules live behind the `OrderValidator` trait so tests
// can substitute their own.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("order_uid is missing")]
    MissingOrderUid,

    #[error("{0} is missing")]
    MissingField(&'static str),

    #[error("invalid sm_id")]
    InvalidSmId,

    #[error("delivery {0} is missing")]
    MissingDeliveryField(&'static str),

    #[error("payment {0} is missing")]
    MissingPaymentField(&'static str),

    #[error("payment {0} is invalid")]
    InvalidPaymentField(&'static str),

    #[error("items empty")]
    EmptyItems,

    #[error("item {name}: {reason}")]
    InvalidItem { name: String, reason: &'static str },
}

pub trait OrderValidator: Send + Sync {
    fn validate(&self, order: &Order) -> Result<(), ValidationError>;
}

/// Field-by-field rules for the order aggregate. An order must carry its
/// identifier, routing metadata, complete delivery and payment parts, and at
/// least one well-formed item.
pub struct RuleValidator;

impl OrderValidator for RuleValidator {
    fn validate(&self, order: &Order) -> Result<(), ValidationError> {
        if order.order_uid.is_empty() {
            return Err(ValidationError::MissingOrderUid);
        }
        if order.track_number.is_empty() {
            return Err(ValidationError::MissingField("track_number"));
        }
        if order.entry.is_empty() {
            return Err(ValidationError::MissingField("entry"));
        }
        if order.locale.is_empty() {
            return Err(ValidationError::MissingField("locale"));
        }
        if order.customer_id.is_empty() {
            return Err(ValidationError::MissingField("customer_id"));
        }
        if order.delivery_service.is_empty() {
            return Err(ValidationError::MissingField("delivery_service"));
        }
        if order.shardkey.is_empty() {
            return Err(ValidationError::MissingField("shardkey"));
        }
        if order.sm_id <= 0 {
            return Err(ValidationError::InvalidSmId);
        }

        let delivery = &order.delivery;
        if delivery.name.is_empty() {
            return Err(ValidationError::MissingDeliveryField("name"));
        }
        if delivery.phone.is_empty() {
            return Err(ValidationError::MissingDeliveryField("phone"));
        }
        if delivery.zip.is_empty() {
            return Err(ValidationError::MissingDeliveryField("zip"));
        }
        if delivery.city.is_empty() {
            return Err(ValidationError::MissingDeliveryField("city"));
        }
        if delivery.address.is_empty() {
            return Err(ValidationError::MissingDeliveryField("address"));
        }
        if delivery.region.is_empty() {
            return Err(ValidationError::MissingDeliveryField("region"));
        }
        if delivery.email.is_empty() {
            return Err(ValidationError::MissingDeliveryField("email"));
        }

        let payment = &order.payment;
        if payment.transaction.is_empty() {
            return Err(ValidationError::MissingPaymentField("transaction"));
        }
        if payment.request_id.is_empty() {
            return Err(ValidationError::MissingPaymentField("request_id"));
        }
        if payment.currency.is_empty() {
            return Err(ValidationError::MissingPaymentField("currency"));
        }
        if payment.provider.is_empty() {
            return Err(ValidationError::MissingPaymentField("provider"));
        }
        if payment.bank.is_empty() {
            return Err(ValidationError::MissingPaymentField("bank"));
        }
        if payment.amount <= 0 {
            return Err(ValidationError::InvalidPaymentField("amount"));
        }
        if payment.delivery_cost < 0 {
            return Err(ValidationError::InvalidPaymentField("delivery_cost"));
        }
        if payment.goods_total <= 0 {
            return Err(ValidationError::InvalidPaymentField("goods_total"));
        }

        if order.items.is_empty() {
            return Err(ValidationError::EmptyItems);
        }
        for item in &order.items {
            validate_item(item)?;
        }

        Ok(())
    }
}

fn validate_item(item: &Item) -> Result<(), ValidationError> {
    let fail = |reason| ValidationError::InvalidItem {
        name: item.name.clone(),
        reason,
    };
    if item.name.is_empty() {
        return Err(fail("name is missing"));
    }
    if item.chrt_id <= 0 {
        return Err(fail("chrt_id is invalid"));
    }
    if item.track_number.is_empty() {
        return Err(fail("track_number is missing"));
    }
    if item.rid.is_empty() {
        return Err(fail("rid is missing"));
    }
    if item.nm_id <= 0 {
        return Err(fail("nm_id is invalid"));
    }
    if item.price < 0 {
        return Err(fail("price is invalid"));
    }
    if item.sale < 0 {
        return Err(fail("sale is invalid"));
    }
    if item.total_price < 0 {
        return Err(fail("total_price is invalid"));
    }
    if item.status < 0 {
        return Err(fail("status is invalid"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::valid_order;
    use crate::models::Order;

    fn mutated(mutate: impl FnOnce(&mut Order)) -> Order {
        let mut order = valid_order("validator-test");
        mutate(&mut order);
        order
    }

    #[test]
    fn accepts_a_complete_order() {
        assert_eq!(RuleValidator.validate(&valid_order("ok")), Ok(()));
    }

    #[test]
    fn rejects_incomplete_orders_with_the_right_reason() {
        let cases: Vec<(Order, ValidationError)> = vec![
            (
                mutated(|o| o.order_uid.clear()),
                ValidationError::MissingOrderUid,
            ),
            (
                mutated(|o| o.track_number.clear()),
                ValidationError::MissingField("track_number"),
            ),
            (
                mutated(|o| o.entry.clear()),
                ValidationError::MissingField("entry"),
            ),
            (
                mutated(|o| o.locale.clear()),
                ValidationError::MissingField("locale"),
            ),
            (
                mutated(|o| o.customer_id.clear()),
                ValidationError::MissingField("customer_id"),
            ),
            (
                mutated(|o| o.delivery_service.clear()),
                ValidationError::MissingField("delivery_service"),
            ),
            (
                mutated(|o| o.shardkey.clear()),
                ValidationError::MissingField("shardkey"),
            ),
            (mutated(|o| o.sm_id = 0), ValidationError::InvalidSmId),
            (
                mutated(|o| o.delivery.phone.clear()),
                ValidationError::MissingDeliveryField("phone"),
            ),
            (
                mutated(|o| o.delivery.email.clear()),
                ValidationError::MissingDeliveryField("email"),
            ),
            (
                mutated(|o| o.payment.transaction.clear()),
                ValidationError::MissingPaymentField("transaction"),
            ),
            (
                mutated(|o| o.payment.amount = 0),
                ValidationError::InvalidPaymentField("amount"),
            ),
            (
                mutated(|o| o.payment.delivery_cost = -1),
                ValidationError::InvalidPaymentField("delivery_cost"),
            ),
            (
                mutated(|o| o.items.clear()),
                ValidationError::EmptyItems,
            ),
        ];

        for (order, want) in cases {
            assert_eq!(RuleValidator.validate(&order), Err(want));
        }
    }

    #[test]
    fn rejects_broken_items() {
        let order = mutated(|o| o.items[0].chrt_id = 0);
        let err = RuleValidator.validate(&order).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidItem { .. }));

        let order = mutated(|o| o.items[0].price = -5);
        let err = RuleValidator.validate(&order).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidItem { reason: "price is invalid", .. }
        ));
    }
}
