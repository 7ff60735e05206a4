//! Wire types for the order-creation endpoint.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{IdempotencyKey, MerchantId, OrderId, ProductId};
use crate::error::{FoodCartError, Result};

/// Where the order should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLocation {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// One line of an order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Product identifier.
    #[serde(rename = "item")]
    pub product_id: ProductId,
    /// Number of units.
    #[serde(rename = "count")]
    pub quantity: u32,
    /// Display name, echoed for receipts.
    pub name: String,
}

/// Order-creation request built from a cart snapshot at submit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Key the backend uses to collapse duplicate submissions.
    pub idempotency_key: IdempotencyKey,
    /// Merchant (branch) the order is placed with.
    #[serde(rename = "branch")]
    pub merchant_id: MerchantId,
    /// Ordered lines.
    pub items: Vec<OrderLine>,
    /// Total the client computed from its snapshot.
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    /// Delivery location, when the customer picked one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_location: Option<DeliveryLocation>,
    /// Normalized coupon code applied to the cart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

/// Order the backend created (or had already created for the same key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    /// Backend order identifier.
    #[serde(rename = "_id")]
    pub id: OrderId,
    /// Total as computed by the backend, if it reports one.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub total_price: Option<Decimal>,
}

/// Response envelope: `{ success, data }` or `{ success: false, error }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEnvelope {
    /// Whether the backend accepted the request.
    pub success: bool,
    /// Created order, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<OrderConfirmation>,
    /// Human-readable reason, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrderEnvelope {
    /// Wraps a successful confirmation.
    #[inline]
    #[must_use]
    pub const fn accepted(order: OrderConfirmation) -> Self {
        Self {
            success: true,
            data: Some(order),
            error: None,
        }
    }

    /// Wraps a business rejection.
    #[inline]
    #[must_use]
    pub fn rejected<T: Into<String>>(message: T) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Converts the envelope into the confirmation or a typed error.
    ///
    /// # Errors
    ///
    /// Returns [`FoodCartError::Rejected`] when `success` is `false`, and
    /// [`FoodCartError::Api`] when a success envelope carries no order.
    #[inline]
    pub fn into_result(self, status: u16) -> Result<OrderConfirmation> {
        match (self.success, self.data) {
            (true, Some(order)) => Ok(order),
            (true, None) => Err(FoodCartError::Api {
                status,
                message: "success response without order data".to_owned(),
            }),
            (false, _) => Err(FoodCartError::Rejected {
                message: self
                    .error
                    .unwrap_or_else(|| "order rejected by backend".to_owned()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_wire_field_names() {
        let request = CreateOrderRequest {
            idempotency_key: IdempotencyKey::from_existing("k-1".to_owned()),
            merchant_id: MerchantId::from("m1"),
            items: vec![OrderLine {
                product_id: ProductId::from("p1"),
                quantity: 2,
                name: "Margherita".to_owned(),
            }],
            total_price: Decimal::new(2_050, 2),
            delivery_location: Some(DeliveryLocation {
                latitude: 12.97,
                longitude: 77.59,
            }),
            coupon_code: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "idempotencyKey": "k-1",
                "branch": "m1",
                "items": [{"item": "p1", "count": 2, "name": "Margherita"}],
                "totalPrice": 20.5,
                "deliveryLocation": {"latitude": 12.97, "longitude": 77.59}
            })
        );
    }

    #[test]
    fn success_envelope_yields_order() {
        let json = r#"{"success": true, "data": {"_id": "ord-1", "totalPrice": 20, "status": "placed"}}"#;
        let envelope: OrderEnvelope = serde_json::from_str(json).unwrap();
        let order = envelope.into_result(201).unwrap();
        assert_eq!(order.id, OrderId::from("ord-1"));
        assert_eq!(order.total_price, Some(Decimal::new(20, 0)));
    }

    #[test]
    fn failure_envelope_yields_rejection() {
        let json = r#"{"success": false, "error": "Restaurant is closed"}"#;
        let envelope: OrderEnvelope = serde_json::from_str(json).unwrap();
        let err = envelope.into_result(400).unwrap_err();
        assert!(matches!(err, FoodCartError::Rejected { ref message } if message == "Restaurant is closed"));
    }

    #[test]
    fn success_without_data_is_api_error() {
        let err = OrderEnvelope {
            success: true,
            data: None,
            error: None,
        }
        .into_result(200)
        .unwrap_err();
        assert!(matches!(err, FoodCartError::Api { status: 200, .. }));
    }
}
