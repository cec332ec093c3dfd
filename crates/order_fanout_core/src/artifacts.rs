//! Role-specific business records derived from an order message.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::contract::{ContractError, OrderMessage};
use crate::role::Role;
use crate::storage_keys::{analytics_object_key, order_object_key, shipping_object_key};

pub const SHIPPING_CARRIER: &str = "Acme Logistics";
pub const SHIPPING_EVENT_TYPE: &str = "OrderShipped";
pub const READY_TO_SHIP: &str = "READY_TO_SHIP";

const TRACKING_ID_HEX_LEN: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRecord {
    pub order_id: Option<String>,
    pub product_id: String,
    pub quantity: i64,
    pub price: f64,
    pub correlation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_id: Option<String>,
    pub product: String,
    pub quantity: i64,
    pub price: f64,
    pub correlation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRecord {
    pub order_id: String,
    pub correlation_id: String,
    pub carrier: String,
    pub tracking: String,
    pub status: String,
}

/// A business record together with the object key it is persisted under.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessArtifact {
    pub key: String,
    pub body: Value,
}

/// Derives the record a role persists for one message. Roles without a
/// business output (the stress worker) return `Ok(None)`.
pub fn derive_artifact(
    role: Role,
    message: &OrderMessage,
    correlation_id: &str,
) -> Result<Option<BusinessArtifact>, ContractError> {
    let artifact = match role {
        Role::Analytics => {
            let record = AnalyticsRecord {
                order_id: message.order_id.clone(),
                product_id: message.product_or_unknown().to_string(),
                quantity: message.quantity()?,
                price: message.price()?,
                correlation_id: correlation_id.to_string(),
            };
            BusinessArtifact {
                key: analytics_object_key(
                    message.event_type_or_default(),
                    message.order_id_or_default(),
                ),
                body: to_body(&record)?,
            }
        }
        Role::Fulfillment => {
            let record = OrderRecord {
                order_id: message.order_id.clone(),
                product: message.product_or_unknown().to_string(),
                quantity: message.quantity()?,
                price: message.price()?,
                correlation_id: correlation_id.to_string(),
            };
            BusinessArtifact {
                key: order_object_key(message.order_id_or_default()),
                body: to_body(&record)?,
            }
        }
        Role::Shipping => {
            let order_id = message.order_id_or_default();
            let record = ShipmentRecord {
                order_id: order_id.to_string(),
                correlation_id: correlation_id.to_string(),
                carrier: SHIPPING_CARRIER.to_string(),
                tracking: tracking_id(order_id, correlation_id),
                status: READY_TO_SHIP.to_string(),
            };
            BusinessArtifact {
                key: shipping_object_key(SHIPPING_EVENT_TYPE, order_id, correlation_id),
                body: to_body(&record)?,
            }
        }
        Role::Stress => return Ok(None),
    };
    Ok(Some(artifact))
}

/// Tracking ids are a digest of the order and correlation ids so that a
/// redelivered message produces the same shipment record.
pub fn tracking_id(order_id: &str, correlation_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(order_id.as_bytes());
    hasher.update(b":");
    hasher.update(correlation_id.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("TRK-{}", digest[..TRACKING_ID_HEX_LEN].to_ascii_uppercase())
}

fn to_body(record: &impl Serialize) -> Result<Value, ContractError> {
    serde_json::to_value(record).map_err(|error| ContractError::Serialize {
        message: error.to_string(),
    })
}
