use serde_json::{json, Map, Value};

use crate::failure::FailureSpec;

pub const DEFAULT_QUANTITY: i64 = 1;
pub const DEFAULT_PRICE: f64 = 0.0;
pub const DEFAULT_PRIORITY: &str = "high";
pub const DEFAULT_ORDER_ID: &str = "no-id";
pub const DEFAULT_EVENT_TYPE: &str = "Event";
pub const UNKNOWN_PRODUCT: &str = "UNKNOWN";
pub const DEFAULT_RECEIVE_COUNT: u32 = 1;

const SNS_NOTIFICATION_TYPE: &str = "Notification";

/// One record of a delivered batch, independent of the queue SDK types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRecord {
    pub message_id: String,
    pub body: String,
    pub receive_count: u32,
}

/// An order event as decoded from a queue record body.
///
/// Decoding never fails: bodies that are not JSON objects are kept as an
/// opaque `{"raw": body}` document and every business field is left unset.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderMessage {
    pub correlation_id: Option<String>,
    pub order_id: Option<String>,
    pub event_type: Option<String>,
    pub product: Option<String>,
    pub priority: Option<String>,
    pub force_fail: FailureSpec,
    quantity: Option<Value>,
    price: Option<Value>,
    document: Value,
}

impl OrderMessage {
    pub fn decode(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(object)) => match sns_notification_message(&object) {
                Some(inner) => Self::decode(inner),
                None => Self::from_object(object),
            },
            _ => Self::opaque(body),
        }
    }

    pub fn from_object(object: Map<String, Value>) -> Self {
        Self {
            correlation_id: text_field(&object, "correlationId"),
            order_id: text_field(&object, "orderId"),
            event_type: text_field(&object, "eventType"),
            product: text_field(&object, "product").or_else(|| text_field(&object, "productId")),
            priority: text_field(&object, "priority"),
            force_fail: FailureSpec::from_value(object.get("forceFail")),
            quantity: object.get("quantity").cloned().filter(|value| !value.is_null()),
            price: object.get("price").cloned().filter(|value| !value.is_null()),
            document: Value::Object(object),
        }
    }

    fn opaque(body: &str) -> Self {
        Self {
            correlation_id: None,
            order_id: None,
            event_type: None,
            product: None,
            priority: None,
            force_fail: FailureSpec::None,
            quantity: None,
            price: None,
            document: json!({ "raw": body }),
        }
    }

    /// The decoded body exactly as delivered.
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn quantity(&self) -> Result<i64, ContractError> {
        match &self.quantity {
            None => Ok(DEFAULT_QUANTITY),
            Some(value) => integer_value(value).ok_or_else(|| ContractError::InvalidNumber {
                field: "quantity",
                value: value.to_string(),
            }),
        }
    }

    pub fn price(&self) -> Result<f64, ContractError> {
        match &self.price {
            None => Ok(DEFAULT_PRICE),
            Some(value) => decimal_value(value).ok_or_else(|| ContractError::InvalidNumber {
                field: "price",
                value: value.to_string(),
            }),
        }
    }

    pub fn product_or_unknown(&self) -> &str {
        self.product.as_deref().unwrap_or(UNKNOWN_PRODUCT)
    }

    pub fn order_id_or_default(&self) -> &str {
        self.order_id.as_deref().unwrap_or(DEFAULT_ORDER_ID)
    }

    pub fn event_type_or_default(&self) -> &str {
        self.event_type.as_deref().unwrap_or(DEFAULT_EVENT_TYPE)
    }
}

/// Resolves the correlation id of a message, synthesizing `c-{now_millis}` when
/// upstream omitted it so every message stays traceable.
pub fn resolve_correlation_id(message: &OrderMessage, now_millis: i64) -> String {
    message
        .correlation_id
        .clone()
        .unwrap_or_else(|| format!("c-{now_millis}"))
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractError {
    #[error("field '{field}' must be numeric, got {value}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("failed to serialize artifact: {message}")]
    Serialize { message: String },
}

/// Outcome of one delivered batch: the ids of the messages that must be
/// redelivered. Every other id in the batch is considered consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    failed_ids: Vec<String>,
}

impl BatchReport {
    pub fn from_failed_ids(ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            failed_ids: ids.into_iter().collect(),
        }
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed_ids.iter().map(String::as_str).collect()
    }

    pub fn into_failed_ids(self) -> Vec<String> {
        self.failed_ids
    }

    pub fn is_empty(&self) -> bool {
        self.failed_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// An order event ready to be published onto the fan-out topic.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub correlation_id: String,
    pub order_id: String,
    pub event_type: String,
    pub priority: String,
    pub message: Map<String, Value>,
}

impl PublishedEvent {
    pub fn message_json(&self) -> String {
        Value::Object(self.message.clone()).to_string()
    }
}

/// Validates a publish request body and fills in missing identifiers.
///
/// Entries of an optional nested `payload` object are merged into the message
/// but never replace the identity fields.
pub fn normalize_publish_request(
    body: Value,
    mut new_id: impl FnMut() -> String,
) -> Result<PublishedEvent, ValidationError> {
    let Value::Object(mut object) = body else {
        return Err(ValidationError::new("Request body must be a JSON object"));
    };

    let event_type = text_field(&object, "eventType")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ValidationError::new("eventType is required"))?;

    if let Some(force_fail) = object.get("forceFail") {
        if !matches!(
            force_fail,
            Value::Null | Value::Bool(_) | Value::String(_) | Value::Array(_)
        ) {
            return Err(ValidationError::new(
                "forceFail must be a boolean, a role name or a list of role names",
            ));
        }
    }

    let nested = match object.remove("payload") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(nested)) => nested,
        Some(_) => return Err(ValidationError::new("payload must be a JSON object")),
    };

    let order_id = text_field(&object, "orderId").unwrap_or_else(&mut new_id);
    let correlation_id = text_field(&object, "correlationId").unwrap_or_else(&mut new_id);
    let priority = text_field(&object, "priority").unwrap_or_else(|| DEFAULT_PRIORITY.to_string());

    for (key, value) in nested {
        object.entry(key).or_insert(value);
    }
    object.insert("orderId".to_string(), Value::from(order_id.clone()));
    object.insert("eventType".to_string(), Value::from(event_type.clone()));
    object.insert("priority".to_string(), Value::from(priority.clone()));
    object.insert(
        "correlationId".to_string(),
        Value::from(correlation_id.clone()),
    );

    Ok(PublishedEvent {
        correlation_id,
        order_id,
        event_type,
        priority,
        message: object,
    })
}

fn sns_notification_message(object: &Map<String, Value>) -> Option<&str> {
    let is_notification = object
        .get("Type")
        .and_then(Value::as_str)
        .map(|kind| kind == SNS_NOTIFICATION_TYPE)
        .unwrap_or(false);
    if !is_notification {
        return None;
    }
    object.get("Message").and_then(Value::as_str)
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|decimal| decimal.trunc() as i64)),
        Value::String(text) => text.trim().parse().ok(),
        Value::Bool(flag) => Some(i64::from(*flag)),
        _ => None,
    }
}

fn decimal_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        Value::Bool(flag) => Some(f64::from(u8::from(*flag))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_order_fields_with_defaults() {
        let message = OrderMessage::decode(
            r#"{"correlationId":"c1","orderId":"o1","eventType":"OrderPlaced","productId":"X"}"#,
        );

        assert_eq!(message.correlation_id.as_deref(), Some("c1"));
        assert_eq!(message.product_or_unknown(), "X");
        assert_eq!(message.quantity(), Ok(1));
        assert_eq!(message.price(), Ok(0.0));
        assert_eq!(message.force_fail, FailureSpec::None);
        assert_eq!(message.document()["orderId"], json!("o1"));
    }

    #[test]
    fn product_takes_precedence_over_product_id() {
        let message = OrderMessage::decode(r#"{"product":"Book","productId":"B-1"}"#);
        assert_eq!(message.product_or_unknown(), "Book");
    }

    #[test]
    fn malformed_body_becomes_opaque_payload() {
        let message = OrderMessage::decode("not json at all");

        assert_eq!(message.document(), &json!({"raw": "not json at all"}));
        assert_eq!(message.correlation_id, None);
        assert_eq!(message.order_id_or_default(), DEFAULT_ORDER_ID);
    }

    #[test]
    fn non_object_json_is_kept_opaque() {
        let message = OrderMessage::decode("[1,2,3]");
        assert_eq!(message.document(), &json!({"raw": "[1,2,3]"}));
    }

    #[test]
    fn unwraps_sns_notification_envelope() {
        let envelope = json!({
            "Type": "Notification",
            "TopicArn": "arn:aws:sns:us-east-1:000000000000:orders",
            "Message": "{\"correlationId\":\"c9\",\"orderId\":\"o9\",\"forceFail\":\"shipping\"}"
        });
        let message = OrderMessage::decode(&envelope.to_string());

        assert_eq!(message.correlation_id.as_deref(), Some("c9"));
        assert_eq!(
            message.force_fail,
            FailureSpec::SingleRole("shipping".to_string())
        );
    }

    #[test]
    fn numeric_strings_are_accepted_but_garbage_is_rejected() {
        let message = OrderMessage::decode(r#"{"quantity":"3","price":"9.5"}"#);
        assert_eq!(message.quantity(), Ok(3));
        assert_eq!(message.price(), Ok(9.5));

        let message = OrderMessage::decode(r#"{"quantity":"many"}"#);
        assert!(matches!(
            message.quantity(),
            Err(ContractError::InvalidNumber {
                field: "quantity",
                ..
            })
        ));
    }

    #[test]
    fn empty_correlation_id_is_synthesized() {
        let message = OrderMessage::decode(r#"{"correlationId":""}"#);
        assert_eq!(resolve_correlation_id(&message, 1_700), "c-1700");
    }

    #[test]
    fn batch_report_keeps_failed_ids_in_order() {
        let report = BatchReport::from_failed_ids(vec!["m-3".to_string(), "m-1".to_string()]);
        assert_eq!(report.failed_ids(), vec!["m-3", "m-1"]);
        assert!(!report.is_empty());
        assert!(BatchReport::default().is_empty());
    }

    #[test]
    fn publish_request_fills_missing_identifiers() {
        let mut ids = vec!["cid-1".to_string(), "oid-1".to_string()];
        let event = normalize_publish_request(
            json!({"eventType": "OrderPlaced", "product": "Book", "quantity": 2}),
            || ids.pop().expect("id available"),
        )
        .expect("request should normalize");

        assert_eq!(event.order_id, "oid-1");
        assert_eq!(event.correlation_id, "cid-1");
        assert_eq!(event.priority, "high");
        assert_eq!(event.message["correlationId"], json!("cid-1"));
        assert_eq!(event.message["quantity"], json!(2));
    }

    #[test]
    fn publish_request_keeps_supplied_identifiers_over_nested_payload() {
        let event = normalize_publish_request(
            json!({
                "eventType": "OrderUpdated",
                "orderId": "o-7",
                "correlationId": "c-7",
                "priority": "low",
                "payload": {"orderId": "shadow", "price": 4.5}
            }),
            || unreachable!("identifiers were supplied"),
        )
        .expect("request should normalize");

        assert_eq!(event.order_id, "o-7");
        assert_eq!(event.message["orderId"], json!("o-7"));
        assert_eq!(event.message["price"], json!(4.5));
        assert!(!event.message.contains_key("payload"));
    }

    #[test]
    fn publish_request_requires_event_type() {
        let error = normalize_publish_request(json!({"orderId": "o-1"}), String::new)
            .expect_err("request should fail");
        assert_eq!(error.message(), "eventType is required");

        let error = normalize_publish_request(json!("text"), String::new)
            .expect_err("request should fail");
        assert_eq!(error.message(), "Request body must be a JSON object");
    }
}
