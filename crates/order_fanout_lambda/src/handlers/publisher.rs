use std::collections::BTreeMap;

use order_fanout_core::contract::{normalize_publish_request, PublishedEvent};
use order_fanout_core::routing::route_event;
use order_fanout_core::storage_keys::TraceStep;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapters::publish::EventPublisher;
use crate::handlers::HandlerDeps;
use crate::trace::TraceRecorder;

const COMPONENT: &str = "publisher";
const CORRELATION_HEADER: &str = "X-Correlation-ID";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

impl ApiGatewayResponse {
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Accepts an order event over HTTP, traces it and hands it to the fan-out
/// transport. `publisher` is `None` when neither a topic nor a queue is
/// configured.
pub fn handle_publish_event(
    event: Value,
    publisher: Option<&dyn EventPublisher>,
    deps: HandlerDeps<'_>,
    new_id: impl FnMut() -> String,
) -> ApiGatewayResponse {
    let payload = match normalize_apigw_event(event) {
        Ok(value) => value,
        Err(message) => return validation_error_response(&message),
    };

    let published = match normalize_publish_request(payload, new_id) {
        Ok(value) => value,
        Err(error) => return validation_error_response(error.message()),
    };

    let Some(publisher) = publisher else {
        return error_response(
            500,
            json!({
                "error": "misconfiguration",
                "message": "TOPIC_ARN or QUEUE_URL must be configured",
            }),
        );
    };

    let routes = route_event(&published.event_type, &published.priority);
    let recorder = TraceRecorder::new(deps.store, deps.clock);
    let traced = recorder
        .record(
            &published.correlation_id,
            TraceStep::Published,
            json!({ "message": Value::Object(published.message.clone()) }),
        )
        .and_then(|_| {
            recorder.record(
                &published.correlation_id,
                TraceStep::Routes,
                json!({ "routes": routes, "targets": routes.targets() }),
            )
        });
    if let Err(error) = traced {
        deps.log.error(
            COMPONENT,
            "trace_write_failed",
            json!({
                "correlation_id": published.correlation_id.clone(),
                "error": error.to_string(),
            }),
        );
        return error_response(
            502,
            json!({
                "error": "trace_failed",
                "message": error.to_string(),
                "correlationId": published.correlation_id,
            }),
        );
    }

    let message_id = match publisher.publish(&published.message_json(), &attributes(&published)) {
        Ok(value) => value,
        Err(error) => {
            deps.log.error(
                COMPONENT,
                "publish_failed",
                json!({
                    "correlation_id": published.correlation_id.clone(),
                    "target": publisher.target(),
                    "error": error.to_string(),
                }),
            );
            return error_response(
                502,
                json!({
                    "error": "publish_failed",
                    "message": error.to_string(),
                    "correlationId": published.correlation_id,
                }),
            );
        }
    };

    deps.log.info(
        COMPONENT,
        "event_published",
        json!({
            "correlation_id": published.correlation_id.clone(),
            "order_id": published.order_id.clone(),
            "event_type": published.event_type.clone(),
            "message_id": message_id,
            "targets": routes.targets(),
        }),
    );

    let mut response = success_response(
        202,
        json!({
            "correlationId": published.correlation_id.clone(),
            "orderId": published.order_id,
            "routes": routes,
            "status": "published",
        }),
    );
    response.headers[CORRELATION_HEADER] = Value::from(published.correlation_id);
    response
}

fn attributes(published: &PublishedEvent) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("eventType".to_string(), published.event_type.clone()),
        ("priority".to_string(), published.priority.clone()),
    ])
}

fn normalize_apigw_event(event: Value) -> Result<Value, String> {
    let Some(object) = event.as_object() else {
        return Err("Request payload must be a JSON object".to_string());
    };

    let Some(body) = object.get("body") else {
        return Ok(event);
    };

    match body {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(body.clone()),
        Value::String(text) if text.trim().is_empty() => Ok(json!({})),
        Value::String(text) => {
            serde_json::from_str(text).map_err(|error| format!("Malformed JSON body: {error}"))
        }
        _ => Err("Request body must be a JSON object".to_string()),
    }
}

fn validation_error_response(message: &str) -> ApiGatewayResponse {
    error_response(
        400,
        json!({
            "error": "validation_error",
            "message": message,
        }),
    )
}

fn success_response(status_code: u16, payload: Value) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: json!({"Content-Type": "application/json"}),
        body: payload.to_string(),
    }
}

fn error_response(status_code: u16, payload: Value) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: json!({"Content-Type": "application/json"}),
        body: payload.to_string(),
    }
}
