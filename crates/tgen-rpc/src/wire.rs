//! JSON-RPC 2.0 message encoding and response interpretation.
//!
//! Every request is a single JSON object; a batch is a JSON array of
//! request objects. A response carrying `result` is a success, one carrying
//! `error` is a failure whose payload is the server's error message.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Protocol version tag sent with every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// A single command destined for the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcCommand {
    /// Remote method name.
    pub method: String,
    /// Method parameters; an empty object when the method takes none.
    pub params: Value,
}

impl RpcCommand {
    /// Create a new command.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Outcome of one remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcReply {
    /// Whether the server accepted the command.
    pub success: bool,
    /// The `result` on success, the error message on failure.
    pub data: Value,
}

impl RpcReply {
    /// A successful reply carrying `data`.
    #[must_use]
    pub const fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
        }
    }

    /// A failing reply carrying `message`.
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::String(message.into()),
        }
    }

    /// Render the payload as text.
    ///
    /// Strings are returned bare, anything else as compact JSON.
    #[must_use]
    pub fn message(&self) -> String {
        payload_text(&self.data)
    }
}

/// Render a JSON payload as text, leaving strings unquoted.
#[must_use]
pub fn payload_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Build a request object.
#[must_use]
pub fn request(id: u64, method: &str, params: &Value) -> Value {
    let params = if params.is_null() {
        json!({})
    } else {
        params.clone()
    };
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Build a batch request; ids are assigned consecutively from `first_id`.
#[must_use]
pub fn batch_request(first_id: u64, commands: &[RpcCommand]) -> Value {
    Value::Array(
        commands
            .iter()
            .zip(first_id..)
            .map(|(cmd, id)| request(id, &cmd.method, &cmd.params))
            .collect(),
    )
}

/// Interpret a response object for the request numbered `expected_id`.
#[must_use]
pub fn decode_response(expected_id: u64, response: &Value) -> RpcReply {
    match response.get("id").and_then(Value::as_u64) {
        Some(id) if id == expected_id => {}
        Some(id) => {
            return RpcReply::fail(format!(
                "response id mismatch: expected {expected_id}, got {id}"
            ))
        }
        None => {
            // an error reply to an unparseable request may carry a null id
            if let Some(error) = response.get("error") {
                return RpcReply::fail(error_message(error));
            }
            return RpcReply::fail("malformed response: missing id");
        }
    }

    if let Some(error) = response.get("error") {
        return RpcReply::fail(error_message(error));
    }

    match response.get("result") {
        Some(result) => RpcReply::ok(result.clone()),
        None => RpcReply::fail("malformed response: neither result nor error"),
    }
}

/// Interpret a batch response, returning replies in request order.
///
/// Entries may arrive in any order; requests with no matching entry get a
/// failing reply.
#[must_use]
pub fn decode_batch_response(first_id: u64, count: usize, response: &Value) -> Vec<RpcReply> {
    let Some(entries) = response.as_array() else {
        // a whole-batch rejection comes back as one error object
        let reply = response.get("error").map_or_else(
            || RpcReply::fail("malformed batch response: expected an array"),
            |error| RpcReply::fail(error_message(error)),
        );
        return vec![reply; count];
    };

    (first_id..)
        .take(count)
        .map(|id| {
            entries
                .iter()
                .find(|entry| entry.get("id").and_then(Value::as_u64) == Some(id))
                .map_or_else(
                    || RpcReply::fail(format!("no response for request {id}")),
                    |entry| decode_response(id, entry),
                )
        })
        .collect()
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| payload_text(error), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape() {
        let msg = request(7, "acquire", &json!({"port_id": 1, "user": "bob", "force": false}));
        assert_eq!(msg["jsonrpc"], "2.0");
        assert_eq!(msg["id"], 7);
        assert_eq!(msg["method"], "acquire");
        assert_eq!(msg["params"]["port_id"], 1);
    }

    #[test]
    fn null_params_become_empty_object() {
        let msg = request(1, "ping", &Value::Null);
        assert_eq!(msg["params"], json!({}));
    }

    #[test]
    fn batch_ids_are_consecutive() {
        let batch = batch_request(
            10,
            &[
                RpcCommand::new("ping", json!({})),
                RpcCommand::new("get_system_info", json!({})),
            ],
        );
        let ids: Vec<u64> = batch
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[test]
    fn decode_success() {
        let reply = decode_response(3, &json!({"jsonrpc": "2.0", "id": 3, "result": "ACK"}));
        assert_eq!(reply, RpcReply::ok(json!("ACK")));
        assert_eq!(reply.message(), "ACK");
    }

    #[test]
    fn decode_error() {
        let reply = decode_response(
            3,
            &json!({"jsonrpc": "2.0", "id": 3, "error": {"code": -32000, "message": "port is owned by 'alice'"}}),
        );
        assert!(!reply.success);
        assert_eq!(reply.message(), "port is owned by 'alice'");
    }

    #[test]
    fn decode_mismatched_id() {
        let reply = decode_response(3, &json!({"jsonrpc": "2.0", "id": 4, "result": 1}));
        assert!(!reply.success);
        assert!(reply.message().contains("mismatch"));
    }

    #[test]
    fn decode_null_id_error() {
        let reply = decode_response(
            3,
            &json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32700, "message": "Parse error"}}),
        );
        assert!(!reply.success);
        assert_eq!(reply.message(), "Parse error");
    }

    #[test]
    fn batch_reordered_to_request_order() {
        let response = json!([
            {"jsonrpc": "2.0", "id": 2, "result": "second"},
            {"jsonrpc": "2.0", "id": 1, "error": {"message": "first failed"}},
        ]);
        let replies = decode_batch_response(1, 3, &response);
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0], RpcReply::fail("first failed"));
        assert_eq!(replies[1], RpcReply::ok(json!("second")));
        assert!(!replies[2].success);
    }

    #[test]
    fn batch_rejected_as_a_whole() {
        let response = json!({"jsonrpc": "2.0", "id": null, "error": {"message": "Invalid Request"}});
        let replies = decode_batch_response(1, 2, &response);
        assert_eq!(replies, vec![RpcReply::fail("Invalid Request"); 2]);
    }
}
