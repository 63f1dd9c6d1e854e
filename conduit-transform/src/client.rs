//! The remote transformation endpoint client (spec §6): a plain
//! request/response call `{function_name, input} -> {output, status,
//! status_message}`. One client is opened per `transform_data` call batch
//! and released on return (spec §4.4, §5 "Shared resources").

use conduit_types::Field;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransformStatus {
    Success,
    Failure,
    Error,
}

#[derive(Debug, Serialize)]
struct TransformRequest<'a> {
    function_name: &'a str,
    input: String,
}

#[derive(Debug, Deserialize)]
struct TransformResponse {
    output: String,
    status: TransformStatus,
    #[allow(dead_code)]
    status_message: String,
}

/// A single shared client for one `transform_data` batch (spec §4.4: "open
/// a single shared client for the call batch and release on return").
/// Holding the `reqwest::Client` rather than building one per call avoids
/// re-negotiating a connection per rule.
pub struct TransformClient {
    endpoint: String,
    http: reqwest::Client,
}

impl TransformClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        TransformClient {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Dispatches one named remote rule. Any transport error or a
    /// non-`SUCCESS` status is a soft failure from the caller's
    /// perspective (spec §4.4: "on any transport error or non-success
    /// status, fall back to the original value"); this returns `Err` in
    /// both cases and `conduit-transform::apply_rule` is what actually
    /// performs the fallback.
    pub async fn invoke(&self, function_name: &str, input: &Field) -> Result<Field, String> {
        let request = TransformRequest {
            function_name,
            input: input.to_display_string(),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("transport error calling {function_name}: {e}"))?;

        if !response.status().is_success() {
            return Err(format!(
                "transform endpoint returned HTTP {} for {function_name}",
                response.status()
            ));
        }

        let body: TransformResponse = response
            .json()
            .await
            .map_err(|e| format!("malformed transform response for {function_name}: {e}"))?;

        match body.status {
            TransformStatus::Success => Ok(Field::String(body.output)),
            TransformStatus::Failure | TransformStatus::Error => {
                Err(format!("transform endpoint reported {:?} for {function_name}: {}", body.status, body.status_message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_deserializes_from_uppercase_wire_values() {
        let s: TransformStatus = serde_json::from_str(r#""SUCCESS""#).unwrap();
        assert_eq!(s, TransformStatus::Success);
        let f: TransformStatus = serde_json::from_str(r#""FAILURE""#).unwrap();
        assert_eq!(f, TransformStatus::Failure);
    }
}
