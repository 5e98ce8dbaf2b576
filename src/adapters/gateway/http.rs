//! `reqwest`-based [`GatewayClient`] targeting the `tools/invoke` RPC
//! surface in `spec.md` §6, matching the shape of the teacher's
//! `infrastructure::claude::client::ClaudeClientImpl` (pooled
//! `reqwest::Client`, JSON bodies, explicit status classification) but
//! aimed at `sessions_spawn`/`sessions_list` instead of `/v1/messages`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde_json::{json, Value};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::gateway::{GatewayClient, SessionSummary, SpawnFailure, SpawnOutcome, SpawnParams};

/// Gateway RPC client over `POST {base_url}/tools/invoke`.
pub struct HttpGatewayClient {
    http: ReqwestClient,
    base_url: String,
    token: String,
}

impl HttpGatewayClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> DomainResult<Self> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(300))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| DomainError::GatewayError(format!("failed to build gateway http client: {e}")))?;
        Ok(Self { http, base_url: base_url.into(), token: token.into() })
    }

    async fn invoke(&self, tool: &str, args: Value) -> DomainResult<(reqwest::StatusCode, Value)> {
        let response = self
            .http
            .post(format!("{}/tools/invoke", self.base_url))
            .bearer_auth(&self.token)
            .json(&json!({ "tool": tool, "args": args }))
            .send()
            .await
            .map_err(|e| DomainError::GatewayError(format!("{tool} request failed: {e}")))?;

        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn sessions_spawn(&self, params: &SpawnParams) -> DomainResult<SpawnOutcome> {
        let mut args = serde_json::Map::new();
        args.insert("task".to_string(), json!(params.task));
        args.insert("label".to_string(), json!(params.label));
        if let Some(model) = &params.model {
            args.insert("model".to_string(), json!(model));
        }
        if let Some(thinking) = &params.thinking {
            args.insert("thinking".to_string(), json!(thinking));
        }
        args.insert("cleanup".to_string(), json!(params.cleanup));
        if let Some(timeout) = params.run_timeout_seconds {
            args.insert("runTimeoutSeconds".to_string(), json!(timeout));
        }

        let (status, body) = self.invoke("sessions_spawn", Value::Object(args)).await?;
        if !status.is_success() {
            return Ok(SpawnOutcome::Rejected(SpawnFailure::Http(status.as_u16())));
        }

        let result = body.get("result").cloned().unwrap_or(Value::Null);
        let details = result.get("details").cloned();

        if let Some(details) = &details {
            if details.get("status").and_then(Value::as_str) == Some("error") {
                let message = details.get("error").and_then(Value::as_str).unwrap_or("unknown gateway error");
                return Ok(SpawnOutcome::Rejected(SpawnFailure::SpawnError(message.to_string())));
            }
        }

        // Normalize the gateway's two alternative response shapes
        // (`result.details.childSessionKey` vs `result.childSessionKey`)
        // into one outcome, per `spec.md` §9.
        let session_key = details
            .as_ref()
            .and_then(|d| d.get("childSessionKey"))
            .or_else(|| result.get("childSessionKey"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let run_id = details.as_ref().and_then(|d| d.get("runId")).and_then(Value::as_str).map(str::to_string);

        match session_key {
            Some(session_key) => Ok(SpawnOutcome::Accepted { session_key, run_id }),
            None => Ok(SpawnOutcome::Rejected(SpawnFailure::SpawnError(
                "gateway response carried no childSessionKey".to_string(),
            ))),
        }
    }

    async fn sessions_list(&self, limit: u32, message_limit: u32) -> DomainResult<Vec<SessionSummary>> {
        let args = json!({ "limit": limit, "messageLimit": message_limit });
        let (status, body) = self.invoke("sessions_list", args).await?;
        if !status.is_success() {
            return Err(DomainError::GatewayError(format!("HTTP_{}", status.as_u16())));
        }

        let sessions = body
            .pointer("/result/details/sessions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(sessions.iter().filter_map(parse_session_summary).collect())
    }
}

fn parse_session_summary(value: &Value) -> Option<SessionSummary> {
    let session_key = value
        .get("key")
        .or_else(|| value.get("sessionKey"))
        .and_then(Value::as_str)?
        .to_string();
    let total_tokens = value.get("totalTokens").and_then(Value::as_u64).unwrap_or(0);
    let model = value.get("model").and_then(Value::as_str).map(str::to_string);
    let messages = value.get("messages").and_then(Value::as_array);
    let message_count = messages.map_or(0, Vec::len);
    let last_stop_reason = messages
        .and_then(|messages| messages.last())
        .and_then(|last| last.get("stopReason"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(SessionSummary { session_key, total_tokens, model, last_stop_reason, message_count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_session_summary_from_alternative_key_shape() {
        let value = json!({ "sessionKey": "abc", "totalTokens": 42, "messages": [{"stopReason": "end_turn"}] });
        let summary = parse_session_summary(&value).unwrap();
        assert_eq!(summary.session_key, "abc");
        assert_eq!(summary.total_tokens, 42);
        assert_eq!(summary.last_stop_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn missing_session_key_is_skipped() {
        let value = json!({ "totalTokens": 1 });
        assert!(parse_session_summary(&value).is_none());
    }
}
