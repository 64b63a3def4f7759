//! HTTP client for the claimr.io quest widget API.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use quest_core::{short_id, BoundSigner, Progress, Session};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ORIGIN, REFERER};
use serde::Serialize;
use serde_json::Value;

use super::{ActionResult, ActivityStatus, CampaignService, ServiceError};
use crate::config::CampaignConfig;

/// Challenge signed by the wallet to log in.
pub fn login_message(public_key: &str) -> String {
    format!("Please sign your public key '{public_key}' in order to login into quest campaign")
}

#[derive(Debug, Serialize)]
struct WalletAuth<'a> {
    chain_id: &'a str,
    network: &'a str,
    address: &'a str,
    signature: &'a str,
    message: &'a str,
    state: &'a str,
}

pub struct ClaimrClient {
    client: reqwest::Client,
    campaign: CampaignConfig,
}

impl ClaimrClient {
    pub fn new(campaign: CampaignConfig, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let origin = campaign.widget_origin.trim_end_matches('/');
        headers.insert(
            ORIGIN,
            HeaderValue::from_str(origin).context("invalid widget origin")?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{origin}/")).context("invalid widget origin")?,
        );

        let mut builder = reqwest::Client::builder()
            .user_agent(campaign.user_agent.as_str())
            .default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self { client, campaign })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.campaign.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn progress_query(&self) -> [(&str, &str); 4] {
        [
            ("otag", self.campaign.otag.as_str()),
            ("ptag", self.campaign.ptag.as_str()),
            ("session_id", self.campaign.session_id.as_str()),
            ("ref_id", self.campaign.ref_id.as_str()),
        ]
    }

    /// Send a request and decode the JSON body. The body of a non-2xx reply
    /// is read first so the service's message is kept.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, ServiceError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ServiceError::Malformed(e.to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Transport(format!("request timed out: {e}"))
    } else if e.is_decode() {
        ServiceError::Malformed(e.to_string())
    } else {
        ServiceError::Transport(e.to_string())
    }
}

/// 5xx is a server-side outage and counts as transient; any other non-2xx
/// status is a rejection.
fn status_error(status: StatusCode, body: &str) -> ServiceError {
    let detail = format!(
        "HTTP {}{}",
        status,
        service_message(body).map(|m| format!(": {m}")).unwrap_or_default()
    );
    if status.is_server_error() {
        ServiceError::Transport(detail)
    } else {
        ServiceError::Rejected(detail)
    }
}

/// Best-effort extraction of an error message from a response body.
fn service_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    ["message", "error", "detail"]
        .iter()
        .find_map(|k| v.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

/// Fail unless the envelope carries `"success": true`.
pub(crate) fn require_success(body: &Value) -> Result<(), ServiceError> {
    match body.get("success").and_then(Value::as_bool) {
        Some(true) => Ok(()),
        Some(false) => {
            let msg = body
                .get("message")
                .or_else(|| body.get("error"))
                .and_then(Value::as_str)
                .unwrap_or("success=false");
            Err(ServiceError::Rejected(msg.to_string()))
        }
        None => Err(ServiceError::Malformed("missing 'success' flag".to_string())),
    }
}

pub(crate) fn parse_session(body: &Value) -> Result<Session, ServiceError> {
    require_success(body)?;
    body.pointer("/data/access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(Session::new)
        .ok_or_else(|| ServiceError::Malformed("missing data.access_token".to_string()))
}

pub(crate) fn parse_activity(body: &Value) -> ActivityStatus {
    match body.get("success").and_then(Value::as_bool) {
        Some(true) => ActivityStatus::Active,
        _ => ActivityStatus::Inactive,
    }
}

pub(crate) fn parse_progress(body: &Value) -> Result<Progress, ServiceError> {
    require_success(body)?;
    let progress = body
        .pointer("/data/progress")
        .ok_or_else(|| ServiceError::Malformed("missing data.progress".to_string()))?;

    let score = progress
        .get("pcn")
        .and_then(as_count)
        .ok_or_else(|| ServiceError::Malformed("missing or invalid data.progress.pcn".to_string()))?;
    let xp = progress.get("xp").and_then(as_count);

    Ok(Progress { score, xp })
}

pub(crate) fn parse_action(body: &Value) -> Result<ActionResult, ServiceError> {
    require_success(body)?;
    let detail = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(ActionResult::Completed { detail })
}

/// Counters come back as integers, floats or numeric strings.
fn as_count(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64),
        _ => None,
    }
}

#[async_trait]
impl CampaignService for ClaimrClient {
    async fn authenticate(
        &self,
        identity: &str,
        signer: BoundSigner<'_>,
    ) -> Result<Session, ServiceError> {
        let public_key = signer.public_key()?;
        let message = login_message(&public_key);
        let signature = signer.sign(&message)?;

        let payload = WalletAuth {
            chain_id: &self.campaign.chain_id,
            network: &self.campaign.network,
            address: identity,
            signature: &signature,
            message: &message,
            state: &self.campaign.state,
        };

        tracing::debug!(identity = %short_id(identity), "POST auth/wallet");
        let body = self
            .send(self.client.post(self.url("auth/wallet")).json(&payload))
            .await?;
        parse_session(&body)
    }

    async fn check_status(
        &self,
        identity: &str,
        session: Option<&Session>,
    ) -> Result<ActivityStatus, ServiceError> {
        let mut request = self
            .client
            .get(self.url("sessions"))
            .query(&[("id", self.campaign.session_id.as_str())]);
        if let Some(session) = session {
            request = request.bearer_auth(&session.access_token);
        }

        tracing::debug!(identity = %short_id(identity), "GET sessions");
        let body = self.send(request).await?;
        Ok(parse_activity(&body))
    }

    async fn perform_action(&self, session: &Session) -> Result<ActionResult, ServiceError> {
        let Some(path) = self.campaign.action_path.as_deref() else {
            return Ok(ActionResult::Skipped);
        };

        let request = self
            .client
            .post(self.url(path))
            .bearer_auth(&session.access_token)
            .query(&self.progress_query());
        let body = self.send(request).await?;
        parse_action(&body)
    }

    async fn fetch_progress(&self, session: &Session) -> Result<Progress, ServiceError> {
        let request = self
            .client
            .get(self.url("v2/widget/campaign/progress"))
            .bearer_auth(&session.access_token)
            .query(&self.progress_query());
        let body = self.send(request).await?;
        parse_progress(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn login_message_embeds_public_key() {
        assert_eq!(
            login_message("0x04ab"),
            "Please sign your public key '0x04ab' in order to login into quest campaign"
        );
    }

    #[test]
    fn session_from_success_envelope() {
        let body = json!({"success": true, "data": {"access_token": "tok-1"}});
        assert_eq!(parse_session(&body).unwrap().access_token, "tok-1");
    }

    #[test]
    fn session_rejected_or_malformed() {
        let rejected = json!({"success": false, "message": "bad signature"});
        assert_eq!(
            parse_session(&rejected),
            Err(ServiceError::Rejected("bad signature".into()))
        );

        let no_token = json!({"success": true, "data": {}});
        assert!(matches!(parse_session(&no_token), Err(ServiceError::Malformed(_))));

        let no_flag = json!({"data": {"access_token": "x"}});
        assert!(matches!(parse_session(&no_flag), Err(ServiceError::Malformed(_))));
    }

    #[test]
    fn progress_accepts_numeric_shapes() {
        let body = json!({"success": true, "data": {"progress": {"pcn": 120, "xp": 35.0}}});
        assert_eq!(parse_progress(&body).unwrap(), Progress { score: 120, xp: Some(35) });

        let body = json!({"success": true, "data": {"progress": {"pcn": "48"}}});
        assert_eq!(parse_progress(&body).unwrap(), Progress { score: 48, xp: None });
    }

    #[test]
    fn progress_without_score_is_malformed() {
        let body = json!({"success": true, "data": {"progress": {"xp": 3}}});
        assert!(matches!(parse_progress(&body), Err(ServiceError::Malformed(_))));

        let body = json!({"success": true, "data": {"progress": {"pcn": -4}}});
        assert!(matches!(parse_progress(&body), Err(ServiceError::Malformed(_))));
    }

    #[test]
    fn unsuccessful_progress_is_rejected() {
        let body = json!({"success": false});
        assert!(matches!(parse_progress(&body), Err(ServiceError::Rejected(_))));
    }

    #[test]
    fn activity_follows_success_flag() {
        assert_eq!(parse_activity(&json!({"success": true})), ActivityStatus::Active);
        assert_eq!(parse_activity(&json!({"success": false})), ActivityStatus::Inactive);
        assert_eq!(parse_activity(&json!({})), ActivityStatus::Inactive);
    }

    #[test]
    fn action_envelope() {
        let ok = json!({"success": true, "message": "checked in"});
        assert_eq!(
            parse_action(&ok).unwrap(),
            ActionResult::Completed { detail: Some("checked in".into()) }
        );
        assert!(parse_action(&json!({"success": false, "error": "already claimed"})).is_err());
    }

    #[test]
    fn server_errors_are_transient_client_errors_rejected() {
        let e = status_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(e, ServiceError::Transport("HTTP 502 Bad Gateway".into()));
        assert_eq!(e.class(), "transient-network");

        let e = status_error(StatusCode::UNAUTHORIZED, r#"{"message":"token expired"}"#);
        assert_eq!(e, ServiceError::Rejected("HTTP 401 Unauthorized: token expired".into()));
    }

    #[test]
    fn error_body_message_is_extracted() {
        assert_eq!(service_message(r#"{"error":"expired"}"#), Some("expired".into()));
        assert_eq!(service_message("<html>"), None);
    }

    #[test]
    fn client_builds_urls_without_double_slashes() {
        let mut campaign = CampaignConfig::default();
        campaign.base_url = "http://localhost:9/".into();
        let client = ClaimrClient::new(campaign, Some(Duration::from_secs(1))).unwrap();
        assert_eq!(client.url("/auth/wallet"), "http://localhost:9/auth/wallet");
    }
}
