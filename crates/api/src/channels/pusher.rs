//! Hosted channel service publisher (Pusher HTTP API)
//!
//! Events are sent as `POST /apps/{app_id}/events`, authenticated with a
//! signed query string:
//!
//! ```text
//! auth_signature = hex(hmac_sha256(secret, "POST\n{path}\n{sorted query}"))
//! ```

use async_trait::async_trait;
use livedesk_shared::ChannelName;
use md5::{Digest, Md5};
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Serialize;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::OnceCell;

use super::authorizer::ChannelAuthorizer;
use super::publisher::{ChannelPublisher, PublishError};

const AUTH_VERSION: &str = "1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct TriggerRequest<'a> {
    name: &'a str,
    channels: Vec<String>,
    /// The event payload, JSON-encoded a second time
    data: String,
}

/// Publishes through the hosted REST API. The HTTP client is built on first use.
pub struct PusherPublisher {
    host: String,
    app_id: String,
    signer: ChannelAuthorizer,
    client: OnceCell<Client>,
}

impl PusherPublisher {
    pub fn new(host: &str, app_id: &str, key: &str, secret: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            signer: ChannelAuthorizer::new(key, secret),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Client, PublishError> {
        self.client
            .get_or_try_init(|| async {
                Client::builder()
                    .timeout(REQUEST_TIMEOUT)
                    .build()
                    .map_err(|e| PublishError::Transport(e.to_string()))
            })
            .await
    }

    fn events_path(&self) -> String {
        format!("/apps/{}/events", self.app_id)
    }

    /// Build the signed query string for a request body sent at `timestamp`
    fn signed_query(&self, path: &str, body: &str, timestamp: i64) -> Result<String, PublishError> {
        // Keys are already in lexical order
        let query = format!(
            "auth_key={}&auth_timestamp={}&auth_version={}&body_md5={}",
            self.signer.key(),
            timestamp,
            AUTH_VERSION,
            body_md5(body),
        );

        let signature = self
            .signer
            .signature(&string_to_sign(path, &query))
            .map_err(|_| PublishError::Signing)?;

        Ok(format!("{}&auth_signature={}", query, signature))
    }

    async fn trigger(
        &self,
        channel: ChannelName,
        event: &str,
        payload: serde_json::Value,
        timestamp: i64,
    ) -> Result<(), PublishError> {
        let request = TriggerRequest {
            name: event,
            channels: vec![channel.wire_name()],
            data: serde_json::to_string(&payload)
                .map_err(|e| PublishError::Encoding(e.to_string()))?,
        };
        let body =
            serde_json::to_string(&request).map_err(|e| PublishError::Encoding(e.to_string()))?;

        let path = self.events_path();
        let url = format!(
            "{}{}?{}",
            self.host,
            path,
            self.signed_query(&path, &body, timestamp)?
        );

        let response = self
            .client()
            .await?
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ChannelPublisher for PusherPublisher {
    async fn publish(
        &self,
        channel: ChannelName,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        self.trigger(channel, event, payload, timestamp).await
    }

    fn name(&self) -> &'static str {
        "pusher"
    }
}

fn body_md5(body: &str) -> String {
    hex::encode(Md5::digest(body.as_bytes()))
}

fn string_to_sign(path: &str, query: &str) -> String {
    format!("POST\n{}\n{}", path, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_body_md5() {
        assert_eq!(body_md5(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_signed_query_layout() {
        let publisher = PusherPublisher::new("https://api-mt1.pusher.com", "3", "key", "secret-value-16ch");
        let query = publisher
            .signed_query("/apps/3/events", "", 1353088179)
            .unwrap();

        let unsigned = "auth_key=key&auth_timestamp=1353088179&auth_version=1.0&body_md5=d41d8cd98f00b204e9800998ecf8427e";
        let expected_signature = publisher
            .signer
            .signature(&format!("POST\n/apps/3/events\n{}", unsigned))
            .unwrap();

        assert_eq!(
            query,
            format!("{}&auth_signature={}", unsigned, expected_signature)
        );
        assert_eq!(expected_signature.len(), 64);
    }

    #[tokio::test]
    async fn test_publish_posts_signed_event() {
        let mut server = mockito::Server::new_async().await;
        let conversation_id = Uuid::new_v4();
        let wire = ChannelName::Conversation(conversation_id).wire_name();

        let mock = server
            .mock("POST", "/apps/123/events")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("auth_key".into(), "app-key".into()),
                Matcher::UrlEncoded("auth_version".into(), "1.0".into()),
                Matcher::Regex("auth_timestamp=[0-9]+".into()),
                Matcher::Regex("body_md5=[0-9a-f]{32}".into()),
                Matcher::Regex("auth_signature=[0-9a-f]{64}".into()),
            ]))
            .match_body(Matcher::PartialJson(json!({
                "name": "new-message",
                "channels": [wire],
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let publisher = PusherPublisher::new(&server.url(), "123", "app-key", "app-secret-value");
        publisher
            .publish(
                ChannelName::Conversation(conversation_id),
                "new-message",
                json!({"text": "Hello"}),
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_publish_payload_is_double_encoded() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/apps/123/events")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "data": "{\"text\":\"Hello\"}",
            })))
            .with_status(200)
            .create_async()
            .await;

        let publisher = PusherPublisher::new(&server.url(), "123", "app-key", "app-secret-value");
        publisher
            .publish(
                ChannelName::Agent(Uuid::new_v4()),
                "new-conversation",
                json!({"text": "Hello"}),
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_publish_is_an_error() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/apps/123/events")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("Invalid signature")
            .create_async()
            .await;

        let publisher = PusherPublisher::new(&server.url(), "123", "app-key", "app-secret-value");
        let result = publisher
            .publish(ChannelName::Agent(Uuid::new_v4()), "new-conversation", json!({}))
            .await;

        match result {
            Err(PublishError::Rejected { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "Invalid signature");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }
}
