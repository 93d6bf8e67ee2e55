//! Push notification channels for Stork.
//!
//! [`HttpPushNotifier`] posts topic messages to an FCM-style HTTP push
//! gateway. [`LogNotifier`] only logs, for deployments without a gateway.

use reqwest::Client;
use serde::Serialize;
use stork_core::prelude::*;
use tracing::{debug, info, instrument};

#[derive(Serialize)]
struct PushRequest<'a> {
    message: PushMessage<'a>,
}

#[derive(Serialize)]
struct PushMessage<'a> {
    topic: &'a str,
    notification: PushContent<'a>,
}

#[derive(Serialize)]
struct PushContent<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

#[derive(Clone)]
pub struct HttpPushNotifier {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpPushNotifier {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            token,
        }
    }
}

impl Notifier for HttpPushNotifier {
    #[instrument(skip(self, notification), fields(topic = %notification.topic))]
    async fn send(&self, notification: &PushNotification) -> Result<(), NotificationError> {
        let payload = PushRequest {
            message: PushMessage {
                topic: &notification.topic,
                notification: PushContent {
                    title: &notification.title,
                    body: &notification.body,
                    image: notification.icon.as_deref(),
                },
            },
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Push gateway accepted notification");
        Ok(())
    }
}

/// Logs every notification and reports success.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, notification: &PushNotification) -> Result<(), NotificationError> {
        info!(
            topic = %notification.topic,
            title = %notification.title,
            "Push notification (log only): {}",
            notification.body
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification(icon: Option<&str>) -> PushNotification {
        PushNotification {
            topic: topic_for("My Game"),
            title: "New bundle".into(),
            body: "Level 2 is live".into(),
            icon: icon.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn posts_topic_message() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer push-secret"))
            .and(body_json(serde_json::json!({
                "message": {
                    "topic": "My-Game",
                    "notification": {
                        "title": "New bundle",
                        "body": "Level 2 is live",
                        "image": "https://cdn.example.com/icon.png"
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&gateway)
            .await;

        let notifier =
            HttpPushNotifier::new(format!("{}/send", gateway.uri()), Some("push-secret".into()));
        notifier
            .send(&notification(Some("https://cdn.example.com/icon.png")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn omits_missing_icon() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "message": {
                    "topic": "My-Game",
                    "notification": { "title": "New bundle", "body": "Level 2 is live" }
                }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&gateway)
            .await;

        HttpPushNotifier::new(gateway.uri(), None)
            .send(&notification(None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn gateway_rejection_is_reported() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("topic not allowed"))
            .mount(&gateway)
            .await;

        let err = HttpPushNotifier::new(gateway.uri(), None)
            .send(&notification(None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NotificationError::Rejected { status: 403, ref body } if body == "topic not allowed"
        ));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_transport_error() {
        let err = HttpPushNotifier::new("http://127.0.0.1:9/send", None)
            .send(&notification(None))
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Transport(_)));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        LogNotifier.send(&notification(None)).await.unwrap();
    }
}
