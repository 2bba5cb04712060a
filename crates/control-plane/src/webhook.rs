// Webhook notification delivery
//
// Posts each new alert with its recipient list as JSON to a configured URL.
// The receiving side fans out to email, chat or SMS.

use async_trait::async_trait;
use paperwatch_core::{Alert, NotifyError, Notifier, Recipient};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    recipients: &'a [Recipient],
    alert: &'a Alert,
}

pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, alert: &Alert, recipients: &[Recipient]) -> Result<(), NotifyError> {
        debug!(url = %self.url, alert_id = %alert.id, "Posting notification webhook");

        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { recipients, alert })
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, body = %body, "Notification webhook rejected");
            return Err(NotifyError::Delivery(format!("HTTP {}: {}", status, body)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use chrono::Utc;
    use paperwatch_core::AlertDraft;
    use std::sync::{Arc, Mutex};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/hook")
    }

    #[tokio::test]
    async fn test_posts_alert_and_recipients() {
        let received = Arc::new(Mutex::new(Vec::<serde_json::Value>::new()));
        let sink = received.clone();
        let url = serve(Router::new().route(
            "/hook",
            post(move |Json(body): Json<serde_json::Value>| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(body);
                    StatusCode::NO_CONTENT
                }
            }),
        ))
        .await;

        let alert = AlertDraft::reported_theft().into_alert("D1", "2F North".into(), Utc::now());
        let recipients = vec![Recipient {
            address: "ops@example.com".into(),
        }];
        WebhookNotifier::new(url)
            .unwrap()
            .send(&alert, &recipients)
            .await
            .unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["alert"]["device_id"], "D1");
        assert_eq!(received[0]["recipients"][0]["address"], "ops@example.com");
    }

    #[tokio::test]
    async fn test_non_success_is_delivery_error() {
        let url = serve(Router::new().route(
            "/hook",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        ))
        .await;

        let alert = AlertDraft::reported_theft().into_alert("D1", "L".into(), Utc::now());
        let err = WebhookNotifier::new(url)
            .unwrap()
            .send(&alert, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Delivery(msg) if msg.contains("502")));
    }
}
