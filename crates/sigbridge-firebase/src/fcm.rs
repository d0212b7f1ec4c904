//! FCM push adapter — sends data messages over the FCM HTTP API.

use async_trait::async_trait;

use sigbridge_core::config::DeliveryConfig;
use sigbridge_core::traits::NotificationDispatch;
use sigbridge_core::types::{DeliveryFailure, Recipient, SignalPayload};

const FCM_SEND_URL: &str = "https://fcm.googleapis.com/fcm/send";

/// FCM server-key dispatcher.
pub struct FcmDispatch {
    server_key: String,
    ttl_secs: u64,
    channel_id: String,
    client: reqwest::Client,
}

impl FcmDispatch {
    pub fn new(server_key: impl Into<String>, delivery: &DeliveryConfig) -> Self {
        Self {
            server_key: server_key.into(),
            ttl_secs: delivery.ttl_secs,
            channel_id: delivery.channel_id.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn message_body(&self, recipient: &Recipient, payload: &SignalPayload) -> serde_json::Value {
        serde_json::json!({
            "to": recipient.delivery_token.clone(),
            "priority": "high",
            // Stale signals are dropped by the transport, not delivered late.
            "time_to_live": self.ttl_secs,
            "data": payload,
            "notification": {
                "title": "🎯 New Trading Signal",
                "body": payload.formatted_message.clone(),
                "sound": "default",
                "android_channel_id": self.channel_id.clone(),
            },
        })
    }
}

#[async_trait]
impl NotificationDispatch for FcmDispatch {
    async fn send(
        &self,
        recipient: &Recipient,
        payload: &SignalPayload,
    ) -> Result<(), DeliveryFailure> {
        let response = self
            .client
            .post(FCM_SEND_URL)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&self.message_body(recipient, payload))
            .send()
            .await
            .map_err(|e| DeliveryFailure::Transient(format!("FCM request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(DeliveryFailure::Transient(format!("FCM HTTP {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DeliveryFailure::Transient(format!("Invalid FCM response: {e}")))?;

        classify_send_result(&body)
    }
}

/// The downstream API reports per-token errors inside a 200 response;
/// unregistered and malformed tokens are permanent, everything else is
/// worth a fresh attempt on the next signal.
fn classify_send_result(body: &serde_json::Value) -> Result<(), DeliveryFailure> {
    let Some(error) = body["results"][0]["error"].as_str() else {
        return Ok(());
    };
    match error {
        "NotRegistered" | "InvalidRegistration" | "MissingRegistration" => {
            Err(DeliveryFailure::InvalidToken)
        }
        other => Err(DeliveryFailure::Transient(format!("FCM error: {other}"))),
    }
}
