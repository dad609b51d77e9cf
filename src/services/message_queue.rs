//! Message queue
//!
//! Outbound notifications travel as JSON messages on SQS queues.

use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client as SqsClient;
use serde::{Deserialize, Serialize};

/// Environment variable naming the check-in flight queue
pub const CHECK_IN_FLIGHT_QUEUE_URL_VAR: &str = "CHECK_IN_FLIGHT_SQS_QUEUE_URL";

/// Environment variable naming the check-in passenger queue
pub const CHECK_IN_PASSENGER_QUEUE_URL_VAR: &str = "CHECK_IN_PASSENGER_SQS_QUEUE_URL";

/// Message queued for every flight whose check-in window opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInFlightMessage {
    pub flight_id: String,
}

/// Message queued for every passenger to notify about an open check-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInPassengerMessage {
    pub flight_id: String,
    pub passenger_id: String,
}

/// Queue the notification services publish to
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Send a raw message body; true when the queue accepted it
    async fn send_message(&self, queue_url: &str, body: &str) -> Result<bool, MessageQueueError>;

    /// Send a check-in message to the check-in flight queue
    async fn send_check_in_flight_message(
        &self,
        message: &CheckInFlightMessage,
    ) -> Result<bool, MessageQueueError>;

    /// Send a message to the check-in passenger queue
    async fn send_check_in_passenger_message(
        &self,
        message: &CheckInPassengerMessage,
    ) -> Result<bool, MessageQueueError>;
}

/// SQS-backed [`MessageQueue`]
#[derive(Clone)]
pub struct SqsMessageQueue {
    client: SqsClient,
    check_in_flight_queue_url: Option<String>,
    check_in_passenger_queue_url: Option<String>,
}

impl SqsMessageQueue {
    /// Create a queue publisher.
    ///
    /// A missing queue URL is only reported when a message for that queue
    /// is sent.
    pub fn new(
        client: SqsClient,
        check_in_flight_queue_url: Option<String>,
        check_in_passenger_queue_url: Option<String>,
    ) -> Self {
        Self {
            client,
            check_in_flight_queue_url,
            check_in_passenger_queue_url,
        }
    }
}

/// Serialize a message and hand it to `queue`
pub async fn send_json<Q, M>(queue: &Q, queue_url: &str, message: &M) -> Result<bool, MessageQueueError>
where
    Q: MessageQueue + ?Sized,
    M: Serialize + Sync,
{
    let body =
        serde_json::to_string(message).map_err(|e| MessageQueueError::Serialization(e.to_string()))?;
    queue.send_message(queue_url, &body).await
}

#[async_trait]
impl MessageQueue for SqsMessageQueue {
    async fn send_message(&self, queue_url: &str, body: &str) -> Result<bool, MessageQueueError> {
        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| MessageQueueError::Sqs(DisplayErrorContext(e).to_string()))?;

        tracing::debug!(
            queue_url = %queue_url,
            message_id = ?output.message_id(),
            "Message sent"
        );

        Ok(output.message_id().is_some())
    }

    async fn send_check_in_flight_message(
        &self,
        message: &CheckInFlightMessage,
    ) -> Result<bool, MessageQueueError> {
        let queue_url = self
            .check_in_flight_queue_url
            .as_deref()
            .ok_or(MessageQueueError::ConfigMissing(CHECK_IN_FLIGHT_QUEUE_URL_VAR))?;

        send_json(self, queue_url, message).await
    }

    async fn send_check_in_passenger_message(
        &self,
        message: &CheckInPassengerMessage,
    ) -> Result<bool, MessageQueueError> {
        let queue_url = self
            .check_in_passenger_queue_url
            .as_deref()
            .ok_or(MessageQueueError::ConfigMissing(CHECK_IN_PASSENGER_QUEUE_URL_VAR))?;

        send_json(self, queue_url, message).await
    }
}

/// Errors that can occur while publishing messages
#[derive(Debug, Clone, thiserror::Error)]
pub enum MessageQueueError {
    #[error("There is no environment variable named {0}.")]
    ConfigMissing(&'static str),

    #[error("SQS error: {0}")]
    Sqs(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_sqs::config::{BehaviorVersion, Credentials, Region};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessageQueue for Recorder {
        async fn send_message(&self, queue_url: &str, body: &str) -> Result<bool, MessageQueueError> {
            self.sent
                .lock()
                .unwrap()
                .push((queue_url.to_string(), body.to_string()));
            Ok(true)
        }

        async fn send_check_in_flight_message(
            &self,
            message: &CheckInFlightMessage,
        ) -> Result<bool, MessageQueueError> {
            send_json(self, "memory://check-in", message).await
        }

        async fn send_check_in_passenger_message(
            &self,
            message: &CheckInPassengerMessage,
        ) -> Result<bool, MessageQueueError> {
            send_json(self, "memory://check-in-passenger", message).await
        }
    }

    fn offline_client() -> SqsClient {
        let config = aws_sdk_sqs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .build();
        SqsClient::from_conf(config)
    }

    #[test]
    fn test_message_body_uses_camel_case() {
        let message = CheckInFlightMessage {
            flight_id: "f-1".to_string(),
        };
        assert_eq!(serde_json::to_value(&message).unwrap(), json!({"flightId": "f-1"}));
    }

    #[tokio::test]
    async fn test_send_json_serializes_message() {
        let queue = Recorder::default();
        let sent = queue
            .send_check_in_flight_message(&CheckInFlightMessage {
                flight_id: "f-9".to_string(),
            })
            .await
            .unwrap();

        assert!(sent);
        let recorded = queue.sent.lock().unwrap();
        assert_eq!(recorded[0].0, "memory://check-in");
        assert_eq!(recorded[0].1, r#"{"flightId":"f-9"}"#);
    }

    #[tokio::test]
    async fn test_missing_queue_url_fails_before_sending() {
        let queue = SqsMessageQueue::new(offline_client(), None, None);
        let result = queue
            .send_check_in_flight_message(&CheckInFlightMessage {
                flight_id: "f-1".to_string(),
            })
            .await;

        assert!(matches!(
            result,
            Err(MessageQueueError::ConfigMissing(CHECK_IN_FLIGHT_QUEUE_URL_VAR))
        ));
    }

    #[tokio::test]
    async fn test_passenger_message_needs_its_own_queue_url() {
        let queue = SqsMessageQueue::new(
            offline_client(),
            Some("http://localhost:4566/000000000000/check-in-flight".to_string()),
            None,
        );
        let result = queue
            .send_check_in_passenger_message(&CheckInPassengerMessage {
                flight_id: "f-1".to_string(),
                passenger_id: "p-1".to_string(),
            })
            .await;

        assert!(matches!(
            result,
            Err(MessageQueueError::ConfigMissing(CHECK_IN_PASSENGER_QUEUE_URL_VAR))
        ));
    }

    #[tokio::test]
    async fn test_passenger_message_body() {
        let queue = Recorder::default();
        queue
            .send_check_in_passenger_message(&CheckInPassengerMessage {
                flight_id: "f-1".to_string(),
                passenger_id: "p-2".to_string(),
            })
            .await
            .unwrap();

        let recorded = queue.sent.lock().unwrap();
        assert_eq!(recorded[0].0, "memory://check-in-passenger");
        assert_eq!(recorded[0].1, r#"{"flightId":"f-1","passengerId":"p-2"}"#);
    }
}
