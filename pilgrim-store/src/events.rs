use async_trait::async_trait;
use pilgrim_core::Notifier;
use pilgrim_shared::models::events::{Audience, BookingCreatedEvent, ConsultationRequestedEvent, NotificationEnvelope};
use pilgrim_shared::pii::redact_email;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

type NotifyResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    booking_topic: String,
    consultation_topic: String,
}

impl EventProducer {
    pub fn new(brokers: &str, booking_topic: &str, consultation_topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            booking_topic: booking_topic.to_string(),
            consultation_topic: consultation_topic.to_string(),
        })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }

    /// One message per audience, keyed so both land on the same partition.
    async fn publish_both<E: Serialize + Clone>(&self, topic: &str, key: &str, event: &E) -> NotifyResult {
        for audience in [Audience::Requester, Audience::Operator] {
            let envelope = NotificationEnvelope {
                audience,
                event: event.clone(),
            };
            let payload = serde_json::to_string(&envelope)?;
            self.publish(topic, key, &payload).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for EventProducer {
    async fn booking_created(&self, event: &BookingCreatedEvent) -> NotifyResult {
        self.publish_both(&self.booking_topic, &event.booking_ref, event).await
    }

    async fn consultation_requested(&self, event: &ConsultationRequestedEvent) -> NotifyResult {
        self.publish_both(&self.consultation_topic, &event.consultation_id.to_string(), event)
            .await
    }
}

/// Used when Kafka is disabled: notifications only reach the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn booking_created(&self, event: &BookingCreatedEvent) -> NotifyResult {
        info!(
            booking_ref = %event.booking_ref,
            tour = %event.tour_title,
            customer = %redact_email(event.customer_email.expose()),
            deposit = %event.deposit,
            "Booking confirmation queued (log only)"
        );
        Ok(())
    }

    async fn consultation_requested(&self, event: &ConsultationRequestedEvent) -> NotifyResult {
        info!(
            consultation_id = %event.consultation_id,
            requester = %redact_email(event.email.expose()),
            preferred_date = ?event.preferred_date,
            "Consultation acknowledgement queued (log only)"
        );
        Ok(())
    }
}
