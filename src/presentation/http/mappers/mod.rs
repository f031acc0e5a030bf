use anyhow::anyhow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    application::usecases::campaign_stats::CampaignStats,
    domain::{events::DeliveryEvent, models::MessageRecord},
    presentation::http::{
        requests::ProviderEventDto,
        responses::{CampaignAnalyticsDto, DeliveryBreakdownDto, MessageRecordDto},
    },
};

pub fn map_record(record: &MessageRecord) -> MessageRecordDto {
    MessageRecordDto {
        id: record.id,
        recipient_email: record.recipient_email.clone(),
        subject: record.subject.clone(),
        provider: record.provider.into(),
        provider_message_id: record.provider_message_id.clone(),
        send_status: record.send_status.into(),
        delivery_status: record.delivery_status.into(),
        scheduled_time: record.scheduled_time.map(|t| t.to_rfc3339()),
        sent_time: record.sent_time.map(|t| t.to_rfc3339()),
        delivered_time: record.delivered_time.map(|t| t.to_rfc3339()),
        open_time: record.open_time.map(|t| t.to_rfc3339()),
        last_error: record.last_error.clone(),
        created_at: record.created_at.to_rfc3339(),
        updated_at: record.updated_at.to_rfc3339(),
    }
}

pub fn map_stats(stats: &CampaignStats) -> CampaignAnalyticsDto {
    CampaignAnalyticsDto {
        total_sent: stats.counts.sent,
        pending: stats.counts.pending,
        scheduled: stats.counts.scheduled,
        failed: stats.counts.send_failed,
        response_rate: stats.response_rate,
        delivery_status: DeliveryBreakdownDto {
            pending: stats.counts.delivery_pending,
            delivered: stats.counts.delivered,
            opened: stats.counts.opened,
            bounced: stats.counts.bounced,
            failed: stats.counts.delivery_failed,
        },
    }
}

/// Accepts the callback body as either one event object or an array of them
/// and normalizes into domain events. A structural failure here rejects the
/// whole request; anything event-level is the reconciler's business.
pub fn parse_delivery_events(body: &serde_json::Value) -> anyhow::Result<Vec<DeliveryEvent>> {
    let raw: Vec<ProviderEventDto> = if body.is_array() {
        serde_json::from_value(body.clone())?
    } else {
        vec![serde_json::from_value(body.clone())?]
    };
    raw.into_iter().map(map_event).collect()
}

fn map_event(raw: ProviderEventDto) -> anyhow::Result<DeliveryEvent> {
    let timestamp = DateTime::<Utc>::from_timestamp(raw.timestamp, 0)
        .ok_or_else(|| anyhow!("event timestamp out of range: {}", raw.timestamp))?;
    let record_id = raw
        .custom_args
        .as_ref()
        .and_then(|args| args.email_id.as_deref())
        .and_then(|id| Uuid::parse_str(id).ok());
    Ok(DeliveryEvent {
        event_type: raw.event,
        recipient_email: raw.email,
        timestamp,
        record_id,
        provider_message_id: raw.sg_message_id,
        reason: raw.reason,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn parses_a_single_event_object() {
        let body = json!({
            "event": "open",
            "email": "a@x.io",
            "timestamp": 1_748_779_200
        });
        let events = parse_delivery_events(&body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "open");
        assert_eq!(events[0].recipient_email, "a@x.io");
        assert!(events[0].record_id.is_none());
    }

    #[test]
    fn parses_an_event_array_with_correlation_hints() {
        let id = Uuid::new_v4();
        let body = json!([
            {
                "event": "delivered",
                "email": "a@x.io",
                "timestamp": 1_748_779_200,
                "sg_message_id": "sg-1"
            },
            {
                "event": "bounce",
                "email": "b@x.io",
                "timestamp": 1_748_779_260,
                "customArgs": { "emailId": id.to_string() },
                "reason": "550 user unknown"
            }
        ]);
        let events = parse_delivery_events(&body).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].provider_message_id.as_deref(), Some("sg-1"));
        assert_eq!(events[1].record_id, Some(id));
        assert_eq!(events[1].reason.as_deref(), Some("550 user unknown"));
    }

    #[test]
    fn non_uuid_custom_arg_is_ignored() {
        let body = json!({
            "event": "open",
            "email": "a@x.io",
            "timestamp": 1_748_779_200,
            "customArgs": { "emailId": "not-a-uuid" }
        });
        let events = parse_delivery_events(&body).unwrap();
        assert!(events[0].record_id.is_none());
    }

    #[test]
    fn structurally_malformed_body_is_an_error() {
        let body = json!({ "event": "open" });
        assert!(parse_delivery_events(&body).is_err());
        assert!(parse_delivery_events(&json!("just a string")).is_err());
    }
}
