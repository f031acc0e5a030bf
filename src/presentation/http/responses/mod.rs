use poem_openapi::Object;
use uuid::Uuid;

use crate::presentation::models::{DeliveryStatusDto, ProviderHealthDto, ProviderKindDto, SendStatusDto};

#[derive(Object)]
pub struct SubmitCampaignResponseDto {
    pub queued_count: u32,
    pub first_rendered_preview: Option<String>,
}

#[derive(Object)]
pub struct MessageRecordDto {
    pub id: Uuid,
    pub recipient_email: String,
    pub subject: String,
    pub provider: ProviderKindDto,
    pub provider_message_id: Option<String>,
    pub send_status: SendStatusDto,
    pub delivery_status: DeliveryStatusDto,
    pub scheduled_time: Option<String>,
    pub sent_time: Option<String>,
    pub delivered_time: Option<String>,
    pub open_time: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Object)]
pub struct CampaignAnalyticsDto {
    pub total_sent: u64,
    pub pending: u64,
    pub scheduled: u64,
    pub failed: u64,
    pub response_rate: f64,
    pub delivery_status: DeliveryBreakdownDto,
}

#[derive(Object)]
pub struct DeliveryBreakdownDto {
    pub pending: u64,
    pub delivered: u64,
    pub opened: u64,
    pub bounced: u64,
    pub failed: u64,
}

#[derive(Object)]
pub struct ProviderStatusDto {
    pub provider: ProviderKindDto,
    pub status: ProviderHealthDto,
}

#[derive(Object)]
pub struct WebhookAckDto {
    pub processed: u32,
}
