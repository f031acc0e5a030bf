use chrono::{DateTime, Utc};
use poem_openapi::Object;
use serde::Deserialize;

use crate::presentation::models::ProviderKindDto;

#[derive(Object, Debug)]
pub struct RecipientDto {
    pub email: poem_openapi::types::Email,
    /// Free-form template fields for this recipient.
    #[oai(default)]
    pub fields: serde_json::Value,
}

#[derive(Object, Debug)]
pub struct SubmitCampaignRequestDto {
    #[oai(validator(min_length = 1))]
    pub subject: String,
    #[oai(validator(min_length = 1))]
    pub template: String,
    pub provider: ProviderKindDto,
    #[oai(validator(min_items = 1))]
    pub recipients: Vec<RecipientDto>,
    #[oai(validator(minimum(value = "1")))]
    pub throttle_per_hour: u32,
    pub schedule_time: Option<DateTime<Utc>>,
}

/// Raw callback event as providers post it: `timestamp` in epoch seconds,
/// correlation hints optional. Batches arrive as one object or an array.
#[derive(Debug, Deserialize)]
pub struct ProviderEventDto {
    pub event: String,
    pub email: String,
    pub timestamp: i64,
    #[serde(default)]
    pub sg_message_id: Option<String>,
    #[serde(default, rename = "customArgs")]
    pub custom_args: Option<ProviderEventCustomArgs>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderEventCustomArgs {
    #[serde(rename = "emailId")]
    pub email_id: Option<String>,
}
