use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{OpenApi, param::Header, payload::Json};
use uuid::Uuid;

use crate::{
    application::usecases::submit_campaign::{RecipientInput, SubmitCampaignRequest},
    domain::errors::DomainError,
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags},
        mappers::{map_record, map_stats},
        requests::SubmitCampaignRequestDto,
        responses::{CampaignAnalyticsDto, MessageRecordDto, SubmitCampaignResponseDto},
    },
};

pub struct CampaignsEndpoints {
    state: Arc<ApiState>,
}

impl CampaignsEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl CampaignsEndpoints {
    #[oai(
        path = "/campaigns",
        method = "post",
        tag = EndpointsTags::Campaigns,
    )]
    pub async fn submit_campaign(
        &self,
        #[oai(name = "X-User-Id")] user_id: Header<Uuid>,
        request: Json<SubmitCampaignRequestDto>,
    ) -> PoemResult<Json<SubmitCampaignResponseDto>> {
        let payload = SubmitCampaignRequest {
            owner_id: user_id.0,
            subject: request.subject.clone(),
            template: request.template.clone(),
            provider: request.provider.into(),
            recipients: request
                .recipients
                .iter()
                .map(|r| RecipientInput {
                    email: r.email.0.clone(),
                    fields: r.fields.clone(),
                })
                .collect(),
            throttle_per_hour: request.throttle_per_hour,
            schedule_time: request.schedule_time,
        };

        let response = self
            .state
            .submit_campaign_usecase
            .execute(payload)
            .await
            .map_err(map_submit_error)?;

        Ok(Json(SubmitCampaignResponseDto {
            queued_count: response.queued_count,
            first_rendered_preview: response.first_rendered_preview,
        }))
    }

    #[oai(
        path = "/campaigns/records",
        method = "get",
        tag = EndpointsTags::Campaigns,
    )]
    pub async fn list_records(
        &self,
        #[oai(name = "X-User-Id")] user_id: Header<Uuid>,
    ) -> PoemResult<Json<Vec<MessageRecordDto>>> {
        let records = self
            .state
            .list_records_usecase
            .execute(user_id.0)
            .await
            .map_err(internal_error)?;

        Ok(Json(records.iter().map(map_record).collect()))
    }

    #[oai(
        path = "/campaigns/analytics",
        method = "get",
        tag = EndpointsTags::Campaigns,
    )]
    pub async fn analytics(
        &self,
        #[oai(name = "X-User-Id")] user_id: Header<Uuid>,
    ) -> PoemResult<Json<CampaignAnalyticsDto>> {
        let stats = self
            .state
            .campaign_stats_usecase
            .execute(user_id.0)
            .await
            .map_err(internal_error)?;

        Ok(Json(map_stats(&stats)))
    }
}

fn map_submit_error(err: anyhow::Error) -> poem::Error {
    match err.downcast_ref::<DomainError>() {
        Some(DomainError::Validation(_)) => {
            poem::Error::from_string(err.to_string(), poem::http::StatusCode::BAD_REQUEST)
        }
        _ => internal_error(err),
    }
}

fn internal_error(err: anyhow::Error) -> poem::Error {
    poem::Error::from_string(
        err.to_string(),
        poem::http::StatusCode::INTERNAL_SERVER_ERROR,
    )
}
