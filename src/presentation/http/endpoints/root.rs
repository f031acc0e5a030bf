use std::sync::Arc;

use poem_openapi::Tags;

use crate::application::{
    handlers::reconciler::DeliveryReconciler,
    usecases::{
        campaign_stats::CampaignStatsUseCase, list_records::ListRecordsUseCase,
        provider_status::ProviderStatusUseCase, submit_campaign::SubmitCampaignUseCase,
    },
};

pub struct ApiState {
    pub submit_campaign_usecase: Arc<SubmitCampaignUseCase>,
    pub list_records_usecase: Arc<ListRecordsUseCase>,
    pub campaign_stats_usecase: Arc<CampaignStatsUseCase>,
    pub provider_status_usecase: Arc<ProviderStatusUseCase>,
    pub reconciler: Arc<DeliveryReconciler>,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Campaigns,
    Providers,
    Webhooks,
}
