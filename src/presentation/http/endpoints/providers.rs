use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{OpenApi, payload::Json};

use crate::presentation::http::{
    endpoints::root::{ApiState, EndpointsTags},
    responses::ProviderStatusDto,
};

pub struct ProvidersEndpoints {
    state: Arc<ApiState>,
}

impl ProvidersEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl ProvidersEndpoints {
    #[oai(
        path = "/providers/status",
        method = "get",
        tag = EndpointsTags::Providers,
    )]
    pub async fn provider_status(&self) -> PoemResult<Json<Vec<ProviderStatusDto>>> {
        let statuses = self.state.provider_status_usecase.execute().await;
        Ok(Json(
            statuses
                .into_iter()
                .map(|(provider, status)| ProviderStatusDto {
                    provider: provider.into(),
                    status: status.into(),
                })
                .collect(),
        ))
    }
}
