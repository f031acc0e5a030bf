use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{OpenApi, payload::Json};

use crate::presentation::http::{
    endpoints::root::{ApiState, EndpointsTags},
    mappers::parse_delivery_events,
    responses::WebhookAckDto,
};

pub struct WebhookEndpoints {
    state: Arc<ApiState>,
}

impl WebhookEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl WebhookEndpoints {
    /// Delivery callback ingestion. Providers post a single event object or
    /// an array; the batch always gets a 200 once it parses — events that
    /// correlate to nothing are no-ops, not errors.
    #[oai(
        path = "/webhooks/delivery",
        method = "post",
        tag = EndpointsTags::Webhooks,
    )]
    pub async fn delivery_events(
        &self,
        body: Json<serde_json::Value>,
    ) -> PoemResult<Json<WebhookAckDto>> {
        let events = parse_delivery_events(&body.0).map_err(|err| {
            tracing::error!(error = %err, "malformed delivery callback batch");
            poem::Error::from_string(
                err.to_string(),
                poem::http::StatusCode::INTERNAL_SERVER_ERROR,
            )
        })?;

        let processed = self.state.reconciler.apply_batch(&events).await;
        Ok(Json(WebhookAckDto { processed }))
    }
}
