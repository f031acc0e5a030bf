use crate::{
    application::services::gateway::ProviderGateway,
    domain::models::{ProviderHealth, ProviderKind},
};

pub struct ProviderStatusUseCase {
    gateway: ProviderGateway,
}

impl ProviderStatusUseCase {
    pub fn new(gateway: ProviderGateway) -> Self {
        Self { gateway }
    }

    /// Probes every configured variant. Probes are safe no-ops (sandboxed or
    /// connection-verify only) and never transmit a real message.
    pub async fn execute(&self) -> Vec<(ProviderKind, ProviderHealth)> {
        let mut statuses = Vec::new();
        for client in self.gateway.all() {
            let health = client.check_status().await;
            statuses.push((client.provider(), health));
        }
        statuses.sort_by_key(|(provider, _)| provider.as_str());
        statuses
    }
}
