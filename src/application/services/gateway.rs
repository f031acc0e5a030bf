use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::models::{MessageRecord, ProviderHealth, ProviderKind};

/// What a provider hands back after accepting a message. Untracked providers
/// leave the id empty.
#[derive(Debug, Clone, Default)]
pub struct SendReceipt {
    pub provider_message_id: Option<String>,
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> ProviderKind;

    async fn send(&self, record: &MessageRecord) -> anyhow::Result<SendReceipt>;

    /// Safe operational probe: must not transmit a real message.
    async fn check_status(&self) -> ProviderHealth;
}

/// Tagged-variant dispatch over the configured provider clients. The worker
/// stays provider-agnostic; it only selects which client to call.
#[derive(Clone)]
pub struct ProviderGateway {
    clients: HashMap<ProviderKind, Arc<dyn ProviderClient>>,
}

impl ProviderGateway {
    pub fn new(clients: Vec<Arc<dyn ProviderClient>>) -> Self {
        let mut map = HashMap::new();
        for client in clients {
            map.insert(client.provider(), client);
        }
        Self { clients: map }
    }

    pub fn get(&self, provider: ProviderKind) -> Option<Arc<dyn ProviderClient>> {
        self.clients.get(&provider).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn ProviderClient>> {
        self.clients.values().cloned().collect()
    }
}
