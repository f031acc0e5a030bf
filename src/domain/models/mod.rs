pub mod message;
pub mod provider;

pub use message::{DeliveryStatus, MessageRecord, NewMessageRecord, SendStatus, StatusCounts};
pub use provider::{ProviderHealth, ProviderKind};
