//! Payment gateway integration: domain types, provider trait and the Xendit client

pub mod error;
pub mod provider;
pub mod providers;
pub mod types;
pub mod utils;

pub use error::{PaymentError, PaymentResult};
pub use provider::PaymentProvider;
pub use types::{
    ChargeChannel, ChargeDisplay, ChargeRequest, PaymentMethodKind, PaymentStatus,
    ReconciliationEvent, WebhookEvent,
};
