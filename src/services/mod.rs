//! Services module for payment business logic

pub mod charge;
pub mod reconciliation;
pub mod reference;
pub mod webhook_processor;

pub use charge::{ChargeResponse, ChargeService};
pub use reconciliation::{ReconciliationOutcome, ReconciliationService};
pub use reference::ReferenceIdGenerator;
pub use webhook_processor::{WebhookOutcome, WebhookProcessor, WebhookProcessorError};
