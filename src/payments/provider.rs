use crate::payments::error::PaymentResult;
use crate::payments::types::{
    ChargeRequest, PaymentMethodKind, ProviderChargeResult, ProviderStatusResult,
};
use async_trait::async_trait;

/// Outbound side of a payment gateway.
///
/// Implementations only talk to the gateway; persisting the outcome is the
/// caller's job.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a QRIS invoice, fixed virtual account or e-wallet charge
    async fn create_charge(&self, request: ChargeRequest) -> PaymentResult<ProviderChargeResult>;

    /// Fetch the gateway's current view of a charge created earlier
    async fn get_charge_status(
        &self,
        method: PaymentMethodKind,
        provider_payment_id: &str,
    ) -> PaymentResult<ProviderStatusResult>;

    fn name(&self) -> &'static str;
}
