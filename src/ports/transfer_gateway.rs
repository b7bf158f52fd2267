//! Transfer gateway port.
//!
//! Outbound money: recipient creation and transfer initiation against the
//! provider's payout API, plus the balance read used before initiating.
//! Treated as an opaque external service with its own latency and failure
//! modes; transient failures are recorded on the already-created payout
//! row, never bubbled into the inbound webhook result.

use async_trait::async_trait;

use crate::domain::foundation::{CurrencyCode, DomainError};

/// A provider-side transfer recipient handle.
#[derive(Debug, Clone)]
pub struct TransferRecipient {
    pub recipient_code: String,
}

/// Result of initiating a transfer.
#[derive(Debug, Clone)]
pub struct TransferInitiation {
    /// Stable reference used to match the settlement webhook.
    pub reference: String,
    /// Provider transfer handle, when assigned synchronously.
    pub transfer_code: Option<String>,
    /// Whether the transfer is parked behind an OTP challenge.
    pub requires_otp: bool,
}

/// Port for the provider payout/transfer API.
#[async_trait]
pub trait TransferGateway: Send + Sync {
    /// Creates (or reuses) a transfer recipient for the given bank
    /// credentials handle.
    async fn create_recipient(
        &self,
        name: &str,
        account_number: &str,
        bank_code: &str,
        currency: &CurrencyCode,
    ) -> Result<TransferRecipient, DomainError>;

    /// Initiates a transfer; `reference` is caller-supplied so the
    /// settlement webhook can be matched without guessing.
    async fn initiate_transfer(
        &self,
        recipient_code: &str,
        amount_cents: i64,
        currency: &CurrencyCode,
        reference: &str,
        reason: &str,
    ) -> Result<TransferInitiation, DomainError>;

    /// Available balance in minor units for the given currency.
    async fn balance(&self, currency: &CurrencyCode) -> Result<i64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn TransferGateway) {}
    }
}
