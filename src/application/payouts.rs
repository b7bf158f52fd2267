//! Payout initiation.
//!
//! Creates the payout ledger row at the moment the transfer is initiated,
//! so the settlement webhook always has a row to reconcile against. The
//! caller-supplied reference is what the webhook matches on.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::DEBIT_RECOVERY_CAP_CENTS;
use crate::domain::foundation::{CreatorId, CurrencyCode, DomainError, ErrorCode, Timestamp};
use crate::domain::ledger::{Activity, Payment, PaymentStatus};
use crate::ports::{ActivityLog, PaymentStore, PayoutStatus, ProfileStore, TransferGateway};

pub struct PayoutInitiator {
    payments: Arc<dyn PaymentStore>,
    profiles: Arc<dyn ProfileStore>,
    activities: Arc<dyn ActivityLog>,
    gateway: Arc<dyn TransferGateway>,
}

impl PayoutInitiator {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        profiles: Arc<dyn ProfileStore>,
        activities: Arc<dyn ActivityLog>,
        gateway: Arc<dyn TransferGateway>,
    ) -> Self {
        Self {
            payments,
            profiles,
            activities,
            gateway,
        }
    }

    /// Initiates a transfer to the creator's stored recipient and records
    /// the pending payout row.
    ///
    /// Any outstanding platform debit is recovered here, capped per payout:
    /// the transfer is reduced by the recovered amount, the profile debit is
    /// decremented, and the recovery lands as its own activity.
    ///
    /// # Errors
    ///
    /// - `ProfileNotFound` if the creator has no profile
    /// - `ValidationFailed` if the amount is not positive, payouts are not
    ///   enabled, no recipient is stored, the platform debit consumes the
    ///   whole amount, or the provider balance cannot cover the transfer
    /// - `ProviderError` if the gateway call fails
    pub async fn initiate(
        &self,
        creator_id: CreatorId,
        amount_cents: i64,
        currency: CurrencyCode,
        reason: &str,
    ) -> Result<Payment, DomainError> {
        if amount_cents <= 0 {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "payout amount must be positive",
            ));
        }

        let profile = self
            .profiles
            .find_by_creator(&creator_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(ErrorCode::ProfileNotFound, "creator profile not found")
            })?;
        if profile.payout_status != PayoutStatus::Active {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "payouts are not enabled for this creator",
            ));
        }
        let recipient = profile.transfer_recipient_code.as_ref().ok_or_else(|| {
            DomainError::new(
                ErrorCode::ValidationFailed,
                "creator has no transfer recipient on file",
            )
        })?;

        let withholding = profile
            .platform_debit_cents
            .clamp(0, DEBIT_RECOVERY_CAP_CENTS);
        let transfer_cents = amount_cents - withholding;
        if transfer_cents <= 0 {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "platform debit consumes the whole payout",
            )
            .with_detail("platform_debit_cents", profile.platform_debit_cents.to_string()));
        }

        let available = self.gateway.balance(&currency).await?;
        if available < transfer_cents {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "provider balance cannot cover the transfer",
            )
            .with_detail("available_cents", available.to_string())
            .with_detail("requested_cents", transfer_cents.to_string()));
        }

        let reference = format!("payout_{}", Uuid::new_v4().simple());
        let initiation = self
            .gateway
            .initiate_transfer(
                recipient.expose_secret(),
                transfer_cents,
                &currency,
                &reference,
                reason,
            )
            .await?;

        let status = if initiation.requires_otp {
            PaymentStatus::OtpPending
        } else {
            PaymentStatus::Pending
        };
        let payout = Payment::payout(
            creator_id,
            transfer_cents,
            currency,
            status,
            Some(initiation.reference.clone()),
            initiation.transfer_code.clone(),
            Timestamp::now(),
        );
        self.payments.insert(&payout).await?;

        if withholding > 0 {
            self.recover_platform_debit(&creator_id, withholding, &payout)
                .await;
        }

        let activity = Activity::new(
            creator_id,
            None,
            "payout_initiated",
            serde_json::json!({
                "reference": initiation.reference,
                "amount_cents": transfer_cents,
                "withheld_cents": withholding,
                "requires_otp": initiation.requires_otp,
            }),
        );
        if let Err(err) = self.activities.record(&activity).await {
            warn!(%creator_id, error = %err, "payout initiation activity failed");
        }

        info!(
            %creator_id,
            reference = %initiation.reference,
            amount_cents = transfer_cents,
            withheld_cents = withholding,
            requires_otp = initiation.requires_otp,
            "payout initiated"
        );
        Ok(payout)
    }

    /// Settles the withheld portion against the profile debit. The transfer
    /// has already gone out reduced, so a store failure here is recorded as
    /// an activity rather than failing the payout.
    async fn recover_platform_debit(
        &self,
        creator_id: &CreatorId,
        withholding: i64,
        payout: &Payment,
    ) {
        match self
            .profiles
            .decrement_platform_debit(creator_id, withholding)
            .await
        {
            Ok(recovered) => {
                let activity = Activity::new(
                    *creator_id,
                    None,
                    "platform_debit_recovered",
                    serde_json::json!({
                        "recovered_cents": recovered,
                        "payment_id": payout.id.to_string(),
                    }),
                );
                if let Err(err) = self.activities.record(&activity).await {
                    warn!(%creator_id, error = %err, "debit recovery activity failed");
                }
            }
            Err(err) => {
                warn!(%creator_id, error = %err, "debit recovery failed");
                let activity = Activity::side_effect_failure(
                    *creator_id,
                    "debit_recovery_failed",
                    &err.to_string(),
                    serde_json::json!({ "payment_id": payout.id.to_string() }),
                );
                if let Err(err) = self.activities.record(&activity).await {
                    warn!(%creator_id, error = %err, "debit recovery activity failed");
                }
            }
        }
    }
}
