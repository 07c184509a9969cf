use crate::domain::deal::{Amount, DealId};
use crate::domain::user::UserId;
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const PAYMENT_ID_LEN: usize = 12;
pub const REFERENCE_MIN_CHARS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    ScreenshotProof,
    ReferenceId,
}

/// Verification state of a payment claim.
///
/// Nothing advances a record past `PendingVerification`; the variant exists as the
/// hook for an out-of-band verification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    PendingVerification,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(raw[..PAYMENT_ID_LEN].to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user-supplied transaction reference, at least 8 characters after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceId(String);

impl ReferenceId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let text = raw.trim();
        if text.chars().count() < REFERENCE_MIN_CHARS {
            return Err(ValidationError::ReferenceTooShort {
                min: REFERENCE_MIN_CHARS,
            });
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Evidence of payment submitted by the payer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proof {
    Screenshot { file_id: String },
    Reference(ReferenceId),
}

impl Proof {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Proof::Screenshot { .. } => PaymentMethod::ScreenshotProof,
            Proof::Reference(_) => PaymentMethod::ReferenceId,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub deal_id: DealId,
    pub payer_id: UserId,
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    /// The payment id itself for screenshots, the typed reference otherwise.
    pub reference_id: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn pending(deal_id: DealId, payer_id: UserId, amount: Amount, proof: &Proof) -> Self {
        let payment_id = PaymentId::generate();
        let reference_id = match proof {
            Proof::Screenshot { .. } => payment_id.as_str().to_string(),
            Proof::Reference(reference) => reference.as_str().to_string(),
        };
        Self {
            payment_id,
            deal_id,
            payer_id,
            amount,
            payment_method: proof.method(),
            reference_id,
            status: PaymentStatus::PendingVerification,
            created_at: Utc::now(),
        }
    }
}
