use crate::domain::deal::{DealId, DealStatus};
use crate::domain::lifecycle::Trigger;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EscrowError>;

/// Everything that can go wrong while handling a single inbound event.
///
/// No variant is fatal to the process: each one is scoped to the request that
/// produced it and is reported back to the caller.
#[derive(Error, Debug)]
pub enum EscrowError {
    #[error("Access denied: only operators can {action}")]
    Unauthorized { action: &'static str },
    #[error("Too many requests, try again in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Deal #{0} not found")]
    DealNotFound(DealId),
    #[error("Session expired, please start again")]
    SessionExpired,
    #[error("Deal #{deal_id} is {from}, cannot {trigger}")]
    IllegalTransition {
        deal_id: DealId,
        from: DealStatus,
        trigger: Trigger,
    },
    #[error("Deal id #{0} is already taken")]
    DuplicateDeal(DealId),
    #[error("Could not load payment instructions: {0}")]
    Asset(String),
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl EscrowError {
    /// Collaborator failures: the caller may simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EscrowError::Asset(_)
                | EscrowError::IoError(_)
                | EscrowError::InternalError(_)
                | EscrowError::RateLimited { .. }
        )
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for EscrowError {
    fn from(err: rocksdb::Error) -> Self {
        EscrowError::InternalError(Box::new(err))
    }
}

/// A single turn of input failed a field constraint.
///
/// Always recoverable: the conversation re-prompts the same stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Description too short, please provide at least {min} characters")]
    DescriptionTooShort { min: usize },
    #[error("Description too long, please keep it under {max} characters")]
    DescriptionTooLong { max: usize },
    #[error("Terms too short, please provide at least {min} characters")]
    TermsTooShort { min: usize },
    #[error("Terms too long, please keep it under {max} characters")]
    TermsTooLong { max: usize },
    #[error("Invalid amount, please enter a valid number")]
    AmountNotNumeric,
    #[error("Minimum amount is {min}")]
    AmountBelowMinimum { min: Decimal },
    #[error("Maximum amount is {max}")]
    AmountAboveMaximum { max: Decimal },
    #[error("Please provide a valid reference id (minimum {min} characters)")]
    ReferenceTooShort { min: usize },
    #[error("Please send a screenshot or a payment reference id")]
    MissingProof,
}
