use super::deal::{Deal, DealId, DealStats, DealStatus};
use super::payment::PaymentRecord;
use super::user::{User, UserId};
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Outcome of a conditional status write.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// The stored status matched the expectation and was replaced.
    Applied(Deal),
    /// Another writer got there first; nothing was written.
    Conflict { current: DealStatus },
    NotFound,
}

#[async_trait]
pub trait DealStore: Send + Sync {
    /// Persists a freshly materialized deal. Fails with
    /// [`crate::error::EscrowError::DuplicateDeal`] if the id is taken.
    async fn create_deal(&self, deal: Deal) -> Result<Deal>;
    async fn get_deal(&self, deal_id: &DealId) -> Result<Option<Deal>>;
    /// Compare-and-swap on the status field: writes `next` only if the stored
    /// status is still `expected`.
    async fn update_status(
        &self,
        deal_id: &DealId,
        expected: DealStatus,
        next: DealStatus,
    ) -> Result<StatusUpdate>;
    /// All deals, oldest first, optionally restricted to one status.
    async fn list_deals(&self, status: Option<DealStatus>) -> Result<Vec<Deal>>;
    async fn list_deals_by_creator(&self, creator_id: UserId) -> Result<Vec<Deal>>;
    async fn aggregate_stats(&self) -> Result<DealStats>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create_payment_record(&self, record: PaymentRecord) -> Result<PaymentRecord>;
    async fn payments_for_deal(&self, deal_id: &DealId) -> Result<Vec<PaymentRecord>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts or refreshes a user. Returns `true` on first contact.
    async fn upsert_user(&self, user: User) -> Result<bool>;
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;
}

/// The static payment QR image shown with payment instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentQr {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn payment_qr(&self) -> Result<PaymentQr>;
}

pub type DealStoreBox = Box<dyn DealStore>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type UserStoreBox = Box<dyn UserStore>;
pub type AssetSourceBox = Box<dyn AssetSource>;
