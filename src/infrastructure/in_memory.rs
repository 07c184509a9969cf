use crate::domain::deal::{Deal, DealId, DealStats, DealStatus};
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::{
    AssetSource, DealStore, PaymentQr, PaymentStore, StatusUpdate, UserStore,
};
use crate::domain::user::{User, UserId};
use crate::error::{EscrowError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct DealTable {
    deals: HashMap<DealId, Deal>,
    /// Insertion order, so listings come back oldest first.
    order: Vec<DealId>,
}

impl DealTable {
    fn ordered(&self) -> impl Iterator<Item = &Deal> {
        self.order.iter().filter_map(|id| self.deals.get(id))
    }
}

/// A thread-safe in-memory deal store.
///
/// The status compare-and-swap runs under the table's write lock, so it is atomic
/// with respect to every other writer of the same store.
#[derive(Default, Clone)]
pub struct InMemoryDealStore {
    table: Arc<RwLock<DealTable>>,
}

impl InMemoryDealStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DealStore for InMemoryDealStore {
    async fn create_deal(&self, deal: Deal) -> Result<Deal> {
        let mut table = self.table.write().await;
        if table.deals.contains_key(&deal.deal_id) {
            return Err(EscrowError::DuplicateDeal(deal.deal_id));
        }
        table.order.push(deal.deal_id.clone());
        table.deals.insert(deal.deal_id.clone(), deal.clone());
        Ok(deal)
    }

    async fn get_deal(&self, deal_id: &DealId) -> Result<Option<Deal>> {
        let table = self.table.read().await;
        Ok(table.deals.get(deal_id).cloned())
    }

    async fn update_status(
        &self,
        deal_id: &DealId,
        expected: DealStatus,
        next: DealStatus,
    ) -> Result<StatusUpdate> {
        let mut table = self.table.write().await;
        let Some(deal) = table.deals.get_mut(deal_id) else {
            return Ok(StatusUpdate::NotFound);
        };
        if deal.status != expected {
            return Ok(StatusUpdate::Conflict {
                current: deal.status,
            });
        }
        deal.status = next;
        Ok(StatusUpdate::Applied(deal.clone()))
    }

    async fn list_deals(&self, status: Option<DealStatus>) -> Result<Vec<Deal>> {
        let table = self.table.read().await;
        Ok(table
            .ordered()
            .filter(|deal| status.is_none_or(|status| deal.status == status))
            .cloned()
            .collect())
    }

    async fn list_deals_by_creator(&self, creator_id: UserId) -> Result<Vec<Deal>> {
        let table = self.table.read().await;
        Ok(table
            .ordered()
            .filter(|deal| deal.creator_id == creator_id)
            .cloned()
            .collect())
    }

    async fn aggregate_stats(&self) -> Result<DealStats> {
        let table = self.table.read().await;
        Ok(DealStats::tally(table.deals.values()))
    }
}

/// Payment claims grouped by deal, in arrival order.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    records: Arc<RwLock<HashMap<DealId, Vec<PaymentRecord>>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create_payment_record(&self, record: PaymentRecord) -> Result<PaymentRecord> {
        let mut records = self.records.write().await;
        records
            .entry(record.deal_id.clone())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn payments_for_deal(&self, deal_id: &DealId) -> Result<Vec<PaymentRecord>> {
        let records = self.records.read().await;
        Ok(records.get(deal_id).cloned().unwrap_or_default())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn upsert_user(&self, user: User) -> Result<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.user_id) {
            Some(existing) => {
                existing.refresh(user);
                Ok(false)
            }
            None => {
                users.insert(user.user_id, user);
                Ok(true)
            }
        }
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).cloned())
    }
}

/// Serves a fixed QR image from memory, or fails like a missing file when empty.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAssetSource {
    qr: Option<PaymentQr>,
}

impl InMemoryAssetSource {
    pub fn new(qr: PaymentQr) -> Self {
        Self { qr: Some(qr) }
    }

    pub fn missing() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetSource for InMemoryAssetSource {
    async fn payment_qr(&self) -> Result<PaymentQr> {
        self.qr
            .clone()
            .ok_or_else(|| EscrowError::Asset("payment QR image is not available".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deal::{Amount, DealDraft, Description, Terms};
    use crate::domain::payment::{PaymentMethod, Proof};
    use crate::domain::user::Caller;
    use rust_decimal_macros::dec;

    fn deal(id: &str, creator: i64, amount: &str) -> Deal {
        let draft = DealDraft {
            description: Description::parse("Vintage film camera").unwrap(),
            amount: Amount::parse(amount).unwrap(),
            terms: Terms::parse("Shipped within two days of payment").unwrap(),
        };
        Deal::materialize(DealId::new(id), UserId(creator), draft)
    }

    #[tokio::test]
    async fn test_create_and_get_deal() {
        let store = InMemoryDealStore::new();
        let created = store.create_deal(deal("AAAA0001", 1, "500")).await.unwrap();

        let fetched = store.get_deal(&created.deal_id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(store.get_deal(&DealId::new("NOPE")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_deal_id_is_rejected() {
        let store = InMemoryDealStore::new();
        store.create_deal(deal("AAAA0001", 1, "500")).await.unwrap();

        let result = store.create_deal(deal("AAAA0001", 2, "900")).await;
        assert!(matches!(result, Err(EscrowError::DuplicateDeal(_))));
        let kept = store.get_deal(&DealId::new("AAAA0001")).await.unwrap().unwrap();
        assert_eq!(kept.creator_id, UserId(1));
    }

    #[tokio::test]
    async fn test_update_status_is_compare_and_swap() {
        let store = InMemoryDealStore::new();
        let id = DealId::new("AAAA0001");
        store.create_deal(deal("AAAA0001", 1, "500")).await.unwrap();

        let applied = store
            .update_status(&id, DealStatus::Created, DealStatus::Funded)
            .await
            .unwrap();
        assert!(matches!(applied, StatusUpdate::Applied(d) if d.status == DealStatus::Funded));

        let stale = store
            .update_status(&id, DealStatus::Created, DealStatus::Disputed)
            .await
            .unwrap();
        assert_eq!(
            stale,
            StatusUpdate::Conflict {
                current: DealStatus::Funded
            }
        );

        let missing = store
            .update_status(&DealId::new("NOPE"), DealStatus::Created, DealStatus::Funded)
            .await
            .unwrap();
        assert_eq!(missing, StatusUpdate::NotFound);
    }

    #[tokio::test]
    async fn test_listings_and_stats() {
        let store = InMemoryDealStore::new();
        for (id, creator, amount) in [
            ("AAAA0001", 1, "1000"),
            ("AAAA0002", 2, "2000"),
            ("AAAA0003", 1, "3000"),
        ] {
            store.create_deal(deal(id, creator, amount)).await.unwrap();
        }
        store
            .update_status(&DealId::new("AAAA0002"), DealStatus::Created, DealStatus::Disputed)
            .await
            .unwrap();
        store
            .update_status(&DealId::new("AAAA0003"), DealStatus::Created, DealStatus::Cancelled)
            .await
            .unwrap();

        let all: Vec<_> = store
            .list_deals(None)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.deal_id.to_string())
            .collect();
        assert_eq!(all, ["AAAA0001", "AAAA0002", "AAAA0003"]);

        let disputed = store.list_deals(Some(DealStatus::Disputed)).await.unwrap();
        assert_eq!(disputed.len(), 1);
        assert_eq!(store.list_deals_by_creator(UserId(1)).await.unwrap().len(), 2);

        let stats = store.aggregate_stats().await.unwrap();
        assert_eq!(stats.total_deals, 3);
        assert_eq!(stats.active_deals, 1);
        assert_eq!(stats.disputed_deals, 1);
        assert_eq!(stats.total_value, dec!(3000));
    }

    #[tokio::test]
    async fn test_payment_records_accumulate() {
        let store = InMemoryPaymentStore::new();
        let id = DealId::new("AAAA0001");
        let amount = Amount::parse("500").unwrap();
        let shot = Proof::Screenshot {
            file_id: "f1".into(),
        };

        for _ in 0..2 {
            store
                .create_payment_record(PaymentRecord::pending(id.clone(), UserId(2), amount, &shot))
                .await
                .unwrap();
        }

        let records = store.payments_for_deal(&id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.payment_method == PaymentMethod::ScreenshotProof));
        assert!(store.payments_for_deal(&DealId::new("OTHER")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_upsert_refreshes_display_fields() {
        let store = InMemoryUserStore::new();
        let first = User::from_caller(&Caller::new(7, Some("asha"), "Asha"));
        let first_seen = first.first_seen;

        assert!(store.upsert_user(first).await.unwrap());
        assert!(
            !store
                .upsert_user(User::from_caller(&Caller::new(7, None, "Asha K")))
                .await
                .unwrap()
        );

        let user = store.get_user(UserId(7)).await.unwrap().unwrap();
        assert_eq!(user.display_name, "Asha K");
        assert_eq!(user.username, None);
        assert_eq!(user.first_seen, first_seen);
    }

    #[tokio::test]
    async fn test_missing_asset() {
        let result = InMemoryAssetSource::missing().payment_qr().await;
        assert!(matches!(result, Err(EscrowError::Asset(_))));
    }
}
