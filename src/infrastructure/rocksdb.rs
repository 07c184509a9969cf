use crate::domain::deal::{Deal, DealId, DealStats, DealStatus};
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::{DealStore, PaymentStore, StatusUpdate, UserStore};
use crate::domain::user::{User, UserId};
use crate::error::{EscrowError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Column Family for registered users, keyed by big-endian user id.
pub const CF_USERS: &str = "users";
/// Column Family for deals, keyed by deal id.
pub const CF_DEALS: &str = "deals";
/// Column Family for payment claims, keyed by `<deal_id>:<payment_id>`.
pub const CF_PAYMENTS: &str = "payments";

/// A persistent store implementation using RocksDB.
///
/// Users, deals and payment records live in separate Column Families with JSON
/// values. RocksDB has no conditional put, so deal creation and the status
/// compare-and-swap are serialized through an in-process write lock; the
/// database must not be shared with another process.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

fn internal(message: String) -> EscrowError {
    EscrowError::InternalError(Box::new(std::io::Error::other(message)))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        EscrowError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Serialization error: {}", e),
        )))
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        EscrowError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

fn payment_prefix(deal_id: &DealId) -> Vec<u8> {
    format!("{}:", deal_id).into_bytes()
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "users", "deals" and "payments" column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_USERS, CF_DEALS, CF_PAYMENTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| internal(format!("{} column family not found", name)))
    }

    fn get_json<T: DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(name)?, key)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, name: &str, key: &[u8], value: &T) -> Result<()> {
        self.db.put_cf(self.cf(name)?, key, encode(value)?)?;
        Ok(())
    }

    /// Decodes every value whose key starts with `prefix`, in key order.
    fn scan<T: DeserializeOwned>(&self, name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let iter = self
            .db
            .iterator_cf(self.cf(name)?, IteratorMode::From(prefix, Direction::Forward));

        let mut values = Vec::new();
        for item in iter {
            let (key, value) =
                item.map_err(|e| internal(format!("RocksDB iteration error: {}", e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    /// All deals, oldest first.
    fn all_deals(&self) -> Result<Vec<Deal>> {
        let mut deals: Vec<Deal> = self.scan(CF_DEALS, &[])?;
        deals.sort_by_key(|deal| deal.created_at);
        Ok(deals)
    }
}

#[async_trait]
impl DealStore for RocksDBStore {
    async fn create_deal(&self, deal: Deal) -> Result<Deal> {
        let _guard = self.write_lock.lock().await;
        let key = deal.deal_id.as_str().as_bytes();
        if self.db.get_pinned_cf(self.cf(CF_DEALS)?, key)?.is_some() {
            return Err(EscrowError::DuplicateDeal(deal.deal_id));
        }
        self.put_json(CF_DEALS, key, &deal)?;
        Ok(deal)
    }

    async fn get_deal(&self, deal_id: &DealId) -> Result<Option<Deal>> {
        self.get_json(CF_DEALS, deal_id.as_str().as_bytes())
    }

    async fn update_status(
        &self,
        deal_id: &DealId,
        expected: DealStatus,
        next: DealStatus,
    ) -> Result<StatusUpdate> {
        let _guard = self.write_lock.lock().await;
        let key = deal_id.as_str().as_bytes();
        let Some(mut deal) = self.get_json::<Deal>(CF_DEALS, key)? else {
            return Ok(StatusUpdate::NotFound);
        };
        if deal.status != expected {
            return Ok(StatusUpdate::Conflict {
                current: deal.status,
            });
        }
        deal.status = next;
        self.put_json(CF_DEALS, key, &deal)?;
        debug!(%deal_id, status = %next, "deal status persisted");
        Ok(StatusUpdate::Applied(deal))
    }

    async fn list_deals(&self, status: Option<DealStatus>) -> Result<Vec<Deal>> {
        let mut deals = self.all_deals()?;
        if let Some(status) = status {
            deals.retain(|deal| deal.status == status);
        }
        Ok(deals)
    }

    async fn list_deals_by_creator(&self, creator_id: UserId) -> Result<Vec<Deal>> {
        let mut deals = self.all_deals()?;
        deals.retain(|deal| deal.creator_id == creator_id);
        Ok(deals)
    }

    async fn aggregate_stats(&self) -> Result<DealStats> {
        Ok(DealStats::tally(&self.all_deals()?))
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn create_payment_record(&self, record: PaymentRecord) -> Result<PaymentRecord> {
        let mut key = payment_prefix(&record.deal_id);
        key.extend_from_slice(record.payment_id.as_str().as_bytes());
        self.put_json(CF_PAYMENTS, &key, &record)?;
        Ok(record)
    }

    async fn payments_for_deal(&self, deal_id: &DealId) -> Result<Vec<PaymentRecord>> {
        let mut records: Vec<PaymentRecord> = self.scan(CF_PAYMENTS, &payment_prefix(deal_id))?;
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }
}

#[async_trait]
impl UserStore for RocksDBStore {
    async fn upsert_user(&self, user: User) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let key = user.user_id.0.to_be_bytes();
        match self.get_json::<User>(CF_USERS, &key)? {
            Some(mut existing) => {
                existing.refresh(user);
                self.put_json(CF_USERS, &key, &existing)?;
                Ok(false)
            }
            None => {
                self.put_json(CF_USERS, &key, &user)?;
                Ok(true)
            }
        }
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.get_json(CF_USERS, &user_id.0.to_be_bytes())
    }
}
