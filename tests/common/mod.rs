#![allow(dead_code)]

use async_trait::async_trait;
use escrowbot::application::action::Action;
use escrowbot::application::engine::EscrowEngine;
use escrowbot::application::gate::{AllowList, Gate, SlidingWindowLimiter};
use escrowbot::application::view::View;
use escrowbot::config::{PaymentConfig, RateLimitConfig, WindowStrategy};
use escrowbot::domain::deal::{
    Amount, Deal, DealDraft, DealId, DealStats, DealStatus, Description, Terms,
};
use escrowbot::domain::payment::PaymentRecord;
use escrowbot::domain::ports::{
    DealStore, DealStoreBox, PaymentQr, PaymentStore, PaymentStoreBox, StatusUpdate,
};
use escrowbot::domain::user::{Caller, UserId};
use escrowbot::error::{EscrowError, Result};
use escrowbot::infrastructure::in_memory::{
    InMemoryAssetSource, InMemoryDealStore, InMemoryPaymentStore, InMemoryUserStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const OPERATOR_ID: i64 = 900;
pub const DESCRIPTION: &str = "Used mountain bike, 21-speed, good condition";
pub const TERMS: &str = "Payment upfront, delivery within 3 days, 7-day return window";

pub fn seller() -> Caller {
    Caller::new(1, Some("seller"), "Seller")
}

pub fn buyer() -> Caller {
    Caller::new(2, Some("buyer"), "Buyer")
}

pub fn operator() -> Caller {
    Caller::new(OPERATOR_ID, Some("darx_zerox"), "Operator")
}

pub fn qr() -> PaymentQr {
    PaymentQr {
        path: PathBuf::from("static/payment_qr.jpg"),
        bytes: vec![0xFF, 0xD8, 0xFF],
    }
}

/// Rate limit generous enough to never trip in tests that are not about it.
pub fn relaxed_limits() -> RateLimitConfig {
    RateLimitConfig {
        window_seconds: 60,
        max_calls: 10_000,
        strategy: WindowStrategy::Sliding,
    }
}

pub struct Harness {
    pub engine: Arc<EscrowEngine>,
    pub deals: InMemoryDealStore,
    pub payments: InMemoryPaymentStore,
    pub writes: Arc<AtomicUsize>,
}

/// Engine with operator [`OPERATOR_ID`], the given limits and the given stores.
pub fn engine_with(
    deals: DealStoreBox,
    payments: PaymentStoreBox,
    rate_limit: RateLimitConfig,
    assets: InMemoryAssetSource,
) -> EscrowEngine {
    let gate = Gate::new(
        Arc::new(AllowList::new([OPERATOR_ID], Vec::<String>::new())),
        Arc::new(SlidingWindowLimiter::new(rate_limit)),
    );
    EscrowEngine::new(
        deals,
        payments,
        Box::new(InMemoryUserStore::new()),
        Box::new(assets),
        gate,
        PaymentConfig::default(),
    )
}

pub fn harness_with(rate_limit: RateLimitConfig, assets: InMemoryAssetSource) -> Harness {
    let deals = InMemoryDealStore::new();
    let payments = InMemoryPaymentStore::new();
    let counting = CountingDealStore::new(deals.clone());
    let writes = counting.writes.clone();
    let engine = engine_with(
        Box::new(counting),
        Box::new(payments.clone()),
        rate_limit,
        assets,
    );
    Harness {
        engine: Arc::new(engine),
        deals,
        payments,
        writes,
    }
}

pub fn harness() -> Harness {
    harness_with(relaxed_limits(), InMemoryAssetSource::new(qr()))
}

/// Harness whose every status swap is beaten by a concurrent move to `interloper`.
pub fn racing_harness(interloper: DealStatus) -> Harness {
    let deals = InMemoryDealStore::new();
    let payments = InMemoryPaymentStore::new();
    let engine = engine_with(
        Box::new(RacingDealStore::new(deals.clone(), interloper)),
        Box::new(payments.clone()),
        relaxed_limits(),
        InMemoryAssetSource::new(qr()),
    );
    Harness {
        engine: Arc::new(engine),
        deals,
        payments,
        writes: Arc::new(AtomicUsize::new(0)),
    }
}

/// Harness whose payment store rejects every write.
pub fn failing_payments_harness() -> Harness {
    let deals = InMemoryDealStore::new();
    let engine = engine_with(
        Box::new(deals.clone()),
        Box::new(FailingPaymentStore),
        relaxed_limits(),
        InMemoryAssetSource::new(qr()),
    );
    Harness {
        engine: Arc::new(engine),
        deals,
        payments: InMemoryPaymentStore::new(),
        writes: Arc::new(AtomicUsize::new(0)),
    }
}

/// Allows a single throttled call per minute.
pub fn one_call_per_minute() -> RateLimitConfig {
    RateLimitConfig {
        window_seconds: 60,
        max_calls: 1,
        strategy: WindowStrategy::Sliding,
    }
}

impl Harness {
    pub async fn send(&self, caller: &Caller, action: Action) -> Result<View> {
        self.engine.handle(caller, action).await
    }

    pub async fn say(&self, caller: &Caller, text: &str) -> Result<View> {
        self.send(caller, Action::Text(text.to_string())).await
    }

    /// Walks `caller` through the whole authoring flow and returns the new deal.
    pub async fn author_deal(&self, caller: &Caller, amount: &str) -> Deal {
        self.send(caller, Action::CreateDeal).await.unwrap();
        self.say(caller, DESCRIPTION).await.unwrap();
        self.say(caller, amount).await.unwrap();
        self.say(caller, TERMS).await.unwrap();
        match self.send(caller, Action::ConfirmDeal).await.unwrap() {
            View::DealCreated(deal) => deal,
            other => panic!("expected a created deal, got {other:?}"),
        }
    }

    /// Stores a deal directly in `status`, bypassing the engine and the write counter.
    pub async fn seed(&self, id: &str, status: DealStatus) -> DealId {
        let draft = DealDraft {
            description: Description::parse(DESCRIPTION).unwrap(),
            amount: Amount::parse("15000").unwrap(),
            terms: Terms::parse(TERMS).unwrap(),
        };
        let deal = Deal::materialize(DealId::new(id), seller().user_id, draft);
        let deal_id = deal.deal_id.clone();
        self.deals.create_deal(deal).await.unwrap();
        if status != DealStatus::Created {
            self.deals
                .update_status(&deal_id, DealStatus::Created, status)
                .await
                .unwrap();
        }
        deal_id
    }

    pub async fn status(&self, deal_id: &DealId) -> DealStatus {
        self.deals.get_deal(deal_id).await.unwrap().unwrap().status
    }

    pub fn status_writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

/// Deal store decorator counting status writes that reach the backend.
pub struct CountingDealStore {
    inner: InMemoryDealStore,
    pub writes: Arc<AtomicUsize>,
}

impl CountingDealStore {
    pub fn new(inner: InMemoryDealStore) -> Self {
        Self {
            inner,
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl DealStore for CountingDealStore {
    async fn create_deal(&self, deal: Deal) -> Result<Deal> {
        self.inner.create_deal(deal).await
    }

    async fn get_deal(&self, deal_id: &DealId) -> Result<Option<Deal>> {
        self.inner.get_deal(deal_id).await
    }

    async fn update_status(
        &self,
        deal_id: &DealId,
        expected: DealStatus,
        next: DealStatus,
    ) -> Result<StatusUpdate> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update_status(deal_id, expected, next).await
    }

    async fn list_deals(&self, status: Option<DealStatus>) -> Result<Vec<Deal>> {
        self.inner.list_deals(status).await
    }

    async fn list_deals_by_creator(&self, creator_id: UserId) -> Result<Vec<Deal>> {
        self.inner.list_deals_by_creator(creator_id).await
    }

    async fn aggregate_stats(&self) -> Result<DealStats> {
        self.inner.aggregate_stats().await
    }
}

/// Deal store where another writer moves the deal to `interloper` just before
/// every status swap, so each swap loses the race.
pub struct RacingDealStore {
    inner: InMemoryDealStore,
    interloper: DealStatus,
}

impl RacingDealStore {
    pub fn new(inner: InMemoryDealStore, interloper: DealStatus) -> Self {
        Self { inner, interloper }
    }
}

#[async_trait]
impl DealStore for RacingDealStore {
    async fn create_deal(&self, deal: Deal) -> Result<Deal> {
        self.inner.create_deal(deal).await
    }

    async fn get_deal(&self, deal_id: &DealId) -> Result<Option<Deal>> {
        self.inner.get_deal(deal_id).await
    }

    async fn update_status(
        &self,
        deal_id: &DealId,
        expected: DealStatus,
        next: DealStatus,
    ) -> Result<StatusUpdate> {
        if let Some(deal) = self.inner.get_deal(deal_id).await? {
            self.inner
                .update_status(deal_id, deal.status, self.interloper)
                .await?;
        }
        self.inner.update_status(deal_id, expected, next).await
    }

    async fn list_deals(&self, status: Option<DealStatus>) -> Result<Vec<Deal>> {
        self.inner.list_deals(status).await
    }

    async fn list_deals_by_creator(&self, creator_id: UserId) -> Result<Vec<Deal>> {
        self.inner.list_deals_by_creator(creator_id).await
    }

    async fn aggregate_stats(&self) -> Result<DealStats> {
        self.inner.aggregate_stats().await
    }
}

/// Payment store whose writes always fail with a retryable IO error.
#[derive(Default, Clone)]
pub struct FailingPaymentStore;

#[async_trait]
impl PaymentStore for FailingPaymentStore {
    async fn create_payment_record(&self, _record: PaymentRecord) -> Result<PaymentRecord> {
        Err(EscrowError::IoError(std::io::Error::other("disk full")))
    }

    async fn payments_for_deal(&self, _deal_id: &DealId) -> Result<Vec<PaymentRecord>> {
        Ok(Vec::new())
    }
}
