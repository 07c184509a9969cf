use crate::application::gate::Gate;
use crate::domain::deal::{Deal, DealDraft, DealId, DealStatus};
use crate::domain::lifecycle::{Actor, Trigger};
use crate::domain::payment::{PaymentRecord, Proof};
use crate::domain::ports::{DealStore, PaymentStore, StatusUpdate};
use crate::domain::user::Caller;
use crate::error::{EscrowError, Result};
use tracing::{debug, info, warn};

/// Attempts at finding an unused id before giving up on materialization.
const MAX_ID_ATTEMPTS: usize = 3;

/// Applies deal status transitions against the store.
///
/// Checks run cheapest first: privilege, existence, then the transition table.
/// Only when all three pass is the status written, as a compare-and-swap on the
/// status that was read, so a concurrent transition on the same deal makes this
/// one fail with [`EscrowError::IllegalTransition`] instead of silently
/// overwriting it.
pub struct DealLifecycle<'a> {
    deals: &'a dyn DealStore,
    payments: &'a dyn PaymentStore,
    gate: &'a Gate,
}

impl<'a> DealLifecycle<'a> {
    pub fn new(deals: &'a dyn DealStore, payments: &'a dyn PaymentStore, gate: &'a Gate) -> Self {
        Self {
            deals,
            payments,
            gate,
        }
    }

    /// Persists a confirmed draft as a new `created` deal owned by `creator`.
    pub async fn materialize(&self, creator: &Caller, draft: DealDraft) -> Result<Deal> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let deal = Deal::materialize(DealId::generate(), creator.user_id, draft.clone());
            match self.deals.create_deal(deal).await {
                Ok(deal) => {
                    info!(
                        deal_id = %deal.deal_id,
                        creator_id = %deal.creator_id,
                        amount = %deal.amount.value(),
                        "deal created"
                    );
                    return Ok(deal);
                }
                Err(EscrowError::DuplicateDeal(deal_id)) if attempt < MAX_ID_ATTEMPTS => {
                    debug!(%deal_id, attempt, "deal id collision, regenerating");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Fetches a deal that must exist.
    pub async fn load(&self, deal_id: &DealId) -> Result<Deal> {
        self.deals
            .get_deal(deal_id)
            .await?
            .ok_or_else(|| EscrowError::DealNotFound(deal_id.clone()))
    }

    /// Fires `trigger` on `deal_id` on behalf of `caller`.
    pub async fn apply(&self, caller: &Caller, deal_id: &DealId, trigger: Trigger) -> Result<Deal> {
        if trigger.required_actor() == Actor::Operator {
            self.gate.require_operator(caller, trigger.as_str())?;
        }
        let deal = self.load(deal_id).await?;
        self.transition(&deal, trigger).await
    }

    /// Moves the deal from `created` to `funded` and records the payer's proof.
    ///
    /// The status swap runs first, so a proof that loses a race against another
    /// transition leaves no record behind. If the record cannot be stored the deal
    /// is swapped back to `created`.
    pub async fn fund(
        &self,
        payer: &Caller,
        deal_id: &DealId,
        proof: &Proof,
    ) -> Result<(Deal, PaymentRecord)> {
        let deal = self.load(deal_id).await?;
        let funded = self.transition(&deal, Trigger::Fund).await?;

        let record =
            PaymentRecord::pending(deal.deal_id.clone(), payer.user_id, deal.amount, proof);
        let record = match self.payments.create_payment_record(record).await {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    deal_id = %deal.deal_id,
                    error = %err,
                    "payment record not stored, returning deal to created"
                );
                self.deals
                    .update_status(&deal.deal_id, DealStatus::Funded, DealStatus::Created)
                    .await?;
                return Err(err);
            }
        };
        info!(
            deal_id = %deal.deal_id,
            payer_id = %payer.user_id,
            payment_id = %record.payment_id,
            method = ?record.payment_method,
            "payment proof recorded"
        );
        Ok((funded, record))
    }

    async fn transition(&self, deal: &Deal, trigger: Trigger) -> Result<Deal> {
        let illegal = |from: DealStatus| EscrowError::IllegalTransition {
            deal_id: deal.deal_id.clone(),
            from,
            trigger,
        };
        let next = trigger.target(deal.status).ok_or_else(|| illegal(deal.status))?;

        match self
            .deals
            .update_status(&deal.deal_id, deal.status, next)
            .await?
        {
            StatusUpdate::Applied(updated) => {
                info!(
                    deal_id = %deal.deal_id,
                    from = %deal.status,
                    to = %next,
                    ?trigger,
                    "deal status changed"
                );
                Ok(updated)
            }
            StatusUpdate::Conflict { current } => {
                warn!(
                    deal_id = %deal.deal_id,
                    expected = %deal.status,
                    %current,
                    ?trigger,
                    "concurrent transition won, request dropped"
                );
                Err(illegal(current))
            }
            StatusUpdate::NotFound => Err(EscrowError::DealNotFound(deal.deal_id.clone())),
        }
    }
}
