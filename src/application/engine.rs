use crate::application::action::Action;
use crate::application::conversation::{self, Effect, Input, Session, Stage};
use crate::application::gate::Gate;
use crate::application::lifecycle::DealLifecycle;
use crate::application::session::SessionRegistry;
use crate::application::view::{DealScope, View};
use crate::config::PaymentConfig;
use crate::domain::deal::{Deal, DealId, DealStats, DealStatus};
use crate::domain::lifecycle::Trigger;
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::{AssetSourceBox, DealStoreBox, PaymentStoreBox, UserStoreBox};
use crate::domain::user::{Caller, User};
use crate::error::{EscrowError, Result};
use tracing::{debug, info};

/// How many deals the operator "all deals" listing shows.
pub const RECENT_DEALS_LIMIT: usize = 10;

/// The entry point for every inbound chat event.
///
/// `EscrowEngine` owns the storage backends and the session table. Each call to
/// [`EscrowEngine::handle`] is one turn: the caller's session lock is held from the
/// first check to the last store write, so turns of one user never interleave.
pub struct EscrowEngine {
    deals: DealStoreBox,
    payments: PaymentStoreBox,
    users: UserStoreBox,
    assets: AssetSourceBox,
    gate: Gate,
    sessions: SessionRegistry,
    payment: PaymentConfig,
}

impl EscrowEngine {
    pub fn new(
        deals: DealStoreBox,
        payments: PaymentStoreBox,
        users: UserStoreBox,
        assets: AssetSourceBox,
        gate: Gate,
        payment: PaymentConfig,
    ) -> Self {
        Self {
            deals,
            payments,
            users,
            assets,
            gate,
            sessions: SessionRegistry::new(),
            payment,
        }
    }

    fn lifecycle(&self) -> DealLifecycle<'_> {
        DealLifecycle::new(self.deals.as_ref(), self.payments.as_ref(), &self.gate)
    }

    /// Handles one action from `caller` and returns what should be shown back.
    ///
    /// Validation failures inside a conversation come back as
    /// [`View::InputRejected`]; everything else that prevents the action is an `Err`.
    pub async fn handle(&self, caller: &Caller, action: Action) -> Result<View> {
        if action.is_throttled() {
            self.gate.throttle(caller)?;
        }

        let mut session = self.sessions.acquire(caller.user_id).await;
        debug!(
            user_id = %caller.user_id,
            stage = session.stage.name(),
            ?action,
            "handling action"
        );
        let lifecycle = self.lifecycle();

        match action {
            Action::Start => {
                session.stage = Stage::Idle;
                let is_new = self.users.upsert_user(User::from_caller(caller)).await?;
                if is_new {
                    info!(user_id = %caller.user_id, "new user registered");
                }
                Ok(View::Welcome {
                    display_name: caller.display_name.clone(),
                    is_new,
                })
            }
            Action::MainMenu => {
                session.stage = Stage::Idle;
                Ok(View::MainMenu)
            }
            Action::Help => Ok(View::Help),
            Action::Page(page) => Ok(View::Page(page)),
            Action::Admin => {
                self.gate.require_operator(caller, "open the admin panel")?;
                Ok(View::AdminPanel(self.stats().await?))
            }

            Action::CreateDeal => self.converse(caller, &mut session, Input::BeginDeal).await,
            Action::ConfirmDeal => self.converse(caller, &mut session, Input::Confirm).await,
            Action::CancelDealCreation => {
                self.converse(caller, &mut session, Input::Cancel).await
            }
            Action::Text(_) if !session.is_open() => Ok(View::Unrecognized),
            Action::Text(text) => self.converse(caller, &mut session, Input::Text(text)).await,
            Action::Photo { file_id } => {
                self.converse(caller, &mut session, Input::Photo { file_id })
                    .await
            }
            Action::Unsupported => self.converse(caller, &mut session, Input::Unsupported).await,

            Action::MyDeals => Ok(View::DealList {
                scope: DealScope::Mine,
                deals: self.deals.list_deals_by_creator(caller.user_id).await?,
            }),
            Action::ShowDeal(deal_id) => Ok(View::DealDetails {
                deal: lifecycle.load(&deal_id).await?,
                admin: false,
            }),
            Action::ShareDeal(deal_id) => {
                let deal = lifecycle.load(&deal_id).await?;
                if deal.creator_id != caller.user_id {
                    self.gate.require_operator(caller, "share a deal they did not create")?;
                }
                Ok(View::ShareDeal(deal))
            }

            Action::PayDeal(deal_id) | Action::RegenerateQr(deal_id) => {
                self.start_payment(caller, &mut session, &deal_id).await
            }
            Action::PaymentDone(deal_id) => Ok(View::ProofRequested { deal_id }),
            Action::ReleasePayment(deal_id) => lifecycle
                .apply(caller, &deal_id, Trigger::Release)
                .await
                .map(View::PaymentReleased),
            Action::RaiseDispute(deal_id) => lifecycle
                .apply(caller, &deal_id, Trigger::Dispute)
                .await
                .map(View::DisputeRaised),

            Action::AdminAllDeals => {
                self.gate.require_operator(caller, "list all deals")?;
                let deals = self.deals.list_deals(None).await?;
                Ok(View::DealList {
                    scope: DealScope::Recent,
                    deals: deals.into_iter().rev().take(RECENT_DEALS_LIMIT).collect(),
                })
            }
            Action::AdminDisputes => {
                self.gate.require_operator(caller, "list disputes")?;
                Ok(View::DealList {
                    scope: DealScope::Disputes,
                    deals: self.deals.list_deals(Some(DealStatus::Disputed)).await?,
                })
            }
            Action::AdminDeal(deal_id) => {
                self.gate.require_operator(caller, "manage deals")?;
                Ok(View::DealDetails {
                    deal: lifecycle.load(&deal_id).await?,
                    admin: true,
                })
            }
            Action::AdminResolve(deal_id) => lifecycle
                .apply(caller, &deal_id, Trigger::Resolve)
                .await
                .map(View::DisputeResolved),
            Action::AdminCancel(deal_id) => lifecycle
                .apply(caller, &deal_id, Trigger::Cancel)
                .await
                .map(View::DealCancelled),
        }
    }

    /// Shows payment instructions for a `created` deal and opens the proof flow.
    ///
    /// The QR image is loaded before the session is touched, so a missing asset
    /// leaves any open flow as it was.
    async fn start_payment(
        &self,
        caller: &Caller,
        session: &mut Session,
        deal_id: &DealId,
    ) -> Result<View> {
        let deal = self.lifecycle().load(deal_id).await?;
        if deal.status != DealStatus::Created {
            return Err(EscrowError::IllegalTransition {
                deal_id: deal.deal_id,
                from: deal.status,
                trigger: Trigger::Fund,
            });
        }
        let qr = self.assets.payment_qr().await?;

        let input = Input::BeginPayment {
            deal_id: deal.deal_id.clone(),
            amount: deal.amount,
        };
        self.converse(caller, session, input).await?;
        Ok(View::PaymentInstructions {
            deal,
            upi_id: self.payment.upi_id.clone(),
            qr,
        })
    }

    /// Runs one conversation step and carries out its effects.
    ///
    /// The stepped session is committed only once every effect succeeded. After a
    /// retryable collaborator failure the previous session is kept so the user can
    /// repeat the turn; any other failure ends the flow.
    async fn converse(&self, caller: &Caller, session: &mut Session, input: Input) -> Result<View> {
        let (next, effects) = conversation::step(session.clone(), input);
        let mut view = View::Ignored;
        for effect in effects {
            match self.execute(caller, effect).await {
                Ok(shown) => view = shown,
                Err(err) if err.is_retryable() => return Err(err),
                Err(err) => {
                    session.stage = Stage::Idle;
                    return Err(err);
                }
            }
        }
        if next.stage != session.stage {
            debug!(
                user_id = %caller.user_id,
                from = session.stage.name(),
                to = next.stage.name(),
                "conversation advanced"
            );
        }
        *session = next;
        Ok(view)
    }

    async fn execute(&self, caller: &Caller, effect: Effect) -> Result<View> {
        match effect {
            Effect::Prompt(prompt) => Ok(View::Prompt(prompt)),
            Effect::Reject(reason) => {
                debug!(user_id = %caller.user_id, %reason, "input rejected");
                Ok(View::InputRejected(reason))
            }
            Effect::Materialize(draft) => self
                .lifecycle()
                .materialize(caller, draft)
                .await
                .map(View::DealCreated),
            Effect::SubmitProof { deal_id, proof, .. } => {
                match self.lifecycle().fund(caller, &deal_id, &proof).await {
                    Ok((deal, record)) => Ok(View::PaymentAccepted { deal, record }),
                    Err(EscrowError::DealNotFound(_)) => Err(EscrowError::SessionExpired),
                    Err(err) => Err(err),
                }
            }
            Effect::Cancelled => Ok(View::CreationCancelled),
            Effect::Ignored => Ok(View::Ignored),
        }
    }

    /// Every deal, oldest first.
    pub async fn deals(&self) -> Result<Vec<Deal>> {
        self.deals.list_deals(None).await
    }

    pub async fn payments_for_deal(&self, deal_id: &DealId) -> Result<Vec<PaymentRecord>> {
        self.payments.payments_for_deal(deal_id).await
    }

    pub async fn stats(&self) -> Result<DealStats> {
        self.deals.aggregate_stats().await
    }

    /// Number of users with an unfinished conversation.
    pub fn open_sessions(&self) -> usize {
        self.sessions.open_sessions()
    }
}
