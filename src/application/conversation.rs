//! Per-user multi-turn input collection.
//!
//! [`step`] is a pure function from the current [`Session`] and one [`Input`] to the
//! next session and the [`Effect`]s the engine must carry out. It never touches a
//! store; materializing a deal or recording a payment is requested through an
//! effect and performed by [`crate::application::engine::EscrowEngine`].
//!
//! Collected fields live inside the stage they were collected for, so a draft
//! cannot reach confirmation with a field missing.

use crate::domain::deal::{Amount, DealDraft, DealId, Description, Terms};
use crate::domain::payment::{Proof, ReferenceId};
use crate::domain::user::UserId;
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Idle,
    AwaitingDescription,
    AwaitingAmount {
        description: Description,
    },
    AwaitingTerms {
        description: Description,
        amount: Amount,
    },
    AwaitingConfirmation {
        draft: DealDraft,
    },
    AwaitingProof {
        deal_id: DealId,
        amount: Amount,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::AwaitingDescription => "awaiting_description",
            Stage::AwaitingAmount { .. } => "awaiting_amount",
            Stage::AwaitingTerms { .. } => "awaiting_terms",
            Stage::AwaitingConfirmation { .. } => "awaiting_confirmation",
            Stage::AwaitingProof { .. } => "awaiting_proof",
        }
    }
}

/// Ephemeral conversation state of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub stage: Stage,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            stage: Stage::Idle,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stage != Stage::Idle
    }
}

/// One turn of user input, already stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Start authoring a new deal, discarding any open flow.
    BeginDeal,
    /// Start collecting proof for `deal_id`, discarding any open flow.
    BeginPayment { deal_id: DealId, amount: Amount },
    Text(String),
    Photo { file_id: String },
    /// A message with neither text nor image (sticker, voice note, ...).
    Unsupported,
    Confirm,
    Cancel,
}

/// What the user should be asked next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Description,
    Amount,
    Terms { amount: Amount },
    Confirmation(DealDraft),
    Proof { deal_id: DealId, amount: Amount },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Prompt(Prompt),
    /// Input failed validation; the stage is unchanged and the user is re-prompted.
    Reject(ValidationError),
    /// Confirmed draft: generate an id and persist the deal.
    Materialize(DealDraft),
    /// Accepted proof: record the payment and fund the deal.
    SubmitProof {
        deal_id: DealId,
        amount: Amount,
        proof: Proof,
    },
    Cancelled,
    /// Input has no meaning in the current stage.
    Ignored,
}

/// Advances `session` by one turn.
pub fn step(session: Session, input: Input) -> (Session, Vec<Effect>) {
    let Session { user_id, stage } = session;
    let (stage, effect) = advance(stage, input);
    (Session { user_id, stage }, vec![effect])
}

fn advance(stage: Stage, input: Input) -> (Stage, Effect) {
    match (stage, input) {
        (_, Input::BeginDeal) => (
            Stage::AwaitingDescription,
            Effect::Prompt(Prompt::Description),
        ),
        (_, Input::BeginPayment { deal_id, amount }) => (
            Stage::AwaitingProof {
                deal_id: deal_id.clone(),
                amount,
            },
            Effect::Prompt(Prompt::Proof { deal_id, amount }),
        ),
        (_, Input::Cancel) => (Stage::Idle, Effect::Cancelled),

        (Stage::AwaitingDescription, Input::Text(text)) => match Description::parse(&text) {
            Ok(description) => (
                Stage::AwaitingAmount { description },
                Effect::Prompt(Prompt::Amount),
            ),
            Err(reason) => (Stage::AwaitingDescription, Effect::Reject(reason)),
        },

        (Stage::AwaitingAmount { description }, Input::Text(text)) => {
            match Amount::parse(&text) {
                Ok(amount) => (
                    Stage::AwaitingTerms {
                        description,
                        amount,
                    },
                    Effect::Prompt(Prompt::Terms { amount }),
                ),
                Err(reason) => (Stage::AwaitingAmount { description }, Effect::Reject(reason)),
            }
        }

        (Stage::AwaitingTerms { description, amount }, Input::Text(text)) => {
            match Terms::parse(&text) {
                Ok(terms) => {
                    let draft = DealDraft {
                        description,
                        amount,
                        terms,
                    };
                    (
                        Stage::AwaitingConfirmation {
                            draft: draft.clone(),
                        },
                        Effect::Prompt(Prompt::Confirmation(draft)),
                    )
                }
                Err(reason) => (
                    Stage::AwaitingTerms {
                        description,
                        amount,
                    },
                    Effect::Reject(reason),
                ),
            }
        }

        (Stage::AwaitingConfirmation { draft }, Input::Confirm) => {
            (Stage::Idle, Effect::Materialize(draft))
        }

        (Stage::AwaitingProof { deal_id, amount }, Input::Photo { file_id }) => (
            Stage::Idle,
            Effect::SubmitProof {
                deal_id,
                amount,
                proof: Proof::Screenshot { file_id },
            },
        ),

        (Stage::AwaitingProof { deal_id, amount }, Input::Text(text)) => {
            match ReferenceId::parse(&text) {
                Ok(reference) => (
                    Stage::Idle,
                    Effect::SubmitProof {
                        deal_id,
                        amount,
                        proof: Proof::Reference(reference),
                    },
                ),
                Err(reason) => (Stage::AwaitingProof { deal_id, amount }, Effect::Reject(reason)),
            }
        }

        (stage @ Stage::AwaitingProof { .. }, Input::Unsupported) => {
            (stage, Effect::Reject(ValidationError::MissingProof))
        }

        // Photos during deal authoring, free text at confirmation, stray confirms.
        (stage, _) => (stage, Effect::Ignored),
    }
}
