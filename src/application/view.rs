use crate::application::action::InfoPage;
use crate::application::conversation::Prompt;
use crate::domain::deal::{Deal, DealId, DealStats};
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::PaymentQr;
use crate::error::ValidationError;

/// Which listing a [`View::DealList`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealScope {
    /// Deals created by the caller.
    Mine,
    /// The most recent deals across all users (operators only).
    Recent,
    /// Deals currently in dispute (operators only).
    Disputes,
}

/// The outcome of one handled turn, independent of how it is rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Welcome {
        display_name: String,
        is_new: bool,
    },
    MainMenu,
    Help,
    Page(InfoPage),
    AdminPanel(DealStats),

    Prompt(Prompt),
    InputRejected(ValidationError),
    DealCreated(Deal),
    CreationCancelled,

    DealList {
        scope: DealScope,
        deals: Vec<Deal>,
    },
    /// A single deal; `admin` selects the operator button set.
    DealDetails {
        deal: Deal,
        admin: bool,
    },
    ShareDeal(Deal),

    PaymentInstructions {
        deal: Deal,
        upi_id: String,
        qr: PaymentQr,
    },
    ProofRequested {
        deal_id: DealId,
    },
    PaymentAccepted {
        deal: Deal,
        record: PaymentRecord,
    },
    PaymentReleased(Deal),
    DisputeRaised(Deal),
    DisputeResolved(Deal),
    DealCancelled(Deal),

    /// A command or button the bot does not know.
    Unrecognized,
    /// Input with no meaning in the current conversation stage; nothing is sent.
    Ignored,
}
