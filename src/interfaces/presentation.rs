//! Plain-text rendering of engine views.
//!
//! Rendering is pure: the same [`View`] always renders to the same [`Rendered`]
//! value and never fails.

use crate::application::action::{Action, InfoPage};
use crate::application::conversation::Prompt;
use crate::application::view::{DealScope, View};
use crate::domain::deal::{
    DESCRIPTION_MAX_CHARS, DESCRIPTION_MIN_CHARS, Deal, DealStatus, MAX_AMOUNT, MIN_AMOUNT,
    TERMS_MIN_CHARS,
};
use crate::domain::lifecycle::{Actor, Trigger, available_triggers};
use crate::domain::ports::PaymentQr;
use crate::error::EscrowError;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Write;

/// Characters of a description shown in list entries.
const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    fn new(label: &str, action: Action) -> Self {
        Self {
            label: label.to_string(),
            action,
        }
    }
}

/// A message ready for delivery: text, inline buttons and an optional image to
/// upload alongside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub buttons: Vec<Button>,
    pub attachment: Option<PaymentQr>,
}

impl Rendered {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = buttons;
        self
    }

    /// Whether there is anything to send at all.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.buttons.is_empty() && self.attachment.is_none()
    }
}

pub trait Renderer: Send + Sync {
    fn render(&self, view: &View) -> Rendered;
    fn render_error(&self, error: &EscrowError) -> Rendered;
}

/// Formats `value` with two decimals and comma thousands separators.
pub fn format_amount(value: Decimal) -> String {
    let fixed = format!(
        "{:.2}",
        value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    );
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}{grouped}.{fraction}")
}

fn title_case(status: DealStatus) -> String {
    let name = status.as_str();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

fn main_menu_buttons() -> Vec<Button> {
    vec![
        Button::new("Create Deal", Action::CreateDeal),
        Button::new("My Deals", Action::MyDeals),
        Button::new("How It Works", Action::Page(InfoPage::HowItWorks)),
        Button::new("Payment Status", Action::Page(InfoPage::StatusGuide)),
        Button::new("Support", Action::Page(InfoPage::Support)),
    ]
}

fn trigger_button(trigger: Trigger, deal: &Deal) -> Button {
    let id = deal.deal_id.clone();
    match trigger {
        Trigger::Fund => Button::new("Pay Now", Action::PayDeal(id)),
        Trigger::Release => Button::new("Release Payment", Action::ReleasePayment(id)),
        Trigger::Dispute => Button::new("Raise Dispute", Action::RaiseDispute(id)),
        Trigger::Resolve => Button::new("Resolve (Complete)", Action::AdminResolve(id)),
        Trigger::Cancel => Button::new("Cancel Deal", Action::AdminCancel(id)),
    }
}

/// The buttons legal for `deal` right now, for a participant or an operator.
fn deal_buttons(deal: &Deal, admin: bool) -> Vec<Button> {
    let actor = if admin { Actor::Operator } else { Actor::Anyone };
    let mut buttons: Vec<Button> = available_triggers(deal.status)
        .into_iter()
        .filter(|trigger| trigger.required_actor() == actor)
        .map(|trigger| trigger_button(trigger, deal))
        .collect();
    if admin {
        buttons.push(Button::new("Back to Admin", Action::Admin));
    } else {
        buttons.push(Button::new("Share Deal", Action::ShareDeal(deal.deal_id.clone())));
        buttons.push(Button::new("My Deals", Action::MyDeals));
    }
    buttons
}

/// The renderer used by the command-line driver.
#[derive(Debug, Clone)]
pub struct TextRenderer {
    currency_symbol: String,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new("₹")
    }
}

impl TextRenderer {
    pub fn new(currency_symbol: impl Into<String>) -> Self {
        Self {
            currency_symbol: currency_symbol.into(),
        }
    }

    fn money(&self, value: Decimal) -> String {
        format!("{}{}", self.currency_symbol, format_amount(value))
    }

    fn deal_summary(&self, deal: &Deal) -> String {
        format!(
            "ID: #{}\nStatus: {}\nAmount: {}\n\nDescription:\n{}\n\nTerms:\n{}",
            deal.deal_id,
            title_case(deal.status),
            self.money(deal.amount.value()),
            deal.description.as_str(),
            deal.terms.as_str(),
        )
    }

    fn render_prompt(&self, prompt: &Prompt) -> Rendered {
        match prompt {
            Prompt::Description => Rendered::text(format!(
                "Create New Escrow Deal\n\nStep 1/3: Description\nPlease describe what you're \
                 buying or selling ({DESCRIPTION_MIN_CHARS}-{DESCRIPTION_MAX_CHARS} characters)."
            )),
            Prompt::Amount => Rendered::text(format!(
                "Step 2/3: Amount\nDescription saved!\nNow enter the deal amount.\n\
                 Minimum amount: {}\nMaximum amount: {}",
                self.money(MIN_AMOUNT),
                self.money(MAX_AMOUNT)
            )),
            Prompt::Terms { amount } => Rendered::text(format!(
                "Step 3/3: Terms & Conditions\nAmount: {} saved!\nPlease specify the deal \
                 terms (at least {TERMS_MIN_CHARS} characters): payment timeframe, delivery \
                 conditions, return policy.",
                self.money(amount.value())
            )),
            Prompt::Confirmation(draft) => Rendered::text(format!(
                "Deal Confirmation\n\nDescription:\n{}\n\nAmount: {}\n\nTerms:\n{}\n\n\
                 Confirm to create this deal.",
                draft.description.as_str(),
                self.money(draft.amount.value()),
                draft.terms.as_str()
            ))
            .with_buttons(vec![
                Button::new("Confirm Deal", Action::ConfirmDeal),
                Button::new("Cancel", Action::CancelDealCreation),
            ]),
            Prompt::Proof { deal_id, amount } => Rendered::text(format!(
                "Send proof of your {} payment for deal #{deal_id}: a screenshot of the \
                 confirmation or your UPI transaction reference.",
                self.money(amount.value())
            )),
        }
    }

    fn render_list(&self, scope: DealScope, deals: &[Deal]) -> Rendered {
        let (title, empty, back) = match scope {
            DealScope::Mine => (
                "Your Deals",
                "No deals found.\nCreate your first secure deal now!",
                Button::new("Main Menu", Action::MainMenu),
            ),
            DealScope::Recent => (
                "All Deals (Recent)",
                "No deals found.",
                Button::new("Back to Admin", Action::Admin),
            ),
            DealScope::Disputes => (
                "Active Disputes",
                "No active disputes.",
                Button::new("Back to Admin", Action::Admin),
            ),
        };
        if deals.is_empty() {
            return Rendered::text(format!("{title}\n\n{empty}")).with_buttons(vec![back]);
        }

        let mut text = format!("{title}\n");
        let mut buttons = Vec::with_capacity(deals.len() + 1);
        for deal in deals {
            let _ = write!(
                text,
                "\n#{} {} - {}\n{}\n",
                deal.deal_id,
                self.money(deal.amount.value()),
                title_case(deal.status),
                preview(deal.description.as_str())
            );
            let action = match scope {
                DealScope::Mine => Action::ShowDeal(deal.deal_id.clone()),
                DealScope::Recent | DealScope::Disputes => {
                    Action::AdminDeal(deal.deal_id.clone())
                }
            };
            buttons.push(Button {
                label: format!("#{}", deal.deal_id),
                action,
            });
        }
        buttons.push(back);
        Rendered::text(text).with_buttons(buttons)
    }
}

impl Renderer for TextRenderer {
    fn render(&self, view: &View) -> Rendered {
        match view {
            View::Welcome {
                display_name,
                is_new: true,
            } => Rendered::text(format!(
                "Welcome to Quick Escrow, {display_name}!\n\nTrade safely: describe your deal, \
                 the buyer pays into escrow, and funds are released once both sides are happy."
            ))
            .with_buttons(vec![
                Button::new("Get Started", Action::MainMenu),
                Button::new("How It Works", Action::Page(InfoPage::HowItWorks)),
            ]),
            View::Welcome {
                display_name,
                is_new: false,
            } => Rendered::text(format!(
                "Welcome back, {display_name}!\nWhat would you like to do?"
            ))
            .with_buttons(main_menu_buttons()),
            View::MainMenu => {
                Rendered::text("Quick Escrow\nChoose an option:").with_buttons(main_menu_buttons())
            }
            View::Help => Rendered::text(
                "Quick Escrow Help\n\nCommands:\n/start - main menu\n/help - this page\n\
                 /status - your deals\n\nUse Create Deal to start a new escrow.",
            )
            .with_buttons(main_menu_buttons()),
            View::Page(InfoPage::HowItWorks) => Rendered::text(
                "How Escrow Works\n\n1. Create Deal: describe the item, set amount and terms.\n\
                 2. Buyer Payment: pay via UPI and send proof.\n\
                 3. Seller Delivery: complete the agreed terms.\n\
                 4. Release Payment: buyer confirms and funds are released.",
            )
            .with_buttons(main_menu_buttons()),
            View::Page(InfoPage::Support) => Rendered::text(
                "Quick Escrow Support\n\nPayment not reflecting: contact an admin with your UPI \
                 reference.\nDeal disputes: use the dispute button on the deal.",
            )
            .with_buttons(main_menu_buttons()),
            View::Page(InfoPage::StatusGuide) => Rendered::text(
                "Payment Status Guide\n\nCreated: waiting for payment\nFunded: payment received\n\
                 Completed: payment released\nDisputed: under admin review\n\
                 Cancelled: deal terminated",
            )
            .with_buttons(main_menu_buttons()),
            View::AdminPanel(stats) => Rendered::text(format!(
                "Admin Panel\n\nTotal Deals: {}\nActive Deals: {}\nCompleted: {}\nDisputed: {}\n\
                 Total Value: {}",
                stats.total_deals,
                stats.active_deals,
                stats.completed_deals,
                stats.disputed_deals,
                self.money(stats.total_value)
            ))
            .with_buttons(vec![
                Button::new("All Deals", Action::AdminAllDeals),
                Button::new("Disputes", Action::AdminDisputes),
            ]),

            View::Prompt(prompt) => self.render_prompt(prompt),
            View::InputRejected(reason) => Rendered::text(reason.to_string()),
            View::DealCreated(deal) => Rendered::text(format!(
                "Deal Created Successfully!\n\nDeal ID: #{}\nAmount: {}\nStatus: {}\n\n\
                 Share the deal ID with your counter-party.",
                deal.deal_id,
                self.money(deal.amount.value()),
                title_case(deal.status)
            ))
            .with_buttons(deal_buttons(deal, false)),
            View::CreationCancelled => {
                Rendered::text("Deal creation cancelled.").with_buttons(main_menu_buttons())
            }

            View::DealList { scope, deals } => self.render_list(*scope, deals),
            View::DealDetails { deal, admin } => {
                let mut text = format!("Deal Details\n\n{}", self.deal_summary(deal));
                if *admin {
                    let _ = write!(text, "\n\nCreator: {}", deal.creator_id);
                }
                let _ = write!(text, "\n\nCreated: {}", deal.created_at.format("%Y-%m-%d %H:%M"));
                Rendered::text(text).with_buttons(deal_buttons(deal, *admin))
            }
            View::ShareDeal(deal) => Rendered::text(format!(
                "Quick Escrow Deal\n\n{}\n\nTo participate:\n1. Start the bot\n\
                 2. Use deal ID: #{}\n3. Follow the secure payment process",
                self.deal_summary(deal),
                deal.deal_id
            ))
            .with_buttons(deal_buttons(deal, false)),

            View::PaymentInstructions { deal, upi_id, qr } => Rendered {
                text: format!(
                    "Payment Instructions\n\nDeal: #{}\nAmount: {}\n\n1. Scan the QR code with \
                     any UPI app\n2. Or pay manually to UPI ID: {upi_id}\n   Memo: Escrow#{}\n\n\
                     After paying, send a screenshot or your UPI reference.",
                    deal.deal_id,
                    self.money(deal.amount.value()),
                    deal.deal_id
                ),
                buttons: vec![
                    Button::new("Payment Done", Action::PaymentDone(deal.deal_id.clone())),
                    Button::new("Regenerate QR", Action::RegenerateQr(deal.deal_id.clone())),
                ],
                attachment: Some(qr.clone()),
            },
            View::ProofRequested { deal_id } => Rendered::text(format!(
                "Payment Confirmation for deal #{deal_id}\n\nPlease provide payment proof:\n\
                 Option 1: send a screenshot of your payment confirmation\n\
                 Option 2: send your UPI transaction reference number"
            )),
            View::PaymentAccepted { deal, record } => Rendered::text(format!(
                "Payment Proof Received!\n\nDeal: #{}\nPayment ID: {}\nAmount: {}\n\
                 Status: {}\n\nYour payment is pending verification.",
                deal.deal_id,
                record.payment_id,
                self.money(record.amount.value()),
                title_case(deal.status)
            ))
            .with_buttons(deal_buttons(deal, false)),
            View::PaymentReleased(deal) => Rendered::text(format!(
                "Payment released for deal #{}. The deal is now completed.",
                deal.deal_id
            ))
            .with_buttons(main_menu_buttons()),
            View::DisputeRaised(deal) => Rendered::text(format!(
                "Dispute raised for deal #{}. An admin will review it shortly.",
                deal.deal_id
            ))
            .with_buttons(main_menu_buttons()),
            View::DisputeResolved(deal) => Rendered::text(format!(
                "Dispute for deal #{} resolved. The deal is now completed.",
                deal.deal_id
            ))
            .with_buttons(vec![Button::new("Back to Admin", Action::Admin)]),
            View::DealCancelled(deal) => Rendered::text(format!(
                "Deal #{} has been cancelled.",
                deal.deal_id
            ))
            .with_buttons(vec![Button::new("Back to Admin", Action::Admin)]),

            View::Unrecognized => {
                Rendered::text("I didn't understand that. Use /start to see the menu.")
                    .with_buttons(main_menu_buttons())
            }
            View::Ignored => Rendered::default(),
        }
    }

    fn render_error(&self, error: &EscrowError) -> Rendered {
        let text = match error {
            EscrowError::IllegalTransition {
                deal_id,
                trigger: Trigger::Fund,
                ..
            } => format!("Deal #{deal_id} is not available for payment."),
            EscrowError::IllegalTransition {
                deal_id,
                from,
                trigger,
            } => format!(
                "Cannot {trigger} on deal #{deal_id} while it is {}.",
                title_case(*from).to_lowercase()
            ),
            EscrowError::InternalError(_) | EscrowError::IoError(_) | EscrowError::CsvError(_) => {
                "Something went wrong, please try again.".to_string()
            }
            other => other.to_string(),
        };
        Rendered::text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deal::{Amount, DealDraft, DealId, Description, Terms};
    use crate::domain::user::UserId;
    use rust_decimal_macros::dec;
    use std::path::PathBuf;

    fn deal(status: DealStatus) -> Deal {
        let mut deal = Deal::materialize(
            DealId::new("AB12CD34"),
            UserId(1),
            DealDraft {
                description: Description::parse("iPhone 14 Pro Max 256GB Space Black").unwrap(),
                amount: Amount::parse("45000.5").unwrap(),
                terms: Terms::parse("Payment within 24 hours, delivery within 3 days").unwrap(),
            },
        );
        deal.status = status;
        deal
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(0)), "0.00");
        assert_eq!(format_amount(dec!(100)), "100.00");
        assert_eq!(format_amount(dec!(15000)), "15,000.00");
        assert_eq!(format_amount(dec!(500000)), "500,000.00");
        assert_eq!(format_amount(dec!(1234567.891)), "1,234,567.89");
        assert_eq!(format_amount(dec!(-2500.5)), "-2,500.50");
    }

    #[test]
    fn test_render_is_idempotent() {
        let renderer = TextRenderer::default();
        let views = [
            View::MainMenu,
            View::DealDetails {
                deal: deal(DealStatus::Funded),
                admin: false,
            },
            View::DealList {
                scope: DealScope::Mine,
                deals: vec![deal(DealStatus::Created)],
            },
            View::InputRejected(crate::error::ValidationError::AmountNotNumeric),
        ];
        for view in &views {
            let first = renderer.render(view);
            assert_eq!(first, renderer.render(view));
            assert!(!first.is_empty());
        }
    }

    #[test]
    fn test_deal_buttons_follow_transition_table() {
        let renderer = TextRenderer::default();
        let actions = |status, admin| -> Vec<Action> {
            renderer
                .render(&View::DealDetails {
                    deal: deal(status),
                    admin,
                })
                .buttons
                .into_iter()
                .map(|b| b.action)
                .collect()
        };
        let id = DealId::new("AB12CD34");

        let created = actions(DealStatus::Created, false);
        assert!(created.contains(&Action::PayDeal(id.clone())));
        assert!(created.contains(&Action::RaiseDispute(id.clone())));
        assert!(!created.contains(&Action::ReleasePayment(id.clone())));

        let funded = actions(DealStatus::Funded, false);
        assert!(funded.contains(&Action::ReleasePayment(id.clone())));
        assert!(!funded.contains(&Action::PayDeal(id.clone())));

        let disputed = actions(DealStatus::Disputed, true);
        assert!(disputed.contains(&Action::AdminResolve(id.clone())));
        assert!(disputed.contains(&Action::AdminCancel(id.clone())));

        let completed = actions(DealStatus::Completed, true);
        assert_eq!(completed, vec![Action::Admin]);
    }

    #[test]
    fn test_payment_instructions_attach_qr() {
        let renderer = TextRenderer::new("Rs ");
        let rendered = renderer.render(&View::PaymentInstructions {
            deal: deal(DealStatus::Created),
            upi_id: "deals@okbank".into(),
            qr: PaymentQr {
                path: PathBuf::from("static/payment_qr.jpg"),
                bytes: vec![1, 2, 3],
            },
        });
        assert!(rendered.text.contains("deals@okbank"));
        assert!(rendered.text.contains("Rs 45,000.50"));
        assert!(rendered.text.contains("Escrow#AB12CD34"));
        let image = rendered.attachment.unwrap();
        assert_eq!(image.path, PathBuf::from("static/payment_qr.jpg"));
        assert_eq!(image.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_ignored_renders_nothing() {
        assert!(TextRenderer::default().render(&View::Ignored).is_empty());
    }

    #[test]
    fn test_render_error_messages() {
        let renderer = TextRenderer::default();
        let not_payable = EscrowError::IllegalTransition {
            deal_id: DealId::new("AB12CD34"),
            from: DealStatus::Funded,
            trigger: Trigger::Fund,
        };
        assert_eq!(
            renderer.render_error(&not_payable).text,
            "Deal #AB12CD34 is not available for payment."
        );

        let release = EscrowError::IllegalTransition {
            deal_id: DealId::new("AB12CD34"),
            from: DealStatus::Created,
            trigger: Trigger::Release,
        };
        assert_eq!(
            renderer.render_error(&release).text,
            "Cannot release payment on deal #AB12CD34 while it is created."
        );
    }
}
