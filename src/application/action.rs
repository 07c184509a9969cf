use crate::domain::deal::DealId;

/// Static informational pages reachable from the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoPage {
    HowItWorks,
    Support,
    StatusGuide,
}

/// Everything a user can ask the bot to do: slash commands, button presses and
/// plain messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Help,
    Admin,
    MainMenu,
    Page(InfoPage),

    CreateDeal,
    ConfirmDeal,
    CancelDealCreation,
    Text(String),
    Photo { file_id: String },
    /// A message carrying neither text nor an image.
    Unsupported,

    MyDeals,
    ShowDeal(DealId),
    ShareDeal(DealId),

    PayDeal(DealId),
    RegenerateQr(DealId),
    PaymentDone(DealId),
    ReleasePayment(DealId),
    RaiseDispute(DealId),

    AdminAllDeals,
    AdminDisputes,
    AdminDeal(DealId),
    AdminResolve(DealId),
    AdminCancel(DealId),
}

/// Callback payloads that carry a deal id, longest prefix first so that
/// `admin_deal_` is not mistaken for `deal_`.
const DEAL_CALLBACKS: [(&str, fn(DealId) -> Action); 10] = [
    ("regenerate_qr_", Action::RegenerateQr),
    ("release_payment_", Action::ReleasePayment),
    ("admin_resolve_", Action::AdminResolve),
    ("payment_done_", Action::PaymentDone),
    ("dispute_deal_", Action::RaiseDispute),
    ("admin_cancel_", Action::AdminCancel),
    ("share_deal_", Action::ShareDeal),
    ("admin_deal_", Action::AdminDeal),
    ("pay_deal_", Action::PayDeal),
    ("deal_", Action::ShowDeal),
];

impl Action {
    /// Parses a slash command such as `/start` or `/admin`.
    pub fn from_command(command: &str) -> Option<Self> {
        let name = command.trim().trim_start_matches('/');
        let name = name.split(['@', ' ']).next().unwrap_or_default();
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Action::Start),
            "help" => Some(Action::Help),
            "admin" => Some(Action::Admin),
            "status" => Some(Action::MyDeals),
            _ => None,
        }
    }

    /// Parses the payload attached to an inline button.
    pub fn from_callback(data: &str) -> Option<Self> {
        let fixed = match data {
            "create_deal" => Some(Action::CreateDeal),
            "confirm_deal" => Some(Action::ConfirmDeal),
            "cancel_deal_creation" => Some(Action::CancelDealCreation),
            "my_deals" => Some(Action::MyDeals),
            "main_menu" | "start_onboarding" => Some(Action::MainMenu),
            "how_it_works" => Some(Action::Page(InfoPage::HowItWorks)),
            "support" => Some(Action::Page(InfoPage::Support)),
            "payment_status" => Some(Action::Page(InfoPage::StatusGuide)),
            "admin_all_deals" => Some(Action::AdminAllDeals),
            "admin_disputes" => Some(Action::AdminDisputes),
            "back_to_admin" => Some(Action::Admin),
            _ => None,
        };
        fixed.or_else(|| {
            DEAL_CALLBACKS.iter().find_map(|(prefix, build)| {
                data.strip_prefix(prefix)
                    .filter(|id| !id.is_empty())
                    .map(|id| build(DealId::new(id)))
            })
        })
    }

    /// The inline-button payload that round-trips through [`Action::from_callback`],
    /// for actions that can be attached to a button.
    pub fn callback_data(&self) -> Option<String> {
        let data = match self {
            Action::CreateDeal => "create_deal".to_string(),
            Action::ConfirmDeal => "confirm_deal".to_string(),
            Action::CancelDealCreation => "cancel_deal_creation".to_string(),
            Action::MyDeals => "my_deals".to_string(),
            Action::MainMenu => "main_menu".to_string(),
            Action::Admin => "back_to_admin".to_string(),
            Action::Page(InfoPage::HowItWorks) => "how_it_works".to_string(),
            Action::Page(InfoPage::Support) => "support".to_string(),
            Action::Page(InfoPage::StatusGuide) => "payment_status".to_string(),
            Action::AdminAllDeals => "admin_all_deals".to_string(),
            Action::AdminDisputes => "admin_disputes".to_string(),
            Action::ShowDeal(id) => format!("deal_{id}"),
            Action::ShareDeal(id) => format!("share_deal_{id}"),
            Action::PayDeal(id) => format!("pay_deal_{id}"),
            Action::RegenerateQr(id) => format!("regenerate_qr_{id}"),
            Action::PaymentDone(id) => format!("payment_done_{id}"),
            Action::ReleasePayment(id) => format!("release_payment_{id}"),
            Action::RaiseDispute(id) => format!("dispute_deal_{id}"),
            Action::AdminDeal(id) => format!("admin_deal_{id}"),
            Action::AdminResolve(id) => format!("admin_resolve_{id}"),
            Action::AdminCancel(id) => format!("admin_cancel_{id}"),
            Action::Start
            | Action::Help
            | Action::Text(_)
            | Action::Photo { .. }
            | Action::Unsupported => return None,
        };
        Some(data)
    }

    /// Whether the rate limiter applies to this action.
    pub fn is_throttled(&self) -> bool {
        matches!(
            self,
            Action::Start | Action::CreateDeal | Action::PayDeal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands() {
        assert_eq!(Action::from_command("/start"), Some(Action::Start));
        assert_eq!(Action::from_command("/admin@QuickEscrow_Bot"), Some(Action::Admin));
        assert_eq!(Action::from_command("/HELP"), Some(Action::Help));
        assert_eq!(Action::from_command("/unknown"), None);
    }

    #[test]
    fn test_deal_callbacks_do_not_shadow_each_other() {
        let id = DealId::new("AB12CD34");
        assert_eq!(
            Action::from_callback("admin_deal_AB12CD34"),
            Some(Action::AdminDeal(id.clone()))
        );
        assert_eq!(
            Action::from_callback("deal_AB12CD34"),
            Some(Action::ShowDeal(id.clone()))
        );
        assert_eq!(
            Action::from_callback("share_deal_ab12cd34"),
            Some(Action::ShareDeal(id))
        );
        assert_eq!(Action::from_callback("pay_deal_"), None);
        assert_eq!(Action::from_callback("nonsense"), None);
    }

    #[test]
    fn test_callback_round_trip() {
        let id = DealId::new("AB12CD34");
        let actions = [
            Action::CreateDeal,
            Action::ConfirmDeal,
            Action::CancelDealCreation,
            Action::MyDeals,
            Action::MainMenu,
            Action::Admin,
            Action::Page(InfoPage::Support),
            Action::AdminDisputes,
            Action::ShowDeal(id.clone()),
            Action::PayDeal(id.clone()),
            Action::RegenerateQr(id.clone()),
            Action::PaymentDone(id.clone()),
            Action::ReleasePayment(id.clone()),
            Action::RaiseDispute(id.clone()),
            Action::AdminDeal(id.clone()),
            Action::AdminResolve(id.clone()),
            Action::AdminCancel(id),
        ];
        for action in actions {
            let data = action.callback_data().unwrap();
            assert_eq!(Action::from_callback(&data), Some(action));
        }
    }

    #[test]
    fn test_throttled_entry_points() {
        assert!(Action::Start.is_throttled());
        assert!(Action::CreateDeal.is_throttled());
        assert!(Action::PayDeal(DealId::new("X")).is_throttled());
        assert!(!Action::MyDeals.is_throttled());
        assert!(!Action::Text("hi".into()).is_throttled());
    }
}
