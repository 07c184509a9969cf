use crate::application::action::Action;
use crate::domain::deal::{DEAL_ID_LEN, DealId};
use crate::domain::user::Caller;
use crate::error::{EscrowError, Result};
use serde::Deserialize;
use std::io::Read;

/// One inbound chat event of a replay script.
///
/// `action` is a slash command (`/start`), a message kind (`text`, `photo`,
/// `unsupported`) or a button name (`create_deal`, `pay_deal`, `admin_resolve`, ...).
/// For button names that address a deal, `arg` holds the deal id; `#N` stands for
/// the N-th deal created during the replay.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventRecord {
    pub user: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub action: String,
    #[serde(default)]
    pub arg: Option<String>,
}

impl EventRecord {
    pub fn caller(&self) -> Caller {
        let display_name = match &self.username {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("user{}", self.user),
        };
        Caller::new(self.user, self.username.as_deref(), &display_name)
    }

    /// Translates the record into an engine action. `created` lists the deals
    /// created so far in the replay, in creation order.
    pub fn to_action(&self, created: &[DealId]) -> Result<Action> {
        let action = self.action.trim();
        let arg = self.arg.as_deref().map(str::trim).filter(|arg| !arg.is_empty());
        let parsed = match action {
            command if command.starts_with('/') => Action::from_command(command),
            "text" => Some(Action::Text(arg.unwrap_or_default().to_string())),
            "photo" => Some(Action::Photo {
                file_id: arg.unwrap_or("photo").to_string(),
            }),
            "unsupported" => Some(Action::Unsupported),
            button => match arg {
                Some(reference) => {
                    let deal_id = resolve_deal(reference, created)?;
                    Action::from_callback(&format!("{button}_{deal_id}"))
                }
                None => Action::from_callback(button),
            },
        };
        parsed.ok_or_else(|| EscrowError::MalformedEvent(format!("unknown action '{action}'")))
    }
}

/// Resolves `#N` placeholders; anything else is taken as a literal deal id.
fn resolve_deal(reference: &str, created: &[DealId]) -> Result<DealId> {
    let placeholder = reference
        .strip_prefix('#')
        .filter(|n| !n.is_empty() && n.len() < DEAL_ID_LEN)
        .filter(|n| n.bytes().all(|b| b.is_ascii_digit()));
    match placeholder {
        Some(n) => n
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| created.get(index))
            .cloned()
            .ok_or_else(|| {
                EscrowError::MalformedEvent(format!("no deal {reference} created yet"))
            }),
        None => Ok(DealId::new(reference)),
    }
}

/// Reads chat events from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and tolerating rows without the
/// trailing `arg` column.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes events, one `Result` per row.
    pub fn events(self) -> impl Iterator<Item = Result<EventRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(EscrowError::from))
    }
}
