use crate::domain::user::UserId;
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEAL_ID_LEN: usize = 8;

pub const DESCRIPTION_MIN_CHARS: usize = 10;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const TERMS_MIN_CHARS: usize = 20;
pub const TERMS_MAX_CHARS: usize = 1000;

pub const MIN_AMOUNT: Decimal = dec!(100);
pub const MAX_AMOUNT: Decimal = dec!(500000);

/// Opaque, uppercase deal token.
///
/// Generated ids are always [`DEAL_ID_LEN`] characters long. Ids that arrive from
/// the outside (button payloads, typed `#ABCD1234` references) are normalized but
/// not length-checked; an unknown id simply resolves to nothing in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealId(String);

impl DealId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().trim_start_matches('#').to_ascii_uppercase())
    }

    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(raw[..DEAL_ID_LEN].to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    Created,
    Funded,
    Completed,
    Disputed,
    Cancelled,
}

impl DealStatus {
    pub const ALL: [DealStatus; 5] = [
        DealStatus::Created,
        DealStatus::Funded,
        DealStatus::Completed,
        DealStatus::Disputed,
        DealStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Created => "created",
            DealStatus::Funded => "funded",
            DealStatus::Completed => "completed",
            DealStatus::Disputed => "disputed",
            DealStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DealStatus::Completed | DealStatus::Cancelled)
    }

    /// Deals that still hold an open obligation between the two parties.
    pub fn is_active(&self) -> bool {
        matches!(self, DealStatus::Created | DealStatus::Funded)
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// What is being bought or sold, 10 to 500 characters after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Description(String);

impl Description {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let text = raw.trim();
        let len = char_len(text);
        if len < DESCRIPTION_MIN_CHARS {
            Err(ValidationError::DescriptionTooShort {
                min: DESCRIPTION_MIN_CHARS,
            })
        } else if len > DESCRIPTION_MAX_CHARS {
            Err(ValidationError::DescriptionTooLong {
                max: DESCRIPTION_MAX_CHARS,
            })
        } else {
            Ok(Self(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Description {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Description> for String {
    fn from(description: Description) -> Self {
        description.0
    }
}

/// Payment, delivery and return conditions, 20 to 1000 characters after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Terms(String);

impl Terms {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let text = raw.trim();
        let len = char_len(text);
        if len < TERMS_MIN_CHARS {
            Err(ValidationError::TermsTooShort {
                min: TERMS_MIN_CHARS,
            })
        } else if len > TERMS_MAX_CHARS {
            Err(ValidationError::TermsTooLong {
                max: TERMS_MAX_CHARS,
            })
        } else {
            Ok(Self(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Terms {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Terms> for String {
    fn from(terms: Terms) -> Self {
        terms.0
    }
}

/// Deal price, bounded to [`MIN_AMOUNT`, `MAX_AMOUNT`] and held at two decimals.
///
/// The range check runs on the value as typed, before rounding, so `99.999` is
/// rejected rather than rounded up into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, ValidationError> {
        if value < MIN_AMOUNT {
            Err(ValidationError::AmountBelowMinimum { min: MIN_AMOUNT })
        } else if value > MAX_AMOUNT {
            Err(ValidationError::AmountAboveMaximum { max: MAX_AMOUNT })
        } else {
            let mut value =
                value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            value.rescale(2);
            Ok(Self(value))
        }
    }

    /// Parses user input such as `15000`, `15,000` or `45000.50`.
    ///
    /// Numbers too large for a [`Decimal`] are out of range, not malformed.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
        if let Ok(value) = Decimal::from_str(&cleaned) {
            return Self::new(value);
        }

        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        let is_number = !(whole.is_empty() && fraction.is_empty())
            && whole.bytes().all(|b| b.is_ascii_digit())
            && fraction.bytes().all(|b| b.is_ascii_digit());
        if !is_number {
            return Err(ValidationError::AmountNotNumeric);
        }

        // Too many digits for a Decimal. Only the magnitude matters from here on, so
        // nonzero fraction digits past the fourth collapse into a trailing 1.
        let whole = match whole.trim_start_matches('0') {
            "" => "0",
            significant => significant,
        };
        let fraction = match fraction.split_at_checked(4) {
            Some((kept, rest)) if rest.bytes().any(|b| b != b'0') => format!("{kept}1"),
            Some((kept, _)) => kept.to_string(),
            None => fraction.to_string(),
        };
        let sign = if negative { "-" } else { "" };
        let shortened = if fraction.is_empty() {
            format!("{sign}{whole}")
        } else {
            format!("{sign}{whole}.{fraction}")
        };
        match Decimal::from_str(&shortened) {
            Ok(value) => Self::new(value),
            Err(_) if negative => Err(ValidationError::AmountBelowMinimum { min: MIN_AMOUNT }),
            Err(_) => Err(ValidationError::AmountAboveMaximum { max: MAX_AMOUNT }),
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// The fully collected, validated fields of a deal that has not been confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealDraft {
    pub description: Description,
    pub amount: Amount,
    pub terms: Terms,
}

/// A tracked trade agreement.
///
/// Everything except `status` is fixed at creation; status only moves through
/// [`crate::domain::lifecycle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub deal_id: DealId,
    pub creator_id: UserId,
    pub description: Description,
    pub amount: Amount,
    pub terms: Terms,
    pub status: DealStatus,
    pub created_at: DateTime<Utc>,
}

impl Deal {
    pub fn materialize(deal_id: DealId, creator_id: UserId, draft: DealDraft) -> Self {
        Self {
            deal_id,
            creator_id,
            description: draft.description,
            amount: draft.amount,
            terms: draft.terms,
            status: DealStatus::Created,
            created_at: Utc::now(),
        }
    }
}

/// Dashboard figures for the operator panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DealStats {
    pub total_deals: usize,
    pub active_deals: usize,
    pub completed_deals: usize,
    pub disputed_deals: usize,
    /// Sum of amounts over every deal that was not cancelled.
    pub total_value: Decimal,
}

impl DealStats {
    pub fn tally<'a>(deals: impl IntoIterator<Item = &'a Deal>) -> Self {
        deals.into_iter().fold(Self::default(), |mut stats, deal| {
            stats.total_deals += 1;
            match deal.status {
                s if s.is_active() => stats.active_deals += 1,
                DealStatus::Completed => stats.completed_deals += 1,
                DealStatus::Disputed => stats.disputed_deals += 1,
                _ => {}
            }
            if deal.status != DealStatus::Cancelled {
                stats.total_value += deal.amount.value();
            }
            stats
        })
    }
}
