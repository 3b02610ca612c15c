//! Validation of transaction request bodies.

use serde::{Deserialize, Deserializer};
use time::{
    Date, OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339,
    macros::format_description,
};

use crate::{
    transaction::{Category, NewTransaction, TransactionPatch},
    validation::{ValidationErrors, required},
};

/// The smallest amount a transaction may have.
pub const MIN_AMOUNT: f64 = 0.01;

/// An amount as sent by clients, either a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    /// A JSON number, e.g. `4.5`.
    Number(f64),
    /// A numeric string, e.g. `"4.50"`.
    Text(String),
}

/// The raw JSON body for creating or updating a transaction.
///
/// Every field is optional at this stage so that missing fields are reported
/// alongside other validation errors instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    /// Must be non-empty.
    pub description: Option<String>,
    /// Must be at least [MIN_AMOUNT].
    pub amount: Option<AmountInput>,
    /// An RFC 3339 date-time or a `YYYY-MM-DD` date.
    pub date: Option<String>,
    /// The display name of a [Category].
    pub category: Option<String>,
    /// Free-form notes. `Some(None)` when the body sets `notes` to `null`.
    #[serde(default, deserialize_with = "present")]
    pub notes: Option<Option<String>>,
    /// Accepted for compatibility, the stored value is derived from the category.
    pub is_income: Option<bool>,
}

impl TransactionPayload {
    /// Validate a payload for a new transaction, all fields except `notes` and
    /// `isIncome` are required.
    ///
    /// # Errors
    /// Returns every field that is missing or invalid.
    pub fn validate(self) -> Result<NewTransaction, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let description = required(self.description, "description", &mut errors)
            .and_then(|description| validate_description(description, &mut errors));
        let amount = required(self.amount, "amount", &mut errors)
            .and_then(|amount| validate_amount(amount, &mut errors));
        let date =
            required(self.date, "date", &mut errors).and_then(|date| validate_date(&date, &mut errors));
        let category = required(self.category, "category", &mut errors)
            .and_then(|category| validate_category(&category, &mut errors));

        match (description, amount, date, category) {
            (Some(description), Some(amount), Some(date), Some(category)) => {
                errors.into_result(NewTransaction {
                    description,
                    amount,
                    date,
                    category,
                    notes: self.notes.flatten(),
                })
            }
            _ => Err(errors),
        }
    }

    /// Validate a payload for updating a transaction, every field is optional
    /// but fields that are present must be valid.
    ///
    /// # Errors
    /// Returns every field that is invalid.
    pub fn validate_patch(self) -> Result<TransactionPatch, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let patch = TransactionPatch {
            description: self
                .description
                .and_then(|description| validate_description(description, &mut errors)),
            amount: self
                .amount
                .and_then(|amount| validate_amount(amount, &mut errors)),
            date: self
                .date
                .and_then(|date| validate_date(&date, &mut errors)),
            category: self
                .category
                .and_then(|category| validate_category(&category, &mut errors)),
            notes: self.notes,
        };

        errors.into_result(patch)
    }
}

/// Deserialize a field that is present in the body, so that `null` becomes
/// `Some(None)` and a missing field falls back to `None` via `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn validate_description(description: String, errors: &mut ValidationErrors) -> Option<String> {
    if description.is_empty() {
        errors.push("description", "Description is required");
        return None;
    }

    Some(description)
}

fn validate_amount(amount: AmountInput, errors: &mut ValidationErrors) -> Option<f64> {
    let amount = match amount {
        AmountInput::Number(amount) => Some(amount),
        AmountInput::Text(text) => text.trim().parse::<f64>().ok(),
    };

    match amount {
        Some(amount) if !amount.is_finite() => {
            errors.push("amount", "Amount must be a number");
            None
        }
        Some(amount) if amount < MIN_AMOUNT => {
            errors.push("amount", "Amount must be greater than 0");
            None
        }
        Some(amount) => Some(amount),
        None => {
            errors.push("amount", "Amount must be a number");
            None
        }
    }
}

fn validate_date(date: &str, errors: &mut ValidationErrors) -> Option<OffsetDateTime> {
    let parsed = parse_date(date);

    if parsed.is_none() {
        errors.push("date", "Please enter a valid date");
    }

    parsed
}

fn validate_category(category: &str, errors: &mut ValidationErrors) -> Option<Category> {
    match category.parse() {
        Ok(category) => Some(category),
        Err(_) => {
            errors.push("category", "Please select a valid category");
            None
        }
    }
}

/// Parse an RFC 3339 date-time, or a `YYYY-MM-DD` date taken as midnight UTC.
///
/// The result is always in UTC and has millisecond precision, the precision
/// dates are stored with.
pub fn parse_date(text: &str) -> Option<OffsetDateTime> {
    let text = text.trim();

    if let Ok(date_time) = OffsetDateTime::parse(text, &Rfc3339) {
        let date_time = date_time.to_offset(UtcOffset::UTC);
        return date_time.replace_millisecond(date_time.millisecond()).ok();
    }

    Date::parse(text, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}
