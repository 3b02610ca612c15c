//! Defines the data models for transactions.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::database_id::TransactionId;

// ============================================================================
// MODELS
// ============================================================================

/// The fixed set of categories a transaction can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Rent, mortgage and other housing costs.
    Housing,
    /// Groceries, restaurants and cafes.
    #[serde(rename = "Food & Dining")]
    FoodAndDining,
    /// Public transport, fuel, parking.
    Transportation,
    /// Movies, games, events.
    Entertainment,
    /// Power, water, internet.
    Utilities,
    /// Money earned. The only category counted as income.
    Income,
    /// Anything else.
    Other,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 7] = [
        Category::Housing,
        Category::FoodAndDining,
        Category::Transportation,
        Category::Entertainment,
        Category::Utilities,
        Category::Income,
        Category::Other,
    ];

    /// The display name of the category, which is also its wire format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Housing => "Housing",
            Category::FoodAndDining => "Food & Dining",
            Category::Transportation => "Transportation",
            Category::Entertainment => "Entertainment",
            Category::Utilities => "Utilities",
            Category::Income => "Income",
            Category::Other => "Other",
        }
    }

    /// Whether transactions in this category count as income.
    pub fn is_income(&self) -> bool {
        *self == Category::Income
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when a string does not name a [Category].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == text)
            .ok_or_else(|| UnknownCategory(text.to_owned()))
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money spent or earned, always positive.
    pub amount: f64,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// The category the transaction is filed under.
    pub category: Category,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Whether money was earned. True iff `category` is [Category::Income].
    pub is_income: bool,
}

/// A validated transaction that has not been assigned an ID yet.
///
/// Build one from a request body with
/// [TransactionPayload::validate](crate::transaction::TransactionPayload::validate).
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// A non-empty description.
    pub description: String,
    /// An amount of at least 0.01.
    pub amount: f64,
    /// When the transaction happened.
    pub date: OffsetDateTime,
    /// The category the transaction is filed under.
    pub category: Category,
    /// Free-form notes.
    pub notes: Option<String>,
}

impl NewTransaction {
    /// Whether the new transaction counts as income.
    pub fn is_income(&self) -> bool {
        self.category.is_income()
    }

    /// Attach an ID, producing the stored record.
    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        let is_income = self.is_income();

        Transaction {
            id,
            description: self.description,
            amount: self.amount,
            date: self.date,
            category: self.category,
            notes: self.notes,
            is_income,
        }
    }
}

/// A validated partial update for a transaction.
///
/// Fields set to `None` keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionPatch {
    /// The new description.
    pub description: Option<String>,
    /// The new amount.
    pub amount: Option<f64>,
    /// The new date.
    pub date: Option<OffsetDateTime>,
    /// The new category. Also updates `is_income`.
    pub category: Option<Category>,
    /// The new notes. `Some(None)` clears them.
    pub notes: Option<Option<String>>,
}

impl TransactionPatch {
    /// Merge the fields set in this patch onto `transaction`.
    pub fn apply(self, transaction: &mut Transaction) {
        if let Some(description) = self.description {
            transaction.description = description;
        }

        if let Some(amount) = self.amount {
            transaction.amount = amount;
        }

        if let Some(date) = self.date {
            transaction.date = date;
        }

        if let Some(category) = self.category {
            transaction.category = category;
            transaction.is_income = category.is_income();
        }

        if let Some(notes) = self.notes {
            transaction.notes = notes;
        }
    }
}


#[cfg(test)]
mod patch_tests {
    use time::macros::datetime;

    use crate::transaction::{Category, Transaction, TransactionPatch};

    fn coffee() -> Transaction {
        Transaction {
            id: 1,
            description: "Coffee".to_owned(),
            amount: 4.5,
            date: datetime!(2024-01-05 0:00 UTC),
            category: Category::FoodAndDining,
            notes: None,
            is_income: false,
        }
    }

    #[test]
    fn empty_patch_keeps_everything() {
        let mut transaction = coffee();

        TransactionPatch::default().apply(&mut transaction);

        assert_eq!(transaction, coffee());
    }

    #[test]
    fn category_change_updates_is_income() {
        let mut transaction = coffee();

        TransactionPatch {
            category: Some(Category::Income),
            ..Default::default()
        }
        .apply(&mut transaction);

        assert_eq!(transaction.category, Category::Income);
        assert!(transaction.is_income);
    }

    #[test]
    fn null_notes_clear_existing_notes() {
        let mut transaction = Transaction {
            notes: Some("hello".to_owned()),
            ..coffee()
        };

        TransactionPatch {
            notes: Some(None),
            ..Default::default()
        }
        .apply(&mut transaction);

        assert_eq!(transaction.notes, None);
    }

    #[test]
    fn amount_patch_keeps_description_and_date() {
        let mut transaction = coffee();

        TransactionPatch {
            amount: Some(5.0),
            ..Default::default()
        }
        .apply(&mut transaction);

        assert_eq!(transaction.amount, 5.0);
        assert_eq!(transaction.description, "Coffee");
        assert_eq!(transaction.date, datetime!(2024-01-05 0:00 UTC));
    }
}
