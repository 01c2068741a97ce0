use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountKind;
use crate::currency::Cents;

/// A posted money movement: `amount_cents` leaves `from_account` and enters `to_account`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: Uuid,
    pub from_account: Uuid,
    pub to_account: Uuid,
    pub amount_cents: Cents,
    pub description: String,
    pub date: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_rule_id: Option<Uuid>,
}

impl Transaction {
    pub fn touches(&self, account_id: Uuid) -> bool {
        self.from_account == account_id || self.to_account == account_id
    }

    /// Signed effect of this transaction on `account_id`.
    pub fn signed_amount_for(&self, account_id: Uuid) -> Cents {
        if self.to_account == account_id {
            self.amount_cents
        } else if self.from_account == account_id {
            -self.amount_cents
        } else {
            0
        }
    }
}

/// Command payload for posting a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTransaction {
    pub from_account: Uuid,
    pub to_account: Uuid,
    pub amount_cents: Cents,
    pub description: String,
    pub date: NaiveDateTime,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub recurring_rule_id: Option<Uuid>,
}

impl NewTransaction {
    pub fn new(
        from_account: Uuid,
        to_account: Uuid,
        amount_cents: Cents,
        description: impl Into<String>,
        date: NaiveDateTime,
    ) -> Self {
        Self {
            from_account,
            to_account,
            amount_cents,
            description: description.into(),
            date,
            category: None,
            recurring_rule_id: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Economic nature of a transaction, derived from its accounts' kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

impl TransactionKind {
    pub fn classify(from: AccountKind, to: AccountKind) -> Self {
        match (from, to) {
            (AccountKind::Income, AccountKind::Asset) => TransactionKind::Income,
            (AccountKind::Asset, AccountKind::Expense) => TransactionKind::Expense,
            _ => TransactionKind::Transfer,
        }
    }
}

/// A transaction together with the classification computed at read time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassifiedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub kind: TransactionKind,
}

/// Optional criteria for listing transactions; empty criteria match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionFilter {
    pub account: Option<Uuid>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub category: Option<String>,
}

impl TransactionFilter {
    pub fn for_account(account: Uuid) -> Self {
        Self {
            account: Some(account),
            ..Self::default()
        }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from_date = Some(from);
        self.to_date = Some(to);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn matches(&self, txn: &Transaction) -> bool {
        let day = txn.date.date();
        self.account.map_or(true, |id| txn.touches(id))
            && self.from_date.map_or(true, |from| day >= from)
            && self.to_date.map_or(true, |to| day <= to)
            && self
                .category
                .as_deref()
                .map_or(true, |category| txn.category.as_deref() == Some(category))
    }
}
