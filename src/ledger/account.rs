use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Cents;

pub const MAX_ACCOUNT_NAME_LEN: usize = 100;

/// Accounting category of an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Income,
    Expense,
}

impl AccountKind {
    /// Stored kinds keep an authoritative balance; the rest derive it from history.
    pub fn stores_balance(self) -> bool {
        matches!(self, AccountKind::Asset | AccountKind::Liability)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Archived,
}

/// Balance held directly on asset and liability accounts.
///
/// Only the ledger can move it, and only while posting a transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredBalance {
    opening: Cents,
    current: Cents,
}

impl StoredBalance {
    pub(crate) fn opening(opening: Cents) -> Self {
        Self {
            opening,
            current: opening,
        }
    }

    pub fn cents(&self) -> Cents {
        self.current
    }

    pub fn opening_cents(&self) -> Cents {
        self.opening
    }

    /// Returns the balance after applying `delta`, or `None` on overflow.
    pub(crate) fn checked_apply(&self, delta: Cents) -> Option<Cents> {
        self.current.checked_add(delta)
    }

    pub(crate) fn set(&mut self, cents: Cents) {
        self.current = cents;
    }
}

/// Capability split between balances the ledger stores and balances it recomputes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AccountBalance {
    Stored(StoredBalance),
    Derived,
}

/// Represents a financial account registered in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub kind: AccountKind,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub(crate) balance: AccountBalance,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub(crate) fn new(
        name: String,
        kind: AccountKind,
        initial_balance: Cents,
        parent_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let balance = if kind.stores_balance() {
            AccountBalance::Stored(StoredBalance::opening(initial_balance))
        } else {
            AccountBalance::Derived
        };
        Self {
            id: Uuid::new_v4(),
            name,
            kind,
            status: AccountStatus::Active,
            parent_id,
            balance,
            created_at,
        }
    }

    pub fn balance(&self) -> &AccountBalance {
        &self.balance
    }

    /// Stored balance, if this account keeps one.
    pub fn stored_balance(&self) -> Option<Cents> {
        match self.balance {
            AccountBalance::Stored(stored) => Some(stored.cents()),
            AccountBalance::Derived => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn is_archived(&self) -> bool {
        self.status == AccountStatus::Archived
    }
}

/// Account paired with its resolved balance, as handed to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountView {
    #[serde(flatten)]
    pub account: Account,
    pub balance_cents: Cents,
}
