use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    account::{Account, AccountBalance, AccountKind, AccountStatus, AccountView, MAX_ACCOUNT_NAME_LEN},
    transaction::{ClassifiedTransaction, NewTransaction, Transaction, TransactionFilter, TransactionKind},
};
use crate::currency::{ensure_positive, Cents};
use crate::errors::{LedgerError, Result};

pub(crate) const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Command payload for registering an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub kind: AccountKind,
    #[serde(default)]
    pub initial_balance: Cents,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

impl NewAccount {
    pub fn new(name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            name: name.into(),
            kind,
            initial_balance: 0,
            parent_id: None,
        }
    }

    pub fn with_initial_balance(mut self, cents: Cents) -> Self {
        self.initial_balance = cents;
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Stored balance that no longer matches its opening balance plus postings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceMismatch {
    pub account_id: Uuid,
    pub stored: Cents,
    pub expected: Cents,
}

/// Account registry and posting journal.
///
/// Stored balances (asset, liability) only move inside [`Ledger::post_transaction`];
/// derived balances (income, expense) are recomputed from the journal on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    transactions: Vec<Transaction>,
    #[serde(default = "Ledger::schema_version_default")]
    schema_version: u8,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: Vec::new(),
            transactions: Vec::new(),
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    pub fn schema_version(&self) -> u8 {
        self.schema_version
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account(&self, id: Uuid) -> Option<&Account> {
        self.accounts.iter().find(|account| account.id == id)
    }

    fn account_mut(&mut self, id: Uuid) -> Option<&mut Account> {
        self.accounts.iter_mut().find(|account| account.id == id)
    }

    fn require(&self, id: Uuid) -> Result<&Account> {
        self.account(id).ok_or_else(|| LedgerError::account_not_found(id))
    }

    pub fn children(&self, id: Uuid) -> impl Iterator<Item = &Account> {
        self.accounts
            .iter()
            .filter(move |account| account.parent_id == Some(id))
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn all_transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn create_account(&mut self, request: NewAccount, created_at: DateTime<Utc>) -> Result<Account> {
        let name = validate_name(&request.name)?;
        if !request.kind.stores_balance() && request.initial_balance != 0 {
            return Err(LedgerError::Validation(format!(
                "{:?} accounts derive their balance and cannot take an initial balance",
                request.kind
            )));
        }
        if let Some(parent_id) = request.parent_id {
            self.validate_parent(parent_id, request.kind)?;
        }

        let account = Account::new(
            name,
            request.kind,
            request.initial_balance,
            request.parent_id,
            created_at,
        );
        tracing::info!(
            account_id = %account.id,
            kind = ?account.kind,
            initial_balance = request.initial_balance,
            "account created"
        );
        self.accounts.push(account.clone());
        Ok(account)
    }

    pub fn rename_account(&mut self, id: Uuid, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        let account = self
            .account_mut(id)
            .ok_or_else(|| LedgerError::account_not_found(id))?;
        account.name = name;
        Ok(())
    }

    /// Moves an account under `parent_id`, or to the top level when `None`.
    pub fn set_parent(&mut self, id: Uuid, parent_id: Option<Uuid>) -> Result<()> {
        let kind = self.require(id)?.kind;
        if let Some(parent_id) = parent_id {
            if parent_id == id {
                return Err(LedgerError::Validation("account cannot be its own parent".into()));
            }
            self.validate_parent(parent_id, kind)?;
            let mut cursor = Some(parent_id);
            while let Some(ancestor) = cursor {
                if ancestor == id {
                    return Err(LedgerError::Validation(format!(
                        "moving account {id} under {parent_id} would create a cycle"
                    )));
                }
                cursor = self.account(ancestor).and_then(|account| account.parent_id);
            }
        }
        if let Some(account) = self.account_mut(id) {
            account.parent_id = parent_id;
        }
        Ok(())
    }

    fn validate_parent(&self, parent_id: Uuid, kind: AccountKind) -> Result<()> {
        let parent = self.account(parent_id).ok_or_else(|| {
            LedgerError::Validation(format!("parent account {parent_id} does not exist"))
        })?;
        if parent.kind != kind {
            return Err(LedgerError::Validation(format!(
                "parent account is {:?} but child is {:?}",
                parent.kind, kind
            )));
        }
        if parent.is_archived() {
            return Err(LedgerError::Validation(format!(
                "parent account {parent_id} is archived"
            )));
        }
        Ok(())
    }

    pub fn archive_account(&mut self, id: Uuid) -> Result<()> {
        let account = self.require(id)?;
        if account.is_archived() {
            return Err(LedgerError::InvalidState(format!("account {id} is already archived")));
        }
        if let Some(balance) = account.stored_balance().filter(|cents| *cents != 0) {
            return Err(LedgerError::InvalidState(format!(
                "account {id} still holds {balance} cents; settle it before archiving"
            )));
        }
        if self.children(id).any(Account::is_active) {
            return Err(LedgerError::InvalidState(format!(
                "account {id} has active child accounts"
            )));
        }
        if let Some(account) = self.account_mut(id) {
            account.status = AccountStatus::Archived;
        }
        tracing::info!(account_id = %id, "account archived");
        Ok(())
    }

    pub fn unarchive_account(&mut self, id: Uuid) -> Result<()> {
        let account = self.require(id)?;
        if account.is_active() {
            return Err(LedgerError::InvalidState(format!("account {id} is not archived")));
        }
        if let Some(parent) = account.parent_id.and_then(|parent| self.account(parent)) {
            if parent.is_archived() {
                return Err(LedgerError::InvalidState(format!(
                    "parent account {} is archived",
                    parent.id
                )));
            }
        }
        if let Some(account) = self.account_mut(id) {
            account.status = AccountStatus::Active;
        }
        tracing::info!(account_id = %id, "account restored");
        Ok(())
    }

    /// Posts a single debit/credit pair. Either both stored balances move or neither does.
    pub fn post_transaction(&mut self, request: NewTransaction) -> Result<ClassifiedTransaction> {
        ensure_positive(request.amount_cents, "transaction")?;
        if request.from_account == request.to_account {
            return Err(LedgerError::Validation(
                "source and destination accounts must differ".into(),
            ));
        }
        let from = self.require(request.from_account)?;
        let to = self.require(request.to_account)?;
        for account in [from, to] {
            if account.is_archived() {
                return Err(LedgerError::InvalidState(format!(
                    "account {} is archived",
                    account.id
                )));
            }
        }

        let amount = request.amount_cents;
        let overflow = || LedgerError::Validation(format!("posting {amount} cents overflows a balance"));
        let from_next = match &from.balance {
            AccountBalance::Stored(stored) => Some(stored.checked_apply(-amount).ok_or_else(overflow)?),
            AccountBalance::Derived => None,
        };
        let to_next = match &to.balance {
            AccountBalance::Stored(stored) => Some(stored.checked_apply(amount).ok_or_else(overflow)?),
            AccountBalance::Derived => None,
        };
        let kind = TransactionKind::classify(from.kind, to.kind);

        for (id, next) in [(request.from_account, from_next), (request.to_account, to_next)] {
            if let (Some(next), Some(account)) = (next, self.account_mut(id)) {
                if let AccountBalance::Stored(stored) = &mut account.balance {
                    stored.set(next);
                }
            }
        }

        let transaction = Transaction {
            id: Uuid::new_v4(),
            from_account: request.from_account,
            to_account: request.to_account,
            amount_cents: amount,
            description: request.description,
            date: request.date,
            category: request.category,
            recurring_rule_id: request.recurring_rule_id,
        };
        tracing::info!(
            transaction_id = %transaction.id,
            from = %transaction.from_account,
            to = %transaction.to_account,
            amount_cents = amount,
            kind = ?kind,
            "transaction posted"
        );
        self.transactions.push(transaction.clone());
        Ok(ClassifiedTransaction { transaction, kind })
    }

    /// Current balance: stored value for asset/liability, journal sum for income/expense.
    pub fn account_balance(&self, id: Uuid) -> Result<Cents> {
        let account = self.require(id)?;
        Ok(match account.balance {
            AccountBalance::Stored(stored) => stored.cents(),
            AccountBalance::Derived => self.journal_sum(id),
        })
    }

    fn journal_sum(&self, id: Uuid) -> Cents {
        self.transactions
            .iter()
            .map(|txn| txn.signed_amount_for(id))
            .fold(0, Cents::saturating_add)
    }

    /// Balance of the account plus every descendant.
    pub fn rolled_up_balance(&self, id: Uuid) -> Result<Cents> {
        let mut total = self.account_balance(id)?;
        let mut pending: Vec<Uuid> = self.children(id).map(|child| child.id).collect();
        while let Some(next) = pending.pop() {
            total = total.saturating_add(self.account_balance(next)?);
            pending.extend(self.children(next).map(|child| child.id));
        }
        Ok(total)
    }

    pub fn account_view(&self, id: Uuid) -> Result<AccountView> {
        let account = self.require(id)?.clone();
        let balance_cents = self.account_balance(id)?;
        Ok(AccountView {
            account,
            balance_cents,
        })
    }

    pub fn account_views(&self) -> Vec<AccountView> {
        self.accounts
            .iter()
            .map(|account| AccountView {
                account: account.clone(),
                balance_cents: match account.balance {
                    AccountBalance::Stored(stored) => stored.cents(),
                    AccountBalance::Derived => self.journal_sum(account.id),
                },
            })
            .collect()
    }

    /// Classifies against the accounts' current kinds.
    pub fn classify(&self, transaction: &Transaction) -> Result<TransactionKind> {
        let from = self.require(transaction.from_account)?;
        let to = self.require(transaction.to_account)?;
        Ok(TransactionKind::classify(from.kind, to.kind))
    }

    /// Matching transactions, newest first.
    pub fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<ClassifiedTransaction>> {
        let mut listed = self
            .transactions
            .iter()
            .filter(|txn| filter.matches(txn))
            .map(|txn| -> Result<ClassifiedTransaction> {
                Ok(ClassifiedTransaction {
                    kind: self.classify(txn)?,
                    transaction: txn.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        listed.sort_by(|a, b| b.transaction.date.cmp(&a.transaction.date));
        Ok(listed)
    }

    /// Checks the account tree and journal references of a ledger built outside
    /// [`Ledger::create_account`], such as one read back from JSON.
    ///
    /// Account and transaction ids must be unique, parents must exist with the same
    /// kind, no parent chain may loop, and every posting must reference known accounts.
    pub fn verify_structure(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.accounts.len());
        for account in &self.accounts {
            if !seen.insert(account.id) {
                return Err(LedgerError::Validation(format!("duplicate account id {}", account.id)));
            }
        }
        for account in &self.accounts {
            let Some(parent_id) = account.parent_id else {
                continue;
            };
            let parent = self.account(parent_id).ok_or_else(|| {
                LedgerError::Validation(format!(
                    "account {} references missing parent {parent_id}",
                    account.id
                ))
            })?;
            if parent.kind != account.kind {
                return Err(LedgerError::Validation(format!(
                    "account {} is {:?} but its parent is {:?}",
                    account.id, account.kind, parent.kind
                )));
            }
            // A chain longer than the account count must revisit an account.
            let mut cursor = Some(parent_id);
            let mut steps = 0;
            while let Some(ancestor) = cursor {
                if ancestor == account.id || steps > self.accounts.len() {
                    return Err(LedgerError::Validation(format!(
                        "account {} is part of a parent cycle",
                        account.id
                    )));
                }
                steps += 1;
                cursor = self.account(ancestor).and_then(|next| next.parent_id);
            }
        }

        let mut postings = HashSet::with_capacity(self.transactions.len());
        for txn in &self.transactions {
            if !postings.insert(txn.id) {
                return Err(LedgerError::Validation(format!("duplicate transaction id {}", txn.id)));
            }
            for id in [txn.from_account, txn.to_account] {
                if !seen.contains(&id) {
                    return Err(LedgerError::Validation(format!(
                        "transaction {} references unknown account {id}",
                        txn.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Recomputes every stored balance from its opening value and the journal.
    pub fn verify_balances(&self) -> Vec<BalanceMismatch> {
        self.accounts
            .iter()
            .filter_map(|account| match account.balance {
                AccountBalance::Stored(stored) => {
                    let expected = stored.opening_cents().saturating_add(self.journal_sum(account.id));
                    (expected != stored.cents()).then_some(BalanceMismatch {
                        account_id: account.id,
                        stored: stored.cents(),
                        expected,
                    })
                }
                AccountBalance::Derived => None,
            })
            .collect()
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Validation("account name cannot be empty".into()));
    }
    if trimmed.chars().count() > MAX_ACCOUNT_NAME_LEN {
        return Err(LedgerError::Validation(format!(
            "account name exceeds {MAX_ACCOUNT_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn open(ledger: &mut Ledger, name: &str, kind: AccountKind, balance: Cents) -> Uuid {
        ledger
            .create_account(NewAccount::new(name, kind).with_initial_balance(balance), Utc::now())
            .expect("account created")
            .id
    }

    #[test]
    fn create_account_validates_name() {
        let mut ledger = Ledger::new();
        let err = ledger
            .create_account(NewAccount::new("   ", AccountKind::Asset), Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let long = "x".repeat(MAX_ACCOUNT_NAME_LEN + 1);
        let err = ledger
            .create_account(NewAccount::new(long, AccountKind::Asset), Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let exact = "y".repeat(MAX_ACCOUNT_NAME_LEN);
        assert!(ledger
            .create_account(NewAccount::new(exact, AccountKind::Asset), Utc::now())
            .is_ok());
    }

    #[test]
    fn derived_accounts_reject_initial_balance() {
        let mut ledger = Ledger::new();
        let err = ledger
            .create_account(
                NewAccount::new("Salary", AccountKind::Income).with_initial_balance(10),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn parent_must_exist_and_share_kind() {
        let mut ledger = Ledger::new();
        let bank = open(&mut ledger, "Bank", AccountKind::Asset, 0);
        let card = open(&mut ledger, "Card", AccountKind::Liability, 0);

        let missing = ledger
            .create_account(
                NewAccount::new("Child", AccountKind::Asset).with_parent(Uuid::new_v4()),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(missing, LedgerError::Validation(_)));

        let mismatched = ledger
            .create_account(NewAccount::new("Child", AccountKind::Asset).with_parent(card), Utc::now())
            .unwrap_err();
        assert!(matches!(mismatched, LedgerError::Validation(_)));

        let child = ledger
            .create_account(NewAccount::new("Savings", AccountKind::Asset).with_parent(bank), Utc::now())
            .unwrap();
        assert_eq!(child.parent_id, Some(bank));
    }

    #[test]
    fn set_parent_rejects_cycles() {
        let mut ledger = Ledger::new();
        let root = open(&mut ledger, "Root", AccountKind::Asset, 0);
        let child = open(&mut ledger, "Child", AccountKind::Asset, 0);
        ledger.set_parent(child, Some(root)).unwrap();

        let err = ledger.set_parent(root, Some(child)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        let err = ledger.set_parent(root, Some(root)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        ledger.set_parent(child, None).unwrap();
        assert_eq!(ledger.account(child).unwrap().parent_id, None);
    }

    #[test]
    fn posting_moves_stored_balances() {
        let mut ledger = Ledger::new();
        let checking = open(&mut ledger, "Checking", AccountKind::Asset, 100_000);
        let savings = open(&mut ledger, "Savings", AccountKind::Asset, 0);

        let posted = ledger
            .post_transaction(NewTransaction::new(checking, savings, 25_000, "Move", at(1)))
            .unwrap();
        assert_eq!(posted.kind, TransactionKind::Transfer);
        assert_eq!(ledger.account_balance(checking).unwrap(), 75_000);
        assert_eq!(ledger.account_balance(savings).unwrap(), 25_000);
        assert!(ledger.verify_balances().is_empty());
    }

    #[test]
    fn derived_balances_follow_journal() {
        let mut ledger = Ledger::new();
        let salary = open(&mut ledger, "Salary", AccountKind::Income, 0);
        let checking = open(&mut ledger, "Checking", AccountKind::Asset, 0);
        let rent = open(&mut ledger, "Rent", AccountKind::Expense, 0);

        let pay = ledger
            .post_transaction(NewTransaction::new(salary, checking, 300_000, "Pay", at(1)))
            .unwrap();
        assert_eq!(pay.kind, TransactionKind::Income);
        let bill = ledger
            .post_transaction(NewTransaction::new(checking, rent, 120_000, "Rent", at(2)))
            .unwrap();
        assert_eq!(bill.kind, TransactionKind::Expense);

        assert_eq!(ledger.account_balance(salary).unwrap(), -300_000);
        assert_eq!(ledger.account_balance(rent).unwrap(), 120_000);
        assert_eq!(ledger.account_balance(checking).unwrap(), 180_000);
    }

    #[test]
    fn posting_failures_leave_state_untouched() {
        let mut ledger = Ledger::new();
        let checking = open(&mut ledger, "Checking", AccountKind::Asset, 1_000);
        let closed = open(&mut ledger, "Closed", AccountKind::Asset, 0);
        ledger.archive_account(closed).unwrap();

        let cases = [
            (NewTransaction::new(checking, closed, 10, "x", at(1)), "state"),
            (NewTransaction::new(checking, Uuid::new_v4(), 10, "x", at(1)), "missing"),
            (NewTransaction::new(checking, checking, 10, "x", at(1)), "same"),
            (NewTransaction::new(checking, closed, 0, "x", at(1)), "zero"),
        ];
        for (request, label) in cases {
            let err = ledger.post_transaction(request).unwrap_err();
            match label {
                "state" => assert!(matches!(err, LedgerError::InvalidState(_))),
                "missing" => assert!(matches!(err, LedgerError::NotFound(_))),
                _ => assert!(matches!(err, LedgerError::Validation(_))),
            }
        }
        assert_eq!(ledger.account_balance(checking).unwrap(), 1_000);
        assert_eq!(ledger.transaction_count(), 0);
    }

    #[test]
    fn overflowing_post_is_rejected_atomically() {
        let mut ledger = Ledger::new();
        let rich = open(&mut ledger, "Rich", AccountKind::Asset, 0);
        let full = open(&mut ledger, "Full", AccountKind::Asset, i64::MAX);
        let err = ledger
            .post_transaction(NewTransaction::new(rich, full, 1, "x", at(1)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(ledger.account_balance(rich).unwrap(), 0);
        assert_eq!(ledger.account_balance(full).unwrap(), i64::MAX);
    }

    #[test]
    fn archive_requires_settled_balance_and_no_active_children() {
        let mut ledger = Ledger::new();
        let parent = open(&mut ledger, "Parent", AccountKind::Asset, 0);
        let funded = open(&mut ledger, "Funded", AccountKind::Asset, 500);
        let child = ledger
            .create_account(NewAccount::new("Child", AccountKind::Asset).with_parent(parent), Utc::now())
            .unwrap()
            .id;

        assert!(matches!(
            ledger.archive_account(funded).unwrap_err(),
            LedgerError::InvalidState(_)
        ));
        assert!(matches!(
            ledger.archive_account(parent).unwrap_err(),
            LedgerError::InvalidState(_)
        ));

        ledger.archive_account(child).unwrap();
        ledger.archive_account(parent).unwrap();
        assert!(matches!(
            ledger.archive_account(parent).unwrap_err(),
            LedgerError::InvalidState(_)
        ));
        assert!(matches!(
            ledger.unarchive_account(child).unwrap_err(),
            LedgerError::InvalidState(_)
        ));
        ledger.unarchive_account(parent).unwrap();
        ledger.unarchive_account(child).unwrap();
        assert!(ledger.account(child).unwrap().is_active());
    }

    #[test]
    fn rolled_up_balance_includes_descendants() {
        let mut ledger = Ledger::new();
        let root = open(&mut ledger, "Investments", AccountKind::Asset, 1_000);
        let mid = ledger
            .create_account(
                NewAccount::new("Brokerage", AccountKind::Asset)
                    .with_initial_balance(2_000)
                    .with_parent(root),
                Utc::now(),
            )
            .unwrap()
            .id;
        ledger
            .create_account(
                NewAccount::new("Bonds", AccountKind::Asset)
                    .with_initial_balance(300)
                    .with_parent(mid),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(ledger.account_balance(root).unwrap(), 1_000);
        assert_eq!(ledger.rolled_up_balance(root).unwrap(), 3_300);
        assert_eq!(ledger.rolled_up_balance(mid).unwrap(), 2_300);
    }

    #[test]
    fn transactions_are_filtered_and_newest_first() {
        let mut ledger = Ledger::new();
        let checking = open(&mut ledger, "Checking", AccountKind::Asset, 10_000);
        let food = open(&mut ledger, "Food", AccountKind::Expense, 0);
        let other = open(&mut ledger, "Other", AccountKind::Asset, 0);

        ledger
            .post_transaction(NewTransaction::new(checking, food, 100, "Lunch", at(3)).with_category("Dining"))
            .unwrap();
        ledger
            .post_transaction(NewTransaction::new(checking, food, 200, "Dinner", at(5)).with_category("Dining"))
            .unwrap();
        ledger
            .post_transaction(NewTransaction::new(checking, other, 300, "Move", at(4)))
            .unwrap();

        let all = ledger.transactions(&TransactionFilter::default()).unwrap();
        let descriptions: Vec<_> = all.iter().map(|t| t.transaction.description.as_str()).collect();
        assert_eq!(descriptions, ["Dinner", "Move", "Lunch"]);

        let dining = ledger
            .transactions(&TransactionFilter::for_account(food).with_category("Dining"))
            .unwrap();
        assert_eq!(dining.len(), 2);
        assert!(dining.iter().all(|t| t.kind == TransactionKind::Expense));

        let window = TransactionFilter::default().between(at(4).date(), at(4).date());
        assert_eq!(ledger.transactions(&window).unwrap().len(), 1);
    }

    #[test]
    fn verify_structure_rejects_tampered_trees() {
        let mut ledger = Ledger::new();
        let a = open(&mut ledger, "A", AccountKind::Asset, 0);
        let b = open(&mut ledger, "B", AccountKind::Asset, 0);
        let card = open(&mut ledger, "Card", AccountKind::Liability, 0);
        ledger.set_parent(b, Some(a)).unwrap();
        assert!(ledger.verify_structure().is_ok());

        let mut looped = ledger.clone();
        looped.account_mut(a).unwrap().parent_id = Some(b);
        assert!(matches!(looped.verify_structure(), Err(LedgerError::Validation(_))));

        let mut mixed = ledger.clone();
        mixed.account_mut(card).unwrap().parent_id = Some(a);
        assert!(matches!(mixed.verify_structure(), Err(LedgerError::Validation(_))));

        let mut orphan = ledger.clone();
        orphan.account_mut(card).unwrap().parent_id = Some(Uuid::new_v4());
        assert!(orphan.verify_structure().is_err());

        let mut duplicated = ledger.clone();
        let copy = duplicated.account(a).unwrap().clone();
        duplicated.accounts.push(copy);
        assert!(duplicated.verify_structure().is_err());
    }

    #[test]
    fn classification_is_a_repeatable_read() {
        let mut ledger = Ledger::new();
        let salary = open(&mut ledger, "Salary", AccountKind::Income, 0);
        let checking = open(&mut ledger, "Checking", AccountKind::Asset, 0);
        let posted = ledger
            .post_transaction(NewTransaction::new(salary, checking, 1_000, "Pay", at(1)))
            .unwrap();
        let stored = &ledger.all_transactions()[0];
        let first = ledger.classify(stored).unwrap();
        let second = ledger.classify(stored).unwrap();
        assert_eq!(first, TransactionKind::Income);
        assert_eq!(first, second);
        assert_eq!(first, posted.kind);
        assert_eq!(ledger.all_transactions()[0], posted.transaction);
    }

    #[test]
    fn ledger_roundtrips_through_json() {
        let mut ledger = Ledger::new();
        let a = open(&mut ledger, "A", AccountKind::Asset, 500);
        let b = open(&mut ledger, "B", AccountKind::Expense, 0);
        ledger
            .post_transaction(NewTransaction::new(a, b, 125, "Fee", at(7)))
            .unwrap();

        let json = serde_json::to_string(&ledger).unwrap();
        let restored: Ledger = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.account_balance(a).unwrap(), 375);
        assert_eq!(restored.account_balance(b).unwrap(), 125);
        assert_eq!(restored.schema_version(), CURRENT_SCHEMA_VERSION);
    }
}
