//! Account registry, posting journal, and the calendar helpers they share.

pub mod account;
#[allow(clippy::module_inception)]
pub mod ledger;
pub mod time_interval;
pub mod transaction;

pub use account::{
    Account, AccountBalance, AccountKind, AccountStatus, AccountView, StoredBalance,
    MAX_ACCOUNT_NAME_LEN,
};
pub use ledger::{BalanceMismatch, Ledger, NewAccount};
pub use time_interval::{DateWindow, Frequency};
pub use transaction::{
    ClassifiedTransaction, NewTransaction, Transaction, TransactionFilter, TransactionKind,
};
