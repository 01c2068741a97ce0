//! Aggregate figures derived from ledger data.
//!
//! Nothing here mutates the ledger. Net worth reads stored balances of active
//! asset/liability accounts; period metrics read classified transactions.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::currency::Cents;
use crate::ledger::time_interval::shift_month;
use crate::ledger::{Account, AccountKind, ClassifiedTransaction, DateWindow, TransactionKind};

pub const UNCATEGORIZED: &str = "Uncategorized";

/// Net worth computed on demand; `calculated_at` is when, not as-of.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetWorthCalculation {
    pub total_assets: Cents,
    pub total_liabilities: Cents,
    pub net_worth: Cents,
    pub asset_count: usize,
    pub liability_count: usize,
    pub calculated_at: DateTime<Utc>,
}

/// Immutable point-in-time record of net worth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetWorthSnapshot {
    date: NaiveDate,
    total_assets: Cents,
    total_liabilities: Cents,
    net_worth: Cents,
}

impl NetWorthSnapshot {
    pub fn from_calculation(date: NaiveDate, calculation: &NetWorthCalculation) -> Self {
        Self {
            date,
            total_assets: calculation.total_assets,
            total_liabilities: calculation.total_liabilities,
            net_worth: calculation.net_worth,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn total_assets(&self) -> Cents {
        self.total_assets
    }

    pub fn total_liabilities(&self) -> Cents {
        self.total_liabilities
    }

    pub fn net_worth(&self) -> Cents {
        self.net_worth
    }
}

/// Sums active asset and liability accounts independently; children are not rolled
/// into parents and archived accounts are skipped.
pub fn net_worth<'a>(
    accounts: impl IntoIterator<Item = &'a Account>,
    calculated_at: DateTime<Utc>,
) -> NetWorthCalculation {
    let mut total_assets: Cents = 0;
    let mut total_liabilities: Cents = 0;
    let mut asset_count = 0;
    let mut liability_count = 0;

    for account in accounts.into_iter().filter(|account| account.is_active()) {
        let Some(balance) = account.stored_balance() else {
            continue;
        };
        match account.kind {
            AccountKind::Asset => {
                total_assets = total_assets.saturating_add(balance);
                asset_count += 1;
            }
            AccountKind::Liability => {
                total_liabilities = total_liabilities.saturating_add(balance);
                liability_count += 1;
            }
            AccountKind::Income | AccountKind::Expense => {}
        }
    }

    NetWorthCalculation {
        total_assets,
        total_liabilities,
        net_worth: total_assets.saturating_sub(total_liabilities),
        asset_count,
        liability_count,
        calculated_at,
    }
}

/// Current-month totals and their change against the preceding month.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PeriodMetrics {
    pub income: Cents,
    pub expenses: Cents,
    pub previous_income: Cents,
    pub previous_expenses: Cents,
    pub income_change_pct: f64,
    pub expense_change_pct: f64,
}

/// Income and expense totals within a window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodTotals {
    pub income: Cents,
    pub expenses: Cents,
}

impl PeriodTotals {
    pub fn within<'a>(
        transactions: impl IntoIterator<Item = &'a ClassifiedTransaction>,
        window: DateWindow,
    ) -> Self {
        let mut totals = Self::default();
        for txn in transactions {
            if !window.contains(txn.transaction.date.date()) {
                continue;
            }
            match txn.kind {
                TransactionKind::Income => {
                    totals.income = totals.income.saturating_add(txn.transaction.amount_cents)
                }
                TransactionKind::Expense => {
                    totals.expenses = totals.expenses.saturating_add(txn.transaction.amount_cents)
                }
                TransactionKind::Transfer => {}
            }
        }
        totals
    }

    pub fn net(&self) -> Cents {
        self.income.saturating_sub(self.expenses)
    }
}

/// Percentage change from `previous` to `current`.
///
/// Defined as `0.0` when `previous` is zero. This is a reporting convention, not a
/// true rate of change.
pub fn percent_change(current: Cents, previous: Cents) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    (current as f64 - previous as f64) / previous as f64 * 100.0
}

pub fn period_metrics(transactions: &[ClassifiedTransaction], reference: NaiveDate) -> PeriodMetrics {
    let current = PeriodTotals::within(transactions, DateWindow::month_of(reference));
    let previous = DateWindow::previous_month_of(reference)
        .map(|window| PeriodTotals::within(transactions, window))
        .unwrap_or_default();
    PeriodMetrics {
        income: current.income,
        expenses: current.expenses,
        previous_income: previous.income,
        previous_expenses: previous.expenses,
        income_change_pct: percent_change(current.income, previous.income),
        expense_change_pct: percent_change(current.expenses, previous.expenses),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlyTotals {
    pub month: NaiveDate,
    pub income: Cents,
    pub expenses: Cents,
    pub net: Cents,
}

/// Totals for the `months` calendar months ending with `reference`'s month, oldest first.
///
/// Months before the start of the calendar are omitted.
pub fn monthly_trend(
    transactions: &[ClassifiedTransaction],
    reference: NaiveDate,
    months: u32,
) -> Vec<MonthlyTotals> {
    (0..months)
        .rev()
        .filter_map(|offset| {
            let month = shift_month(reference, -i32::try_from(offset).ok()?)?;
            let window = DateWindow::month_of(month);
            let totals = PeriodTotals::within(transactions, window);
            Some(MonthlyTotals {
                month: window.start,
                income: totals.income,
                expenses: totals.expenses,
                net: totals.net(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: Cents,
    pub transactions: usize,
}

/// Expense totals per category within `window`, largest first.
pub fn expenses_by_category(
    transactions: &[ClassifiedTransaction],
    window: DateWindow,
) -> Vec<CategoryTotal> {
    let mut buckets: HashMap<&str, (Cents, usize)> = HashMap::new();
    for txn in transactions {
        if txn.kind != TransactionKind::Expense || !window.contains(txn.transaction.date.date()) {
            continue;
        }
        let key = txn.transaction.category.as_deref().unwrap_or(UNCATEGORIZED);
        let entry = buckets.entry(key).or_default();
        entry.0 = entry.0.saturating_add(txn.transaction.amount_cents);
        entry.1 += 1;
    }
    let mut totals: Vec<CategoryTotal> = buckets
        .into_iter()
        .map(|(category, (amount, transactions))| CategoryTotal {
            category: category.to_string(),
            amount,
            transactions,
        })
        .collect();
    totals.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.category.cmp(&b.category)));
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Ledger, NewAccount, NewTransaction, TransactionFilter};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        ledger: Ledger,
        salary: Uuid,
        checking: Uuid,
        groceries: Uuid,
        savings: Uuid,
    }

    fn fixture() -> Fixture {
        let mut ledger = Ledger::new();
        let mut open = |name: &str, kind, balance| {
            ledger
                .create_account(NewAccount::new(name, kind).with_initial_balance(balance), Utc::now())
                .unwrap()
                .id
        };
        let salary = open("Salary", AccountKind::Income, 0);
        let checking = open("Checking", AccountKind::Asset, 0);
        let groceries = open("Groceries", AccountKind::Expense, 0);
        let savings = open("Savings", AccountKind::Asset, 0);
        Fixture {
            ledger,
            salary,
            checking,
            groceries,
            savings,
        }
    }

    fn post(f: &mut Fixture, from: Uuid, to: Uuid, amount: Cents, on: NaiveDate, category: Option<&str>) {
        let mut request = NewTransaction::new(from, to, amount, "entry", on.and_hms_opt(12, 0, 0).unwrap());
        request.category = category.map(str::to_string);
        f.ledger.post_transaction(request).unwrap();
    }

    fn classified(f: &Fixture) -> Vec<ClassifiedTransaction> {
        f.ledger.transactions(&TransactionFilter::default()).unwrap()
    }

    #[test]
    fn net_worth_of_one_asset_and_one_liability() {
        let mut ledger = Ledger::new();
        ledger
            .create_account(
                NewAccount::new("Checking", AccountKind::Asset).with_initial_balance(100_000),
                Utc::now(),
            )
            .unwrap();
        ledger
            .create_account(
                NewAccount::new("Card", AccountKind::Liability).with_initial_balance(30_000),
                Utc::now(),
            )
            .unwrap();
        let now = Utc::now();
        let calc = net_worth(ledger.accounts(), now);
        assert_eq!(calc.total_assets, 100_000);
        assert_eq!(calc.total_liabilities, 30_000);
        assert_eq!(calc.net_worth, 70_000);
        assert_eq!(calc.asset_count, 1);
        assert_eq!(calc.liability_count, 1);
        assert_eq!(calc.calculated_at, now);

        let snapshot = NetWorthSnapshot::from_calculation(date(2024, 1, 1), &calc);
        assert_eq!(snapshot.net_worth(), 70_000);
        assert_eq!(snapshot.date(), date(2024, 1, 1));
    }

    #[test]
    fn net_worth_skips_archived_and_counts_children_independently() {
        let mut ledger = Ledger::new();
        let parent = ledger
            .create_account(
                NewAccount::new("Bank", AccountKind::Asset).with_initial_balance(1_000),
                Utc::now(),
            )
            .unwrap()
            .id;
        ledger
            .create_account(
                NewAccount::new("Sub", AccountKind::Asset)
                    .with_initial_balance(500)
                    .with_parent(parent),
                Utc::now(),
            )
            .unwrap();
        let closed = ledger
            .create_account(NewAccount::new("Old", AccountKind::Asset), Utc::now())
            .unwrap()
            .id;
        ledger.archive_account(closed).unwrap();

        let calc = net_worth(ledger.accounts(), Utc::now());
        assert_eq!(calc.total_assets, 1_500);
        assert_eq!(calc.asset_count, 2);
        assert_eq!(calc.liability_count, 0);
    }

    #[test]
    fn period_metrics_compare_calendar_months() {
        let mut f = fixture();
        let (salary, checking, groceries, savings) = (f.salary, f.checking, f.groceries, f.savings);
        post(&mut f, salary, checking, 200_000, date(2024, 1, 31), None);
        post(&mut f, checking, groceries, 40_000, date(2024, 1, 5), None);
        post(&mut f, salary, checking, 250_000, date(2024, 2, 1), None);
        post(&mut f, checking, groceries, 30_000, date(2024, 2, 10), None);
        post(&mut f, checking, savings, 99_999, date(2024, 2, 11), None);
        post(&mut f, salary, checking, 1, date(2024, 3, 1), None);

        let metrics = period_metrics(&classified(&f), date(2024, 2, 15));
        assert_eq!(metrics.income, 250_000);
        assert_eq!(metrics.expenses, 30_000);
        assert_eq!(metrics.previous_income, 200_000);
        assert_eq!(metrics.previous_expenses, 40_000);
        assert!((metrics.income_change_pct - 25.0).abs() < 1e-9);
        assert!((metrics.expense_change_pct + 25.0).abs() < 1e-9);
    }

    #[test]
    fn zero_previous_month_yields_zero_change() {
        let mut f = fixture();
        let (salary, checking) = (f.salary, f.checking);
        post(&mut f, salary, checking, 50_000, date(2024, 3, 3), None);
        let metrics = period_metrics(&classified(&f), date(2024, 3, 20));
        assert_eq!(metrics.income, 50_000);
        assert_eq!(metrics.income_change_pct, 0.0);
        assert_eq!(metrics.expense_change_pct, 0.0);
        assert_eq!(percent_change(0, 0), 0.0);
    }

    #[test]
    fn january_compares_against_december() {
        let mut f = fixture();
        let (salary, checking) = (f.salary, f.checking);
        post(&mut f, salary, checking, 100, date(2023, 12, 31), None);
        post(&mut f, salary, checking, 150, date(2024, 1, 1), None);
        let metrics = period_metrics(&classified(&f), date(2024, 1, 10));
        assert_eq!(metrics.previous_income, 100);
        assert!((metrics.income_change_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn trend_and_category_breakdown() {
        let mut f = fixture();
        let (salary, checking, groceries) = (f.salary, f.checking, f.groceries);
        post(&mut f, salary, checking, 1_000, date(2024, 1, 10), None);
        post(&mut f, checking, groceries, 300, date(2024, 3, 2), Some("Food"));
        post(&mut f, checking, groceries, 200, date(2024, 3, 9), Some("Food"));
        post(&mut f, checking, groceries, 700, date(2024, 3, 12), None);

        let trend = monthly_trend(&classified(&f), date(2024, 3, 31), 3);
        let months: Vec<_> = trend.iter().map(|m| m.month).collect();
        assert_eq!(months, [date(2024, 1, 1), date(2024, 2, 1), date(2024, 3, 1)]);
        assert_eq!(trend[0].net, 1_000);
        assert_eq!(trend[2].expenses, 1_200);
        assert_eq!(trend[2].net, -1_200);

        let breakdown = expenses_by_category(&classified(&f), DateWindow::month_of(date(2024, 3, 1)));
        assert_eq!(
            breakdown,
            vec![
                CategoryTotal {
                    category: UNCATEGORIZED.into(),
                    amount: 700,
                    transactions: 1
                },
                CategoryTotal {
                    category: "Food".into(),
                    amount: 500,
                    transactions: 2
                },
            ]
        );
    }
}
