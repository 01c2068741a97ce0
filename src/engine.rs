//! Thread-safe command/query façade over the ledger, recurring rules, and net-worth history.
//!
//! Lock discipline: the ledger sits behind one `RwLock`, so postings never interleave
//! their balance updates. Each rule has its own `Mutex`, held across the whole
//! check-post-advance sequence, so two scheduler passes cannot both post the same
//! period. When both are needed the rule lock is taken first, then the ledger lock.
//! The rule registry lock is never held while waiting on either.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::currency::{format_currency_value, Cents};
use crate::errors::{LedgerError, Result};
use crate::ledger::{
    Account, AccountView, ClassifiedTransaction, DateWindow, Ledger, NewAccount, NewTransaction,
    TransactionFilter,
};
use crate::recurring::{
    self, CatchUpOutcome, NewRecurringRule, ProcessingResult, RecurringRule, RuleUpdate, RuleView,
};
use crate::summary::{
    self, CategoryTotal, MonthlyTotals, NetWorthCalculation, NetWorthSnapshot, PeriodMetrics,
};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::persistence::{load_json, save_json_atomic};

type RuleCell = Arc<Mutex<RecurringRule>>;

/// Serializable image of everything the engine owns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineState {
    #[serde(default)]
    pub ledger: Ledger,
    #[serde(default)]
    pub rules: Vec<RecurringRule>,
    #[serde(default)]
    pub snapshots: Vec<NetWorthSnapshot>,
}

/// Summary of one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub outcomes: Vec<CatchUpOutcome>,
}

impl SchedulerReport {
    pub fn posted_count(&self) -> usize {
        self.outcomes.iter().map(|outcome| outcome.posted.len()).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CatchUpOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.error.is_some())
    }
}

pub struct Engine {
    ledger: RwLock<Ledger>,
    rules: RwLock<HashMap<Uuid, RuleCell>>,
    snapshots: Mutex<Vec<NetWorthSnapshot>>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::from_state(EngineState::default(), config, clock)
    }

    /// Rebuilds an engine from exported state after checking its invariants.
    pub fn from_state(state: EngineState, config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        state.ledger.verify_structure()?;
        if let Some(mismatch) = state.ledger.verify_balances().first() {
            return Err(LedgerError::Validation(format!(
                "account {} stores {} cents but its postings imply {}",
                mismatch.account_id, mismatch.stored, mismatch.expected
            )));
        }
        let mut rule_ids = HashSet::with_capacity(state.rules.len());
        for rule in &state.rules {
            if !rule_ids.insert(rule.id) {
                return Err(LedgerError::Validation(format!("duplicate rule id {}", rule.id)));
            }
            for account in [rule.from_account, rule.to_account] {
                if state.ledger.account(account).is_none() {
                    return Err(LedgerError::Validation(format!(
                        "rule {} references unknown account {account}",
                        rule.id
                    )));
                }
            }
        }
        let rules = state
            .rules
            .into_iter()
            .map(|rule| (rule.id, Arc::new(Mutex::new(rule))))
            .collect();
        Ok(Self {
            ledger: RwLock::new(state.ledger),
            rules: RwLock::new(rules),
            snapshots: Mutex::new(state.snapshots),
            clock,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Formats cents using the configured locale and currency.
    pub fn format_amount(&self, cents: Cents) -> String {
        format_currency_value(
            cents,
            &self.config.currency,
            &self.config.locale,
            &self.config.format,
        )
    }

    // Accounts

    pub fn create_account(&self, request: NewAccount) -> Result<Account> {
        write(&self.ledger).create_account(request, self.clock.now())
    }

    pub fn rename_account(&self, id: Uuid, name: &str) -> Result<()> {
        write(&self.ledger).rename_account(id, name)
    }

    pub fn set_account_parent(&self, id: Uuid, parent_id: Option<Uuid>) -> Result<()> {
        write(&self.ledger).set_parent(id, parent_id)
    }

    pub fn archive_account(&self, id: Uuid) -> Result<()> {
        write(&self.ledger).archive_account(id)
    }

    pub fn unarchive_account(&self, id: Uuid) -> Result<()> {
        write(&self.ledger).unarchive_account(id)
    }

    pub fn account(&self, id: Uuid) -> Result<AccountView> {
        read(&self.ledger).account_view(id)
    }

    pub fn accounts(&self) -> Vec<AccountView> {
        read(&self.ledger).account_views()
    }

    pub fn account_balance(&self, id: Uuid) -> Result<Cents> {
        read(&self.ledger).account_balance(id)
    }

    pub fn rolled_up_balance(&self, id: Uuid) -> Result<Cents> {
        read(&self.ledger).rolled_up_balance(id)
    }

    // Transactions

    pub fn post_transaction(&self, request: NewTransaction) -> Result<ClassifiedTransaction> {
        write(&self.ledger).post_transaction(request)
    }

    pub fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<ClassifiedTransaction>> {
        read(&self.ledger).transactions(filter)
    }

    // Aggregates

    pub fn net_worth(&self) -> NetWorthCalculation {
        summary::net_worth(read(&self.ledger).accounts(), self.clock.now())
    }

    /// Records today's net worth. Snapshots are immutable, so a date can be recorded once.
    pub fn record_net_worth_snapshot(&self, date: NaiveDate) -> Result<NetWorthSnapshot> {
        let calculation = self.net_worth();
        let mut snapshots = lock(&self.snapshots);
        if snapshots.iter().any(|snapshot| snapshot.date() == date) {
            return Err(LedgerError::InvalidState(format!(
                "net worth snapshot for {date} already recorded"
            )));
        }
        let snapshot = NetWorthSnapshot::from_calculation(date, &calculation);
        snapshots.push(snapshot.clone());
        snapshots.sort_by_key(NetWorthSnapshot::date);
        tracing::info!(%date, net_worth = snapshot.net_worth(), "net worth snapshot recorded");
        Ok(snapshot)
    }

    /// Recorded snapshots, oldest first.
    pub fn net_worth_history(&self) -> Vec<NetWorthSnapshot> {
        lock(&self.snapshots).clone()
    }

    pub fn period_metrics(&self, reference: NaiveDate) -> Result<PeriodMetrics> {
        let classified = self.transactions(&TransactionFilter::default())?;
        Ok(summary::period_metrics(&classified, reference))
    }

    pub fn monthly_trend(&self, reference: NaiveDate, months: u32) -> Result<Vec<MonthlyTotals>> {
        let classified = self.transactions(&TransactionFilter::default())?;
        Ok(summary::monthly_trend(&classified, reference, months))
    }

    pub fn expenses_by_category(&self, window: DateWindow) -> Result<Vec<CategoryTotal>> {
        let filter = TransactionFilter::default().between(window.start, window.end);
        let classified = self.transactions(&filter)?;
        Ok(summary::expenses_by_category(&classified, window))
    }

    // Recurring rules

    /// Creates a rule anchored on the clock's current date.
    pub fn create_rule(&self, request: NewRecurringRule) -> Result<RecurringRule> {
        self.create_rule_anchored(request, self.clock.today())
    }

    /// Creates a rule whose first occurrence is one period after `anchor`.
    pub fn create_rule_anchored(&self, request: NewRecurringRule, anchor: NaiveDate) -> Result<RecurringRule> {
        let rule = RecurringRule::new(request, anchor)?;
        self.ensure_postable(&rule)?;
        tracing::info!(
            rule_id = %rule.id,
            frequency = rule.frequency.label(),
            amount_cents = rule.amount_cents,
            "recurring rule created"
        );
        write(&self.rules).insert(rule.id, Arc::new(Mutex::new(rule.clone())));
        Ok(rule)
    }

    fn ensure_postable(&self, rule: &RecurringRule) -> Result<()> {
        let ledger = read(&self.ledger);
        for id in [rule.from_account, rule.to_account] {
            let account = ledger
                .account(id)
                .ok_or_else(|| LedgerError::account_not_found(id))?;
            if account.is_archived() {
                return Err(LedgerError::InvalidState(format!("account {id} is archived")));
            }
        }
        Ok(())
    }

    fn rule_cell(&self, id: Uuid) -> Result<RuleCell> {
        read(&self.rules)
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::rule_not_found(id))
    }

    pub fn update_rule(&self, id: Uuid, update: RuleUpdate) -> Result<RecurringRule> {
        let cell = self.rule_cell(id)?;
        let mut rule = lock(&cell);
        let mut candidate = rule.clone();
        candidate.apply(update)?;
        self.ensure_postable(&candidate)?;
        *rule = candidate;
        Ok(rule.clone())
    }

    pub fn pause_rule(&self, id: Uuid) -> Result<RecurringRule> {
        let cell = self.rule_cell(id)?;
        let mut rule = lock(&cell);
        rule.pause()?;
        tracing::info!(rule_id = %id, "recurring rule paused");
        Ok(rule.clone())
    }

    pub fn resume_rule(&self, id: Uuid) -> Result<RecurringRule> {
        let cell = self.rule_cell(id)?;
        let mut rule = lock(&cell);
        rule.resume()?;
        tracing::info!(rule_id = %id, "recurring rule resumed");
        Ok(rule.clone())
    }

    pub fn rule(&self, id: Uuid, today: NaiveDate) -> Result<RuleView> {
        let cell = self.rule_cell(id)?;
        let rule = lock(&cell);
        Ok(RuleView::new(&rule, today, self.config.max_catch_up_periods))
    }

    /// All rules with their due status, soonest first.
    pub fn rules(&self, today: NaiveDate) -> Vec<RuleView> {
        let mut views: Vec<RuleView> = self
            .rule_cells()
            .iter()
            .map(|cell| RuleView::new(&lock(cell), today, self.config.max_catch_up_periods))
            .collect();
        views.sort_by_key(|view| (view.next_due.is_none(), view.next_due, view.rule.id));
        views
    }

    fn rule_cells(&self) -> Vec<RuleCell> {
        read(&self.rules).values().cloned().collect()
    }

    /// Processes a single due period of one rule.
    pub fn process_rule(&self, id: Uuid, today: NaiveDate) -> Result<ProcessingResult> {
        let cell = self.rule_cell(id)?;
        let mut rule = lock(&cell);
        let mut ledger = write(&self.ledger);
        recurring::process(&mut rule, &mut ledger, today)
    }

    /// Brings every active rule up to date, one posting per missed period.
    ///
    /// A failing rule keeps its anchor and is reported; the pass carries on with the rest.
    pub fn run_scheduler_pass(&self, today: NaiveDate) -> SchedulerReport {
        let mut report = SchedulerReport::default();
        for cell in self.rule_cells() {
            let mut rule = lock(&cell);
            if !recurring::is_due(&rule, today) {
                continue;
            }
            let mut ledger = write(&self.ledger);
            let outcome = recurring::catch_up(&mut rule, &mut ledger, today, self.config.max_catch_up_periods);
            report.outcomes.push(outcome);
        }
        tracing::info!(
            %today,
            rules = report.outcomes.len(),
            posted = report.posted_count(),
            "scheduler pass finished"
        );
        report
    }

    // State export

    pub fn export_state(&self) -> EngineState {
        let mut rules: Vec<RecurringRule> = self
            .rule_cells()
            .iter()
            .map(|cell| lock(cell).clone())
            .collect();
        rules.sort_by(|a, b| a.created_on.cmp(&b.created_on).then_with(|| a.id.cmp(&b.id)));
        EngineState {
            ledger: read(&self.ledger).clone(),
            rules,
            snapshots: self.net_worth_history(),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        save_json_atomic(&self.export_state(), path)?;
        tracing::info!(path = %path.display(), "engine state saved");
        Ok(())
    }

    pub fn load_from_file(path: &Path, config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let state: EngineState = load_json(path)?;
        Self::from_state(state, config, clock)
    }

    /// Opens the state file named by `config.snapshot_path`, starting empty when it does
    /// not exist yet.
    pub fn open(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = configured_snapshot_path(&config)?;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no state file; starting empty");
            return Self::with_clock(config, clock);
        }
        Self::load_from_file(&path, config, clock)
    }

    /// Saves to `config.snapshot_path`.
    pub fn save(&self) -> Result<()> {
        let path = configured_snapshot_path(&self.config)?;
        self.save_to_file(&path)
    }
}

fn configured_snapshot_path(config: &EngineConfig) -> Result<PathBuf> {
    config
        .snapshot_path
        .clone()
        .ok_or_else(|| LedgerError::InvalidState("no snapshot_path configured".into()))
}
