//! Recurring rules and the scheduler that turns due periods into postings.
//!
//! A rule is anchored on `last_processed` (or `created_on` before its first run). Each
//! successful [`process`] call posts exactly one transaction for the next occurrence
//! and advances the anchor to it; a failed post leaves the anchor where it was, so the
//! period stays due and is retried on the next pass.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::{ensure_positive, Cents};
use crate::errors::{LedgerError, Result};
use crate::ledger::{ClassifiedTransaction, Frequency, Ledger, NewTransaction};

pub const MAX_CATCH_UP_PERIODS: usize = 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    #[default]
    Active,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurringRule {
    pub id: Uuid,
    pub from_account: Uuid,
    pub to_account: Uuid,
    pub amount_cents: Cents,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub frequency: Frequency,
    #[serde(default)]
    pub status: RuleStatus,
    pub created_on: NaiveDate,
    #[serde(default)]
    pub last_processed: Option<NaiveDate>,
}

/// Command payload for creating a rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewRecurringRule {
    pub from_account: Uuid,
    pub to_account: Uuid,
    pub amount_cents: Cents,
    pub description: String,
    pub frequency: Frequency,
    #[serde(default)]
    pub category: Option<String>,
}

impl NewRecurringRule {
    pub fn new(
        from_account: Uuid,
        to_account: Uuid,
        amount_cents: Cents,
        description: impl Into<String>,
        frequency: Frequency,
    ) -> Self {
        Self {
            from_account,
            to_account,
            amount_cents,
            description: description.into(),
            frequency,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleUpdate {
    pub from_account: Option<Uuid>,
    pub to_account: Option<Uuid>,
    pub amount_cents: Option<Cents>,
    pub description: Option<String>,
    pub frequency: Option<Frequency>,
    pub category: Option<Option<String>>,
}

impl RecurringRule {
    /// Builds an active rule anchored on `created_on`.
    pub fn new(request: NewRecurringRule, created_on: NaiveDate) -> Result<Self> {
        validate_shape(request.from_account, request.to_account, request.amount_cents)?;
        ensure_schedulable(request.frequency, created_on)?;
        Ok(Self {
            id: Uuid::new_v4(),
            from_account: request.from_account,
            to_account: request.to_account,
            amount_cents: request.amount_cents,
            description: request.description,
            category: request.category,
            frequency: request.frequency,
            status: RuleStatus::Active,
            created_on,
            last_processed: None,
        })
    }

    /// Applies `update`; the rule is unchanged if validation fails.
    pub fn apply(&mut self, update: RuleUpdate) -> Result<()> {
        let from = update.from_account.unwrap_or(self.from_account);
        let to = update.to_account.unwrap_or(self.to_account);
        let amount = update.amount_cents.unwrap_or(self.amount_cents);
        validate_shape(from, to, amount)?;
        ensure_schedulable(update.frequency.unwrap_or(self.frequency), self.anchor())?;
        self.from_account = from;
        self.to_account = to;
        self.amount_cents = amount;
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(frequency) = update.frequency {
            self.frequency = frequency;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.status == RuleStatus::Paused {
            return Err(LedgerError::InvalidState(format!("rule {} is already paused", self.id)));
        }
        self.status = RuleStatus::Paused;
        Ok(())
    }

    /// Resumes from the retained anchor; periods missed while paused become due again.
    pub fn resume(&mut self) -> Result<()> {
        if self.status == RuleStatus::Active {
            return Err(LedgerError::InvalidState(format!("rule {} is not paused", self.id)));
        }
        self.status = RuleStatus::Active;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }

    /// Date the next occurrence is counted from.
    pub fn anchor(&self) -> NaiveDate {
        self.last_processed.unwrap_or(self.created_on)
    }

    /// `None` once the schedule has run past the representable calendar.
    pub fn next_due(&self) -> Option<NaiveDate> {
        next_occurrence(self, self.anchor())
    }
}

fn validate_shape(from: Uuid, to: Uuid, amount: Cents) -> Result<()> {
    ensure_positive(amount, "recurring")?;
    if from == to {
        return Err(LedgerError::Validation(
            "source and destination accounts must differ".into(),
        ));
    }
    Ok(())
}

fn ensure_schedulable(frequency: Frequency, anchor: NaiveDate) -> Result<()> {
    if frequency.next_date(anchor).is_none() {
        return Err(LedgerError::Validation(format!(
            "{} schedule anchored on {anchor} has no next occurrence",
            frequency.label()
        )));
    }
    Ok(())
}

/// One period after `from`, calendar-aware.
pub fn next_occurrence(rule: &RecurringRule, from: NaiveDate) -> Option<NaiveDate> {
    rule.frequency.next_date(from)
}

pub fn is_due(rule: &RecurringRule, today: NaiveDate) -> bool {
    rule.is_active() && rule.next_due().is_some_and(|next| next <= today)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult {
    NotDue { next_due: NaiveDate },
    Processed {
        occurrence: NaiveDate,
        transaction: ClassifiedTransaction,
    },
}

/// Posts the single next due period of `rule`, dated on its occurrence date.
pub fn process(rule: &mut RecurringRule, ledger: &mut Ledger, today: NaiveDate) -> Result<ProcessingResult> {
    if !rule.is_active() {
        return Err(LedgerError::InvalidState(format!("rule {} is paused", rule.id)));
    }
    let Some(occurrence) = rule.next_due() else {
        return Err(LedgerError::InvalidState(format!(
            "rule {} has no further occurrences",
            rule.id
        )));
    };
    if occurrence > today {
        tracing::debug!(rule_id = %rule.id, next_due = %occurrence, "rule not due");
        return Ok(ProcessingResult::NotDue { next_due: occurrence });
    }

    let request = NewTransaction {
        from_account: rule.from_account,
        to_account: rule.to_account,
        amount_cents: rule.amount_cents,
        description: rule.description.clone(),
        date: occurrence.and_time(NaiveTime::MIN),
        category: rule.category.clone(),
        recurring_rule_id: Some(rule.id),
    };
    let transaction = ledger.post_transaction(request)?;
    rule.last_processed = Some(occurrence);
    tracing::info!(
        rule_id = %rule.id,
        occurrence = %occurrence,
        transaction_id = %transaction.transaction.id,
        "recurring rule processed"
    );
    Ok(ProcessingResult::Processed {
        occurrence,
        transaction,
    })
}

/// Result of driving one rule until it is no longer due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchUpOutcome {
    pub rule_id: Uuid,
    pub posted: Vec<ClassifiedTransaction>,
    pub error: Option<String>,
    pub still_due: bool,
}

/// Processes one period at a time until the rule is caught up, a post fails, or
/// `max_periods` postings have been made.
pub fn catch_up(
    rule: &mut RecurringRule,
    ledger: &mut Ledger,
    today: NaiveDate,
    max_periods: usize,
) -> CatchUpOutcome {
    let mut posted = Vec::new();
    let mut error = None;
    while is_due(rule, today) && posted.len() < max_periods {
        match process(rule, ledger, today) {
            Ok(ProcessingResult::Processed { transaction, .. }) => posted.push(transaction),
            Ok(ProcessingResult::NotDue { .. }) => break,
            Err(err) => {
                tracing::warn!(rule_id = %rule.id, error = %err, "recurring posting failed; period stays due");
                error = Some(err.to_string());
                break;
            }
        }
    }
    CatchUpOutcome {
        rule_id: rule.id,
        posted,
        error,
        still_due: is_due(rule, today),
    }
}

/// The next `count` occurrence dates after the rule's anchor.
pub fn upcoming(rule: &RecurringRule, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut cursor = rule.anchor();
    while dates.len() < count {
        let Some(next) = next_occurrence(rule, cursor) else {
            break;
        };
        dates.push(next);
        cursor = next;
    }
    dates
}

/// Number of unprocessed occurrences on or before `today`, capped at `cap`.
pub fn overdue_periods(rule: &RecurringRule, today: NaiveDate, cap: usize) -> usize {
    if !rule.is_active() {
        return 0;
    }
    let mut count = 0;
    let mut cursor = next_occurrence(rule, rule.anchor());
    while let Some(occurrence) = cursor.filter(|occurrence| *occurrence <= today) {
        if count == cap {
            break;
        }
        count += 1;
        cursor = next_occurrence(rule, occurrence);
    }
    count
}

/// Read model for listing rules alongside their due status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleView {
    #[serde(flatten)]
    pub rule: RecurringRule,
    pub next_due: Option<NaiveDate>,
    pub due: bool,
    pub overdue_periods: usize,
}

impl RuleView {
    pub fn new(rule: &RecurringRule, today: NaiveDate, cap: usize) -> Self {
        Self {
            rule: rule.clone(),
            next_due: rule.next_due(),
            due: is_due(rule, today),
            overdue_periods: overdue_periods(rule, today, cap),
        }
    }
}
