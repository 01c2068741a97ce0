#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use fintrack_core::{
    currency::Cents,
    ledger::{AccountKind, NewAccount},
    utils::FixedClock,
    Engine, EngineConfig,
};
use uuid::Uuid;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn at_noon(year: i32, month: u32, day: u32) -> NaiveDateTime {
    date(year, month, day).and_hms_opt(12, 0, 0).expect("valid time")
}

/// Engine pinned to 2024-01-01T09:00Z.
pub fn engine() -> Engine {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
    ));
    Engine::with_clock(EngineConfig::default(), clock).expect("engine")
}

pub fn open(engine: &Engine, name: &str, kind: AccountKind, opening: Cents) -> Uuid {
    engine
        .create_account(NewAccount::new(name, kind).with_initial_balance(opening))
        .expect("create account")
        .id
}

/// Checking and card accounts plus salary and groceries categories.
pub struct Household {
    pub checking: Uuid,
    pub card: Uuid,
    pub salary: Uuid,
    pub groceries: Uuid,
}

pub fn household(engine: &Engine) -> Household {
    Household {
        checking: open(engine, "Checking", AccountKind::Asset, 100_000),
        card: open(engine, "Visa", AccountKind::Liability, 0),
        salary: open(engine, "Salary", AccountKind::Income, 0),
        groceries: open(engine, "Groceries", AccountKind::Expense, 0),
    }
}
