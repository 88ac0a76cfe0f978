pub mod assignments;
pub mod billing;
pub mod complaints;
pub mod history;
pub mod storage;

use chrono::{NaiveDate, Utc};

use crate::config::AppConfig;

/// "Today" in the property's timezone. Due dates and overdue derivation
/// follow the local calendar, not UTC.
pub fn local_today(config: &AppConfig) -> NaiveDate {
    Utc::now().with_timezone(&config.timezone).date_naive()
}
