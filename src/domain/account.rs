use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

pub type AccountId = i64;

/// A named balance-holding entity.
///
/// The balance is a snapshot taken when the row was read. Mutations go
/// through the storage layer, which re-evaluates the balance itself, so a
/// stale value here can never push the stored balance below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub balance: Cents,
    pub created_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Whether this snapshot could cover a debit of `amount`.
    pub fn can_cover(&self, amount: Cents) -> bool {
        self.balance
            .checked_sub(amount)
            .is_some_and(|remaining| remaining >= 0)
    }
}
