use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io;
use std::rc::Rc;

use crate::modules::config::WithdrawalLimits;
use crate::modules::errors::WithdrawalError;
use crate::modules::storage::{get_json, set_json, KeyValueStore};
use crate::modules::utils::clock::Clock;
use crate::modules::utils::format::{format_currency, generate_csv};
use crate::modules::utils::logging::log_data_operation;
use crate::modules::utils::time::{datetime_from_millis, format_transaction_date};

pub const TRANSACTIONS_KEY: &str = "irsTransactions";
pub const TODAYS_WITHDRAWALS_KEY: &str = "todaysWithdrawals";

const CSV_HEADERS: [&str; 5] = ["Date", "Description", "Type", "Amount", "Reference"];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "Credit",
            TransactionKind::Debit => "Debit",
        }
    }
}

/// One line of the account ledger
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    pub date: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub reference: String,
}

/// A withdrawal counted against the daily limit
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WithdrawalRecord {
    pub date: DateTime<Utc>,
    pub amount: f64,
}

fn seed_transactions() -> Vec<Transaction> {
    vec![
        Transaction {
            date: "Oct 15, 2025".to_string(),
            description: "Quarterly Dividend - XOM".to_string(),
            kind: TransactionKind::Credit,
            amount: 425.50,
            reference: "DIV-2025-XOM-015".to_string(),
        },
        Transaction {
            date: "Oct 10, 2025".to_string(),
            description: "Bank Transfer".to_string(),
            kind: TransactionKind::Credit,
            amount: 5000.00,
            reference: "BT-2025-8473".to_string(),
        },
    ]
}

/// Transactions and today's withdrawals behind the token-gated surface.
///
/// The ledger itself does not check access; `Portal::withdraw` does that
/// before calling in.
pub struct WithdrawalLedger {
    durable: Rc<dyn KeyValueStore>,
    clock: Rc<dyn Clock>,
    limits: WithdrawalLimits,
    transactions: Vec<Transaction>,
    todays_withdrawals: Vec<WithdrawalRecord>,
}

impl WithdrawalLedger {
    pub fn load(
        durable: Rc<dyn KeyValueStore>,
        clock: Rc<dyn Clock>,
        limits: WithdrawalLimits,
    ) -> Self {
        let transactions =
            get_json(durable.as_ref(), TRANSACTIONS_KEY).unwrap_or_else(seed_transactions);
        let todays_withdrawals: Vec<WithdrawalRecord> =
            get_json(durable.as_ref(), TODAYS_WITHDRAWALS_KEY).unwrap_or_default();

        Self {
            durable,
            clock,
            limits,
            transactions,
            todays_withdrawals,
        }
    }

    pub fn save(&self) -> io::Result<()> {
        set_json(self.durable.as_ref(), TRANSACTIONS_KEY, &self.transactions)?;
        set_json(
            self.durable.as_ref(),
            TODAYS_WITHDRAWALS_KEY,
            &self.todays_withdrawals,
        )
    }

    // Ledger writes are best effort, like the rest of the portal state
    fn persist(&self, operation: &str) {
        if let Err(e) = self.save() {
            log_data_operation(
                operation,
                "session",
                TRANSACTIONS_KEY,
                false,
                Some(&e.to_string()),
            );
        }
    }

    /// Newest first
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn limits(&self) -> WithdrawalLimits {
        self.limits
    }

    /// Sum of withdrawals made on the current (UTC) day
    pub fn today_total(&self) -> f64 {
        let today = datetime_from_millis(self.clock.now_ms()).date_naive();
        self.todays_withdrawals
            .iter()
            .filter(|record| record.date.date_naive() == today)
            .map(|record| record.amount)
            .sum()
    }

    pub fn check_daily_limit(&self, amount: f64) -> Result<(), WithdrawalError> {
        if self.today_total() + amount > self.limits.daily {
            return Err(WithdrawalError::DailyLimitExceeded {
                limit: self.limits.daily,
            });
        }
        Ok(())
    }

    /// Add a debit for `amount` and count it against today's limit
    pub fn record_withdrawal(&mut self, amount: f64, method: &str) -> Transaction {
        let now = datetime_from_millis(self.clock.now_ms());
        let transaction = Transaction {
            date: format_transaction_date(now.timestamp_millis()),
            description: format!("Withdrawal - {}", method),
            kind: TransactionKind::Debit,
            amount: -amount,
            reference: generate_reference(now.year()),
        };

        self.transactions.insert(0, transaction.clone());
        self.todays_withdrawals.push(WithdrawalRecord { date: now, amount });
        self.persist("record_withdrawal");
        transaction
    }

    /// Remove the transaction at `index`. False when out of range.
    pub fn delete_transaction(&mut self, index: usize) -> bool {
        if index >= self.transactions.len() {
            return false;
        }
        self.transactions.remove(index);
        self.persist("delete_transaction");
        true
    }

    pub fn reset_daily_withdrawals(&mut self) {
        self.todays_withdrawals.clear();
        self.persist("reset_daily_withdrawals");
    }

    /// The ledger as CSV, amounts in dollars
    pub fn export_csv(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .transactions
            .iter()
            .map(|transaction| {
                vec![
                    transaction.date.clone(),
                    transaction.description.clone(),
                    transaction.kind.as_str().to_string(),
                    format_currency(transaction.amount),
                    transaction.reference.clone(),
                ]
            })
            .collect();
        generate_csv(&CSV_HEADERS, &rows)
    }
}

/// Reference like `WD-2025-0042`
fn generate_reference(year: i32) -> String {
    let number: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("WD-{}-{:04}", year, number)
}
