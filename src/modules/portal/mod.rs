pub mod withdrawals;

use std::rc::Rc;

use crate::modules::auth::{
    AuthGate, Credential, ExpiryOutcome, Identity, SessionHooks, DEMO_CREDENTIALS,
};
use crate::modules::config::{PortalConfig, WithdrawalLimits};
use crate::modules::errors::{GateError, WithdrawalError};
use crate::modules::storage::Storage;
use crate::modules::tokens::{AccessToken, TokenGate, PROVISIONED_TOKENS};
use crate::modules::utils::clock::Clock;
use crate::modules::utils::logging::{log_auth_event, log_data_operation};

pub use withdrawals::{Transaction, TransactionKind, WithdrawalLedger, WithdrawalRecord};

pub const TOKEN_ACCESSED_KEY: &str = "tokenAccessed";

/// Everything the presentation layer talks to, wired over one storage context
pub struct Portal {
    storage: Storage,
    auth: AuthGate,
    tokens: TokenGate,
    ledger: WithdrawalLedger,
}

impl Portal {
    /// Portal with the demo account and the shipped token set
    pub fn new(storage: Storage, clock: Rc<dyn Clock>, config: &PortalConfig) -> Self {
        Self::with_provisioning(
            storage,
            clock,
            config,
            DEMO_CREDENTIALS.clone(),
            &PROVISIONED_TOKENS,
        )
    }

    pub fn with_provisioning(
        storage: Storage,
        clock: Rc<dyn Clock>,
        config: &PortalConfig,
        credentials: Vec<Credential>,
        tokens: &[AccessToken],
    ) -> Self {
        let auth = AuthGate::new(
            storage.clone(),
            Rc::clone(&clock),
            credentials,
            config.session_timeout_ms(),
        );
        let tokens = TokenGate::new(storage.clone(), Rc::clone(&clock), tokens);
        let ledger = WithdrawalLedger::load(
            Rc::clone(&storage.durable),
            clock,
            config.withdrawal_limits,
        );

        Self {
            storage,
            auth,
            tokens,
            ledger,
        }
    }

    pub fn with_hooks(mut self, hooks: Box<dyn SessionHooks>) -> Self {
        self.auth = self.auth.with_hooks(hooks);
        self
    }

    pub fn auth(&mut self) -> &mut AuthGate {
        &mut self.auth
    }

    pub fn ledger(&self) -> &WithdrawalLedger {
        &self.ledger
    }

    // Session

    pub fn restore(&mut self) -> bool {
        self.auth.restore()
    }

    pub fn authenticate(&mut self, username: &str, password: &str) -> Result<Identity, GateError> {
        self.auth.authenticate(username, password)
    }

    pub fn deauthenticate(&mut self) {
        self.auth.deauthenticate();
        self.tokens.deactivate();
    }

    pub fn is_session_valid(&self) -> bool {
        self.auth.is_session_valid()
    }

    pub fn check_session(&mut self) -> bool {
        self.auth.check_session()
    }

    pub fn current_identity(&mut self) -> Option<Identity> {
        self.auth.current_identity()
    }

    pub fn adjust_balance(&mut self, delta: f64) -> Option<f64> {
        self.auth.adjust_balance(delta)
    }

    pub fn balance(&mut self) -> f64 {
        self.auth.balance()
    }

    pub fn refresh_activity(&mut self) -> bool {
        self.auth.refresh_activity()
    }

    pub fn run_due_timers(&mut self) -> Vec<ExpiryOutcome> {
        self.auth.run_due_timers()
    }

    // Tokens

    pub fn verify_token(&mut self, raw: &str) -> bool {
        self.tokens.verify_token(&mut self.auth, raw)
    }

    pub fn verify_token_detailed(&mut self, raw: &str) -> Result<AccessToken, GateError> {
        self.tokens.verify_token_detailed(&mut self.auth, raw)
    }

    pub fn has_valid_access(&mut self) -> bool {
        self.tokens.has_valid_access(&mut self.auth)
    }

    pub fn access_check(&mut self) -> Result<(), GateError> {
        self.tokens.access_check(&mut self.auth)
    }

    pub fn activate(&self) {
        self.tokens.activate();
    }

    pub fn deactivate(&self) {
        self.tokens.deactivate();
    }

    pub fn list_available(&self) -> Vec<AccessToken> {
        self.tokens.list_available()
    }

    pub fn list_consumed(&self) -> Vec<AccessToken> {
        self.tokens.list_consumed()
    }

    /// Administrative reset, see `TokenGate::reset_all`
    pub fn reset_all(&mut self) {
        self.tokens.reset_all();
    }

    // Withdrawals

    /// Enter the withdrawal surface. Requires token access.
    pub fn open_withdrawals(&mut self) -> bool {
        if !self.has_valid_access() {
            return false;
        }
        if let Err(e) = self.storage.session.set(TOKEN_ACCESSED_KEY, "true") {
            log_data_operation(
                "open_withdrawals",
                "session",
                TOKEN_ACCESSED_KEY,
                false,
                Some(&e.to_string()),
            );
        }
        true
    }

    /// Debit the balance and record the withdrawal
    pub fn withdraw(&mut self, amount: f64, method: &str) -> Result<Transaction, WithdrawalError> {
        if !self.has_valid_access() {
            return Err(WithdrawalError::AccessDenied);
        }
        let identity = self
            .auth
            .current_identity()
            .ok_or(WithdrawalError::NoIdentity)?;

        // Also rejects NaN
        if !(amount > 0.0 && amount <= identity.balance) {
            return Err(WithdrawalError::InvalidAmount(amount));
        }
        self.ledger.check_daily_limit(amount)?;

        let new_balance = self
            .auth
            .adjust_balance(-amount)
            .ok_or(WithdrawalError::NoIdentity)?;
        let transaction = self.ledger.record_withdrawal(amount, method);

        log_auth_event(
            "withdraw",
            &identity.username,
            true,
            Some(&format!("New balance {:.2}", new_balance)),
        );
        Ok(transaction)
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.ledger.transactions()
    }

    pub fn delete_transaction(&mut self, index: usize) -> bool {
        self.ledger.delete_transaction(index)
    }

    pub fn today_withdrawal_total(&self) -> f64 {
        self.ledger.today_total()
    }

    pub fn withdrawal_limits(&self) -> WithdrawalLimits {
        self.ledger.limits()
    }

    pub fn reset_daily_withdrawals(&mut self) {
        self.ledger.reset_daily_withdrawals();
    }

    pub fn export_transactions_csv(&self) -> String {
        self.ledger.export_csv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::auth::gate::tests::{RecordingHooks, START, TIMEOUT};
    use crate::modules::auth::gate::SESSION_EXPIRED_MESSAGE;
    use crate::modules::utils::clock::ManualClock;

    fn test_config() -> PortalConfig {
        PortalConfig {
            session_timeout_secs: (TIMEOUT / 1000) as u64,
            ..PortalConfig::default()
        }
    }

    fn setup_portal() -> (Portal, Rc<ManualClock>, Storage) {
        let clock = Rc::new(ManualClock::new(START));
        let storage = Storage::in_memory();
        let portal = Portal::with_provisioning(
            storage.clone(),
            clock.clone(),
            &test_config(),
            vec![Credential::new(
                "alice",
                "wonderland",
                "alice@example.com",
                "Alice",
                20_000.0,
            )],
            &[AccessToken::new("T1")],
        );
        (portal, clock, storage)
    }

    fn unlocked_portal() -> (Portal, Rc<ManualClock>, Storage) {
        let (mut portal, clock, storage) = setup_portal();
        portal.authenticate("alice", "wonderland").unwrap();
        assert!(portal.verify_token("T1"));
        portal.activate();
        (portal, clock, storage)
    }

    #[test]
    fn test_demo_portal_login() {
        let clock = Rc::new(ManualClock::new(START));
        let mut portal = Portal::new(Storage::in_memory(), clock, &PortalConfig::default());

        let identity = portal.authenticate("MaryJane", "Godisgood").unwrap();
        assert_eq!(identity.full_name, "Mary Jane");
        assert_eq!(portal.balance(), 42_300_000.0);
        assert_eq!(portal.list_available().len(), 5);
        assert!(portal.verify_token("irsinh2026478192"));
    }

    #[test]
    fn test_full_scenario() {
        let (mut portal, _clock, _storage) = setup_portal();
        assert!(!portal.has_valid_access());

        portal.authenticate("alice", "wonderland").unwrap();
        assert!(portal.is_session_valid());
        assert!(portal.verify_token("  t1  "));
        assert_eq!(
            portal.list_consumed()[0].issued_to.as_deref(),
            Some("alice")
        );

        portal.activate();
        assert!(portal.has_valid_access());

        portal.deauthenticate();
        assert!(!portal.has_valid_access());
        assert!(portal.current_identity().is_none());
    }

    #[test]
    fn test_reset_then_reverify() {
        let (mut portal, _clock, _storage) = unlocked_portal();
        assert!(!portal.verify_token("T1"));

        portal.reset_all();
        let available = portal.list_available();
        let token = &available[0];
        assert!(!token.used);
        assert!(token.issued_to.is_none());
        assert!(token.used_at.is_none());
        assert!(!portal.has_valid_access());

        assert!(portal.verify_token("T1"));
    }

    #[test]
    fn test_withdraw_requires_token_access() {
        let (mut portal, _clock, _storage) = setup_portal();
        portal.authenticate("alice", "wonderland").unwrap();

        assert_eq!(
            portal.withdraw(100.0, "ACH").unwrap_err(),
            WithdrawalError::AccessDenied
        );
        assert!(!portal.open_withdrawals());
        assert_eq!(portal.balance(), 20_000.0);
    }

    #[test]
    fn test_withdraw_debits_balance() {
        let (mut portal, _clock, storage) = unlocked_portal();
        assert!(portal.open_withdrawals());
        assert_eq!(storage.session.get(TOKEN_ACCESSED_KEY).as_deref(), Some("true"));

        let transaction = portal.withdraw(2_500.0, "Wire Transfer").unwrap();
        assert_eq!(transaction.amount, -2_500.0);
        assert_eq!(portal.balance(), 17_500.0);
        assert_eq!(portal.today_withdrawal_total(), 2_500.0);
        assert_eq!(portal.transactions()[0], transaction);
    }

    #[test]
    fn test_withdraw_rejects_bad_amounts() {
        let (mut portal, _clock, _storage) = unlocked_portal();

        assert_eq!(
            portal.withdraw(0.0, "ACH").unwrap_err(),
            WithdrawalError::InvalidAmount(0.0)
        );
        assert_eq!(
            portal.withdraw(-5.0, "ACH").unwrap_err(),
            WithdrawalError::InvalidAmount(-5.0)
        );
        assert_eq!(
            portal.withdraw(25_000.0, "ACH").unwrap_err(),
            WithdrawalError::InvalidAmount(25_000.0)
        );
        assert!(portal.withdraw(f64::NAN, "ACH").is_err());
        assert_eq!(portal.balance(), 20_000.0);
    }

    #[test]
    fn test_withdraw_enforces_daily_limit() {
        let (mut portal, _clock, _storage) = unlocked_portal();
        portal.withdraw(8_000.0, "ACH").unwrap();

        assert_eq!(
            portal.withdraw(2_000.01, "ACH").unwrap_err(),
            WithdrawalError::DailyLimitExceeded { limit: 10_000.0 }
        );
        assert_eq!(portal.balance(), 12_000.0);

        portal.reset_daily_withdrawals();
        assert!(portal.withdraw(2_000.01, "ACH").is_ok());
    }

    #[test]
    fn test_expiry_locks_withdrawals() {
        let (portal, clock, _storage) = unlocked_portal();
        let hooks = RecordingHooks::default();
        let mut portal = portal.with_hooks(Box::new(hooks.clone()));

        clock.advance(TIMEOUT);
        assert_eq!(portal.run_due_timers(), vec![ExpiryOutcome::Expired]);
        assert!(!portal.has_valid_access());
        assert_eq!(
            portal.withdraw(10.0, "ACH").unwrap_err(),
            WithdrawalError::AccessDenied
        );
        assert_eq!(
            hooks.events.borrow()[0],
            format!("notify:{}", SESSION_EXPIRED_MESSAGE)
        );
    }

    #[test]
    fn test_activity_keeps_session_alive() {
        let (mut portal, clock, _storage) = unlocked_portal();
        for _ in 0..4 {
            clock.advance(TIMEOUT / 2);
            let outcomes = portal.run_due_timers();
            assert!(!outcomes.contains(&ExpiryOutcome::Expired));
            assert!(portal.refresh_activity());
        }
        assert!(portal.check_session());
        assert!(portal.has_valid_access());
    }

    #[test]
    fn test_delete_transaction() {
        let (mut portal, _clock, _storage) = setup_portal();
        assert_eq!(portal.transactions().len(), 2);
        assert!(portal.delete_transaction(1));
        assert!(!portal.delete_transaction(1));
        assert_eq!(portal.transactions().len(), 1);
        assert!(portal.export_transactions_csv().contains("DIV-2025-XOM-015"));
    }
}
