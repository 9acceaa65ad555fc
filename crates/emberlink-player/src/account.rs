//! Identity lookup used by the login flow.

use std::collections::HashMap;

/// Resolves an account name to the player's display name.
///
/// Returning `None` means the account is not recognized and the login is
/// rejected. Implementations might query a database or an auth service;
/// [`StaticAccounts`] keeps a fixed table in memory.
pub trait AccountDirectory: Send + Sync + 'static {
    fn lookup(&self, account: &str) -> impl Future<Output = Option<String>> + Send;
}

/// An in-memory account table.
#[derive(Debug, Clone, Default)]
pub struct StaticAccounts {
    accounts: HashMap<String, String>,
}

impl StaticAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single account known to the demo deployment.
    pub fn reference() -> Self {
        Self::new().with("overing", "Overing")
    }

    /// Adds (or replaces) an account.
    pub fn with(mut self, account: impl Into<String>, name: impl Into<String>) -> Self {
        self.accounts.insert(account.into(), name.into());
        self
    }
}

impl AccountDirectory for StaticAccounts {
    async fn lookup(&self, account: &str) -> Option<String> {
        self.accounts.get(account).cloned()
    }
}
