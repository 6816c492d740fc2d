//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Shared wallet and trading-profile registry. A single user can be touched by concurrent
// trades on different instruments, so every mutation happens under one write guard: the
// whole per-execution delta set (buyer debit, seller credit, both parties' trade stats)
// commits atomically or not at all.
//
// | Component     | Description                                                   |
// |---------------|---------------------------------------------------------------|
// | AccountStore  | RwLock-protected map of UserAccount records.                  |
// | AccountError  | Unknown account / insufficient balance failures.              |
//--------------------------------------------------------------------------------------------------

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::domain::models::account::UserAccount;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("account {0} not found")]
    UnknownAccount(Uuid),

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },
}

/// All user accounts, shared across instrument workers.
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: RwLock<HashMap<Uuid, UserAccount>>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account, replacing any previous record for the user.
    pub fn insert(&self, account: UserAccount) {
        self.accounts.write().insert(account.user_id, account);
    }

    pub fn exists(&self, user_id: Uuid) -> bool {
        self.accounts.read().contains_key(&user_id)
    }

    pub fn get(&self, user_id: Uuid) -> Option<UserAccount> {
        self.accounts.read().get(&user_id).cloned()
    }

    pub fn balance(&self, user_id: Uuid) -> Option<Decimal> {
        self.accounts.read().get(&user_id).map(|a| a.balance)
    }

    pub fn is_kyc_verified(&self, user_id: Uuid) -> Option<bool> {
        self.accounts.read().get(&user_id).map(|a| a.kyc_verified)
    }

    /// Credits `amount` to a wallet.
    pub fn credit(&self, user_id: Uuid, amount: Decimal) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write();
        let account = accounts
            .get_mut(&user_id)
            .ok_or(AccountError::UnknownAccount(user_id))?;
        account.balance += amount;
        Ok(())
    }

    /// Checks and debits `amount` under a single write guard.
    pub fn try_debit(&self, user_id: Uuid, amount: Decimal) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write();
        let account = accounts
            .get_mut(&user_id)
            .ok_or(AccountError::UnknownAccount(user_id))?;
        if account.balance < amount {
            return Err(AccountError::InsufficientBalance {
                required: amount,
                available: account.balance,
            });
        }
        account.balance -= amount;
        Ok(())
    }

    /// Applies the full wallet+stats delta set of one execution atomically:
    /// debit the buyer `buyer_amount`, credit the seller `seller_amount`,
    /// and update both parties' trade statistics for `value`. Either party
    /// may be absent (primary-pool leg). Nothing is written unless every
    /// check passes.
    pub fn settle_execution(
        &self,
        buyer: Option<Uuid>,
        seller: Option<Uuid>,
        buyer_amount: Decimal,
        seller_amount: Decimal,
        value: Decimal,
    ) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write();

        // Check phase: nothing has been written yet.
        if let Some(buyer_id) = buyer {
            let account = accounts
                .get(&buyer_id)
                .ok_or(AccountError::UnknownAccount(buyer_id))?;
            if account.balance < buyer_amount {
                warn!(
                    user = %buyer_id,
                    required = %buyer_amount,
                    available = %account.balance,
                    "execution abandoned: buyer cannot cover value plus fees"
                );
                return Err(AccountError::InsufficientBalance {
                    required: buyer_amount,
                    available: account.balance,
                });
            }
        }
        if let Some(seller_id) = seller {
            if !accounts.contains_key(&seller_id) {
                return Err(AccountError::UnknownAccount(seller_id));
            }
        }

        // Commit phase: both parties were verified above and the write guard
        // is still held, so every lookup succeeds.
        if let Some(account) = buyer.and_then(|id| accounts.get_mut(&id)) {
            account.balance -= buyer_amount;
            account.record_trade(value);
        }
        if let Some(account) = seller.and_then(|id| accounts.get_mut(&id)) {
            account.balance += seller_amount;
            account.record_trade(value);
        }
        Ok(())
    }
}
