use anyhow::Context;
use tracing::{info, warn};

use crate::domain::{Account, Cents, Transaction, TransactionKind};
use crate::storage::{PoolSettings, Repository, UnitOfWork};

use super::AppError;

/// The ledger core: account lookups and atomic, invariant-preserving
/// balance mutations.
///
/// Holds no mutable state of its own; every mutation is a single unit of
/// work against the store, so one instance can be shared across tasks.
#[derive(Clone)]
pub struct AccountService {
    repo: Repository,
}

/// Result of a credit or debit
#[derive(Debug, Clone)]
pub struct TransactionResult {
    pub transaction: Transaction,
    /// Balance reported by the store after the update, in the same unit of work
    pub new_balance: Cents,
}

impl AccountService {
    /// Create a new service over the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Open (creating if needed) and migrate a database file.
    pub async fn init(database_path: &str, settings: &PoolSettings) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::init(&db_url, settings).await?;
        Ok(Self::new(repo))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    // ========================
    // Accounts
    // ========================

    /// Create an account with an opening balance.
    pub async fn create_account(
        &self,
        initial_balance: Cents,
        username: &str,
    ) -> Result<Account, AppError> {
        if initial_balance < 0 {
            return Err(AppError::InvalidAmount(
                "Initial balance cannot be negative".to_string(),
            ));
        }

        let mut uow = self.repo.begin().await?;
        let Some(account) = Repository::insert_account(&mut uow, username, initial_balance).await?
        else {
            rollback(uow).await?;
            return Err(AppError::AccountAlreadyExists(username.to_string()));
        };
        commit(uow).await?;

        info!(account_id = account.id, username, initial_balance, "account created");
        Ok(account)
    }

    /// Look up an account by username. Read-only, runs outside any unit of work.
    pub async fn get_account(&self, username: &str) -> Result<Account, AppError> {
        self.repo
            .get_account_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(username.to_string()))
    }

    /// List an account's transactions, newest first.
    pub async fn list_transactions(
        &self,
        account: &Account,
        limit: Option<i64>,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repo.list_transactions(account.id, limit).await?)
    }

    // ========================
    // Balance mutations
    // ========================

    /// Credit `amount` to the account and record a credit transaction.
    /// Both writes commit together or not at all.
    pub async fn add_balance(
        &self,
        account: &Account,
        amount: Cents,
    ) -> Result<TransactionResult, AppError> {
        validate_amount(amount)?;

        let mut uow = self.repo.begin().await?;
        let Some(new_balance) = Repository::apply_credit(&mut uow, account.id, amount).await?
        else {
            let exists = Repository::current_balance(&mut uow, account.id)
                .await?
                .is_some();
            rollback(uow).await?;
            return Err(if exists {
                AppError::InvalidAmount("Balance would overflow".to_string())
            } else {
                AppError::NotFound(account.username.clone())
            });
        };
        let transaction = match Repository::insert_transaction(
            &mut uow,
            account.id,
            amount,
            TransactionKind::Credit,
        )
        .await
        {
            Ok(transaction) => transaction,
            Err(e) => {
                rollback(uow).await?;
                return Err(e.into());
            }
        };
        commit(uow).await?;

        info!(
            account_id = account.id,
            transaction_id = transaction.id,
            amount,
            new_balance,
            "balance credited"
        );
        Ok(TransactionResult {
            transaction,
            new_balance,
        })
    }

    /// Debit `amount` from the account and record a debit transaction.
    ///
    /// Sufficiency is decided by the store in the same statement that
    /// applies the debit, so `account.balance` is only used for reporting.
    pub async fn deduct_balance(
        &self,
        account: &Account,
        amount: Cents,
    ) -> Result<TransactionResult, AppError> {
        validate_amount(amount)?;

        // Fast rejection on the snapshot; the store re-checks regardless.
        if !account.can_cover(amount) {
            warn!(account_id = account.id, balance = account.balance, amount, "debit rejected");
            return Err(AppError::InsufficientFunds {
                username: account.username.clone(),
                balance: account.balance,
                required: amount,
            });
        }

        let mut uow = self.repo.begin().await?;
        let Some(new_balance) = Repository::apply_debit(&mut uow, account.id, amount).await? else {
            let balance = Repository::current_balance(&mut uow, account.id).await?;
            rollback(uow).await?;
            return Err(match balance {
                Some(balance) => {
                    warn!(account_id = account.id, balance, amount, "debit rejected by store");
                    AppError::InsufficientFunds {
                        username: account.username.clone(),
                        balance,
                        required: amount,
                    }
                }
                None => AppError::NotFound(account.username.clone()),
            });
        };
        let transaction = match Repository::insert_transaction(
            &mut uow,
            account.id,
            amount,
            TransactionKind::Debit,
        )
        .await
        {
            Ok(transaction) => transaction,
            Err(e) => {
                rollback(uow).await?;
                return Err(e.into());
            }
        };
        commit(uow).await?;

        info!(
            account_id = account.id,
            transaction_id = transaction.id,
            amount,
            new_balance,
            "balance debited"
        );
        Ok(TransactionResult {
            transaction,
            new_balance,
        })
    }

    /// Look up `username` and credit it.
    pub async fn credit(
        &self,
        username: &str,
        amount: Cents,
    ) -> Result<(Account, TransactionResult), AppError> {
        let account = self.get_account(username).await?;
        let result = self.add_balance(&account, amount).await?;
        Ok((account, result))
    }

    /// Look up `username` and debit it.
    pub async fn debit(
        &self,
        username: &str,
        amount: Cents,
    ) -> Result<(Account, TransactionResult), AppError> {
        let account = self.get_account(username).await?;
        let result = self.deduct_balance(&account, amount).await?;
        Ok((account, result))
    }
}

fn validate_amount(amount: Cents) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}

async fn commit(uow: UnitOfWork) -> Result<(), AppError> {
    uow.commit().await.context("Failed to commit transaction")?;
    Ok(())
}

async fn rollback(uow: UnitOfWork) -> Result<(), AppError> {
    uow.rollback()
        .await
        .context("Failed to roll back transaction")?;
    Ok(())
}
