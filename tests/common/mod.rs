// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use saldo::application::AccountService;
use saldo::storage::PoolSettings;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(AccountService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = AccountService::init(db_path.to_str().unwrap(), &PoolSettings::default()).await?;
    Ok((service, temp_dir))
}

/// Whole units to cents, for readable fixtures.
pub fn units(n: i64) -> i64 {
    n * 100
}
