use serde::{Deserialize, Serialize};

use crate::application::TransactionResult;
use crate::domain::{format_cents, parse_cents, Account, Cents, ParseCentsError, Transaction};

/// A money amount as it arrives on the wire: `"12.50"` or `12.5`.
///
/// Numbers are converted through their decimal text form, never through
/// float arithmetic, so `0.1` is exactly 10 cents.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(serde_json::Number),
}

impl AmountInput {
    pub fn to_cents(&self) -> Result<Cents, ParseCentsError> {
        match self {
            AmountInput::Text(s) => parse_cents(s),
            AmountInput::Number(n) => parse_cents(&n.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub balance: Option<AmountInput>,
}

/// Body of both credit and debit requests.
#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    pub username: String,
    pub amount: AmountInput,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BaseResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BaseResponse {
    pub fn success() -> Self {
        Self {
            status: "success",
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    #[serde(flatten)]
    pub base: BaseResponse,
    pub user_id: i64,
    pub username: String,
    pub balance: String,
}

impl From<Account> for CreateUserResponse {
    fn from(account: Account) -> Self {
        Self {
            base: BaseResponse::success(),
            user_id: account.id,
            username: account.username,
            balance: format_cents(account.balance),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GetBalanceResponse {
    pub balance: String,
}

#[derive(Debug, Serialize)]
pub struct DepositResponse {
    #[serde(flatten)]
    pub base: BaseResponse,
    pub transaction_id: i64,
    pub new_balance: String,
}

impl From<TransactionResult> for DepositResponse {
    fn from(result: TransactionResult) -> Self {
        Self {
            base: BaseResponse::success(),
            transaction_id: result.transaction.id,
            new_balance: format_cents(result.new_balance),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WithdrawResponse {
    #[serde(flatten)]
    pub base: BaseResponse,
    pub user_id: i64,
    pub transaction_id: i64,
    pub new_balance: String,
}

impl From<TransactionResult> for WithdrawResponse {
    fn from(result: TransactionResult) -> Self {
        Self {
            base: BaseResponse::success(),
            user_id: result.transaction.account_id,
            transaction_id: result.transaction.id,
            new_balance: format_cents(result.new_balance),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: i64,
    pub kind: &'static str,
    pub amount: String,
    pub created_at: String,
}

impl From<Transaction> for TransactionView {
    fn from(trx: Transaction) -> Self {
        Self {
            id: trx.id,
            kind: trx.kind.as_str(),
            amount: format_cents(trx.amount),
            created_at: trx.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub username: String,
    pub items: Vec<TransactionView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(json: &str) -> Result<Cents, ParseCentsError> {
        serde_json::from_str::<AmountInput>(json).unwrap().to_cents()
    }

    #[test]
    fn test_amount_accepts_strings_and_numbers() {
        assert_eq!(amount("\"12.50\""), Ok(1250));
        assert_eq!(amount("1200"), Ok(120000));
        assert_eq!(amount("0.1"), Ok(10));
        assert_eq!(amount("1200.5"), Ok(120050));
    }

    #[test]
    fn test_amount_rejects_sub_cent_numbers() {
        assert_eq!(amount("0.001"), Err(ParseCentsError::TooPrecise));
    }

    #[test]
    fn test_error_response_shape() {
        let json = serde_json::to_value(BaseResponse::error("nope")).unwrap();
        assert_eq!(json, serde_json::json!({"status": "error", "message": "nope"}));

        let json = serde_json::to_value(BaseResponse::success()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "success"}));
    }
}
