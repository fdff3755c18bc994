use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::application::AccountService;
use crate::domain::{format_cents, Cents};

use super::dto::{
    AmountInput, CreateUserRequest, CreateUserResponse, DepositResponse, GetBalanceResponse,
    HistoryQuery, HistoryResponse, TransactionRequest, TransactionView, WithdrawResponse,
};
use super::errors::{app_error_to_response, json_error};

pub async fn health() -> Response {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
}

pub async fn create_user(
    State(service): State<AccountService>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return json_error(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    if let Err(resp) = require_username(&body.username) {
        return resp;
    }
    let balance = match body.balance.as_ref().map(parse_amount).transpose() {
        Ok(balance) => balance.unwrap_or(0),
        Err(resp) => return resp,
    };

    match service.create_account(balance, &body.username).await {
        Ok(account) => (StatusCode::CREATED, Json(CreateUserResponse::from(account))).into_response(),
        Err(e) => app_error_to_response(e),
    }
}

pub async fn get_balance(
    State(service): State<AccountService>,
    Path(username): Path<String>,
) -> Response {
    match service.get_account(&username).await {
        Ok(account) => Json(GetBalanceResponse {
            balance: format_cents(account.balance),
        })
        .into_response(),
        Err(e) => app_error_to_response(e),
    }
}

pub async fn list_transactions(
    State(service): State<AccountService>,
    Path(username): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return json_error(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let account = match service.get_account(&username).await {
        Ok(account) => account,
        Err(e) => return app_error_to_response(e),
    };
    match service.list_transactions(&account, query.limit).await {
        Ok(items) => Json(HistoryResponse {
            username: account.username,
            items: items.into_iter().map(TransactionView::from).collect(),
        })
        .into_response(),
        Err(e) => app_error_to_response(e),
    }
}

pub async fn deposit(
    State(service): State<AccountService>,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> Response {
    let (username, amount) = match transaction_request(body) {
        Ok(parsed) => parsed,
        Err(resp) => return resp,
    };

    match service.credit(&username, amount).await {
        Ok((_, result)) => Json(DepositResponse::from(result)).into_response(),
        Err(e) => app_error_to_response(e),
    }
}

pub async fn withdraw(
    State(service): State<AccountService>,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> Response {
    let (username, amount) = match transaction_request(body) {
        Ok(parsed) => parsed,
        Err(resp) => return resp,
    };

    match service.debit(&username, amount).await {
        Ok((_, result)) => Json(WithdrawResponse::from(result)).into_response(),
        Err(e) => app_error_to_response(e),
    }
}

fn transaction_request(
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<(String, Cents), Response> {
    let Json(body) = body.map_err(|r| json_error(StatusCode::BAD_REQUEST, r.body_text()))?;
    require_username(&body.username)?;
    let amount = parse_amount(&body.amount)?;
    if amount <= 0 {
        return Err(json_error(StatusCode::BAD_REQUEST, "amount must be positive"));
    }
    Ok((body.username, amount))
}

fn require_username(username: &str) -> Result<(), Response> {
    if username.trim().is_empty() {
        return Err(json_error(StatusCode::BAD_REQUEST, "username is required"));
    }
    Ok(())
}

fn parse_amount(input: &AmountInput) -> Result<Cents, Response> {
    input
        .to_cents()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, format!("invalid amount: {e}")))
}
