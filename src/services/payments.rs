//! Partner room-quota payments. Processing is simulated: after a fixed
//! delay the payment is marked successful and credited to the partner.

use std::time::Duration;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Account, AccountKind, Payment, PaymentStatus};
use crate::state::AppState;

const VALIDITY_DAYS: i64 = 365;

/// Largest amount a single payment may carry.
pub const MAX_PAYMENT_AMOUNT: i64 = 1_000_000_000_000;

/// Largest room quota a single payment may buy.
pub const MAX_ROOMS_PER_PAYMENT: i64 = 10_000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub partner_id: Option<String>,
    pub amount: Option<i64>,
    pub rooms_allowed: Option<i64>,
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessedPayment {
    pub payment: Payment,
    pub partner: Account,
}

fn transaction_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!(
        "TXN_{}_{}",
        Utc::now().timestamp_millis(),
        suffix.to_lowercase()
    )
}

pub fn create_payment(conn: &Connection, new: &NewPayment) -> Result<Payment, AppError> {
    let partner_id = new
        .partner_id
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or(AppError::MissingField("partnerId"))?;
    let amount = new.amount.ok_or(AppError::MissingField("amount"))?;
    let rooms_allowed = new.rooms_allowed.ok_or(AppError::MissingField("roomsAllowed"))?;
    let method = new
        .method
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or(AppError::MissingField("method"))?;

    if amount <= 0 || rooms_allowed <= 0 {
        return Err(AppError::Validation(
            "amount and roomsAllowed must be positive".to_string(),
        ));
    }
    if amount > MAX_PAYMENT_AMOUNT || rooms_allowed > MAX_ROOMS_PER_PAYMENT {
        return Err(AppError::Validation(format!(
            "amount may not exceed {MAX_PAYMENT_AMOUNT} and roomsAllowed may not exceed {MAX_ROOMS_PER_PAYMENT}"
        )));
    }

    if queries::find_account_by_id(conn, AccountKind::Partner, partner_id)?.is_none() {
        return Err(AppError::AccountNotFound);
    }

    let now = Utc::now().naive_utc();
    let payment = Payment {
        payment_id: uuid::Uuid::new_v4().to_string(),
        partner_id: partner_id.to_string(),
        amount,
        rooms_allowed,
        method: method.to_string(),
        status: PaymentStatus::Pending,
        transaction_id: transaction_id(),
        valid_from: now,
        valid_until: now + chrono::Duration::days(VALIDITY_DAYS),
        created_at: now,
        updated_at: now,
    };

    queries::insert_payment(conn, &payment)?;
    tracing::info!(
        payment_id = %payment.payment_id,
        %partner_id,
        amount,
        rooms_allowed,
        "payment created"
    );

    get_payment(conn, &payment.payment_id)
}

pub fn get_payment(conn: &Connection, payment_id: &str) -> Result<Payment, AppError> {
    queries::get_payment(conn, payment_id)?.ok_or_else(|| AppError::NotFound("payment".to_string()))
}

pub fn payment_history(conn: &Connection, partner_id: &str) -> Result<Vec<Payment>, AppError> {
    if partner_id.trim().is_empty() {
        return Err(AppError::MissingField("partnerId"));
    }
    Ok(queries::payments_for_partner(conn, partner_id)?)
}

/// Loads a payment that is still eligible for processing.
pub fn pending_payment(conn: &Connection, payment_id: &str) -> Result<Payment, AppError> {
    if payment_id.trim().is_empty() {
        return Err(AppError::MissingField("paymentId"));
    }
    let payment = get_payment(conn, payment_id)?;
    if payment.status == PaymentStatus::Success {
        return Err(AppError::Validation("payment already processed".to_string()));
    }
    Ok(payment)
}

/// Marks the payment successful and credits the partner in one transaction.
pub fn complete_payment(conn: &mut Connection, payment_id: &str) -> Result<ProcessedPayment, AppError> {
    let tx = conn.transaction()?;

    let payment = queries::get_payment(&tx, payment_id)?
        .ok_or_else(|| AppError::NotFound("payment".to_string()))?;
    let partner = queries::find_account_by_id(&tx, AccountKind::Partner, &payment.partner_id)?
        .and_then(|account| account.partner)
        .ok_or(AppError::AccountNotFound)?;
    let credited = partner
        .paid_amount
        .checked_add(payment.amount)
        .zip(partner.max_rooms.checked_add(payment.rooms_allowed));
    if credited.is_none() {
        return Err(AppError::Validation(
            "payment would overflow the partner's totals".to_string(),
        ));
    }

    if !queries::transition_payment(&tx, payment_id, PaymentStatus::Success)? {
        return Err(AppError::Validation("payment already processed".to_string()));
    }
    if !queries::credit_partner(&tx, &payment.partner_id, payment.amount, payment.rooms_allowed)? {
        return Err(AppError::AccountNotFound);
    }

    tx.commit()?;

    let payment = get_payment(conn, payment_id)?;
    let partner = queries::find_account_by_id(conn, AccountKind::Partner, &payment.partner_id)?
        .ok_or(AppError::AccountNotFound)?;

    tracing::info!(
        %payment_id,
        partner_id = %partner.account_id,
        "payment processed"
    );
    Ok(ProcessedPayment { payment, partner })
}

/// Validates, waits out the simulated gateway delay without holding the
/// store, then completes the payment.
pub async fn process_payment(state: &AppState, payment_id: &str) -> Result<ProcessedPayment, AppError> {
    {
        let db = state.db()?;
        pending_payment(&db, payment_id)?;
    }

    let delay = Duration::from_millis(state.config.payment_processing_delay_ms);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut db = state.db()?;
    complete_payment(&mut db, payment_id)
}
