use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{authenticate_as, ensure_same_partner};
use crate::errors::AppError;
use crate::models::AccountKind;
use crate::services::payments::{self, NewPayment};
use crate::state::AppState;

// POST /payments/create
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut body): Json<NewPayment>,
) -> Result<Json<Value>, AppError> {
    let claims = authenticate_as(&headers, &state, AccountKind::Partner)?;
    let partner_id = body.partner_id.get_or_insert_with(|| claims.sub.clone());
    ensure_same_partner(&claims, partner_id)?;

    let payment = {
        let db = state.db()?;
        payments::create_payment(&db, &body)?
    };
    Ok(Json(json!({ "success": true, "payment": payment })))
}

// POST /payments/process
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    pub payment_id: Option<String>,
}

pub async fn process_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ProcessPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let claims = authenticate_as(&headers, &state, AccountKind::Partner)?;
    let payment_id = body
        .payment_id
        .filter(|p| !p.trim().is_empty())
        .ok_or(AppError::MissingField("paymentId"))?;

    {
        let db = state.db()?;
        let payment = payments::get_payment(&db, &payment_id)?;
        ensure_same_partner(&claims, &payment.partner_id)?;
    }

    let processed = payments::process_payment(&state, &payment_id).await?;
    Ok(Json(json!({
        "success": true,
        "payment": processed.payment,
        "partner": processed.partner,
        "message": "Payment processed successfully",
    })))
}

// GET /payments/history/:partner_id
pub async fn payment_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(partner_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let claims = authenticate_as(&headers, &state, AccountKind::Partner)?;
    ensure_same_partner(&claims, &partner_id)?;

    let payments = {
        let db = state.db()?;
        payments::payment_history(&db, &partner_id)?
    };
    Ok(Json(json!({ "success": true, "payments": payments })))
}

// GET /payments/:payment_id
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(payment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let claims = authenticate_as(&headers, &state, AccountKind::Partner)?;
    let payment = {
        let db = state.db()?;
        payments::get_payment(&db, &payment_id)?
    };
    ensure_same_partner(&claims, &payment.partner_id)?;
    Ok(Json(json!({ "success": true, "payment": payment })))
}
