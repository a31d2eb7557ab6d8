use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Review};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub rental_id: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub rental_id: Option<String>,
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

/// Books a rental for `user_id`. The total is the nightly price times the
/// number of nights.
pub fn create_booking(conn: &Connection, user_id: &str, new: &NewBooking) -> Result<Booking, AppError> {
    let rental_id = new
        .rental_id
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or(AppError::MissingField("rentalId"))?;
    let check_in = new.check_in.ok_or(AppError::MissingField("checkIn"))?;
    let check_out = new.check_out.ok_or(AppError::MissingField("checkOut"))?;

    let rental = queries::get_rental(conn, rental_id)?
        .ok_or_else(|| AppError::NotFound("rental".to_string()))?;

    let now = Utc::now().naive_utc();
    let mut booking = Booking {
        booking_id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        rental_id: rental.rental_id,
        check_in,
        check_out,
        total_amount: 0.0,
        status: BookingStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    let nights = booking.nights();
    if nights <= 0 {
        return Err(AppError::Validation(
            "checkOut must be after checkIn".to_string(),
        ));
    }
    booking.total_amount = rental.price * nights as f64;

    queries::insert_booking(conn, &booking)?;
    tracing::info!(booking_id = %booking.booking_id, %user_id, nights, "booking created");
    Ok(booking)
}

/// Cancels a booking owned by `user_id`.
pub fn cancel_booking(conn: &Connection, user_id: &str, booking_id: &str) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .filter(|b| b.user_id == user_id)
        .ok_or_else(|| AppError::NotFound("booking".to_string()))?;

    if booking.status != BookingStatus::Cancelled {
        queries::update_booking_status(conn, booking_id, &BookingStatus::Cancelled)?;
        tracing::info!(%booking_id, %user_id, "booking cancelled");
    }

    queries::get_booking(conn, booking_id)?.ok_or_else(|| AppError::NotFound("booking".to_string()))
}

pub fn create_review(conn: &Connection, user_id: &str, new: &NewReview) -> Result<Review, AppError> {
    let rental_id = new
        .rental_id
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or(AppError::MissingField("rentalId"))?;
    let rating = new.rating.ok_or(AppError::MissingField("rating"))?;
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    if queries::get_rental(conn, rental_id)?.is_none() {
        return Err(AppError::NotFound("rental".to_string()));
    }

    let review = Review {
        review_id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        rental_id: rental_id.to_string(),
        rating,
        comment: new.comment.clone().filter(|c| !c.trim().is_empty()),
        created_at: Utc::now().naive_utc(),
    };

    queries::insert_review(conn, &review)?;
    tracing::info!(review_id = %review.review_id, %rental_id, rating, "review created");
    Ok(review)
}

pub fn reviews_for_rental(conn: &Connection, rental_id: &str) -> Result<Vec<Review>, AppError> {
    if queries::get_rental(conn, rental_id)?.is_none() {
        return Err(AppError::NotFound("rental".to_string()));
    }
    Ok(queries::reviews_for_rental(conn, rental_id)?)
}
