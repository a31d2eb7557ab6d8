use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use crate::models::{
    Account, AccountKind, Booking, BookingStatus, PartnerDetails, Payment, PaymentStatus, Rental,
    Review, DATE_FORMAT, TIMESTAMP_FORMAT,
};

pub fn now_timestamp() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ── Accounts ──

const ACCOUNT_COLUMNS: &str = "id, kind, external_id, email, username, avatar_url, phone, \
     business_name, is_verified, subscription_status, paid_amount, max_rooms, created_at, updated_at";

/// Lookup keys the resolver may search by. Column names never come from
/// request input.
#[derive(Clone, Copy)]
enum AccountKey {
    Id,
    ExternalId,
    Email,
    Username,
}

impl AccountKey {
    fn column(&self) -> &'static str {
        match self {
            AccountKey::Id => "id",
            AccountKey::ExternalId => "external_id",
            AccountKey::Email => "email",
            AccountKey::Username => "username",
        }
    }
}

fn find_account(
    conn: &Connection,
    kind: AccountKind,
    key: AccountKey,
    value: &str,
) -> rusqlite::Result<Option<Account>> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE kind = ?1 AND {} = ?2",
        key.column()
    );
    let result = conn.query_row(&sql, params![kind.as_str(), value], parse_account_row);

    match result {
        Ok(account) => Ok(Some(account)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn find_account_by_id(
    conn: &Connection,
    kind: AccountKind,
    id: &str,
) -> rusqlite::Result<Option<Account>> {
    find_account(conn, kind, AccountKey::Id, id)
}

pub fn find_account_by_external_id(
    conn: &Connection,
    kind: AccountKind,
    external_id: &str,
) -> rusqlite::Result<Option<Account>> {
    find_account(conn, kind, AccountKey::ExternalId, external_id)
}

pub fn find_account_by_email(
    conn: &Connection,
    kind: AccountKind,
    email: &str,
) -> rusqlite::Result<Option<Account>> {
    find_account(conn, kind, AccountKey::Email, email)
}

pub fn find_account_by_username(
    conn: &Connection,
    kind: AccountKind,
    username: &str,
) -> rusqlite::Result<Option<Account>> {
    find_account(conn, kind, AccountKey::Username, username)
}

pub fn insert_account(conn: &Connection, account: &Account) -> rusqlite::Result<()> {
    let partner = account.partner.as_ref();
    conn.execute(
        "INSERT INTO accounts (id, kind, external_id, email, username, avatar_url, phone,
            business_name, is_verified, subscription_status, paid_amount, max_rooms, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            account.account_id,
            account.kind.as_str(),
            account.external_id,
            account.email,
            account.username,
            account.avatar_url,
            account.phone,
            partner.and_then(|p| p.business_name.as_deref()),
            partner.map(|p| p.is_verified as i32).unwrap_or(0),
            partner.map(|p| p.subscription_status.as_str()),
            partner.map(|p| p.paid_amount).unwrap_or(0),
            partner.map(|p| p.max_rooms).unwrap_or(0),
            format_ts(&account.created_at),
            format_ts(&account.updated_at),
        ],
    )?;
    Ok(())
}

/// Attaches an external identity to an existing account. `avatar_url` is
/// written as given; callers decide whether it replaces the stored one.
pub fn link_external_identity(
    conn: &Connection,
    account_id: &str,
    external_id: &str,
    avatar_url: Option<&str>,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE accounts SET external_id = ?1, avatar_url = ?2, updated_at = ?3 WHERE id = ?4",
        params![external_id, avatar_url, now_timestamp(), account_id],
    )?;
    Ok(count > 0)
}

/// Writes only the fields that are `Some`.
pub fn update_account_profile(
    conn: &Connection,
    kind: AccountKind,
    account_id: &str,
    username: Option<&str>,
    phone: Option<&str>,
    avatar_url: Option<&str>,
    business_name: Option<&str>,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE accounts SET
           username = COALESCE(?1, username),
           phone = COALESCE(?2, phone),
           avatar_url = COALESCE(?3, avatar_url),
           business_name = COALESCE(?4, business_name),
           updated_at = ?5
         WHERE id = ?6 AND kind = ?7",
        params![
            username,
            phone,
            avatar_url,
            business_name,
            now_timestamp(),
            account_id,
            kind.as_str(),
        ],
    )?;
    Ok(count > 0)
}

/// Credits a processed payment to its partner and (re)activates the
/// subscription.
pub fn credit_partner(
    conn: &Connection,
    partner_id: &str,
    amount: i64,
    rooms: i64,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE accounts SET
           paid_amount = paid_amount + ?1,
           max_rooms = max_rooms + ?2,
           subscription_status = 'active',
           updated_at = ?3
         WHERE id = ?4 AND kind = 'partner'",
        params![amount, rooms, now_timestamp(), partner_id],
    )?;
    Ok(count > 0)
}

fn parse_account_row(row: &Row) -> rusqlite::Result<Account> {
    let kind_str: String = row.get(1)?;
    let kind = AccountKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("unknown account kind: {kind_str}").into(),
        )
    })?;

    let partner = match kind {
        AccountKind::Partner => Some(PartnerDetails {
            business_name: row.get(7)?,
            is_verified: row.get::<_, i32>(8)? != 0,
            subscription_status: row
                .get::<_, Option<String>>(9)?
                .unwrap_or_else(|| "active".to_string()),
            paid_amount: row.get(10)?,
            max_rooms: row.get(11)?,
        }),
        AccountKind::EndUser => None,
    };

    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(Account {
        account_id: row.get(0)?,
        kind,
        external_id: row.get(2)?,
        email: row.get(3)?,
        username: row.get(4)?,
        avatar_url: row.get(5)?,
        phone: row.get(6)?,
        partner,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Rentals ──

const RENTAL_COLUMNS: &str = "id, partner_id, name, description, address, lat, lng, price, \
     original_price, room_count, facilities, images, main_image, created_at, updated_at";

pub fn insert_rental(conn: &Connection, rental: &Rental) -> rusqlite::Result<()> {
    let facilities = serde_json::to_string(&rental.facilities).unwrap_or_else(|_| "[]".into());
    let images = serde_json::to_string(&rental.images).unwrap_or_else(|_| "[]".into());

    conn.execute(
        "INSERT INTO rentals (id, partner_id, name, description, address, lat, lng, price,
            original_price, room_count, facilities, images, main_image, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            rental.rental_id,
            rental.partner_id,
            rental.name,
            rental.description,
            rental.address,
            rental.lat,
            rental.lng,
            rental.price,
            rental.original_price,
            rental.room_count,
            facilities,
            images,
            rental.main_image,
            format_ts(&rental.created_at),
            format_ts(&rental.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_rental(conn: &Connection, id: &str) -> rusqlite::Result<Option<Rental>> {
    let result = conn.query_row(
        &format!("SELECT {RENTAL_COLUMNS} FROM rentals WHERE id = ?1"),
        params![id],
        parse_rental_row,
    );

    match result {
        Ok(rental) => Ok(Some(rental)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn list_rentals(conn: &Connection, limit: i64) -> rusqlite::Result<Vec<Rental>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RENTAL_COLUMNS} FROM rentals ORDER BY created_at DESC, rowid DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit], parse_rental_row)?;
    rows.collect()
}

pub fn rentals_by_partner(conn: &Connection, partner_id: &str) -> rusqlite::Result<Vec<Rental>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RENTAL_COLUMNS} FROM rentals WHERE partner_id = ?1 ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map(params![partner_id], parse_rental_row)?;
    rows.collect()
}

pub fn delete_rental(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let count = conn.execute("DELETE FROM rentals WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

fn parse_rental_row(row: &Row) -> rusqlite::Result<Rental> {
    let facilities: String = row.get(10)?;
    let images: String = row.get(11)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    Ok(Rental {
        rental_id: row.get(0)?,
        partner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        address: row.get(4)?,
        lat: row.get(5)?,
        lng: row.get(6)?,
        price: row.get(7)?,
        original_price: row.get(8)?,
        room_count: row.get(9)?,
        facilities: serde_json::from_str(&facilities).unwrap_or_default(),
        images: serde_json::from_str(&images).unwrap_or_default(),
        main_image: row.get(12)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str =
    "id, user_id, rental_id, check_in, check_out, total_amount, status, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, rental_id, check_in, check_out, total_amount, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            booking.booking_id,
            booking.user_id,
            booking.rental_id,
            booking.check_in.format(DATE_FORMAT).to_string(),
            booking.check_out.format(DATE_FORMAT).to_string(),
            booking.total_amount,
            booking.status.as_str(),
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> rusqlite::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        parse_booking_row,
    );

    match result {
        Ok(booking) => Ok(Some(booking)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Newest first, at most `limit` rows.
pub fn recent_bookings_for_user(
    conn: &Connection,
    user_id: &str,
    limit: i64,
) -> rusqlite::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![user_id, limit], parse_booking_row)?;
    rows.collect()
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: &BookingStatus,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_timestamp(), id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &Row) -> rusqlite::Result<Booking> {
    let check_in: String = row.get(3)?;
    let check_out: String = row.get(4)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(Booking {
        booking_id: row.get(0)?,
        user_id: row.get(1)?,
        rental_id: row.get(2)?,
        check_in: parse_date(3, &check_in)?,
        check_out: parse_date(4, &check_out)?,
        total_amount: row.get(5)?,
        status: BookingStatus::parse(&status),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Reviews ──

const REVIEW_COLUMNS: &str = "id, user_id, rental_id, rating, comment, created_at";

pub fn insert_review(conn: &Connection, review: &Review) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO reviews (id, user_id, rental_id, rating, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            review.review_id,
            review.user_id,
            review.rental_id,
            review.rating,
            review.comment,
            format_ts(&review.created_at),
        ],
    )?;
    Ok(())
}

/// Newest first, at most `limit` rows.
pub fn recent_reviews_for_user(
    conn: &Connection,
    user_id: &str,
    limit: i64,
) -> rusqlite::Result<Vec<Review>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![user_id, limit], parse_review_row)?;
    rows.collect()
}

pub fn reviews_for_rental(conn: &Connection, rental_id: &str) -> rusqlite::Result<Vec<Review>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE rental_id = ?1 ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map(params![rental_id], parse_review_row)?;
    rows.collect()
}

fn parse_review_row(row: &Row) -> rusqlite::Result<Review> {
    let created_at: String = row.get(5)?;
    Ok(Review {
        review_id: row.get(0)?,
        user_id: row.get(1)?,
        rental_id: row.get(2)?,
        rating: row.get(3)?,
        comment: row.get(4)?,
        created_at: parse_ts(&created_at),
    })
}

// ── Partner Payments ──

const PAYMENT_COLUMNS: &str = "id, partner_id, amount, rooms_allowed, method, status, \
     transaction_id, valid_from, valid_until, created_at, updated_at";

pub fn insert_payment(conn: &Connection, payment: &Payment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO partner_payments (id, partner_id, amount, rooms_allowed, method, status,
            transaction_id, valid_from, valid_until, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            payment.payment_id,
            payment.partner_id,
            payment.amount,
            payment.rooms_allowed,
            payment.method,
            payment.status.as_str(),
            payment.transaction_id,
            format_ts(&payment.valid_from),
            format_ts(&payment.valid_until),
            format_ts(&payment.created_at),
            format_ts(&payment.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_payment(conn: &Connection, id: &str) -> rusqlite::Result<Option<Payment>> {
    let result = conn.query_row(
        &format!("SELECT {PAYMENT_COLUMNS} FROM partner_payments WHERE id = ?1"),
        params![id],
        parse_payment_row,
    );

    match result {
        Ok(payment) => Ok(Some(payment)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn payments_for_partner(conn: &Connection, partner_id: &str) -> rusqlite::Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM partner_payments WHERE partner_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map(params![partner_id], parse_payment_row)?;
    rows.collect()
}

/// Moves a payment to `status` unless it already holds it. Returns whether
/// a row changed.
pub fn transition_payment(
    conn: &Connection,
    id: &str,
    status: PaymentStatus,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE partner_payments SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status != ?1",
        params![status.as_str(), now_timestamp(), id],
    )?;
    Ok(count > 0)
}

fn parse_payment_row(row: &Row) -> rusqlite::Result<Payment> {
    let status: String = row.get(5)?;
    let valid_from: String = row.get(7)?;
    let valid_until: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Payment {
        payment_id: row.get(0)?,
        partner_id: row.get(1)?,
        amount: row.get(2)?,
        rooms_allowed: row.get(3)?,
        method: row.get(4)?,
        status: PaymentStatus::parse(&status),
        transaction_id: row.get(6)?,
        valid_from: parse_ts(&valid_from),
        valid_until: parse_ts(&valid_until),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}
