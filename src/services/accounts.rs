//! Account resolution and profile maintenance for both account kinds.
//!
//! Every sign-in path (direct Google sign-in and the OAuth callback) funnels
//! through [`resolve`], so end users and partners share one lookup order:
//! external id, then email, then create.

use chrono::Utc;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Account, AccountKind, IdentityAssertion, PartnerDetails, Profile, ProfileUpdate,
    RecentActivity,
};

/// Upper bound on each related-entity list attached to a profile.
pub const RECENT_LIMIT: i64 = 10;

const MAX_USERNAME_LEN: usize = 20;

/// Finds or creates the single account of `kind` matching `assertion`.
pub fn resolve(
    conn: &Connection,
    kind: AccountKind,
    assertion: &IdentityAssertion,
) -> Result<Profile, AppError> {
    if assertion.external_id.is_empty() {
        return Err(AppError::MissingField("googleId"));
    }
    if assertion.email.is_empty() {
        return Err(AppError::MissingField("email"));
    }

    if let Some(account) =
        queries::find_account_by_external_id(conn, kind, &assertion.external_id)?
    {
        tracing::debug!(account_id = %account.account_id, %kind, "resolved by external id");
        return load_profile(conn, account);
    }

    if let Some(account) = queries::find_account_by_email(conn, kind, &assertion.email)? {
        let avatar_url = account
            .avatar_url
            .as_deref()
            .or(assertion.avatar_url.as_deref());
        queries::link_external_identity(
            conn,
            &account.account_id,
            &assertion.external_id,
            avatar_url,
        )?;
        tracing::info!(account_id = %account.account_id, %kind, "linked external identity by email");

        let linked = queries::find_account_by_id(conn, kind, &account.account_id)?
            .ok_or(AppError::AccountNotFound)?;
        return load_profile(conn, linked);
    }

    let username = derive_username(kind, assertion.display_name.as_deref(), &assertion.email);
    let now = Utc::now().naive_utc();
    let account = Account {
        account_id: uuid::Uuid::new_v4().to_string(),
        kind,
        external_id: Some(assertion.external_id.clone()),
        email: assertion.email.clone(),
        username,
        avatar_url: assertion.avatar_url.clone(),
        phone: match kind {
            AccountKind::Partner => Some(String::new()),
            AccountKind::EndUser => None,
        },
        partner: match kind {
            AccountKind::Partner => Some(PartnerDetails::signup_defaults()),
            AccountKind::EndUser => None,
        },
        created_at: now,
        updated_at: now,
    };

    queries::insert_account(conn, &account)
        .map_err(|e| AppError::from_account_write(e, &account.email, &account.username))?;
    tracing::info!(account_id = %account.account_id, %kind, username = %account.username, "created account");

    profile(conn, kind, &account.account_id)
}

/// Builds a username from the display name, or from the email's local part
/// when there is no usable display name. Only ASCII alphanumerics survive,
/// capped at 20 characters. Collisions are left for the store to reject.
pub fn derive_username(kind: AccountKind, display_name: Option<&str>, email: &str) -> String {
    let from_display = display_name.map(clean_username).unwrap_or_default();
    if !from_display.is_empty() {
        return from_display;
    }

    let local_part = email.split('@').next().unwrap_or_default();
    let from_email = clean_username(local_part);
    if !from_email.is_empty() {
        return from_email;
    }

    match kind {
        AccountKind::EndUser => "user".to_string(),
        AccountKind::Partner => "partner".to_string(),
    }
}

fn clean_username(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_USERNAME_LEN)
        .collect()
}

/// Full profile of an account the caller asserts exists.
pub fn profile(conn: &Connection, kind: AccountKind, account_id: &str) -> Result<Profile, AppError> {
    if account_id.trim().is_empty() {
        return Err(AppError::MissingField("accountId"));
    }
    let account =
        queries::find_account_by_id(conn, kind, account_id)?.ok_or(AppError::AccountNotFound)?;
    load_profile(conn, account)
}

/// Applies a partial profile change. Changing `username` to one held by
/// another account of the same kind is rejected before anything is written.
pub fn update_profile(
    conn: &Connection,
    kind: AccountKind,
    account_id: &str,
    update: &ProfileUpdate,
) -> Result<Profile, AppError> {
    let current =
        queries::find_account_by_id(conn, kind, account_id)?.ok_or(AppError::AccountNotFound)?;

    let username = update
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty() && *u != current.username);

    if let Some(wanted) = username {
        if let Some(holder) = queries::find_account_by_username(conn, kind, wanted)? {
            if holder.account_id != current.account_id {
                return Err(AppError::UsernameConflict(wanted.to_string()));
            }
        }
    }

    let avatar_url = update.avatar_url.as_deref().filter(|a| !a.trim().is_empty());
    let business_name = match kind {
        AccountKind::Partner => update.business_name.as_deref(),
        AccountKind::EndUser => None,
    };

    queries::update_account_profile(
        conn,
        kind,
        account_id,
        username,
        update.phone.as_deref(),
        avatar_url,
        business_name,
    )
    .map_err(|e| AppError::from_account_write(e, &current.email, username.unwrap_or_default()))?;

    profile(conn, kind, account_id)
}

/// Creates a partner that has not signed in through an identity provider.
pub fn register_partner(
    conn: &Connection,
    email: &str,
    username: &str,
    business_name: &str,
    phone: Option<&str>,
) -> Result<Profile, AppError> {
    let email = email.trim();
    let username = username.trim();
    let business_name = business_name.trim();

    if email.is_empty() {
        return Err(AppError::MissingField("email"));
    }
    if username.is_empty() {
        return Err(AppError::MissingField("username"));
    }
    if business_name.is_empty() {
        return Err(AppError::MissingField("businessName"));
    }

    let kind = AccountKind::Partner;
    if queries::find_account_by_email(conn, kind, email)?.is_some() {
        return Err(AppError::EmailConflict(email.to_string()));
    }
    if queries::find_account_by_username(conn, kind, username)?.is_some() {
        return Err(AppError::UsernameConflict(username.to_string()));
    }

    let now = Utc::now().naive_utc();
    let account = Account {
        account_id: uuid::Uuid::new_v4().to_string(),
        kind,
        external_id: None,
        email: email.to_string(),
        username: username.to_string(),
        avatar_url: None,
        phone: Some(phone.unwrap_or_default().to_string()),
        partner: Some(PartnerDetails {
            business_name: Some(business_name.to_string()),
            ..PartnerDetails::signup_defaults()
        }),
        created_at: now,
        updated_at: now,
    };

    queries::insert_account(conn, &account)
        .map_err(|e| AppError::from_account_write(e, email, username))?;
    tracing::info!(account_id = %account.account_id, "registered partner");

    profile(conn, kind, &account.account_id)
}

fn load_profile(conn: &Connection, account: Account) -> Result<Profile, AppError> {
    let recent = match account.kind {
        AccountKind::EndUser => Some(RecentActivity {
            bookings: queries::recent_bookings_for_user(conn, &account.account_id, RECENT_LIMIT)?,
            reviews: queries::recent_reviews_for_user(conn, &account.account_id, RECENT_LIMIT)?,
        }),
        AccountKind::Partner => None,
    };
    Ok(Profile { account, recent })
}
