use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{Booking, Review};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    EndUser,
    Partner,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::EndUser => "end_user",
            AccountKind::Partner => "partner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "end_user" => Some(AccountKind::EndUser),
            "partner" => Some(AccountKind::Partner),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing and verification state carried only by partner accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDetails {
    pub business_name: Option<String>,
    pub is_verified: bool,
    pub subscription_status: String,
    pub paid_amount: i64,
    pub max_rooms: i64,
}

impl PartnerDetails {
    /// Defaults for a partner created through sign-in. Subscription starts
    /// active with nothing paid.
    pub fn signup_defaults() -> Self {
        Self {
            business_name: None,
            is_verified: false,
            subscription_status: "active".to_string(),
            paid_amount: 0,
            max_rooms: 0,
        }
    }
}

/// A stored account of either kind.
///
/// `partner` is `Some` exactly when `kind` is [`AccountKind::Partner`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
    pub kind: AccountKind,
    pub external_id: Option<String>,
    pub email: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub partner: Option<PartnerDetails>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// The (subject id, email, display name, avatar) tuple handed over by an
/// upstream identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityAssertion {
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl IdentityAssertion {
    /// Builds an assertion, treating blank optional fields as absent.
    pub fn new(
        external_id: impl Into<String>,
        email: impl Into<String>,
        display_name: Option<String>,
        avatar_url: Option<String>,
    ) -> Self {
        Self {
            external_id: external_id.into().trim().to_string(),
            email: email.into().trim().to_string(),
            display_name: non_blank(display_name),
            avatar_url: non_blank(avatar_url),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Most recent bookings and reviews of an end user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecentActivity {
    pub bookings: Vec<Booking>,
    pub reviews: Vec<Review>,
}

/// An account as returned to its owner.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub account: Account,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub recent: Option<RecentActivity>,
}

/// An account as shown to anyone else: no email, phone or external id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub account_id: String,
    pub kind: AccountKind,
    pub username: String,
    pub avatar_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub recent: Option<RecentActivity>,
}

impl From<Profile> for PublicProfile {
    fn from(profile: Profile) -> Self {
        let Profile { account, recent } = profile;
        Self {
            account_id: account.account_id,
            kind: account.kind,
            username: account.username,
            avatar_url: account.avatar_url,
            created_at: account.created_at,
            updated_at: account.updated_at,
            recent,
        }
    }
}

/// Partial profile change. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub business_name: Option<String>,
}
