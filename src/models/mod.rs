pub mod account;
pub mod booking;
pub mod payment;
pub mod rental;
pub mod review;

pub use account::{
    Account, AccountKind, IdentityAssertion, PartnerDetails, Profile,
    ProfileUpdate, PublicProfile, RecentActivity,
};
pub use booking::{Booking, BookingStatus};
pub use payment::{Payment, PaymentStatus};
pub use rental::Rental;
pub use review::Review;

/// Timestamp layout used for every TEXT datetime column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Layout for calendar dates (check-in / check-out).
pub const DATE_FORMAT: &str = "%Y-%m-%d";
