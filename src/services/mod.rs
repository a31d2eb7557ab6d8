pub mod accounts;
pub mod bookings;
pub mod oauth;
pub mod payments;
pub mod rentals;
pub mod session;
