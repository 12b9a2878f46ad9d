pub mod auth;
pub mod driver_handler;
pub mod manager_handler;
pub mod trip_handler;

pub use auth::AuthUser;
