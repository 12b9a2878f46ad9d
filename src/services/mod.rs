pub mod auth_service;
pub mod config_service;
pub mod driver_service;
pub mod matching_service;
pub mod payment_service;
pub mod sweeper_service;
pub mod trip_service;
