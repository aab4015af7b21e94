pub mod admin;
pub mod analytics;
pub mod auth;
pub mod files;
pub mod health;
pub mod metrics;
pub mod search;
pub mod storage;
pub mod system;
pub mod users;

pub use health::health_check;
