pub mod admin;
pub mod analytics;
pub mod auth;
pub mod files;
pub mod users;

pub use admin::*;
pub use analytics::*;
pub use auth::*;
pub use files::*;
pub use users::*;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
