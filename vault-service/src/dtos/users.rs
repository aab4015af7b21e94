use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{SanitizedUser, UserSettings};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[serde(alias = "currentPassword")]
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[serde(alias = "newPassword")]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Partial settings update. Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    #[serde(alias = "darkMode")]
    pub dark_mode: Option<bool>,
    #[serde(alias = "emailNotifications")]
    pub email_notifications: Option<bool>,
    #[serde(alias = "autoBackup")]
    pub auto_backup: Option<bool>,
}

impl UpdateSettingsRequest {
    pub fn apply(&self, settings: &mut UserSettings) {
        if let Some(v) = self.dark_mode {
            settings.dark_mode = v;
        }
        if let Some(v) = self.email_notifications {
            settings.email_notifications = v;
        }
        if let Some(v) = self.auto_backup {
            settings.auto_backup = v;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub message: String,
    pub user: SanitizedUser,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub message: String,
    pub settings: UserSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_can_clear_flags() {
        let mut settings = UserSettings::default();
        let update: UpdateSettingsRequest =
            serde_json::from_str(r#"{"emailNotifications": false}"#).unwrap();
        update.apply(&mut settings);

        assert!(!settings.email_notifications);
        assert!(settings.auto_backup);
        assert!(!settings.dark_mode);
    }
}
