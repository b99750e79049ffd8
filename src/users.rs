use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::renewal::RenewalRecord;

pub mod memory;

pub use self::memory::InMemoryUserStore;

pub const MAX_SAVED_LOCATIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultLocation {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub theme: Theme,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_location: Option<DefaultLocation>,
    pub news_topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLocation {
    pub id: Uuid,
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub temp: i64,
    pub icon: String,
    pub condition: String,
    pub created_at: DateTime<Utc>,
}

/// A location as submitted by the dashboard.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewLocation {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub temp: f64,
    pub icon: String,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub preferences: Preferences,
    pub saved_locations: Vec<SavedLocation>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub renewal: RenewalRecord,
}

impl User {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            email: normalize_email(email),
            preferences: Preferences::default(),
            saved_locations: Vec::new(),
            created_at: Utc::now(),
            renewal: RenewalRecord::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    pub theme: Option<Theme>,
    pub default_location: Option<DefaultLocation>,
    pub news_topics: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub preferences: Option<PreferencesUpdate>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the user for `email`, creating one named `name` if needed.
    /// The flag is `true` when the user was created.
    async fn find_or_create(&self, email: &str, name: &str) -> Result<(User, bool), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Purges expired renewal tokens and appends `token`.
    async fn issue_renewal_token(&self, id: Uuid, token: &str) -> Result<(), AppError>;

    /// Supersedes `presented` with `replacement`. `Ok(false)` when the user
    /// is unknown or `presented` is not a live token.
    async fn rotate_renewal_token(
        &self,
        id: Uuid,
        presented: &str,
        replacement: &str,
    ) -> Result<bool, AppError>;

    async fn revoke_renewal_token(&self, id: Uuid, token: &str) -> Result<(), AppError>;

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<User, AppError>;

    async fn add_location(&self, id: Uuid, location: NewLocation)
        -> Result<SavedLocation, AppError>;

    async fn remove_location(&self, id: Uuid, location_id: Uuid)
        -> Result<SavedLocation, AppError>;
}
