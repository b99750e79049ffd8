use crate::axum_api::{ApiResponse, AppState, CurrentUser};
use crate::errors::AppError;
use crate::users::{DefaultLocation, PreferencesUpdate, ProfileUpdate, Theme, User};
use crate::validation::{char_len_between, is_latitude, is_longitude, FieldErrors};
use axum::{
    extract::{Extension, Json, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::info;

/// Raw profile update; string fields are checked before they become typed.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub preferences: Option<PreferencesRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesRequest {
    pub theme: Option<String>,
    pub default_location: Option<DefaultLocation>,
    pub news_topics: Option<Vec<String>>,
}

impl UpdateProfileRequest {
    fn into_update(self) -> Result<ProfileUpdate, AppError> {
        let mut errors = FieldErrors::new();

        if let Some(name) = &self.name {
            errors.check(
                "name",
                char_len_between(name.trim(), 2, 50),
                "Name must be between 2 and 50 characters",
            );
        }

        let mut theme = None;
        if let Some(prefs) = &self.preferences {
            if let Some(raw) = &prefs.theme {
                theme = match raw.as_str() {
                    "light" => Some(Theme::Light),
                    "dark" => Some(Theme::Dark),
                    _ => None,
                };
                errors.check(
                    "preferences.theme",
                    theme.is_some(),
                    "Theme must be either light or dark",
                );
            }
            if let Some(location) = &prefs.default_location {
                errors
                    .check(
                        "preferences.defaultLocation.name",
                        char_len_between(location.name.trim(), 1, 100),
                        "Location name must be between 1 and 100 characters",
                    )
                    .check(
                        "preferences.defaultLocation.lat",
                        is_latitude(location.lat),
                        "Latitude must be between -90 and 90",
                    )
                    .check(
                        "preferences.defaultLocation.lon",
                        is_longitude(location.lon),
                        "Longitude must be between -180 and 180",
                    );
            }
            for (i, topic) in prefs.news_topics.iter().flatten().enumerate() {
                errors.check(
                    &format!("preferences.newsTopics[{}]", i),
                    char_len_between(topic.trim(), 1, 50),
                    "Each news topic must be between 1 and 50 characters",
                );
            }
        }
        errors.finish()?;

        Ok(ProfileUpdate {
            name: self.name.filter(|n| !n.trim().is_empty()),
            preferences: self.preferences.map(|prefs| PreferencesUpdate {
                theme,
                default_location: prefs.default_location,
                news_topics: prefs.news_topics,
            }),
        })
    }
}

pub async fn get_profile(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResponse<User> {
    ApiResponse::ok(user)
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<ApiResponse<User>, AppError> {
    let update = payload.into_update()?;
    let updated = state.users.update_profile(user.id, update).await?;

    info!(user_id = %updated.id, "user profile updated");
    Ok(ApiResponse::ok(updated).with_message("Profile updated successfully"))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/me", get(get_profile).put(update_profile))
}
