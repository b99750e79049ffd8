use crate::axum_api::{ApiResponse, AppState, CurrentUser};
use crate::errors::AppError;
use crate::users::{NewLocation, SavedLocation};
use crate::validation::{char_len_between, is_latitude, is_longitude, FieldErrors};
use axum::{
    extract::{Extension, Json, Path, State},
    routing::{delete, get},
    Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddLocationRequest {
    pub name: String,
    pub country: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub temp: Option<f64>,
    pub icon: String,
    pub condition: String,
}

impl AddLocationRequest {
    fn into_location(self) -> Result<NewLocation, AppError> {
        let mut errors = FieldErrors::new();
        errors
            .check(
                "name",
                char_len_between(self.name.trim(), 1, 100),
                "Location name must be between 1 and 100 characters",
            )
            .check(
                "lat",
                self.lat.is_some_and(is_latitude),
                "Latitude must be between -90 and 90",
            )
            .check(
                "lon",
                self.lon.is_some_and(is_longitude),
                "Longitude must be between -180 and 180",
            );
        errors.finish()?;

        Ok(NewLocation {
            name: self.name.trim().to_string(),
            country: self.country,
            lat: self.lat.unwrap_or_default(),
            lon: self.lon.unwrap_or_default(),
            temp: self.temp.unwrap_or_default(),
            icon: self.icon,
            condition: self.condition,
        })
    }
}

pub async fn list_locations(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResponse<Vec<SavedLocation>> {
    ApiResponse::ok(user.saved_locations)
}

pub async fn add_location(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<AddLocationRequest>,
) -> Result<ApiResponse<SavedLocation>, AppError> {
    let location = payload.into_location()?;
    let saved = state.users.add_location(user.id, location).await?;

    info!(user_id = %user.id, location = %saved.name, "location added");
    Ok(ApiResponse::ok(saved)
        .with_message("Location saved successfully")
        .created())
}

pub async fn delete_location(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    let location_id =
        Uuid::parse_str(&id).map_err(|_| AppError::invalid_field("id", "Invalid location ID"))?;
    let removed = state.users.remove_location(user.id, location_id).await?;

    info!(user_id = %user.id, location = %removed.name, "location removed");
    Ok(ApiResponse::message("Location removed successfully"))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_locations).post(add_location))
        .route("/{id}", delete(delete_location))
}
