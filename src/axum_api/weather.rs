use crate::axum_api::{ApiResponse, AppState};
use crate::cache::CacheKey;
use crate::errors::AppError;
use crate::upstream::WeatherQuery;
use crate::validation::{char_len_between, is_latitude, is_longitude, FieldErrors};
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct WeatherParams {
    pub city: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
}

impl WeatherParams {
    /// A city wins over coordinates when both are given.
    pub fn into_query(self) -> Result<WeatherQuery, AppError> {
        let lat = self.lat.as_deref().map(|v| v.trim().parse::<f64>().ok());
        let lon = self.lon.as_deref().map(|v| v.trim().parse::<f64>().ok());

        let mut errors = FieldErrors::new();
        if let Some(city) = &self.city {
            errors.check(
                "city",
                char_len_between(city.trim(), 1, 100),
                "City name must be between 1 and 100 characters",
            );
        }
        if let Some(lat) = lat {
            errors.check(
                "lat",
                lat.is_some_and(is_latitude),
                "Latitude must be between -90 and 90",
            );
        }
        if let Some(lon) = lon {
            errors.check(
                "lon",
                lon.is_some_and(is_longitude),
                "Longitude must be between -180 and 180",
            );
        }
        errors.finish()?;

        match (self.city, lat.flatten(), lon.flatten()) {
            (Some(city), _, _) => Ok(WeatherQuery::City(city.trim().to_string())),
            (None, Some(lat), Some(lon)) => Ok(WeatherQuery::Coords { lat, lon }),
            _ => Err(AppError::MissingParameters),
        }
    }
}

pub async fn current_weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let query = params.into_query()?;
    let key = CacheKey::current_weather(&query);

    let resolved = state
        .cache
        .resolve(key.as_str(), state.config.cache_weather_ttl_seconds, || async {
            state.weather.current(&query).await.map_err(AppError::from)
        })
        .await?;

    Ok(ApiResponse::ok(resolved.value).cached(resolved.from_cache))
}

pub async fn forecast(
    State(state): State<AppState>,
    Query(params): Query<WeatherParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let query = params.into_query()?;
    let key = CacheKey::forecast(&query);

    let resolved = state
        .cache
        .resolve(key.as_str(), state.config.cache_default_ttl_seconds, || async {
            state.weather.forecast(&query).await.map_err(AppError::from)
        })
        .await?;

    Ok(ApiResponse::ok(resolved.value).cached(resolved.from_cache))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/current", get(current_weather))
        .route("/forecast", get(forecast))
}
