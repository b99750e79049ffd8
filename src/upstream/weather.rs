use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Weekday};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::upstream::{
    build_client, get_json, join_url, UpstreamError, WeatherProvider, WeatherQuery,
};

const WEATHER_TIMEOUT: Duration = Duration::from_secs(5);
const HOURLY_SLOTS: usize = 8;
const DAILY_DAYS: usize = 6;

pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
    geo_url: String,
    timeout: Duration,
}

impl OpenWeatherClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        geo_url: impl Into<String>,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
            base_url: base_url.into(),
            geo_url: geo_url.into(),
            timeout: WEATHER_TIMEOUT,
        })
    }

    /// Overrides the timeout used for the weather and forecast calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn location_params(&self, query: &WeatherQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
        ];
        match query {
            WeatherQuery::City(city) => params.push(("q", city.trim().to_string())),
            WeatherQuery::Coords { lat, lon } => {
                params.push(("lat", lat.to_string()));
                params.push(("lon", lon.to_string()));
            }
        }
        params
    }

    async fn geocode(
        &self,
        query: &WeatherQuery,
        coords: Option<(f64, f64)>,
    ) -> Result<Option<GeoInfo>, UpstreamError> {
        let (url, mut params) = match (coords, query) {
            (Some((lat, lon)), _) => (
                join_url(&self.geo_url, "reverse"),
                vec![("lat", lat.to_string()), ("lon", lon.to_string())],
            ),
            (None, WeatherQuery::City(city)) => (
                join_url(&self.geo_url, "direct"),
                vec![("q", city.trim().to_string())],
            ),
            (None, WeatherQuery::Coords { .. }) => return Ok(None),
        };
        params.push(("limit", "1".to_string()));
        params.push(("appid", self.api_key.clone()));

        let body = get_json(&self.client, &url, &params, None).await?;
        let places: Vec<GeoPlace> = serde_json::from_value(body)
            .map_err(|e| UpstreamError::Malformed(format!("geocoding: {}", e)))?;
        Ok(places.into_iter().next().map(GeoInfo::from))
    }

    async fn air_quality(&self, lat: f64, lon: f64) -> Result<AirQuality, UpstreamError> {
        let params = [
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("appid", self.api_key.clone()),
        ];
        let body = get_json(
            &self.client,
            &join_url(&self.base_url, "air_pollution"),
            &params,
            None,
        )
        .await?;
        Ok(AirQuality::from_response(&body))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current(&self, query: &WeatherQuery) -> Result<Value, UpstreamError> {
        let weather = get_json(
            &self.client,
            &join_url(&self.base_url, "weather"),
            &self.location_params(query),
            Some(self.timeout),
        )
        .await?;

        let reported = weather
            .pointer("/coord/lat")
            .and_then(Value::as_f64)
            .zip(weather.pointer("/coord/lon").and_then(Value::as_f64));
        let coords = reported.or_else(|| query.coords());

        let geo = self.geocode(query, coords).await?;
        let air = match coords {
            Some((lat, lon)) => self.air_quality(lat, lon).await?,
            None => AirQuality::default(),
        };

        let merged = merge_current(weather, geo, coords, air)?;
        info!(query = %query.describe(), "weather data fetched");
        Ok(merged)
    }

    async fn forecast(&self, query: &WeatherQuery) -> Result<Value, UpstreamError> {
        let raw = get_json(
            &self.client,
            &join_url(&self.base_url, "forecast"),
            &self.location_params(query),
            Some(self.timeout),
        )
        .await?;

        let summary = summarize_forecast(raw)?;
        info!(query = %query.describe(), "forecast data fetched");
        serde_json::to_value(summary).map_err(|e| UpstreamError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct GeoPlace {
    name: String,
    state: Option<String>,
    country: Option<String>,
    lat: f64,
    lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoInfo {
    pub name: String,
    pub state: Option<String>,
    pub country: Option<String>,
    pub full_name: String,
    pub lat: f64,
    pub lon: f64,
}

impl From<GeoPlace> for GeoInfo {
    fn from(place: GeoPlace) -> Self {
        let full_name = match &place.state {
            Some(state) if !state.is_empty() => format!("{}, {}", place.name, state),
            _ => place.name.clone(),
        };
        Self {
            name: place.name,
            state: place.state.filter(|s| !s.is_empty()),
            country: place.country,
            full_name,
            lat: place.lat,
            lon: place.lon,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AirQuality {
    pub aqi: Option<u8>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
}

impl AirQuality {
    fn from_response(body: &Value) -> Self {
        let entry = body.pointer("/list/0");
        Self {
            aqi: entry
                .and_then(|e| e.pointer("/main/aqi"))
                .and_then(Value::as_u64)
                .and_then(|v| u8::try_from(v).ok()),
            pm2_5: entry
                .and_then(|e| e.pointer("/components/pm2_5"))
                .and_then(Value::as_f64),
            pm10: entry
                .and_then(|e| e.pointer("/components/pm10"))
                .and_then(Value::as_f64),
        }
    }
}

/// Adds `fullName`, `state`, `country`, `coord` and `air_quality` to the raw
/// current-weather payload.
pub fn merge_current(
    weather: Value,
    geo: Option<GeoInfo>,
    coords: Option<(f64, f64)>,
    air: AirQuality,
) -> Result<Value, UpstreamError> {
    let Value::Object(mut merged) = weather else {
        return Err(UpstreamError::Malformed(
            "current weather is not an object".to_string(),
        ));
    };

    let sys_country = merged
        .get("sys")
        .and_then(|sys| sys.get("country"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let name = merged
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let full_name = match (&geo, &sys_country) {
        (Some(geo), _) => geo.full_name.clone(),
        (None, Some(country)) if !country.is_empty() => format!("{}, {}", name, country),
        (None, _) => name,
    };
    let state = geo.as_ref().and_then(|g| g.state.clone());
    let country = geo.and_then(|g| g.country).or(sys_country);

    merged.insert("fullName".into(), json!(full_name));
    merged.insert("state".into(), json!(state));
    merged.insert("country".into(), json!(country));
    if let Some((lat, lon)) = coords {
        merged.insert("coord".into(), json!({ "lat": lat, "lon": lon }));
    }
    merged.insert(
        "air_quality".into(),
        serde_json::to_value(air).map_err(|e| UpstreamError::Malformed(e.to_string()))?,
    );

    Ok(Value::Object(merged))
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    city: Value,
    list: Vec<ForecastItem>,
}

#[derive(Debug, Deserialize)]
struct ForecastItem {
    dt: i64,
    main: ForecastMain,
    #[serde(default)]
    weather: Vec<Value>,
    #[serde(default)]
    wind: Value,
}

#[derive(Debug, Deserialize)]
struct ForecastMain {
    temp: f64,
    feels_like: f64,
    #[serde(default)]
    humidity: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyForecast {
    pub dt: i64,
    pub time: String,
    pub temp: i64,
    pub weather: Value,
    pub humidity: Value,
    pub wind: Value,
    pub feels_like: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecast {
    pub day: String,
    /// Milliseconds since the epoch.
    pub date: i64,
    pub temp: f64,
    pub weather: Value,
    pub humidity: Value,
    pub wind: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    pub city: Value,
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DailyForecast>,
}

/// Reshapes a 5-day/3-hour forecast into the next eight slots and one entry
/// per weekday. The first day (today) is skipped in the daily list and each
/// day keeps its last slot.
pub fn summarize_forecast(raw: Value) -> Result<ForecastSummary, UpstreamError> {
    let response: ForecastResponse = serde_json::from_value(raw)
        .map_err(|e| UpstreamError::Malformed(format!("forecast: {}", e)))?;
    let offset = response
        .city
        .get("timezone")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let hourly = response
        .list
        .iter()
        .take(HOURLY_SLOTS)
        .map(|item| {
            Ok(HourlyForecast {
                dt: item.dt,
                time: format_hour(local_time(item.dt, offset)?.hour()),
                temp: item.main.temp.round() as i64,
                weather: item.weather.first().cloned().unwrap_or(Value::Null),
                humidity: item.main.humidity.clone(),
                wind: item.wind.get("speed").cloned().unwrap_or(Value::Null),
                feels_like: item.main.feels_like.round() as i64,
            })
        })
        .collect::<Result<Vec<_>, UpstreamError>>()?;

    let mut daily: Vec<DailyForecast> = Vec::new();
    for item in &response.list {
        let day = weekday_label(local_time(item.dt, offset)?.weekday());
        let entry = DailyForecast {
            day: day.to_string(),
            date: item.dt * 1000,
            temp: item.main.temp,
            weather: item.weather.first().cloned().unwrap_or(Value::Null),
            humidity: item.main.humidity.clone(),
            wind: item.wind.clone(),
        };
        match daily.iter_mut().find(|d| d.day == entry.day) {
            Some(existing) => *existing = entry,
            None => daily.push(entry),
        }
    }
    let daily = daily.into_iter().skip(1).take(DAILY_DAYS).collect();

    Ok(ForecastSummary {
        city: response.city,
        hourly,
        daily,
    })
}

fn local_time(dt: i64, offset_seconds: i64) -> Result<DateTime<chrono::Utc>, UpstreamError> {
    DateTime::from_timestamp(dt + offset_seconds, 0)
        .ok_or_else(|| UpstreamError::Malformed(format!("timestamp out of range: {}", dt)))
}

fn format_hour(hour: u32) -> String {
    let display = if hour % 12 == 0 { 12 } else { hour % 12 };
    let suffix = if hour < 12 { "AM" } else { "PM" };
    format!("{} {}", display, suffix)
}

fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MON",
        Weekday::Tue => "TUE",
        Weekday::Wed => "WED",
        Weekday::Thu => "THU",
        Weekday::Fri => "FRI",
        Weekday::Sat => "SAT",
        Weekday::Sun => "SUN",
    }
}
