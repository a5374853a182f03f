//! Weather chat: a [`ChatAgent`] with one tool, `getWeather`, backed by the
//! Open-Meteo forecast API (no key required).

use crate::agent::ChatAgent;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::schema::{Field, ObjectSchema};
use crate::tool::{Tool, ToolError, ToolRegistry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const WEATHER_TOOL_NAME: &str = "getWeather";

const CURRENT_FIELDS: &str = "temperature_2m,weathercode,relativehumidity_2m";

/// Current conditions as returned to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    /// Degrees Celsius.
    pub temperature: f64,
    /// WMO weather interpretation code.
    pub weather_code: i64,
    /// Relative humidity, percent.
    pub humidity: f64,
    pub city: String,
}

impl WeatherReport {
    pub fn conditions(&self) -> &'static str {
        describe_weather_code(self.weather_code)
    }
}

/// Weather card.
impl fmt::Display for WeatherReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[ {} ]", self.city)?;
        writeln!(f, "  {:.1}°C, {}", self.temperature, self.conditions())?;
        write!(f, "  Humidity: {:.0}%", self.humidity)
    }
}

/// Text for a WMO weather interpretation code.
pub fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 | 65 => "Rain",
        66 | 67 => "Freezing rain",
        71 | 73 | 75 => "Snow",
        77 => "Snow grains",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown",
    }
}

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    latitude: f64,
    longitude: f64,
    city: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    weathercode: i64,
    relativehumidity_2m: f64,
}

/// Looks up current conditions for a coordinate pair.
///
/// Uses the HTTP client of the [`ExecCtx`] it runs under.
#[derive(Debug, Clone)]
pub struct WeatherTool {
    base_url: String,
    parameters: ObjectSchema,
}

impl WeatherTool {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            parameters: ObjectSchema::new()
                .field(Field::number("latitude"))
                .field(Field::number("longitude"))
                .field(Field::string("city")),
        }
    }

    pub async fn fetch(
        &self,
        client: &reqwest::Client,
        latitude: f64,
        longitude: f64,
        city: String,
    ) -> std::result::Result<WeatherReport, ToolError> {
        tracing::debug!(latitude, longitude, city = %city, "fetching forecast");

        let forecast = client
            .get(format!("{}/v1/forecast", self.base_url))
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<ForecastResponse>()
            .await?;

        Ok(WeatherReport {
            temperature: forecast.current.temperature_2m,
            weather_code: forecast.current.weathercode,
            humidity: forecast.current.relativehumidity_2m,
            city,
        })
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_WEATHER_BASE_URL)
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        WEATHER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get the current weather at a location"
    }

    fn parameters(&self) -> &ObjectSchema {
        &self.parameters
    }

    async fn execute(&self, ctx: &ExecCtx, args: Value) -> std::result::Result<Value, ToolError> {
        let args: WeatherArgs =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let report = self
            .fetch(&ctx.client, args.latitude, args.longitude, args.city)
            .await?;
        serde_json::to_value(report).map_err(|e| ToolError::Execution(e.to_string()))
    }
}

/// The weather chat assistant: `getWeather` registered, `max_steps` model
/// requests per turn.
pub fn weather_assistant(
    model: impl Into<String>,
    weather_base_url: impl Into<String>,
    max_steps: u32,
) -> Result<ChatAgent> {
    let tools = ToolRegistry::new().with(WeatherTool::new(weather_base_url))?;
    Ok(ChatAgent::new("weather-chat", model)
        .with_tools(tools)
        .with_max_steps(max_steps))
}
