//! 天气工具：Open-Meteo 地理编码 + 实时天气（无需 API Key）
//!
//! 任何失败都返回 Err（而不是一段描述失败的文本），这样编排循环的重复调用缓存只会记住成功结果。

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::tools::{decode_args, Tool, ToolError, ToolSignature};

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WeatherArgs {
    /// 地点（城市名等自由文本）
    pub location: String,
    /// celsius 或 fahrenheit，默认 celsius
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TempUnit {
    Celsius,
    Fahrenheit,
}

impl TempUnit {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("fahrenheit") => TempUnit::Fahrenheit,
            _ => TempUnit::Celsius,
        }
    }

    fn param(self) -> &'static str {
        match self {
            TempUnit::Celsius => "celsius",
            TempUnit::Fahrenheit => "fahrenheit",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            TempUnit::Celsius => "°C",
            TempUnit::Fahrenheit => "°F",
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    results: Vec<GeoPlace>,
}

#[derive(Debug, Deserialize)]
struct GeoPlace {
    latitude: Option<f64>,
    longitude: Option<f64>,
    name: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: Option<f64>,
    windspeed: Option<f64>,
}

/// get_weather：按地点查询当前天气
pub struct WeatherTool {
    client: Client,
}

impl WeatherTool {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn lookup(&self, location: &str, unit: TempUnit) -> Result<String, String> {
        let geo: GeoResponse = self
            .client
            .get(GEOCODING_URL)
            .query(&[("name", location), ("count", "1"), ("language", "en"), ("format", "json")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| format!("Weather lookup failed for {location:?}: {e}"))?
            .json()
            .await
            .map_err(|e| format!("Weather lookup failed for {location:?}: {e}"))?;

        let place = geo
            .results
            .into_iter()
            .next()
            .ok_or_else(|| format!("Could not find coordinates for {location:?}."))?;
        let (lat, lon) = match (place.latitude, place.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                return Err(format!(
                    "Geocoding did not return usable coordinates for {location:?}."
                ))
            }
        };

        let forecast: ForecastResponse = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current_weather", "true".to_string()),
                ("temperature_unit", unit.param().to_string()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| format!("Weather API request failed for {location:?}: {e}"))?
            .json()
            .await
            .map_err(|e| format!("Weather API request failed for {location:?}: {e}"))?;

        let current = forecast
            .current_weather
            .ok_or_else(|| format!("Weather data was unavailable for {location:?}."))?;
        let temp = current
            .temperature
            .ok_or_else(|| format!("Weather data was unavailable for {location:?}."))?;

        let name = place.name.unwrap_or_else(|| location.to_string());
        Ok(format_report(
            &name,
            place.country.as_deref().unwrap_or(""),
            temp,
            current.windspeed,
            unit,
        ))
    }
}

fn format_report(name: &str, country: &str, temp: f64, wind: Option<f64>, unit: TempUnit) -> String {
    let place = if country.is_empty() {
        name.to_string()
    } else {
        format!("{name}, {country}")
    };
    let wind_part = wind
        .map(|w| format!(" Windspeed ~{w} km/h."))
        .unwrap_or_default();
    format!(
        "Current weather for {place}: approximately {temp}{}.{wind_part} Data sourced from the Open-Meteo APIs.",
        unit.suffix()
    )
}

#[async_trait]
impl Tool for WeatherTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature::of::<WeatherArgs>(
            "get_weather",
            "Fetch current weather conditions for a location. Use only for current or \
             near-term conditions at a specific place.",
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let args: WeatherArgs = decode_args(args)?;
        let unit = TempUnit::parse(args.unit.as_deref());
        Ok(self.lookup(args.location.trim(), unit).await?)
    }
}
