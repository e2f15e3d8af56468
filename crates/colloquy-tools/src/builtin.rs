//! Built-in tools: calculator, weather lookup, and current date.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use colloquy_common::tools::{Function, Parameters, Property, Tool};

use crate::ToolImplementation;

/// Formats a float the way a person would write it: no trailing zeros,
/// no decimal point for whole numbers.
fn format_number(value: f64) -> String {
    let formatted = format!("{value}");
    if formatted == "-0" {
        "0".to_string()
    } else {
        formatted
    }
}

/// Performs basic arithmetic on two numbers.
pub struct CalculatorTool;

#[derive(Deserialize)]
struct CalculatorArgs {
    operation: String,
    a: f64,
    b: f64,
}

#[async_trait]
impl ToolImplementation for CalculatorTool {
    fn definition(&self) -> Tool {
        let mut properties = HashMap::new();
        properties.insert(
            "operation".to_string(),
            Property::string_enum(
                "The mathematical operation to perform",
                vec!["add", "subtract", "multiply", "divide"],
            ),
        );
        properties.insert("a".to_string(), Property::number("First number"));
        properties.insert("b".to_string(), Property::number("Second number"));

        Tool {
            r#type: "function".to_string(),
            function: Function {
                name: "calculate".to_string(),
                description:
                    "Perform basic mathematical calculations (add, subtract, multiply, divide)"
                        .to_string(),
                parameters: Parameters::new(
                    properties,
                    vec!["operation".into(), "a".into(), "b".into()],
                )
                .into(),
            },
        }
    }

    async fn execute(&self, args: &Value) -> Result<String> {
        let args: CalculatorArgs = serde_json::from_value(args.clone())
            .map_err(|e| anyhow::anyhow!("failed to parse calculator arguments: {e}"))?;

        let (result, symbol) = match args.operation.to_lowercase().as_str() {
            "add" => (args.a + args.b, "+"),
            "subtract" => (args.a - args.b, "-"),
            "multiply" => (args.a * args.b, "*"),
            "divide" => {
                if args.b == 0.0 {
                    // In-band error: the model should see this and recover
                    return Ok("Error: Division by zero is not allowed".to_string());
                }
                (args.a / args.b, "/")
            }
            other => anyhow::bail!("unsupported operation: {other}"),
        };

        Ok(format!(
            "{} {} {} = {}",
            format_number(args.a),
            symbol,
            format_number(args.b),
            format_number(result)
        ))
    }
}

/// Returns the current date and time in RFC 3339 format.
pub struct CurrentDateTool;

#[async_trait]
impl ToolImplementation for CurrentDateTool {
    fn definition(&self) -> Tool {
        Tool {
            r#type: "function".to_string(),
            function: Function {
                name: "get_today_date".to_string(),
                description: "Get today's date and time in RFC3339 format".to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {},
                }),
            },
        }
    }

    async fn execute(&self, _args: &Value) -> Result<String> {
        Ok(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

const WEATHER_API_KEY_ENV: &str = "WEATHER_API_KEY";
const WEATHER_CURRENT_URL: &str = "http://api.weatherapi.com/v1/current.json";
const WEATHER_FORECAST_URL: &str = "http://api.weatherapi.com/v1/forecast.json";

/// Fetches current conditions (and optionally a short forecast) from
/// weatherapi.com.
///
/// The API key is read from the `WEATHER_API_KEY` environment variable at
/// execution time; a missing key produces an in-band unavailability message
/// rather than an error.
pub struct WeatherTool {
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct WeatherArgs {
    location: String,
    #[serde(default)]
    forecast: bool,
}

#[derive(Deserialize)]
struct WeatherApiResponse {
    location: WeatherLocation,
    current: WeatherCurrent,
    #[serde(default)]
    forecast: WeatherForecast,
}

#[derive(Deserialize)]
struct WeatherLocation {
    name: String,
    country: String,
}

#[derive(Deserialize)]
struct WeatherCurrent {
    temp_c: f64,
    condition: WeatherCondition,
    wind_kph: f64,
    humidity: i64,
    feelslike_c: f64,
}

#[derive(Deserialize)]
struct WeatherCondition {
    text: String,
}

#[derive(Deserialize, Default)]
struct WeatherForecast {
    #[serde(rename = "forecastday", default)]
    forecast_day: Vec<WeatherForecastDay>,
}

#[derive(Deserialize)]
struct WeatherForecastDay {
    date: String,
    day: WeatherDay,
}

#[derive(Deserialize)]
struct WeatherDay {
    maxtemp_c: f64,
    mintemp_c: f64,
    condition: WeatherCondition,
}

impl WeatherTool {
    /// Creates a weather tool with a 10-second request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ToolImplementation for WeatherTool {
    fn definition(&self) -> Tool {
        Tool {
            r#type: "function".to_string(),
            function: Function {
                name: "get_weather".to_string(),
                description:
                    "Get current weather and forecast information for a specified location"
                        .to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "location": {
                            "type": "string",
                            "description": "City name, coordinates, or location query"
                        },
                        "forecast": {
                            "type": "boolean",
                            "description": "Include forecast information (optional)"
                        }
                    },
                    "required": ["location"]
                }),
            },
        }
    }

    async fn execute(&self, args: &Value) -> Result<String> {
        let args: WeatherArgs = serde_json::from_value(args.clone())
            .map_err(|e| anyhow::anyhow!("invalid arguments: {e}"))?;

        let Ok(api_key) = std::env::var(WEATHER_API_KEY_ENV) else {
            return Ok("Weather service unavailable: API key not configured".to_string());
        };
        if api_key.is_empty() {
            return Ok("Weather service unavailable: API key not configured".to_string());
        }

        let base_url = if args.forecast {
            WEATHER_FORECAST_URL
        } else {
            WEATHER_CURRENT_URL
        };

        let mut query: Vec<(&str, &str)> = vec![
            ("key", api_key.as_str()),
            ("q", args.location.as_str()),
            ("aqi", "no"),
        ];
        if args.forecast {
            query.push(("days", "3"));
        }

        debug!("fetching weather for {}", args.location);

        let response = self
            .client
            .get(base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("weather API request failed: {e}"))?;

        if !response.status().is_success() {
            return Ok(format!(
                "Weather information unavailable for '{}'",
                args.location
            ));
        }

        let weather: WeatherApiResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("failed to parse weather response: {e}"))?;

        let mut result = format!(
            "Weather in {}, {}:\n",
            weather.location.name, weather.location.country
        );
        result.push_str(&format!(
            "Temperature: {:.1}°C (feels like {:.1}°C)\n",
            weather.current.temp_c, weather.current.feelslike_c
        ));
        result.push_str(&format!("Condition: {}\n", weather.current.condition.text));
        result.push_str(&format!("Wind: {:.1} km/h\n", weather.current.wind_kph));
        result.push_str(&format!("Humidity: {}%", weather.current.humidity));

        if args.forecast && !weather.forecast.forecast_day.is_empty() {
            result.push_str("\n\nForecast:\n");
            for day in &weather.forecast.forecast_day {
                result.push_str(&format!(
                    "{}: {}, {:.1}°C - {:.1}°C\n",
                    day.date, day.day.condition.text, day.day.mintemp_c, day.day.maxtemp_c
                ));
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_calculator_addition() {
        let result = CalculatorTool
            .execute(&json!({"operation": "add", "a": 5, "b": 3}))
            .await
            .unwrap();
        assert_eq!(result, "5 + 3 = 8");
    }

    #[tokio::test]
    async fn test_calculator_subtraction() {
        let result = CalculatorTool
            .execute(&json!({"operation": "subtract", "a": 10, "b": 4}))
            .await
            .unwrap();
        assert_eq!(result, "10 - 4 = 6");
    }

    #[tokio::test]
    async fn test_calculator_multiplication() {
        let result = CalculatorTool
            .execute(&json!({"operation": "multiply", "a": 6, "b": 7}))
            .await
            .unwrap();
        assert_eq!(result, "6 * 7 = 42");
    }

    #[tokio::test]
    async fn test_calculator_division() {
        let result = CalculatorTool
            .execute(&json!({"operation": "divide", "a": 15, "b": 3}))
            .await
            .unwrap();
        assert_eq!(result, "15 / 3 = 5");
    }

    #[tokio::test]
    async fn test_calculator_division_by_zero_is_in_band() {
        let result = CalculatorTool
            .execute(&json!({"operation": "divide", "a": 10, "b": 0}))
            .await
            .unwrap();
        assert_eq!(result, "Error: Division by zero is not allowed");
    }

    #[tokio::test]
    async fn test_calculator_fractional_result() {
        let result = CalculatorTool
            .execute(&json!({"operation": "divide", "a": 5, "b": 2}))
            .await
            .unwrap();
        assert_eq!(result, "5 / 2 = 2.5");
    }

    #[tokio::test]
    async fn test_calculator_unsupported_operation() {
        let err = CalculatorTool
            .execute(&json!({"operation": "power", "a": 2, "b": 3}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported operation"));
    }

    #[tokio::test]
    async fn test_calculator_operation_is_case_insensitive() {
        let result = CalculatorTool
            .execute(&json!({"operation": "ADD", "a": 2, "b": 3}))
            .await
            .unwrap();
        assert_eq!(result, "2 + 3 = 5");
    }

    #[tokio::test]
    async fn test_calculator_missing_arguments() {
        let err = CalculatorTool
            .execute(&json!({"operation": "add"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("calculator arguments"));
    }

    #[tokio::test]
    async fn test_current_date_is_rfc3339() {
        let result = CurrentDateTool.execute(&json!({})).await.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&result).is_ok());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(8.0), "8");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn test_definitions_use_declared_names() {
        assert_eq!(CalculatorTool.definition().function.name, "calculate");
        assert_eq!(CurrentDateTool.definition().function.name, "get_today_date");
        assert_eq!(
            WeatherTool::new().unwrap().definition().function.name,
            "get_weather"
        );
    }

    #[test]
    fn test_calculator_schema_declares_operation_enum() {
        let def = CalculatorTool.definition();
        let params = def.function.parameters;
        assert_eq!(
            params["properties"]["operation"]["enum"],
            json!(["add", "subtract", "multiply", "divide"])
        );
        let required = params["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);
    }
}
