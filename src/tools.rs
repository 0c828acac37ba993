//! Tool catalog and dispatch.
//!
//! `ToolRegistry` is built once with an explicit reading source and shared
//! read-only by every transport. Each invocation resolves the tool, validates
//! its arguments (before any fetch), pulls a fresh reading, and renders text.
//! `invoke` never fails: every error becomes an `isError` envelope here. `call`
//! keeps the typed error for surfaces that map error kinds to status codes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, Tool};
use serde::{Deserialize, Serialize};

use crate::analysis;
use crate::error::ClimaError;
use crate::format;
use crate::station::{ReadingSource, StationClient, WeatherReading};

/// One station measurement addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherParameter {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
    WindDirection,
    Uv,
    Rain,
    RainRate,
    DewPoint,
    WindChill,
}

impl WeatherParameter {
    pub const ALL: [WeatherParameter; 10] = [
        WeatherParameter::Temperature,
        WeatherParameter::Humidity,
        WeatherParameter::Pressure,
        WeatherParameter::WindSpeed,
        WeatherParameter::WindDirection,
        WeatherParameter::Uv,
        WeatherParameter::Rain,
        WeatherParameter::RainRate,
        WeatherParameter::DewPoint,
        WeatherParameter::WindChill,
    ];

    /// Wire names, in catalog order.
    pub const NAMES: [&'static str; 10] = {
        let mut names = [""; 10];
        let mut i = 0;
        while i < names.len() {
            names[i] = Self::ALL[i].name();
            i += 1;
        }
        names
    };

    pub const fn name(self) -> &'static str {
        match self {
            WeatherParameter::Temperature => "temperature",
            WeatherParameter::Humidity => "humidity",
            WeatherParameter::Pressure => "pressure",
            WeatherParameter::WindSpeed => "wind_speed",
            WeatherParameter::WindDirection => "wind_direction",
            WeatherParameter::Uv => "uv",
            WeatherParameter::Rain => "rain",
            WeatherParameter::RainRate => "rain_rate",
            WeatherParameter::DewPoint => "dew_point",
            WeatherParameter::WindChill => "wind_chill",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WeatherParameter::Temperature => "Temperature",
            WeatherParameter::Humidity => "Humidity",
            WeatherParameter::Pressure => "Pressure",
            WeatherParameter::WindSpeed => "Wind Speed",
            WeatherParameter::WindDirection => "Wind Direction",
            WeatherParameter::Uv => "UV Index",
            WeatherParameter::Rain => "Rain",
            WeatherParameter::RainRate => "Rain Rate",
            WeatherParameter::DewPoint => "Dew Point",
            WeatherParameter::WindChill => "Wind Chill",
        }
    }

    fn icon(self) -> &'static str {
        match self {
            WeatherParameter::Temperature
            | WeatherParameter::DewPoint
            | WeatherParameter::WindChill => "🌡️",
            WeatherParameter::Humidity => "💧",
            WeatherParameter::Pressure => "📊",
            WeatherParameter::WindSpeed => "💨",
            WeatherParameter::WindDirection => "🧭",
            WeatherParameter::Uv => "☀️",
            WeatherParameter::Rain => "🌧️",
            WeatherParameter::RainRate => "⛈️",
        }
    }

    /// Unit of the raw value; `None` for the compass direction and the UV index.
    pub fn unit(self) -> Option<&'static str> {
        match self {
            WeatherParameter::Temperature
            | WeatherParameter::DewPoint
            | WeatherParameter::WindChill => Some("°C"),
            WeatherParameter::Humidity => Some("%"),
            WeatherParameter::Pressure => Some("hPa"),
            WeatherParameter::WindSpeed => Some("km/h"),
            WeatherParameter::Rain => Some("mm"),
            WeatherParameter::RainRate => Some("mm/h"),
            WeatherParameter::WindDirection | WeatherParameter::Uv => None,
        }
    }

    /// Raw value as reported by the station.
    pub fn raw_value(self, reading: &WeatherReading) -> serde_json::Value {
        let number = match self {
            WeatherParameter::WindDirection => {
                return serde_json::Value::String(reading.wind_direction.clone());
            }
            WeatherParameter::Temperature => reading.temperature,
            WeatherParameter::Humidity => reading.humidity,
            WeatherParameter::Pressure => reading.bar,
            WeatherParameter::WindSpeed => reading.wind_speed,
            WeatherParameter::Uv => reading.uv,
            WeatherParameter::Rain => reading.rain,
            WeatherParameter::RainRate => reading.rain_rate,
            WeatherParameter::DewPoint => reading.dew,
            WeatherParameter::WindChill => reading.wind_chill,
        };
        serde_json::json!(number)
    }

    /// Display string with unit, e.g. `1016 hPa` or `6 (High)`.
    pub fn formatted(self, reading: &WeatherReading) -> String {
        match self {
            WeatherParameter::Temperature => format::temperature(reading.temperature),
            WeatherParameter::Humidity => format::humidity(reading.humidity),
            WeatherParameter::Pressure => format::pressure(reading.bar),
            WeatherParameter::WindSpeed => format::wind_speed(reading.wind_speed),
            WeatherParameter::WindDirection => reading.wind_direction.clone(),
            WeatherParameter::Uv => format::uv(reading.uv),
            WeatherParameter::Rain => format::rain(reading.rain),
            WeatherParameter::RainRate => format::rain_rate(reading.rain_rate),
            WeatherParameter::DewPoint => format::temperature(reading.dew),
            WeatherParameter::WindChill => format::temperature(reading.wind_chill),
        }
    }
}

impl fmt::Display for WeatherParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WeatherParameter {
    type Err = ClimaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WeatherParameter::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| {
                ClimaError::InvalidParameter(format!(
                    "'{}' is not one of: {}",
                    s,
                    WeatherParameter::NAMES.join(", ")
                ))
            })
    }
}

/// The operations the registry knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherTool {
    CurrentWeather,
    Temperature,
    Parameter,
    AnalyzeConditions,
}

/// A tool bound to its validated arguments, ready to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolCall {
    CurrentWeather,
    Temperature,
    Parameter(WeatherParameter),
    AnalyzeConditions,
}

impl ToolCall {
    /// Render the tool's text for a reading.
    fn render(self, reading: &WeatherReading) -> String {
        let captured = format::captured_at(&reading.captured_at);
        match self {
            ToolCall::CurrentWeather => [
                "🌡️ **Current Weather Conditions at UNLP**".to_string(),
                String::new(),
                format!("📅 **Captured:** {}", captured),
                String::new(),
                format!("🌡️ **Temperature:** {}", format::temperature(reading.temperature)),
                format!("🌡️ **Feels like:** {}", format::temperature(reading.wind_chill)),
                format!("💧 **Humidity:** {}", format::humidity(reading.humidity)),
                format!("🌡️ **Dew Point:** {}", format::temperature(reading.dew)),
                format!("📊 **Pressure:** {}", format::pressure(reading.bar)),
                format!("💨 **Wind Speed:** {}", format::wind_speed(reading.wind_speed)),
                format!("🧭 **Wind Direction:** {}", reading.wind_direction),
                format!("☀️ **UV Index:** {}", format::uv(reading.uv)),
                format!("🌧️ **Rain:** {}", format::rain(reading.rain)),
                format!("⛈️ **Rain Rate:** {}", format::rain_rate(reading.rain_rate)),
            ]
            .join("\n"),
            ToolCall::Temperature => format!(
                "🌡️ **Temperature at UNLP:** {}\n🌡️ **Feels like:** {}\n\n*Data from {}*",
                format::temperature(reading.temperature),
                format::temperature(reading.wind_chill),
                captured
            ),
            ToolCall::Parameter(parameter) => format!(
                "{} **{}:** {}\n\n*Data from {}*",
                parameter.icon(),
                parameter.label(),
                parameter.formatted(reading),
                captured
            ),
            ToolCall::AnalyzeConditions => format!(
                "**Weather Analysis for UNLP:**\n\n{}\n\n*Based on data from {}*",
                analysis::render_bullets(&analysis::analyze(reading)),
                captured
            ),
        }
    }

    fn failure_message(self, err: &ClimaError) -> String {
        match self {
            ToolCall::CurrentWeather => format!("Error fetching weather data: {}", err),
            ToolCall::Temperature => format!("Error fetching temperature data: {}", err),
            ToolCall::Parameter(p) => format!("Error fetching {} data: {}", p, err),
            ToolCall::AnalyzeConditions => format!("Error analyzing weather conditions: {}", err),
        }
    }
}

/// Schema for a tool's single enumerated argument.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub allowed: &'static [&'static str],
}

/// A named operation in the catalog.
#[derive(Debug, Clone, Copy)]
pub struct ToolDescriptor {
    pub tool: WeatherTool,
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

const PARAMETER_ARG: ParameterSpec = ParameterSpec {
    name: "parameter",
    description: "The weather parameter to retrieve",
    allowed: &WeatherParameter::NAMES,
};

const CATALOG: [ToolDescriptor; 4] = [
    ToolDescriptor {
        tool: WeatherTool::CurrentWeather,
        name: "get_current_weather",
        title: "Get Current Weather",
        description: "Get current weather conditions from Facultad de Informática UNLP weather station",
    },
    ToolDescriptor {
        tool: WeatherTool::Temperature,
        name: "get_temperature",
        title: "Get Temperature",
        description: "Get current temperature from Facultad de Informática UNLP weather station",
    },
    ToolDescriptor {
        tool: WeatherTool::Parameter,
        name: "get_weather_parameter",
        title: "Get Weather Parameter",
        description: "Get a specific weather parameter from Facultad de Informática UNLP weather station",
    },
    ToolDescriptor {
        tool: WeatherTool::AnalyzeConditions,
        name: "analyze_weather_conditions",
        title: "Analyze Weather Conditions",
        description: "Analyze current weather conditions and provide insights",
    },
];

impl ToolDescriptor {
    /// The tool's single argument, if it takes one.
    pub fn parameter(&self) -> Option<ParameterSpec> {
        match self.tool {
            WeatherTool::Parameter => Some(PARAMETER_ARG),
            WeatherTool::CurrentWeather
            | WeatherTool::Temperature
            | WeatherTool::AnalyzeConditions => None,
        }
    }

    /// JSON Schema for the tool's arguments.
    pub fn input_schema(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        if let Some(spec) = self.parameter() {
            properties.insert(
                spec.name.to_string(),
                serde_json::json!({
                    "type": "string",
                    "enum": spec.allowed,
                    "description": spec.description,
                }),
            );
            required.push(spec.name);
        }
        let schema = serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        });
        schema.as_object().cloned().unwrap_or_default()
    }

    /// Render as an MCP tool definition.
    pub fn to_mcp_tool(&self) -> Tool {
        Tool {
            name: self.name.into(),
            title: Some(self.title.into()),
            description: Some(self.description.into()),
            input_schema: Arc::new(self.input_schema()),
            output_schema: None,
            annotations: None,
            icons: None,
            meta: None,
        }
    }

    /// Validate arguments and bind them to the tool.
    ///
    /// Tools without a parameter ignore whatever they are given.
    fn bind(
        &self,
        arguments: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> crate::Result<ToolCall> {
        match self.tool {
            WeatherTool::CurrentWeather => Ok(ToolCall::CurrentWeather),
            WeatherTool::Temperature => Ok(ToolCall::Temperature),
            WeatherTool::AnalyzeConditions => Ok(ToolCall::AnalyzeConditions),
            WeatherTool::Parameter => {
                required_parameter(&PARAMETER_ARG, arguments).map(ToolCall::Parameter)
            }
        }
    }
}

fn required_parameter(
    spec: &ParameterSpec,
    arguments: Option<&serde_json::Map<String, serde_json::Value>>,
) -> crate::Result<WeatherParameter> {
    let value = arguments.and_then(|args| args.get(spec.name)).ok_or_else(|| {
        ClimaError::InvalidParameter(format!("missing required argument '{}'", spec.name))
    })?;
    let raw = value.as_str().ok_or_else(|| {
        ClimaError::InvalidParameter(format!("argument '{}' must be a string", spec.name))
    })?;
    raw.parse()
}

/// The shared operation catalog plus the source it reads from.
#[derive(Clone)]
pub struct ToolRegistry {
    source: Arc<dyn ReadingSource>,
    catalog: &'static [ToolDescriptor],
}

impl ToolRegistry {
    /// Build a registry over an explicit reading source.
    pub fn new(source: Arc<dyn ReadingSource>) -> Self {
        Self {
            source,
            catalog: &CATALOG,
        }
    }

    /// Registry over the live station endpoint.
    pub fn for_station() -> crate::Result<Self> {
        Ok(Self::new(Arc::new(StationClient::new()?)))
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        self.catalog
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.catalog.iter().find(|d| d.name == name)
    }

    /// The catalog as MCP tool definitions, in registration order.
    pub fn tools(&self) -> Vec<Tool> {
        self.catalog.iter().map(ToolDescriptor::to_mcp_tool).collect()
    }

    /// Fetch a fresh reading from the underlying source.
    pub async fn reading(&self) -> crate::Result<WeatherReading> {
        self.source.fetch().await
    }

    fn resolve(
        &self,
        name: &str,
        arguments: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> crate::Result<ToolCall> {
        self.descriptor(name)
            .ok_or_else(|| ClimaError::UnknownTool(name.to_string()))?
            .bind(arguments)
    }

    async fn run(&self, call: ToolCall) -> crate::Result<String> {
        let reading = self.reading().await?;
        Ok(call.render(&reading))
    }

    /// Run a tool, keeping the typed error for callers that map error kinds.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> crate::Result<Vec<Content>> {
        let call = self.resolve(name, arguments.as_ref())?;
        let text = self.run(call).await?;
        Ok(vec![Content::text(text)])
    }

    /// Run a tool and fold any failure into an `isError` envelope.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> CallToolResult {
        let call = match self.resolve(name, arguments.as_ref()) {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "rejected tool call");
                return CallToolResult::error(vec![Content::text(e.to_string())]);
            }
        };

        match self.run(call).await {
            Ok(text) => {
                tracing::debug!(tool = %name, "tool call succeeded");
                CallToolResult::success(vec![Content::text(text)])
            }
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "tool call failed");
                CallToolResult::error(vec![Content::text(call.failure_message(&e))])
            }
        }
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.catalog.iter().map(|d| d.name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) fn text_of(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|c| c.as_text().map(|t| t.text.clone()))
        .collect::<Vec<_>>()
        .join("\n")
}
