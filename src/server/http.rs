//! Direct HTTP surface: plain JSON over GET, no MCP framing.
//!
//! Routing is resolved from the path before anything is fetched, so unknown
//! paths and parameter names never touch the station. Every response carries
//! `Content-Type: application/json` and permissive CORS headers.

use std::collections::HashMap;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use rmcp::model::{CallToolResult, Content};
use serde_json::{Map, Value, json};

use crate::error::ClimaError;
use crate::station::{STATION, WeatherReading};
use crate::tools::{ToolRegistry, WeatherParameter};

const CORS_HEADERS: [(header::HeaderName, &str); 4] = [
    (header::CONTENT_TYPE, "application/json"),
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

/// A resolved GET target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Current,
    Temperature,
    Parameter(WeatherParameter),
    Tools,
    Tool(&'a str),
}

impl<'a> Route<'a> {
    fn parse(path: &'a str) -> Option<Self> {
        match path {
            "/" | "/current" => Some(Route::Current),
            "/temperature" => Some(Route::Temperature),
            "/tools" => Some(Route::Tools),
            _ => {
                if let Some(name) = path.strip_prefix("/parameter/") {
                    name.parse().ok().map(Route::Parameter)
                } else {
                    path.strip_prefix("/tools/")
                        .filter(|name| !name.is_empty())
                        .map(Route::Tool)
                }
            }
        }
    }
}

/// Build the router. All paths go through one fallback so that method and
/// path errors produce this surface's own JSON bodies.
pub fn router(registry: ToolRegistry) -> Router {
    Router::new().fallback(dispatch).with_state(registry)
}

fn respond(status: StatusCode, body: Option<Value>) -> Response {
    let body = body.map(|b| b.to_string()).unwrap_or_default();
    (status, CORS_HEADERS, body).into_response()
}

fn not_found() -> Response {
    respond(
        StatusCode::NOT_FOUND,
        Some(json!({
            "error": "Endpoint not found",
            "available_endpoints": [
                "/current - Get all current weather data",
                "/temperature - Get current temperature",
                format!(
                    "/parameter/{{param}} - Get specific parameter ({})",
                    WeatherParameter::NAMES.join(", ")
                ),
                "/tools - List available tools",
                "/tools/{name}?parameter={param} - Run a tool",
            ]
        })),
    )
}

fn upstream_failure(error: &ClimaError) -> Response {
    tracing::warn!(error = %error, "weather fetch failed");
    respond(
        StatusCode::INTERNAL_SERVER_ERROR,
        Some(json!({
            "error": "Failed to fetch weather data",
            "message": error.to_string(),
        })),
    )
}

fn current_body(reading: &WeatherReading) -> Value {
    json!({
        "station": STATION.station,
        "location": STATION.location,
        "data": reading,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn temperature_body(reading: &WeatherReading) -> Value {
    json!({
        "temperature": reading.temperature,
        "feels_like": reading.wind_chill,
        "unit": "°C",
        "captured_at": reading.captured_at,
    })
}

fn parameter_body(parameter: WeatherParameter, reading: &WeatherReading) -> Value {
    let mut body = Map::new();
    body.insert("parameter".to_string(), json!(parameter.name()));
    body.insert("value".to_string(), parameter.raw_value(reading));
    if let Some(unit) = parameter.unit() {
        body.insert("unit".to_string(), json!(unit));
    }
    body.insert("captured_at".to_string(), json!(reading.captured_at));
    Value::Object(body)
}

fn envelope(result: &CallToolResult) -> Option<Value> {
    serde_json::to_value(result).ok()
}

async fn run_tool(
    registry: &ToolRegistry,
    name: &str,
    query: HashMap<String, String>,
) -> Response {
    let arguments: Map<String, Value> = query
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();

    match registry.call(name, Some(arguments)).await {
        Ok(content) => respond(StatusCode::OK, envelope(&CallToolResult::success(content))),
        Err(e) => {
            let status = match &e {
                ClimaError::UnknownTool(_) => StatusCode::NOT_FOUND,
                ClimaError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::warn!(tool = %name, status = status.as_u16(), error = %e, "HTTP tool call failed");
            respond(
                status,
                envelope(&CallToolResult::error(vec![Content::text(e.to_string())])),
            )
        }
    }
}

async fn dispatch(
    State(registry): State<ToolRegistry>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if method == Method::OPTIONS {
        return respond(StatusCode::OK, None);
    }
    if method != Method::GET {
        return respond(
            StatusCode::METHOD_NOT_ALLOWED,
            Some(json!({
                "error": "Method not allowed",
                "allowed_methods": ["GET", "OPTIONS"],
            })),
        );
    }

    let Some(route) = Route::parse(uri.path()) else {
        tracing::debug!(path = %uri.path(), "no route");
        return not_found();
    };

    let project: fn(&WeatherReading) -> Value = match route {
        Route::Tools => {
            return respond(StatusCode::OK, Some(json!({ "tools": registry.tools() })));
        }
        Route::Tool(name) => return run_tool(&registry, name, query).await,
        Route::Parameter(parameter) => {
            return match registry.reading().await {
                Ok(reading) => respond(StatusCode::OK, Some(parameter_body(parameter, &reading))),
                Err(e) => upstream_failure(&e),
            };
        }
        Route::Current => current_body,
        Route::Temperature => temperature_body,
    };

    match registry.reading().await {
        Ok(reading) => respond(StatusCode::OK, Some(project(&reading))),
        Err(e) => upstream_failure(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::test_support::{Outcome, StubSource, neutral_reading};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Response) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        (response.status(), response)
    }

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn json_of(response: Response) -> Value {
        serde_json::from_str(&body_of(response).await).unwrap()
    }

    #[test]
    fn test_route_parsing() {
        assert_eq!(Route::parse("/"), Some(Route::Current));
        assert_eq!(Route::parse("/current"), Some(Route::Current));
        assert_eq!(
            Route::parse("/parameter/rain_rate"),
            Some(Route::Parameter(WeatherParameter::RainRate))
        );
        assert_eq!(Route::parse("/parameter/fog"), None);
        assert_eq!(Route::parse("/tools/get_temperature"), Some(Route::Tool("get_temperature")));
        assert_eq!(Route::parse("/tools/"), None);
        assert_eq!(Route::parse("/forecast"), None);
    }

    #[tokio::test]
    async fn test_options_is_empty_and_does_not_fetch() {
        let source = StubSource::reading(neutral_reading());
        let app = router(ToolRegistry::new(source.clone()));
        let (status, response) = send(app, "OPTIONS", "/current").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert!(body_of(response).await.is_empty());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_get_is_method_not_allowed() {
        let source = StubSource::reading(neutral_reading());
        let app = router(ToolRegistry::new(source.clone()));
        let (status, response) = send(app, "POST", "/current").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let body = json_of(response).await;
        assert_eq!(body["allowed_methods"], json!(["GET", "OPTIONS"]));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_current_includes_station_and_reading() {
        let app = router(ToolRegistry::new(StubSource::reading(neutral_reading())));
        let (status, response) = send(app, "GET", "/current").await;
        assert_eq!(status, StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["station"], "Facultad de Informática UNLP");
        assert_eq!(body["location"], "La Plata, Argentina");
        assert_eq!(body["data"]["wind_direction"], "NNE");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_root_aliases_current() {
        let app = router(ToolRegistry::new(StubSource::reading(neutral_reading())));
        let (status, response) = send(app, "GET", "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(response).await["data"]["temperature"], 18.0);
    }

    #[tokio::test]
    async fn test_temperature_projection() {
        let app = router(ToolRegistry::new(StubSource::reading(neutral_reading())));
        let (status, response) = send(app, "GET", "/temperature").await;
        assert_eq!(status, StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["temperature"], 18.0);
        assert_eq!(body["feels_like"], 18.0);
        assert_eq!(body["unit"], "°C");
        assert_eq!(body["captured_at"], "2025-07-14T15:30:00Z");
    }

    #[tokio::test]
    async fn test_parameter_with_unit() {
        let app = router(ToolRegistry::new(StubSource::reading(neutral_reading())));
        let (status, response) = send(app, "GET", "/parameter/temperature").await;
        assert_eq!(status, StatusCode::OK);
        let text = body_of(response).await;
        assert!(text.contains(r#""parameter":"temperature""#), "{}", text);
        assert!(text.contains("°C"));
    }

    #[tokio::test]
    async fn test_parameter_without_unit() {
        let app = router(ToolRegistry::new(StubSource::reading(neutral_reading())));
        let (_, response) = send(app, "GET", "/parameter/wind_direction").await;
        let body = json_of(response).await;
        assert_eq!(body["value"], "NNE");
        assert!(body.get("unit").is_none());
    }

    #[tokio::test]
    async fn test_unknown_parameter_is_not_found_without_fetch() {
        let source = StubSource::reading(neutral_reading());
        let app = router(ToolRegistry::new(source.clone()));
        let (status, response) = send(app, "GET", "/parameter/unknownthing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let body = json_of(response).await;
        assert_eq!(body["error"], "Endpoint not found");
        assert!(body["available_endpoints"].as_array().unwrap().len() >= 3);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_500_with_message() {
        let app = router(ToolRegistry::new(StubSource::new(Outcome::Status(503))));
        let (status, response) = send(app, "GET", "/temperature").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_of(response).await;
        assert_eq!(body["error"], "Failed to fetch weather data");
        assert!(body["message"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_tools_catalog() {
        let app = router(ToolRegistry::new(StubSource::reading(neutral_reading())));
        let (status, response) = send(app, "GET", "/tools").await;
        assert_eq!(status, StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["tools"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_tool_call_status_mapping() {
        let source = StubSource::reading(neutral_reading());
        let registry = ToolRegistry::new(source.clone());

        let (status, response) = send(
            router(registry.clone()),
            "GET",
            "/tools/get_weather_parameter?parameter=uv",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = json_of(response).await;
        assert!(body["content"][0]["text"].as_str().unwrap().contains("1 (Low)"));

        let (status, response) = send(
            router(registry.clone()),
            "GET",
            "/tools/get_weather_parameter?parameter=fog",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(response).await["isError"], true);

        let (status, _) = send(router(registry), "GET", "/tools/get_forecast").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert_eq!(source.calls(), 1, "only the valid call may fetch");
    }

    #[tokio::test]
    async fn test_tool_call_upstream_failure_is_500() {
        let app = router(ToolRegistry::new(StubSource::new(Outcome::Unreachable)));
        let (status, response) = send(app, "GET", "/tools/get_temperature").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_of(response).await;
        assert_eq!(body["isError"], true);
        assert!(body["content"][0]["text"].as_str().unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let source = StubSource::reading(neutral_reading());
        let app = router(ToolRegistry::new(source.clone()));
        let (status, _) = send(app, "GET", "/forecast").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(source.calls(), 0);
    }
}
