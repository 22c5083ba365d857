//! National Weather Service alerts client and the tool implementations
//! built on it.
//!
//! Network and parse failures stay internal as `Result`s so tests and logs
//! can tell them apart; the tool functions collapse every failure to one of
//! the fixed user-facing messages and never error themselves.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub const NWS_API_BASE: &str = "https://api.weather.gov";
pub const USER_AGENT: &str = "weather-app/1.0";

/// Fetch order for `get_north_america_alerts`: 10 US states, then 10
/// Canadian provinces. The NWS API only carries US alerts, so the provinces
/// normally come back with an empty feature list.
pub const NORTH_AMERICA_REGIONS: [&str; 20] = [
    "CA", "TX", "FL", "NY", "IL", "PA", "OH", "GA", "NC", "MI", // US states
    "BC", "AB", "ON", "QC", "NS", "NB", "MB", "SK", "NL", "PE", // Canadian provinces
];

/// Process-wide settings for the NWS client. Initialized once at startup and
/// never mutated (see `WEATHER_CONFIG` in `main.rs`).
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub api_base: String,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_base: NWS_API_BASE.to_string(),
            user_agent: USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Active-alerts response. `features: None` (key absent) and
/// `Some(vec![])` (present but empty) are distinct states and produce
/// different user-facing messages.
#[derive(Debug, Default, Deserialize)]
pub struct AlertCollection {
    pub features: Option<Vec<AlertFeature>>,
}

/// One alert record from the feature collection. A feature without a
/// `properties` key deserializes to all-default properties rather than
/// failing, so every field renders as its placeholder.
#[derive(Debug, Default, Deserialize)]
pub struct AlertFeature {
    #[serde(default)]
    pub properties: AlertProperties,
}

/// Descriptive fields of one alert. All optional; a missing value renders as
/// the placeholder noted on the field.
#[derive(Debug, Default, Deserialize)]
pub struct AlertProperties {
    /// Placeholder: "Unknown".
    pub event: Option<String>,
    /// Placeholder: "Unknown".
    #[serde(rename = "areaDesc")]
    pub area_desc: Option<String>,
    /// Placeholder: "Unknown".
    pub severity: Option<String>,
    /// Placeholder: "No description available".
    pub description: Option<String>,
    /// Placeholder: "No specific instructions provided".
    pub instruction: Option<String>,
}

/// Client for the NWS active-alerts endpoint.
pub struct NwsClient {
    client: reqwest::Client,
    api_base: String,
}

impl NwsClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/geo+json"));

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
        })
    }

    fn alert_url(&self, region: &str) -> String {
        let api_base = &self.api_base;
        format!("{api_base}/alerts/active/area/{region}")
    }

    /// Single GET returning the parsed JSON body. Transport errors, non-2xx
    /// statuses and unparsable bodies all surface as `Err`.
    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!("Fetching {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("Request to {url} returned an error status"))?;

        response
            .json()
            .await
            .with_context(|| format!("Response from {url} was not valid JSON"))
    }

    /// Fetch the active alerts for a two-letter state or province code. The
    /// code is not validated; an unknown code just yields whatever the API
    /// returns (normally no features).
    pub async fn active_alerts(&self, region: &str) -> Result<AlertCollection> {
        let url = self.alert_url(region);
        let body = self.get_json(&url).await?;
        serde_json::from_value(body)
            .with_context(|| format!("Unexpected alert response shape from {url}"))
    }
}

/// Render one alert as five labeled lines, substituting the placeholder for
/// any missing field.
pub fn format_alert(feature: &AlertFeature) -> String {
    let props = &feature.properties;
    format!(
        "Event: {}\nArea: {}\nSeverity: {}\nDescription: {}\nInstructions: {}",
        props.event.as_deref().unwrap_or("Unknown"),
        props.area_desc.as_deref().unwrap_or("Unknown"),
        props.severity.as_deref().unwrap_or("Unknown"),
        props.description.as_deref().unwrap_or("No description available"),
        props
            .instruction
            .as_deref()
            .unwrap_or("No specific instructions provided"),
    )
}

/// Collapse a fetch outcome to the user-facing text for one region.
fn render_alerts(outcome: Result<AlertCollection>) -> String {
    let collection = match outcome {
        Ok(collection) => collection,
        Err(err) => {
            warn!("Alert fetch failed: {err:#}");
            return "Unable to fetch alerts or no alerts found.".to_string();
        }
    };

    match collection.features {
        None => "Unable to fetch alerts or no alerts found.".to_string(),
        Some(features) if features.is_empty() => "No active alerts for this state.".to_string(),
        Some(features) => features
            .iter()
            .map(format_alert)
            .collect::<Vec<_>>()
            .join("\n---\n"),
    }
}

/// Get the active weather alerts for a US state.
pub async fn get_alerts(client: &NwsClient, state: &str) -> String {
    render_alerts(client.active_alerts(state).await)
}

/// Get the active weather alerts across the fixed North America region list.
///
/// Regions are fetched strictly one after another; a failed or empty region
/// contributes nothing and never stops the sweep.
pub async fn get_north_america_alerts(client: &NwsClient) -> String {
    let mut all_alerts = Vec::new();
    for region in NORTH_AMERICA_REGIONS {
        match client.active_alerts(region).await {
            Ok(collection) => {
                if let Some(features) = collection.features {
                    all_alerts.extend(features.iter().map(format_alert));
                }
            }
            Err(err) => warn!("Skipping region {region}: {err:#}"),
        }
    }

    if all_alerts.is_empty() {
        "No active alerts found in North America.".to_string()
    } else {
        all_alerts.join("\n---\n")
    }
}

/// Body of the `echo://{message}` resource.
pub fn echo_resource(message: &str) -> String {
    format!("Resource echo: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_feature(value: Value) -> AlertFeature {
        serde_json::from_value(value).unwrap()
    }

    fn parse_collection(value: Value) -> AlertCollection {
        serde_json::from_value(value).unwrap()
    }

    /// Config pointing at a port nothing listens on, so every fetch fails.
    fn unreachable_config() -> WeatherConfig {
        WeatherConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            ..WeatherConfig::default()
        }
    }

    #[test]
    fn test_format_alert_placeholders() {
        let feature = parse_feature(json!({"properties": {"event": "Flood Warning"}}));
        assert_eq!(
            format_alert(&feature),
            "Event: Flood Warning\n\
             Area: Unknown\n\
             Severity: Unknown\n\
             Description: No description available\n\
             Instructions: No specific instructions provided"
        );
    }

    #[test]
    fn test_format_alert_all_fields() {
        let feature = parse_feature(json!({
            "properties": {
                "event": "Tornado Warning",
                "areaDesc": "Dallas County",
                "severity": "Extreme",
                "description": "A tornado has been sighted.",
                "instruction": "Take shelter now."
            }
        }));
        assert_eq!(
            format_alert(&feature),
            "Event: Tornado Warning\n\
             Area: Dallas County\n\
             Severity: Extreme\n\
             Description: A tornado has been sighted.\n\
             Instructions: Take shelter now."
        );
    }

    #[test]
    fn test_feature_without_properties_defaults() {
        let feature = parse_feature(json!({"type": "Feature", "geometry": null}));
        assert!(feature.properties.event.is_none());
        assert!(format_alert(&feature).starts_with("Event: Unknown\n"));
    }

    #[test]
    fn test_collection_missing_vs_empty_features() {
        let missing = parse_collection(json!({"title": "Current watches"}));
        assert!(missing.features.is_none());

        let empty = parse_collection(json!({"features": []}));
        assert_eq!(empty.features.unwrap().len(), 0);
    }

    #[test]
    fn test_render_alerts_fetch_failure() {
        let text = render_alerts(Err(anyhow::anyhow!("connection refused")));
        assert_eq!(text, "Unable to fetch alerts or no alerts found.");
    }

    #[test]
    fn test_render_alerts_missing_features() {
        let text = render_alerts(Ok(parse_collection(json!({}))));
        assert_eq!(text, "Unable to fetch alerts or no alerts found.");
    }

    #[test]
    fn test_render_alerts_empty_features() {
        let text = render_alerts(Ok(parse_collection(json!({"features": []}))));
        assert_eq!(text, "No active alerts for this state.");
    }

    #[test]
    fn test_render_alerts_joins_in_input_order() {
        let collection = parse_collection(json!({
            "features": [
                {"properties": {"event": "First"}},
                {"properties": {"event": "Second"}},
                {"properties": {"event": "Third"}}
            ]
        }));
        let text = render_alerts(Ok(collection));

        let blocks: Vec<&str> = text.split("\n---\n").collect();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].starts_with("Event: First\n"));
        assert!(blocks[1].starts_with("Event: Second\n"));
        assert!(blocks[2].starts_with("Event: Third\n"));
    }

    #[test]
    fn test_region_list_order() {
        assert_eq!(NORTH_AMERICA_REGIONS.len(), 20);
        assert_eq!(NORTH_AMERICA_REGIONS[0], "CA");
        assert_eq!(NORTH_AMERICA_REGIONS[9], "MI");
        assert_eq!(NORTH_AMERICA_REGIONS[10], "BC");
        assert_eq!(NORTH_AMERICA_REGIONS[19], "PE");
    }

    #[test]
    fn test_alert_url() {
        let client = NwsClient::new(&WeatherConfig::default()).unwrap();
        assert_eq!(
            client.alert_url("TX"),
            "https://api.weather.gov/alerts/active/area/TX"
        );
    }

    #[test]
    fn test_echo_resource() {
        assert_eq!(echo_resource("hi"), "Resource echo: hi");
    }

    #[tokio::test]
    async fn test_get_alerts_unreachable_api() {
        let client = NwsClient::new(&unreachable_config()).unwrap();
        let text = get_alerts(&client, "CA").await;
        assert_eq!(text, "Unable to fetch alerts or no alerts found.");
    }

    #[tokio::test]
    async fn test_north_america_all_regions_failing() {
        // Every one of the 20 fetches fails; the sweep must still finish and
        // report the empty-accumulation message rather than erroring.
        let client = NwsClient::new(&unreachable_config()).unwrap();
        let text = get_north_america_alerts(&client).await;
        assert_eq!(text, "No active alerts found in North America.");
    }

    // Requires network access. Run with: cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_live_alert_fetch() {
        let client = NwsClient::new(&WeatherConfig::default()).unwrap();
        let collection = client.active_alerts("CA").await.unwrap();
        assert!(collection.features.is_some());
    }
}
