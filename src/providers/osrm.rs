//! Client for an OSRM-compatible routing service, used to turn an ordered
//! stop sequence into road-accurate per-segment durations and distances.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ExternalGeometryConfig;

#[derive(Debug, Error)]
pub enum OsrmError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("API error: {0}")]
    ApiError(String),
}

/// One routed segment between consecutive waypoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteLeg {
    pub duration_seconds: f64,
    pub distance_meters: f64,
}

/// HTTP client for the service's `/route/v1` endpoint.
pub struct OsrmClient {
    client: Client,
    base_url: String,
    profile: String,
}

impl OsrmClient {
    pub fn new(config: &ExternalGeometryConfig) -> Result<Self, OsrmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(5)))
            .build()
            .map_err(|e| OsrmError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            profile: config.profile.clone(),
        })
    }

    /// Fetch the driving legs through `points`, given as (latitude,
    /// longitude) pairs in visit order.
    ///
    /// The service must answer with exactly one leg per consecutive pair;
    /// anything else is an error so the caller can fall back to its own
    /// estimate.
    pub async fn route_legs(&self, points: &[(f64, f64)]) -> Result<Vec<RouteLeg>, OsrmError> {
        if points.len() < 2 {
            return Err(OsrmError::ApiError(
                "need at least two waypoints".to_string(),
            ));
        }

        let url = self.route_url(points);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OsrmError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OsrmError::ApiError(format!(
                "HTTP error: {}",
                response.status().as_u16()
            )));
        }

        let body: RouteResponse = response
            .json()
            .await
            .map_err(|e| OsrmError::ParseError(e.to_string()))?;

        parse_legs(&body, points.len())
    }

    /// `{base}/route/v1/{profile}/{lng},{lat};...` with geometry disabled,
    /// only the leg annotations matter here.
    fn route_url(&self, points: &[(f64, f64)]) -> String {
        let coords = points
            .iter()
            .map(|(lat, lng)| format!("{lng},{lat}"))
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}/route/v1/{}/{}?overview=false&steps=false",
            self.base_url, self.profile, coords
        )
    }
}

fn parse_legs(response: &RouteResponse, point_count: usize) -> Result<Vec<RouteLeg>, OsrmError> {
    if response.code != "Ok" {
        return Err(OsrmError::ApiError(format!(
            "service answered code {:?}",
            response.code
        )));
    }

    let route = response
        .routes
        .first()
        .ok_or_else(|| OsrmError::ApiError("no routes in response".to_string()))?;
    if route.legs.len() != point_count - 1 {
        return Err(OsrmError::ApiError(format!(
            "expected {} legs, got {}",
            point_count - 1,
            route.legs.len()
        )));
    }

    Ok(route
        .legs
        .iter()
        .map(|leg| RouteLeg {
            duration_seconds: leg.duration,
            distance_meters: leg.distance,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    distance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> OsrmClient {
        OsrmClient::new(&ExternalGeometryConfig {
            enabled: true,
            base_url: base_url.to_string(),
            ..ExternalGeometryConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn url_puts_longitude_first_and_strips_trailing_slash() {
        let client = client("https://osrm.example/");
        let url = client.route_url(&[(48.37, 10.89), (48.38, 10.9)]);
        assert_eq!(
            url,
            "https://osrm.example/route/v1/driving/10.89,48.37;10.9,48.38?overview=false&steps=false"
        );
    }

    #[test]
    fn parses_legs_from_service_answer() {
        let body = r#"{
            "code": "Ok",
            "routes": [{
                "legs": [
                    {"duration": 120.5, "distance": 950.0},
                    {"duration": 80.0, "distance": 640.2}
                ]
            }]
        }"#;
        let response: RouteResponse = serde_json::from_str(body).unwrap();
        let legs = parse_legs(&response, 3).unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].duration_seconds, 120.5);
        assert_eq!(legs[1].distance_meters, 640.2);
    }

    #[test]
    fn rejects_non_ok_code() {
        let body = r#"{"code": "NoRoute", "routes": []}"#;
        let response: RouteResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            parse_legs(&response, 2),
            Err(OsrmError::ApiError(_))
        ));
    }

    #[test]
    fn rejects_missing_routes() {
        let body = r#"{"code": "Ok", "routes": []}"#;
        let response: RouteResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            parse_legs(&response, 2),
            Err(OsrmError::ApiError(_))
        ));
    }

    #[test]
    fn rejects_leg_count_mismatch() {
        let body = r#"{
            "code": "Ok",
            "routes": [{"legs": [{"duration": 10.0, "distance": 100.0}]}]
        }"#;
        let response: RouteResponse = serde_json::from_str(body).unwrap();
        assert!(parse_legs(&response, 3).is_err());
        assert!(parse_legs(&response, 2).is_ok());
    }
}
