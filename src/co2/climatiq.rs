// Emission-factor search and estimate against the Climatiq data API.
use super::Co2Estimator;
use crate::model::{Co2Error, Co2Estimate};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.climatiq.io";
pub const DEFAULT_DATA_VERSION: &str = "^21";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResult {
    activity_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    unit_type: String,
}

#[derive(Debug, Deserialize)]
struct EstimateResponse {
    co2e: f64,
    co2e_unit: String,
    #[serde(default)]
    emission_factor: Option<EstimateFactor>,
}

#[derive(Debug, Deserialize)]
struct EstimateFactor {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Free-text phrasings tried in order until one yields a weight-based factor.
pub fn query_phrasings(material: &str) -> Vec<String> {
    vec![
        material.to_string(),
        format!("{} production", material),
        format!("{} material", material),
    ]
}

pub struct ClimatiqClient {
    client: Client,
    api_key: String,
    base_url: String,
    data_version: String,
}

impl ClimatiqClient {
    pub fn new(api_key: &str, base_url: &str, data_version: &str) -> Result<Self, Co2Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Co2Error::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            data_version: data_version.to_string(),
        })
    }

    async fn error_from(response: Response) -> Co2Error {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("CO2 API request failed with status {}", status)
                } else {
                    body.trim().to_string()
                }
            });
        warn!("❌ CO2 API responded [{}]: {}", status, message);
        Co2Error::Api { status, message }
    }

    async fn search_weight_factor(&self, query: &str) -> Result<Option<SearchResult>, Co2Error> {
        let url = format!("{}/data/v1/search", self.base_url);
        debug!("Searching emission factors for '{}'", query);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("query", query), ("data_version", self.data_version.as_str())])
            .send()
            .await
            .map_err(|e| Co2Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let search: SearchResponse = response.json().await.map_err(|e| Co2Error::Http(e.to_string()))?;
        Ok(search
            .results
            .into_iter()
            .find(|r| r.unit_type.eq_ignore_ascii_case("weight")))
    }

    async fn request_estimate(&self, factor: &SearchResult, weight_kg: f64) -> Result<Co2Estimate, Co2Error> {
        let url = format!("{}/data/v1/estimate", self.base_url);
        let body = json!({
            "emission_factor": {
                "activity_id": factor.activity_id,
                "data_version": self.data_version,
            },
            "parameters": {
                "weight": weight_kg,
                "weight_unit": "kg",
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Co2Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let estimate: EstimateResponse = response.json().await.map_err(|e| Co2Error::Http(e.to_string()))?;
        Ok(Co2Estimate {
            co2e: estimate.co2e,
            co2e_unit: estimate.co2e_unit,
            factor_name: estimate
                .emission_factor
                .and_then(|f| f.name)
                .unwrap_or_else(|| factor.name.clone()),
            unit_type: factor.unit_type.clone(),
        })
    }
}

#[async_trait]
impl Co2Estimator for ClimatiqClient {
    async fn estimate(&self, material: &str, weight_kg: f64) -> Result<Co2Estimate, Co2Error> {
        if self.api_key.is_empty() {
            return Err(Co2Error::MissingApiKey);
        }
        let material = material.trim().to_lowercase();
        if material.is_empty() {
            return Err(Co2Error::InvalidInput("Material is required".into()));
        }
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(Co2Error::InvalidInput("Weight must be a positive number of kg".into()));
        }

        for query in query_phrasings(&material) {
            if let Some(factor) = self.search_weight_factor(&query).await? {
                info!("🌍 Using emission factor '{}' ({}) for '{}'", factor.name, factor.activity_id, query);
                return self.request_estimate(&factor, weight_kg).await;
            }
        }

        Err(Co2Error::NoFactor(material))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ClimatiqClient {
        ClimatiqClient::new("test-key", &server.uri(), DEFAULT_DATA_VERSION).unwrap()
    }

    fn search_body(unit_type: &str) -> serde_json::Value {
        json!({
            "results": [{
                "activity_id": "textiles-type_wool",
                "name": "Wool textiles",
                "unit_type": unit_type
            }]
        })
    }

    #[test]
    fn test_query_phrasings_order() {
        assert_eq!(query_phrasings("wool"), vec!["wool", "wool production", "wool material"]);
    }

    #[tokio::test]
    async fn test_estimate_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/v1/search"))
            .and(query_param("query", "wool"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body("Weight")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/data/v1/estimate"))
            .and(body_partial_json(json!({
                "emission_factor": {"activity_id": "textiles-type_wool"},
                "parameters": {"weight": 0.5, "weight_unit": "kg"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "co2e": 10.25,
                "co2e_unit": "kg",
                "emission_factor": {"name": "Wool textiles"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let estimate = client(&server).estimate(" Wool ", 0.5).await.unwrap();
        assert_eq!(
            estimate,
            Co2Estimate {
                co2e: 10.25,
                co2e_unit: "kg".into(),
                factor_name: "Wool textiles".into(),
                unit_type: "Weight".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_next_phrasing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/v1/search"))
            .and(query_param("query", "wool"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body("Money")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/v1/search"))
            .and(query_param("query", "wool production"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body("Weight")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/data/v1/estimate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"co2e": 3.0, "co2e_unit": "kg"})))
            .mount(&server)
            .await;

        let estimate = client(&server).estimate("wool", 1.0).await.unwrap();
        assert_eq!(estimate.co2e, 3.0);
        assert_eq!(estimate.factor_name, "Wool textiles");
    }

    #[tokio::test]
    async fn test_no_weight_factor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server).estimate("unobtainium", 1.0).await.unwrap_err();
        assert!(matches!(err, Co2Error::NoFactor(ref m) if m == "unobtainium"));
    }

    #[tokio::test]
    async fn test_api_error_message_is_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/v1/search"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "unauthorized",
                "message": "Invalid API key"
            })))
            .mount(&server)
            .await;

        let err = client(&server).estimate("wool", 1.0).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid API key");
        assert!(matches!(err, Co2Error::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_input_validation() {
        let server = MockServer::start().await;
        let c = client(&server);
        assert!(matches!(c.estimate("  ", 1.0).await, Err(Co2Error::InvalidInput(_))));
        assert!(matches!(c.estimate("wool", 0.0).await, Err(Co2Error::InvalidInput(_))));
        assert!(matches!(c.estimate("wool", f64::NAN).await, Err(Co2Error::InvalidInput(_))));

        let keyless = ClimatiqClient::new("", &server.uri(), DEFAULT_DATA_VERSION).unwrap();
        assert!(matches!(keyless.estimate("wool", 1.0).await, Err(Co2Error::MissingApiKey)));
    }
}
