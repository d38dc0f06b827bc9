//! Estimation service client.
//!
//! The service is a black box: a request names an activity and carries dimension-specific
//! parameters, the response carries an emission value and its unit.

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{ConfigError, EstimationError};
use crate::normalize::{BaseUnit, EnergyKind};

/// Identifies the factor the service should apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissionFactorRef {
    pub activity_id: String,
    pub data_version: String,
}

/// Dimension-specific request parameters, serialized without a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Parameters {
    Weight {
        weight: f64,
        weight_unit: &'static str,
    },
    WeightDistance {
        weight: f64,
        weight_unit: &'static str,
        distance: f64,
        distance_unit: &'static str,
    },
    Energy {
        energy: f64,
        energy_unit: &'static str,
    },
    Volume {
        volume: f64,
        volume_unit: &'static str,
    },
}

impl Parameters {
    pub fn weight(weight_kg: f64) -> Self {
        Parameters::Weight {
            weight: weight_kg,
            weight_unit: BaseUnit::Kilogram.symbol(),
        }
    }

    pub fn weight_distance(weight_kg: f64, distance_km: f64) -> Self {
        Parameters::WeightDistance {
            weight: weight_kg,
            weight_unit: BaseUnit::Kilogram.symbol(),
            distance: distance_km,
            distance_unit: BaseUnit::Kilometer.symbol(),
        }
    }

    /// Parameters for an energy record. `value` is already in the base unit of `kind`.
    pub fn for_energy(kind: EnergyKind, value: f64) -> Self {
        let unit = kind.dimension().base_unit().symbol();
        match kind {
            EnergyKind::Electricity => Parameters::Energy {
                energy: value,
                energy_unit: unit,
            },
            EnergyKind::NaturalGas | EnergyKind::LiquidFuel => Parameters::Volume {
                volume: value,
                volume_unit: unit,
            },
        }
    }
}

/// One estimation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationRequest {
    pub emission_factor: EmissionFactorRef,
    pub parameters: Parameters,
}

impl EstimationRequest {
    pub fn new(activity_id: &str, data_version: &str, parameters: Parameters) -> Self {
        Self {
            emission_factor: EmissionFactorRef {
                activity_id: activity_id.to_string(),
                data_version: data_version.to_string(),
            },
            parameters,
        }
    }
}

/// Successful service answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Estimate {
    pub co2e: f64,
    pub co2e_unit: String,
}

impl Estimate {
    /// Reject estimates that cannot be stored as emissions.
    pub fn validated(self) -> Result<Self, EstimationError> {
        if self.co2e.is_finite() && self.co2e >= 0.0 {
            Ok(self)
        } else {
            Err(EstimationError::InvalidEstimate { value: self.co2e })
        }
    }
}

/// Synchronous request/response to the estimation service.
///
/// Implementations must be shareable across worker threads.
pub trait EstimationClient: Send + Sync {
    fn estimate(&self, request: &EstimationRequest) -> Result<Estimate, EstimationError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Blocking HTTP client for the estimation service.
pub struct HttpEstimationClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl HttpEstimationClient {
    pub fn new(api: &ApiConfig) -> Result<Self, ConfigError> {
        let api_key = api.resolved_api_key().ok_or_else(|| ConfigError::Invalid {
            message: format!(
                "no API key configured (set api.api_key or {})",
                crate::config::API_KEY_ENV
            ),
        })?;
        let http = Client::builder()
            .timeout(api.timeout())
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            endpoint: api.endpoint.clone(),
            api_key,
        })
    }
}

impl std::fmt::Debug for HttpEstimationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEstimationClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl EstimationClient for HttpEstimationClient {
    fn estimate(&self, request: &EstimationRequest) -> Result<Estimate, EstimationError> {
        debug!(activity_id = %request.emission_factor.activity_id, "calling estimation service");
        let resp = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message.or(b.error))
                .unwrap_or(body);
            return Err(EstimationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<Estimate>()
            .map_err(|e| EstimationError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_matches_service_contract() {
        let req = EstimationRequest::new(
            "freight_vehicle-type_truck",
            "^21",
            Parameters::weight_distance(453.592, 160.934),
        );
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "emission_factor": {"activity_id": "freight_vehicle-type_truck", "data_version": "^21"},
                "parameters": {"weight": 453.592, "weight_unit": "kg", "distance": 160.934, "distance_unit": "km"}
            })
        );
    }

    #[test]
    fn energy_kind_picks_parameter_shape() {
        assert_eq!(
            serde_json::to_value(Parameters::for_energy(EnergyKind::Electricity, 10.0)).unwrap(),
            json!({"energy": 10.0, "energy_unit": "kWh"})
        );
        assert_eq!(
            serde_json::to_value(Parameters::for_energy(EnergyKind::NaturalGas, 3.0)).unwrap(),
            json!({"volume": 3.0, "volume_unit": "m3"})
        );
        assert_eq!(
            serde_json::to_value(Parameters::for_energy(EnergyKind::LiquidFuel, 40.0)).unwrap(),
            json!({"volume": 40.0, "volume_unit": "l"})
        );
    }

    #[test]
    fn response_ignores_extra_fields() {
        let est: Estimate = serde_json::from_value(json!({
            "co2e": 12.5, "co2e_unit": "kg", "co2e_calculation_method": "ar4"
        }))
        .unwrap();
        assert_eq!(est.co2e, 12.5);
    }

    #[test]
    fn negative_or_nan_estimates_are_rejected() {
        for co2e in [-1.0, f64::NAN, f64::INFINITY] {
            let est = Estimate {
                co2e,
                co2e_unit: "kg".into(),
            };
            assert!(matches!(
                est.validated(),
                Err(EstimationError::InvalidEstimate { .. })
            ));
        }
    }
}
