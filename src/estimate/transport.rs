//! Freight transport estimates.
//!
//! Every record's mode, the intermodal sentinel included, must pass the transport allow-list.
//! Single-mode records are one mass+distance request. Records whose mode is the intermodal
//! sentinel are split into legs following the configured distribution: each allowed leg with a
//! factor is estimated on `distance_km * proportion` with the full record mass, and the record
//! total is the sum of its legs.
//!
//! Legs that are disallowed or have no factor are dropped without rescaling the others, so a
//! record's legs can cover less than its `distance_km`. The persisted record keeps the full
//! distance and lists only the legs that were estimated. A leg answered in a different unit
//! than the first estimated leg is treated as failed.

use tracing::{debug, warn};

use crate::config::{lookup_key, AllowList, EmissionFactorTable, IntermodalConfig, PipelineConfig};
use crate::error::EstimationError;
use crate::normalize::{ResolvedSchema, TransportRecord};
use crate::types::{Category, RawRecord};

use super::{
    round_to, CategoryEstimator, EmissionResult, EstimationClient, EstimationRequest, LegEstimate,
    Parameters, RecordOutcome, ResultDetail, SkipReason,
};

pub struct TransportEstimator<'a> {
    client: &'a dyn EstimationClient,
    factors: &'a EmissionFactorTable,
    allowed: &'a AllowList,
    intermodal: &'a IntermodalConfig,
    sentinel: String,
    data_version: &'a str,
}

impl<'a> TransportEstimator<'a> {
    pub fn new(config: &'a PipelineConfig, client: &'a dyn EstimationClient) -> Self {
        Self {
            client,
            factors: &config.emission_factors,
            allowed: &config.allowed_transport_modes,
            intermodal: &config.intermodal_config,
            sentinel: lookup_key(&config.intermodal_config.sentinel_mode),
            data_version: &config.api.data_version,
        }
    }

    fn is_intermodal(&self, record: &TransportRecord) -> bool {
        self.intermodal.enabled && record.mode == self.sentinel
    }

    fn request(&self, activity_id: &str, weight_kg: f64, distance_km: f64) -> EstimationRequest {
        EstimationRequest::new(
            activity_id,
            self.data_version,
            Parameters::weight_distance(weight_kg, distance_km),
        )
    }

    fn estimate_single(&self, record: &TransportRecord) -> RecordOutcome {
        let Some(activity_id) = self.factors.lookup(Category::Transport, &record.mode) else {
            return RecordOutcome::Skipped(SkipReason::MissingFactor {
                key: record.mode.clone(),
            });
        };

        let request = self.request(activity_id, record.weight_kg, record.distance_km);
        match self.client.estimate(&request).and_then(|e| e.validated()) {
            Ok(estimate) => RecordOutcome::Estimated(EmissionResult {
                entity: record.entity.clone(),
                detail: ResultDetail::Transport {
                    product: record.product.clone(),
                    mode: record.mode.clone(),
                    weight_kg: round_to(record.weight_kg, 2),
                    distance_km: round_to(record.distance_km, 2),
                    tonne_km: Some(round_to(record.tonne_km(), 4)),
                    legs: Vec::new(),
                },
                emissions_kg_co2e: round_to(estimate.co2e, 4),
                unit: estimate.co2e_unit,
                source_file: record.source_file.clone(),
            }),
            Err(err) => RecordOutcome::Failed(err),
        }
    }

    fn estimate_intermodal(&self, record: &TransportRecord) -> RecordOutcome {
        let mut legs = Vec::new();
        let mut total = 0.0;
        let mut unit: Option<String> = None;
        let mut last_error: Option<EstimationError> = None;

        for (mode, proportion) in self.intermodal.default_leg_distribution.iter() {
            let mode = lookup_key(mode);
            if !self.allowed.permits(&mode) {
                debug!(entity = %record.entity, %mode, "intermodal leg not allowed");
                continue;
            }
            let Some(activity_id) = self.factors.lookup(Category::Transport, &mode) else {
                warn!(entity = %record.entity, %mode, "no emission factor for intermodal leg");
                continue;
            };

            let leg_distance = record.distance_km * proportion;
            let request = self.request(activity_id, record.weight_kg, leg_distance);
            let answer = self.client.estimate(&request).and_then(|e| e.validated());
            let answer = answer.and_then(|estimate| match &unit {
                Some(first) if *first != estimate.co2e_unit => Err(EstimationError::InvalidResponse(format!(
                    "leg unit '{}' differs from '{first}'",
                    estimate.co2e_unit
                ))),
                _ => Ok(estimate),
            });
            match answer {
                Ok(estimate) => {
                    total += estimate.co2e;
                    unit.get_or_insert(estimate.co2e_unit);
                    legs.push(LegEstimate {
                        mode,
                        distance_km: round_to(leg_distance, 2),
                        proportion: *proportion,
                        emissions_kg_co2e: round_to(estimate.co2e, 4),
                    });
                }
                Err(err) => {
                    warn!(entity = %record.entity, %mode, reason = %err, "intermodal leg failed");
                    last_error = Some(err);
                }
            }
        }

        if legs.is_empty() {
            return match last_error {
                Some(err) => RecordOutcome::Failed(err),
                None => RecordOutcome::Skipped(SkipReason::NoSurvivingLegs),
            };
        }

        RecordOutcome::Estimated(EmissionResult {
            entity: record.entity.clone(),
            detail: ResultDetail::Transport {
                product: record.product.clone(),
                mode: self.sentinel.clone(),
                weight_kg: round_to(record.weight_kg, 2),
                distance_km: round_to(record.distance_km, 2),
                tonne_km: None,
                legs,
            },
            emissions_kg_co2e: round_to(total, 4),
            unit: unit.unwrap_or_else(|| "kg".to_string()),
            source_file: record.source_file.clone(),
        })
    }
}

impl CategoryEstimator for TransportEstimator<'_> {
    type Record = TransportRecord;

    fn category(&self) -> Category {
        Category::Transport
    }

    fn normalize(&self, raw: &RawRecord, schema: &ResolvedSchema) -> Result<TransportRecord, SkipReason> {
        TransportRecord::from_raw(raw, schema)
    }

    fn estimate(&self, record: &TransportRecord) -> RecordOutcome {
        if !self.allowed.permits(&record.mode) {
            return RecordOutcome::Skipped(SkipReason::NotAllowed {
                value: record.mode.clone(),
            });
        }
        if self.is_intermodal(record) {
            self.estimate_intermodal(record)
        } else {
            self.estimate_single(record)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::test_support::{kg, StubClient};
    use crate::estimate::Estimate;

    fn config(allowed: &str, distribution: &str) -> PipelineConfig {
        let doc = format!(
            r#"{{
                "data_sources": {{}},
                "emission_factors": {{"transport": {{
                    "truck": "freight_vehicle-type_truck",
                    "ship": "sea_freight-type_container",
                    "rail": "freight_train-type_diesel"
                }}}},
                "api": {{"data_version": "^21"}},
                "allowed_transport_modes": {allowed},
                "intermodal_config": {{"enabled": true, "default_leg_distribution": {distribution}}}
            }}"#
        );
        PipelineConfig::from_json_str(&doc, "").unwrap()
    }

    fn record(mode: &str, distance_km: f64) -> TransportRecord {
        TransportRecord {
            entity: "Acme".into(),
            product: "Bolts".into(),
            mode: mode.into(),
            weight_kg: 1000.0,
            distance_km,
            source_file: "transport.csv".into(),
        }
    }

    fn legs_of(outcome: &RecordOutcome) -> &[LegEstimate] {
        match outcome {
            RecordOutcome::Estimated(EmissionResult {
                detail: ResultDetail::Transport { legs, .. },
                ..
            }) => legs,
            other => panic!("expected transport estimate, got {other:?}"),
        }
    }

    #[test]
    fn single_mode_reports_tonne_km_but_sends_raw_mass_and_distance() {
        let config = config(r#"["truck"]"#, "{}");
        let client = StubClient::new(|_| kg(12.0));
        let estimator = TransportEstimator::new(&config, &client);

        let outcome = estimator.estimate(&record("truck", 250.0));
        let RecordOutcome::Estimated(result) = &outcome else {
            panic!("expected estimate, got {outcome:?}");
        };
        assert_eq!(result.emissions_kg_co2e, 12.0);
        let ResultDetail::Transport { tonne_km, legs, .. } = &result.detail else {
            panic!("wrong detail");
        };
        assert_eq!(*tonne_km, Some(250.0));
        assert!(legs.is_empty());
        assert_eq!(client.calls()[0].parameters, Parameters::weight_distance(1000.0, 250.0));
    }

    #[test]
    fn single_mode_must_be_allowed() {
        let config = config(r#"["ship"]"#, "{}");
        let client = StubClient::new(|_| kg(1.0));
        let estimator = TransportEstimator::new(&config, &client);
        assert_eq!(
            estimator.estimate(&record("truck", 10.0)),
            RecordOutcome::Skipped(SkipReason::NotAllowed {
                value: "truck".into()
            })
        );
        assert!(client.calls().is_empty());
    }

    #[test]
    fn intermodal_splits_distance_across_legs() {
        let config = config(r#"["truck", "ship", "intermodal"]"#, r#"{"truck": 0.2, "ship": 0.8}"#);
        let client = StubClient::new(|_| kg(10.0));
        let estimator = TransportEstimator::new(&config, &client);

        let outcome = estimator.estimate(&record("intermodal", 1000.0));
        let legs = legs_of(&outcome);
        assert_eq!(legs.len(), 2);
        assert_eq!((legs[0].mode.as_str(), legs[0].distance_km), ("truck", 200.0));
        assert_eq!((legs[1].mode.as_str(), legs[1].distance_km), ("ship", 800.0));
        let RecordOutcome::Estimated(result) = &outcome else { unreachable!() };
        assert_eq!(result.emissions_kg_co2e, 20.0);

        let calls = client.calls();
        assert_eq!(calls[0].parameters, Parameters::weight_distance(1000.0, 200.0));
        assert_eq!(calls[1].emission_factor.activity_id, "sea_freight-type_container");
    }

    #[test]
    fn leg_distances_cover_total_when_all_legs_survive() {
        let config = config("[]", r#"{"truck": 0.25, "rail": 0.35, "ship": 0.4}"#);
        let client = StubClient::new(|_| kg(1.0));
        let estimator = TransportEstimator::new(&config, &client);

        for distance in [1.0, 123.456, 9876.5] {
            let outcome = estimator.estimate(&record("intermodal", distance));
            let sum: f64 = legs_of(&outcome).iter().map(|l| l.distance_km).sum();
            assert!((sum - distance).abs() < 0.02, "{sum} vs {distance}");
        }
    }

    #[test]
    fn disallowed_leg_is_dropped_without_rescaling() {
        let config = config(r#"["ship", "intermodal"]"#, r#"{"truck": 0.2, "ship": 0.8}"#);
        let client = StubClient::new(|_| kg(10.0));
        let estimator = TransportEstimator::new(&config, &client);

        let outcome = estimator.estimate(&record("intermodal", 1000.0));
        let legs = legs_of(&outcome);
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].distance_km, 800.0);
        let RecordOutcome::Estimated(result) = &outcome else { unreachable!() };
        let ResultDetail::Transport { distance_km, .. } = &result.detail else { unreachable!() };
        assert_eq!(*distance_km, 1000.0);
    }

    #[test]
    fn intermodal_without_eligible_legs_is_skipped() {
        let config = config(r#"["rail", "Intermodal"]"#, r#"{"truck": 0.5, "ship": 0.5}"#);
        let client = StubClient::new(|_| kg(10.0));
        let estimator = TransportEstimator::new(&config, &client);
        assert_eq!(
            estimator.estimate(&record("intermodal", 100.0)),
            RecordOutcome::Skipped(SkipReason::NoSurvivingLegs)
        );
    }

    #[test]
    fn intermodal_with_only_failed_legs_is_failed() {
        let config = config("[]", r#"{"truck": 1.0}"#);
        let client = StubClient::new(|_| Err(EstimationError::Transport("timed out".into())));
        let estimator = TransportEstimator::new(&config, &client);
        assert!(matches!(
            estimator.estimate(&record("intermodal", 100.0)),
            RecordOutcome::Failed(EstimationError::Transport(_))
        ));
    }

    #[test]
    fn intermodal_must_itself_be_allowed() {
        let config = config(r#"["truck", "ship"]"#, r#"{"truck": 0.2, "ship": 0.8}"#);
        let client = StubClient::new(|_| kg(10.0));
        let estimator = TransportEstimator::new(&config, &client);

        assert_eq!(
            estimator.estimate(&record("intermodal", 1000.0)),
            RecordOutcome::Skipped(SkipReason::NotAllowed {
                value: "intermodal".into()
            })
        );
        assert!(client.calls().is_empty());
    }

    #[test]
    fn leg_in_a_different_unit_is_not_summed() {
        let config = config("[]", r#"{"truck": 0.5, "ship": 0.5}"#);
        let client = StubClient::new(|request| {
            let co2e_unit = if request.emission_factor.activity_id == "sea_freight-type_container" {
                "lb"
            } else {
                "kg"
            };
            Ok(Estimate {
                co2e: 10.0,
                co2e_unit: co2e_unit.to_string(),
            })
        });
        let estimator = TransportEstimator::new(&config, &client);

        let outcome = estimator.estimate(&record("intermodal", 100.0));
        let legs = legs_of(&outcome);
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].mode, "truck");
        let RecordOutcome::Estimated(result) = &outcome else { unreachable!() };
        assert_eq!(result.emissions_kg_co2e, 10.0);
        assert_eq!(result.unit, "kg");
        assert_eq!(client.calls().len(), 2);
    }
}
