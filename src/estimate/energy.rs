use crate::config::{EmissionFactorTable, PipelineConfig};
use crate::normalize::{EnergyRecord, ResolvedSchema};
use crate::types::{Category, RawRecord};

use super::{
    round_to, CategoryEstimator, EmissionResult, EstimationClient, EstimationRequest, Parameters,
    RecordOutcome, ResultDetail, SkipReason,
};

/// Energy-use estimates. The parameter shape follows the record's [`crate::normalize::EnergyKind`].
pub struct EnergyEstimator<'a> {
    client: &'a dyn EstimationClient,
    factors: &'a EmissionFactorTable,
    data_version: &'a str,
}

impl<'a> EnergyEstimator<'a> {
    pub fn new(config: &'a PipelineConfig, client: &'a dyn EstimationClient) -> Self {
        Self {
            client,
            factors: &config.emission_factors,
            data_version: &config.api.data_version,
        }
    }
}

impl CategoryEstimator for EnergyEstimator<'_> {
    type Record = EnergyRecord;

    fn category(&self) -> Category {
        Category::Energy
    }

    fn normalize(&self, raw: &RawRecord, schema: &ResolvedSchema) -> Result<EnergyRecord, SkipReason> {
        EnergyRecord::from_raw(raw, schema)
    }

    fn estimate(&self, record: &EnergyRecord) -> RecordOutcome {
        let Some(activity_id) = self.factors.lookup(Category::Energy, &record.energy_key) else {
            return RecordOutcome::Skipped(SkipReason::MissingFactor {
                key: record.energy_key.clone(),
            });
        };

        let request = EstimationRequest::new(
            activity_id,
            self.data_version,
            Parameters::for_energy(record.kind, record.quantity.value),
        );
        match self.client.estimate(&request).and_then(|e| e.validated()) {
            Ok(estimate) => RecordOutcome::Estimated(EmissionResult {
                entity: record.entity.clone(),
                detail: ResultDetail::Energy {
                    energy_type: record.energy_type.clone(),
                    consumption: record.consumption,
                    consumption_unit: record.consumption_unit.clone(),
                    location: record.location.clone(),
                    normalized_consumption: round_to(record.quantity.value, 4),
                    normalized_unit: record.quantity.unit.symbol().to_string(),
                },
                emissions_kg_co2e: round_to(estimate.co2e, 4),
                unit: estimate.co2e_unit,
                source_file: record.source_file.clone(),
            }),
            Err(err) => RecordOutcome::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::test_support::{kg, StubClient};
    use crate::normalize::{BaseUnit, EnergyKind, Quantity};

    fn config() -> PipelineConfig {
        PipelineConfig::from_json_str(
            r#"{
                "data_sources": {},
                "emission_factors": {"energy": {
                    "electricity": "electricity-supply_grid",
                    "Natural Gas": "fuel-type_natural_gas",
                    "diesel": "fuel-type_diesel"
                }},
                "api": {"data_version": "^21"}
            }"#,
            "",
        )
        .unwrap()
    }

    fn record(energy_type: &str, kind: EnergyKind, quantity: Quantity) -> EnergyRecord {
        EnergyRecord {
            entity: "Plant1".into(),
            energy_type: energy_type.into(),
            energy_key: crate::config::lookup_key(energy_type),
            kind,
            consumption: 10.0,
            consumption_unit: "gallons".into(),
            quantity,
            location: "US".into(),
            source_file: "energy.csv".into(),
        }
    }

    #[test]
    fn liquid_fuel_is_sent_as_volume_in_liters() {
        let config = config();
        let client = StubClient::new(|_| kg(101.5));
        let estimator = EnergyEstimator::new(&config, &client);
        let quantity = Quantity {
            value: 37.8541,
            unit: BaseUnit::Liter,
        };

        let outcome = estimator.estimate(&record("Diesel", EnergyKind::LiquidFuel, quantity));
        let RecordOutcome::Estimated(result) = outcome else {
            panic!("expected estimate");
        };
        assert_eq!(result.emissions_kg_co2e, 101.5);
        assert!(matches!(
            result.detail,
            ResultDetail::Energy { ref normalized_unit, .. } if normalized_unit == "l"
        ));
        assert_eq!(
            client.calls()[0].parameters,
            Parameters::Volume {
                volume: 37.8541,
                volume_unit: "l"
            }
        );
    }

    #[test]
    fn natural_gas_is_sent_as_volume_in_cubic_meters() {
        let config = config();
        let client = StubClient::new(|_| kg(2.0));
        let estimator = EnergyEstimator::new(&config, &client);
        let quantity = Quantity {
            value: 5.0,
            unit: BaseUnit::CubicMeter,
        };
        let _ = estimator.estimate(&record("Natural Gas", EnergyKind::NaturalGas, quantity));
        let calls = client.calls();
        assert_eq!(calls[0].emission_factor.activity_id, "fuel-type_natural_gas");
        assert_eq!(
            calls[0].parameters,
            Parameters::Volume {
                volume: 5.0,
                volume_unit: "m3"
            }
        );
    }

    #[test]
    fn gasoline_without_factor_is_skipped() {
        let config = config();
        let client = StubClient::new(|_| kg(2.0));
        let estimator = EnergyEstimator::new(&config, &client);
        let quantity = Quantity {
            value: 5.0,
            unit: BaseUnit::Liter,
        };
        assert_eq!(
            estimator.estimate(&record("Gasoline", EnergyKind::LiquidFuel, quantity)),
            RecordOutcome::Skipped(SkipReason::MissingFactor {
                key: "gasoline".into()
            })
        );
    }
}
