use crate::config::{AllowList, EmissionFactorTable, PipelineConfig};
use crate::normalize::{MaterialRecord, ResolvedSchema};
use crate::types::{Category, RawRecord};

use super::{
    round_to, CategoryEstimator, EmissionResult, EstimationClient, EstimationRequest, Parameters,
    RecordOutcome, ResultDetail, SkipReason,
};

/// Mass-based estimates for material consumption.
pub struct MaterialsEstimator<'a> {
    client: &'a dyn EstimationClient,
    factors: &'a EmissionFactorTable,
    allowed: &'a AllowList,
    data_version: &'a str,
}

impl<'a> MaterialsEstimator<'a> {
    pub fn new(config: &'a PipelineConfig, client: &'a dyn EstimationClient) -> Self {
        Self {
            client,
            factors: &config.emission_factors,
            allowed: &config.allowed_materials,
            data_version: &config.api.data_version,
        }
    }
}

impl CategoryEstimator for MaterialsEstimator<'_> {
    type Record = MaterialRecord;

    fn category(&self) -> Category {
        Category::Materials
    }

    fn normalize(&self, raw: &RawRecord, schema: &ResolvedSchema) -> Result<MaterialRecord, SkipReason> {
        MaterialRecord::from_raw(raw, schema)
    }

    fn estimate(&self, record: &MaterialRecord) -> RecordOutcome {
        if !self.allowed.permits(&record.material) {
            return RecordOutcome::Skipped(SkipReason::NotAllowed {
                value: record.material.clone(),
            });
        }
        let Some(activity_id) = self.factors.lookup(Category::Materials, &record.material) else {
            return RecordOutcome::Skipped(SkipReason::MissingFactor {
                key: record.lookup_key(),
            });
        };

        let request = EstimationRequest::new(activity_id, self.data_version, Parameters::weight(record.weight_kg));
        match self.client.estimate(&request).and_then(|e| e.validated()) {
            Ok(estimate) => RecordOutcome::Estimated(EmissionResult {
                entity: record.entity.clone(),
                detail: ResultDetail::Materials {
                    material: record.material.clone(),
                    weight_kg: round_to(record.weight_kg, 2),
                },
                emissions_kg_co2e: round_to(estimate.co2e, 4),
                unit: estimate.co2e_unit,
                source_file: record.source_file.clone(),
            }),
            Err(err) => RecordOutcome::Failed(err),
        }
    }
}
