use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::json;

use emissions_pipeline::config::PipelineConfig;
use emissions_pipeline::error::{EstimationError, OutputError};
use emissions_pipeline::estimate::{Estimate, EstimationClient, EstimationRequest, Parameters};
use emissions_pipeline::pipeline::Pipeline;
use emissions_pipeline::processing::EntityAggregate;
use emissions_pipeline::types::Category;
use emissions_pipeline::PipelineError;

/// Deterministic service: fixed answers for materials, simple rates for everything else.
#[derive(Default)]
struct RateClient {
    requests: Mutex<Vec<EstimationRequest>>,
}

impl RateClient {
    fn activity_ids(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.emission_factor.activity_id.clone())
            .collect()
    }
}

impl EstimationClient for RateClient {
    fn estimate(&self, request: &EstimationRequest) -> Result<Estimate, EstimationError> {
        self.requests.lock().unwrap().push(request.clone());
        let activity = request.emission_factor.activity_id.as_str();
        let co2e = match (&request.parameters, activity) {
            (Parameters::Weight { .. }, "metals-steel") => 100.0,
            (Parameters::Weight { .. }, "metals-aluminum") => 40.0,
            (Parameters::WeightDistance { weight, distance, .. }, "freight-truck") => weight / 1000.0 * distance * 0.1,
            (Parameters::WeightDistance { weight, distance, .. }, "freight-ship") => weight / 1000.0 * distance * 0.01,
            (Parameters::Energy { energy, .. }, _) => energy * 0.4,
            (Parameters::Volume { volume, .. }, _) => volume * 2.0,
            _ => {
                return Err(EstimationError::Api {
                    status: 400,
                    message: format!("unexpected request for {activity}"),
                })
            }
        };
        Ok(Estimate {
            co2e,
            co2e_unit: "kg".to_string(),
        })
    }
}

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn config(out: &Path, max_concurrent_requests: usize) -> PipelineConfig {
    let doc = json!({
        "data_sources": {
            "materials": {"locations": ["materials.csv"]},
            "transport": {"locations": ["transport.json"]},
            "energy": {"locations": ["energy.xml"]}
        },
        "emission_factors": {
            "materials": {"Steel": "metals-steel", "Aluminum": "metals-aluminum", "Plastic": "plastics"},
            "transport": {"truck": "freight-truck", "ship": "freight-ship"},
            "energy": {"Electricity": "electricity-grid", "Natural Gas": "fuel-natural_gas"}
        },
        "api": {"data_version": "^21"},
        "allowed_materials": ["Steel", "Aluminum"],
        "allowed_transport_modes": ["truck", "ship", "intermodal"],
        "intermodal_config": {"enabled": true, "default_leg_distribution": {"truck": 0.2, "ship": 0.8}},
        "output": {
            "emissions_dir": out.join("emissions"),
            "reports_dir": out.join("reports")
        },
        "execution": {"max_concurrent_requests": max_concurrent_requests}
    });
    PipelineConfig::from_json_str(&doc.to_string(), fixtures()).unwrap()
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-2
}

fn by_entity<'a>(aggregates: &'a [EntityAggregate], entity: &str) -> &'a EntityAggregate {
    aggregates.iter().find(|a| a.entity == entity).unwrap()
}

#[test]
fn full_run_estimates_aggregates_and_ranks() {
    let out = tempfile::tempdir().unwrap();
    let config = config(out.path(), 1);
    let client = RateClient::default();

    let summary = Pipeline::new(&config, &client).unwrap().run().unwrap();

    assert_eq!(summary.entities, 3);
    assert!(summary.failed_sources.is_empty());
    let counts: Vec<(Category, usize, usize, usize)> = summary
        .categories
        .iter()
        .map(|r| (r.category, r.estimated(), r.skipped_total(), r.failed))
        .collect();
    assert_eq!(
        counts,
        vec![
            (Category::Materials, 3, 2, 0),
            (Category::Transport, 2, 1, 0),
            (Category::Energy, 2, 1, 0),
        ]
    );
    assert_eq!(summary.categories[0].skipped.get("not_allowed"), Some(&1));
    assert_eq!(summary.categories[0].skipped.get("unknown_unit"), Some(&1));
    assert_eq!(summary.categories[1].skipped.get("missing_value"), Some(&1));
    assert_eq!(summary.categories[2].skipped.get("unsupported_energy_type"), Some(&1));

    // The excluded material never reaches the service.
    assert!(!client.activity_ids().iter().any(|id| id == "plastics"));

    let materials = read_json(&out.path().join("emissions/materials_emissions.json"));
    let materials = materials.as_array().unwrap();
    assert_eq!(materials.len(), 3);
    assert_eq!(materials[0]["entity"], "FactoryA");
    assert_eq!(materials[0]["category"], "materials");
    assert_eq!(materials[0]["material"], "Steel");
    assert_eq!(materials[0]["weight_kg"], 453.59);
    assert_eq!(materials[0]["emissions_kg_co2e"], 100.0);
    assert_eq!(materials[0]["source_file"], "materials.csv");
    assert_eq!(materials[2]["entity"], "Unknown");
    assert!(materials.iter().all(|r| r["material"] != "Plastic"));

    let aggregates: Vec<EntityAggregate> =
        serde_json::from_value(read_json(&out.path().join("emissions/aggregated_emissions.json"))).unwrap();
    let names: Vec<&str> = aggregates.iter().map(|a| a.entity.as_str()).collect();
    assert_eq!(names, vec!["FactoryA", "FactoryB", "Unknown"]);

    let a = by_entity(&aggregates, "FactoryA");
    assert!(approx(a.materials_emissions_kg_co2e, 100.0));
    assert!(approx(a.transport_emissions_kg_co2e, 10.0));
    assert!(approx(a.energy_emissions_kg_co2e, 1000.0));
    assert!(approx(a.total_emissions_kg_co2e, 1110.0));
    assert_eq!(a.breakdown.materials.len(), 1);
    assert_eq!(a.breakdown.energy.len(), 1);

    let b = by_entity(&aggregates, "FactoryB");
    assert!(approx(b.transport_emissions_kg_co2e, 28.0));
    assert!(approx(b.energy_emissions_kg_co2e, 200.0));

    let top = read_json(&out.path().join("reports/top_5_lowest_emissions.json"));
    let ranked: Vec<(&str, u64)> = top
        .as_array()
        .unwrap()
        .iter()
        .map(|r| (r["entity"].as_str().unwrap(), r["rank"].as_u64().unwrap()))
        .collect();
    assert_eq!(ranked, vec![("FactoryB", 1), ("Unknown", 2), ("FactoryA", 3)]);

    let stats = read_json(&out.path().join("reports/summary_statistics.json"));
    assert_eq!(stats["total_entities"], 3);
    assert!(approx(stats["total_emissions_kg_co2e"].as_f64().unwrap(), 278.0));
    assert!(approx(stats["category_totals"]["materials"].as_f64().unwrap(), 240.0));
    assert!(approx(stats["category_totals"]["transport"].as_f64().unwrap(), 38.0));
}

#[test]
fn intermodal_record_is_split_into_legs() {
    let out = tempfile::tempdir().unwrap();
    let config = config(out.path(), 1);
    let client = RateClient::default();

    let report = Pipeline::new(&config, &client)
        .unwrap()
        .estimate_category(Category::Transport)
        .unwrap();
    assert_eq!(report.estimated(), 2);
    assert_eq!(
        client.activity_ids(),
        vec!["freight-truck", "freight-truck", "freight-ship"]
    );

    let transport = read_json(&out.path().join("emissions/transport_emissions.json"));
    let intermodal = &transport[1];
    assert_eq!(intermodal["mode"], "intermodal");
    assert!(intermodal.get("tonne_km").is_none());
    let legs = intermodal["legs"].as_array().unwrap();
    assert_eq!(legs.len(), 2);
    assert_eq!(legs[0]["mode"], "truck");
    assert!(approx(legs[0]["distance_km"].as_f64().unwrap(), 200.0));
    assert_eq!(legs[1]["mode"], "ship");
    assert!(approx(legs[1]["distance_km"].as_f64().unwrap(), 800.0));
    assert!(approx(intermodal["emissions_kg_co2e"].as_f64().unwrap(), 28.0));

    assert!(approx(transport[0]["tonne_km"].as_f64().unwrap(), 100.0));
}

#[test]
fn concurrent_estimation_matches_sequential_output() {
    let seq_out = tempfile::tempdir().unwrap();
    let par_out = tempfile::tempdir().unwrap();
    let seq_config = config(seq_out.path(), 1);
    let par_config = config(par_out.path(), 4);

    Pipeline::new(&seq_config, &RateClient::default()).unwrap().run().unwrap();
    Pipeline::new(&par_config, &RateClient::default()).unwrap().run().unwrap();

    for name in [
        "emissions/materials_emissions.json",
        "emissions/transport_emissions.json",
        "emissions/energy_emissions.json",
        "emissions/aggregated_emissions.json",
    ] {
        assert_eq!(
            read_json(&seq_out.path().join(name)),
            read_json(&par_out.path().join(name)),
            "{name} differs"
        );
    }
}

#[test]
fn stages_run_independently_from_persisted_files() {
    let out = tempfile::tempdir().unwrap();
    let config = config(out.path(), 1);
    let client = RateClient::default();
    let pipeline = Pipeline::new(&config, &client).unwrap();

    let err = pipeline.report(&config.ranking).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Output(OutputError::MissingArtifact { .. })
    ));

    pipeline.estimate_category(Category::Energy).unwrap();
    let aggregates = pipeline.aggregate().unwrap();
    assert_eq!(aggregates.len(), 2);
    assert!(aggregates.iter().all(|a| a.materials_emissions_kg_co2e == 0.0));

    let report = pipeline.report(&config.ranking).unwrap();
    assert!(report.top_path.exists());
    // Energy is not a ranking category by default.
    assert_eq!(report.summary.total_emissions_kg_co2e, 0.0);
}

#[test]
fn source_missing_a_required_column_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("materials.csv"), "Entity,Item,Weight,Unit\nFactoryA,Steel,1,kg\n").unwrap();
    std::fs::write(dir.path().join("energy.csv"), "Entity,EnergyType,Consumption,Unit\nFactoryA,Electricity,10,kWh\n")
        .unwrap();

    let doc = json!({
        "data_sources": {
            "materials": {"locations": ["materials.csv"]},
            "energy": {"locations": ["energy.csv"]}
        },
        "emission_factors": {
            "materials": {"Steel": "metals-steel"},
            "energy": {"electricity": "electricity-grid"}
        },
        "api": {"data_version": "^21"}
    });
    let config = PipelineConfig::from_json_str(&doc.to_string(), dir.path()).unwrap();
    let client = RateClient::default();

    let summary = Pipeline::new(&config, &client).unwrap().run().unwrap();

    assert_eq!(summary.failed_sources.len(), 1);
    assert_eq!(summary.failed_sources[0].0, "materials");
    assert_eq!(summary.categories.len(), 1);
    assert_eq!(summary.categories[0].category, Category::Energy);
    let materials = read_json(&dir.path().join("emissions/materials_emissions.json"));
    assert_eq!(materials, json!([]));
    assert_eq!(read_json(&dir.path().join("emissions/transport_emissions.json")), json!([]));
    assert!(dir.path().join("emissions/energy_emissions.json").exists());
    assert!(dir.path().join("reports/summary_statistics.json").exists());
}

#[test]
fn rerun_after_schema_failure_drops_earlier_results() {
    let dir = tempfile::tempdir().unwrap();
    let doc = json!({
        "data_sources": {"materials": {"locations": ["materials.csv"]}},
        "emission_factors": {"materials": {"Steel": "metals-steel"}},
        "api": {"data_version": "^21"}
    });
    let config = PipelineConfig::from_json_str(&doc.to_string(), dir.path()).unwrap();
    let client = RateClient::default();

    std::fs::write(dir.path().join("materials.csv"), "Entity,Material,Weight,Unit\nOldCo,Steel,1,kg\n").unwrap();
    let first = Pipeline::new(&config, &client).unwrap().run().unwrap();
    assert_eq!(first.entities, 1);

    std::fs::write(dir.path().join("materials.csv"), "Entity,Item,Weight,Unit\nOldCo,Steel,1,kg\n").unwrap();
    let second = Pipeline::new(&config, &client).unwrap().run().unwrap();

    assert_eq!(second.failed_sources.len(), 1);
    assert_eq!(second.failed_sources[0].0, "materials");
    assert_eq!(second.entities, 0);
    let aggregates = read_json(&dir.path().join("emissions/aggregated_emissions.json"));
    assert_eq!(aggregates, json!([]));
}

#[test]
fn rerun_without_a_category_source_clears_its_results() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("materials.csv"), "Entity,Material,Weight,Unit\nOldCo,Steel,1,kg\n").unwrap();
    let with_materials = json!({
        "data_sources": {"materials": {"locations": ["materials.csv"]}},
        "emission_factors": {"materials": {"Steel": "metals-steel"}},
        "api": {"data_version": "^21"}
    });
    let config = PipelineConfig::from_json_str(&with_materials.to_string(), dir.path()).unwrap();
    let client = RateClient::default();
    Pipeline::new(&config, &client).unwrap().run().unwrap();

    let without = json!({"data_sources": {}, "api": {"data_version": "^21"}});
    let config = PipelineConfig::from_json_str(&without.to_string(), dir.path()).unwrap();
    let summary = Pipeline::new(&config, &client).unwrap().run().unwrap();

    assert_eq!(summary.entities, 0);
    assert_eq!(read_json(&dir.path().join("emissions/materials_emissions.json")), json!([]));
}

#[test]
fn unknown_category_has_no_source() {
    let dir = tempfile::tempdir().unwrap();
    let doc = json!({"data_sources": {}, "api": {"data_version": "^21"}});
    let config = PipelineConfig::from_json_str(&doc.to_string(), dir.path()).unwrap();
    let client = RateClient::default();

    let err = Pipeline::new(&config, &client)
        .unwrap()
        .estimate_category(Category::Materials)
        .unwrap_err();
    assert!(err.to_string().contains("unknown data source"));
}
