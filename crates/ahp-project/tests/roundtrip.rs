use std::collections::BTreeMap;

use ahp_emit::{DotOptions, EmitMode, StructuredFormat};
use ahp_partition::StrategyKind;
use ahp_project::{PipelineConfig, ProjectError, load, load_json, load_yaml, save_json, save_yaml};

fn full_config() -> PipelineConfig {
    PipelineConfig {
        strategy: StrategyKind::HierarchyAware,
        rank_count: 8,
        threads_per_rank: Some(2),
        split_factor: Some(1.5),
        emit_mode: EmitMode::Structured,
        structured_format: StructuredFormat::Yaml,
        rank: Some(3),
        dot: DotOptions {
            ports: true,
            hierarchy: false,
        },
        default_latency: "2ps".to_string(),
        program_options: BTreeMap::from([("stop-at".to_string(), "1us".to_string())]),
        ..PipelineConfig::default()
    }
}

#[test]
fn roundtrip_yaml_default_config() {
    let config = PipelineConfig::default();
    let path = std::env::temp_dir().join("ahp_project_roundtrip_default.yaml");

    save_yaml(&path, &config).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(config, loaded);
}

#[test]
fn roundtrip_yaml_full_config() {
    let config = full_config();
    let path = std::env::temp_dir().join("ahp_project_roundtrip_full.yaml");

    save_yaml(&path, &config).unwrap();
    assert_eq!(load(&path).unwrap(), config);
}

#[test]
fn roundtrip_json_full_config() {
    let config = full_config();
    let path = std::env::temp_dir().join("ahp_project_roundtrip_full.json");

    save_json(&path, &config).unwrap();
    assert_eq!(load_json(&path).unwrap(), config);
    assert_eq!(load(&path).unwrap(), config);
}

#[test]
fn invalid_config_is_not_written() {
    let config = PipelineConfig {
        rank_count: 0,
        ..PipelineConfig::default()
    };
    let path = std::env::temp_dir().join("ahp_project_invalid_not_written.yaml");
    let _ = std::fs::remove_file(&path);

    assert!(matches!(
        save_yaml(&path, &config),
        Err(ProjectError::Validation(_))
    ));
    assert!(!path.exists());
}

#[test]
fn invalid_file_is_rejected_on_load() {
    let path = std::env::temp_dir().join("ahp_project_invalid_on_load.yaml");
    std::fs::write(&path, "rank_count: 2\nrank: 5\nemit_mode: structured\n").unwrap();
    assert!(matches!(load_yaml(&path), Err(ProjectError::Validation(_))));

    std::fs::write(&path, "strategy: round-robin\n").unwrap();
    assert!(matches!(load_yaml(&path), Err(ProjectError::Yaml(_))));
}
