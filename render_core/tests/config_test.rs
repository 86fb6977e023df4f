//! Loading renderer configuration from disk

use render_core::config::{ConfigError, RendererConfig};
use render_core::render::{pipeline, UploadBudget};
use render_core::graphics::ResourceManagers;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_config_round_trips_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("renderer.json");
    let config = RendererConfig {
        material_upload_budget_ms: Some(250.0),
        mesh_upload_budget_ms: None,
        max_sorted_batches: 3,
        ..Default::default()
    };

    config.save_to_file(&path).unwrap();
    let loaded = RendererConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let budget = UploadBudget::from_config(&loaded);
    assert_eq!(budget.material, Some(Duration::from_millis(250)));
    assert_eq!(budget.mesh, None);
}

#[test]
fn test_invalid_files_are_rejected() {
    let mut broken = NamedTempFile::new().unwrap();
    write!(broken, "{{ not json").unwrap();
    assert!(matches!(
        RendererConfig::load_from_file(broken.path()),
        Err(ConfigError::Parse(_))
    ));

    let mut negative = NamedTempFile::new().unwrap();
    write!(negative, r#"{{ "mesh_upload_budget_ms": -3.0 }}"#).unwrap();
    assert!(matches!(
        RendererConfig::load_from_file(negative.path()),
        Err(ConfigError::Invalid { field: "mesh_upload_budget_ms", .. })
    ));

    assert!(matches!(
        RendererConfig::load_from_file("/nonexistent/renderer.json"),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn test_loaded_config_drives_pipeline() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{ "stats_history_len": 2 }}"#).unwrap();
    let config = RendererConfig::load_from_file(file.path()).unwrap();

    let managers = Arc::new(ResourceManagers::new().unwrap());
    let (_, renderer) = pipeline(managers, &config);
    assert_eq!(renderer.history().capacity(), 2);
}
