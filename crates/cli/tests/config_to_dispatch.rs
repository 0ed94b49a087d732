//! End-to-end: a config file names base layers, applying it changes dispatch.

use stratum_config::{ConfigError, StratumConfig};
use stratum_dispatch::{
    LayerCatalog, MethodTable, always, base_layers, global_deactivate_layer, with_active_layer,
    with_inactive_layer,
};

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    (tmp, path)
}

#[test]
fn configured_base_layer_applies_to_every_call() {
    let (_tmp, path) = write_config(
        r#"
[layers]
base = ["E2eMetric"]
known = ["E2eBracket"]

[logging]
level = "debug"
"#,
    );
    let config = StratumConfig::load_from(&path).unwrap();

    let catalog = LayerCatalog::new();
    let table = MethodTable::new();
    let metric = catalog.get_or_create("E2eMetric");
    let bracket = catalog.get_or_create("E2eBracket");

    table
        .declare_base::<(), u32, String, _>("measure", |p| Ok(p.args().to_string()))
        .unwrap();
    table
        .declare_after::<(), u32, String, _>("measure", &metric, always(), |_, r| Ok(format!("{r} cm")))
        .unwrap();
    table
        .declare_after::<(), u32, String, _>("measure", &bracket, always(), |_, r| Ok(format!("[{r}]")))
        .unwrap();
    let measure = table.method::<(), u32, String>("measure").unwrap();

    assert_eq!(measure.call(4).unwrap(), "4");

    let applied = config.apply(&catalog).unwrap();
    assert_eq!(applied, vec![metric.clone()]);
    assert!(base_layers().contains(&metric));
    assert_eq!(measure.call(4).unwrap(), "4 cm");

    // Scoped layers compose outside the configured base.
    {
        let _g = with_active_layer(&bracket);
        assert_eq!(measure.call(4).unwrap(), "[4 cm]");
    }

    // Scoped deactivation does not reach the base set.
    {
        let _g = with_inactive_layer(&metric);
        assert_eq!(measure.call(4).unwrap(), "4 cm");
    }

    global_deactivate_layer(&metric).unwrap();
    assert_eq!(measure.call(4).unwrap(), "4");
}

#[test]
fn invalid_config_never_activates_anything() {
    let (_tmp, path) = write_config("[layers]\nbase = [\"E2eTwice\", \"E2eTwice\"]\n");
    let err = StratumConfig::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
    assert!(
        base_layers()
            .iter()
            .all(|l| l.name() != Some("E2eTwice"))
    );
}
