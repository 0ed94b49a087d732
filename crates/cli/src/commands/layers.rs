//! `stratum layers` — show the base layers activated from config.

use std::path::Path;

use stratum_config::ConfigError;
use stratum_dispatch::{LayerCatalog, base_layers};

use super::demo::DEMO_LAYERS;

/// Register the demo layers, apply the config, and describe the result.
pub fn collect(config_path: Option<&Path>) -> Result<serde_json::Value, ConfigError> {
    let config = super::load_config(config_path)?;
    let catalog = LayerCatalog::new();
    for name in DEMO_LAYERS {
        catalog.get_or_create(name);
    }
    let applied = config.apply(&catalog)?;

    let base: Vec<String> = base_layers().iter().map(|l| l.identifier()).collect();
    Ok(serde_json::json!({
        "configured": applied.iter().map(|l| l.identifier()).collect::<Vec<_>>(),
        "base": base,
        "known": catalog.names(),
    }))
}

pub fn run(config_path: Option<&Path>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let report = collect(config_path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let list = |key: &str| -> String {
        let names: Vec<&str> = report[key]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();
        if names.is_empty() {
            "(none)".into()
        } else {
            names.join(", ")
        }
    };

    println!("🧱 Stratum layers");
    println!("   Base:   {}", list("base"));
    println!("   Known:  {}", list("known"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_applies_configured_base_layers() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[layers]\nbase = [\"LayersCmdAudit\"]\nknown = [\"LayersCmdExtra\"]\n",
        )
        .unwrap();

        let report = collect(Some(&path)).unwrap();
        assert_eq!(report["configured"][0], "LayersCmdAudit");
        let known: Vec<&str> = report["known"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(known.contains(&"Loud"));
        assert!(known.contains(&"LayersCmdExtra"));
        assert!(known.contains(&"LayersCmdAudit"));

        let audit = base_layers()
            .into_iter()
            .find(|l| l.name() == Some("LayersCmdAudit"))
            .unwrap();
        stratum_dispatch::global_deactivate_layer(&audit).unwrap();
    }
}
