//! `stratum config` — Configuration management commands.

use std::path::Path;

use stratum_config::StratumConfig;

use super::demo::DEMO_LAYERS;

/// Non-fatal findings about an otherwise valid config.
pub fn warnings(config: &StratumConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    for name in &config.layers.known {
        if config.layers.base.contains(name) {
            warnings.push(format!("Layer '{name}' is listed in both base and known"));
        }
    }

    if config.layers.base.iter().any(|n| n == "Loud") {
        warnings.push("Base layer 'Loud' makes every demo greeting shout".into());
    }

    warnings
}

pub fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match super::load_config(config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            let custom = config
                .layers
                .known
                .iter()
                .filter(|n| !DEMO_LAYERS.contains(&n.as_str()))
                .count();

            println!();
            println!("   Base layers:   {}", config.layers.base.join(", "));
            println!("   Known layers:  {} ({custom} custom)", config.layers.known.len());
            println!("   Log level:     {}", config.logging.level);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", super::config_file(config_path).display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = super::super::config_file(None);
        assert!(path.to_str().unwrap().contains("config.toml"));
        let explicit = super::super::config_file(Some(Path::new("/etc/stratum.toml")));
        assert_eq!(explicit, Path::new("/etc/stratum.toml"));
    }

    #[test]
    fn overlapping_layer_lists_warn() {
        let mut config = StratumConfig::default();
        config.layers.base = vec!["Logged".into()];
        config.layers.known = vec!["Logged".into(), "Polite".into()];
        let found = warnings(&config);
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("Logged"));
    }

    #[test]
    fn default_config_has_no_warnings() {
        assert!(warnings(&StratumConfig::default()).is_empty());
    }
}
