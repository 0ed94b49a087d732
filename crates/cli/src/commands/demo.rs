//! `stratum demo` — greet someone with layers active around the call.

use std::path::Path;
use std::sync::Arc;

use stratum_dispatch::{
    Layer, LayerCatalog, LayeredFn, MethodTable, Result, always, with_active_layers,
};
use tracing::info;

/// Layers the greet method carries advice for.
pub const DEMO_LAYERS: [&str; 3] = ["Loud", "Polite", "Logged"];

/// Declare the greet method and its layered advice on `table`.
pub fn install_greet(
    table: &MethodTable,
    catalog: &LayerCatalog,
) -> Result<Arc<LayeredFn<String, String>>> {
    let loud = catalog.get_or_create("Loud");
    let polite = catalog.get_or_create("Polite");
    let logged = catalog.get_or_create("Logged");

    table.declare_base::<(), String, String, _>("greet", |p| Ok(format!("Hello, {}", p.args())))?;
    table.declare_around::<(), String, String, _>("greet", &loud, always(), |p| {
        Ok(format!("{}!!!", p.proceed_with(p.args().to_uppercase())?))
    })?;
    table.declare_after::<(), String, String, _>("greet", &polite, always(), |_, greeting| {
        Ok(format!("{greeting} Pleased to meet you."))
    })?;
    table.declare_before::<(), String, String, _>("greet", &logged, always(), |inv| {
        info!(
            method = inv.method_name(),
            name = %inv.args(),
            layers = %inv.combination(),
            "Greeting requested"
        );
        Ok(())
    })?;

    table.method("greet")
}

/// Look up every requested layer name in `catalog`.
pub fn resolve_layers(catalog: &LayerCatalog, names: &[String]) -> std::result::Result<Vec<Layer>, String> {
    names
        .iter()
        .map(|name| {
            catalog.get(name).ok_or_else(|| {
                format!(
                    "unknown layer '{name}' (known: {})",
                    catalog.names().join(", ")
                )
            })
        })
        .collect()
}

/// Call greet with `layers` active for the duration of the call.
pub fn greet_with(greet: &LayeredFn<String, String>, layers: &[Layer], name: &str) -> Result<String> {
    let _scope = with_active_layers(layers);
    greet.call(name.to_string())
}

pub fn run(
    config_path: Option<&Path>,
    layers: &[String],
    name: &str,
    describe: bool,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let catalog = LayerCatalog::new();
    let table = MethodTable::new();
    let greet = install_greet(&table, &catalog)?;
    config.apply(&catalog)?;

    let requested = resolve_layers(&catalog, layers)?;
    let greeting = greet_with(&greet, &requested, name)?;
    println!("{greeting}");

    if describe {
        println!();
        println!("🧩 Advice on greet:");
        for summary in table.describe("greet")? {
            let layer = summary
                .layer
                .map(|l| l.identifier())
                .unwrap_or_else(|| "-".into());
            println!("   {:<8} {:<8} {}", summary.kind, layer, summary.name);
        }
        println!("   Cached chains: {}", greet.cached_chains());
    }

    Ok(())
}
