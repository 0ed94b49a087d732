//! Named layer catalog.
//!
//! Layers compare by identity, so anything that refers to layers by name
//! (configuration files, the CLI) needs one place that hands out the same
//! token for the same name.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::layer::Layer;

/// Interning map from layer name to [`Layer`].
#[derive(Default)]
pub struct LayerCatalog {
    layers: RwLock<HashMap<String, Layer>>,
}

impl LayerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the layer registered under `name`, creating it on first use.
    pub fn get_or_create(&self, name: &str) -> Layer {
        if let Some(layer) = self.get(name) {
            return layer;
        }
        let mut layers = self.layers.write().unwrap_or_else(PoisonError::into_inner);
        layers
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(layer = %name, "Created catalog layer");
                Layer::named(name)
            })
            .clone()
    }

    /// Get a layer by name.
    pub fn get(&self, name: &str) -> Option<Layer> {
        self.layers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// List all layer names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .layers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.layers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
