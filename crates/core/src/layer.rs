//! Layers — identity tokens naming a behavioral variant.
//!
//! A layer carries nothing but its identity and an optional display name.
//! Two layers are equal only if they are the same token; two separately
//! created layers with the same name stay distinct.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A COP layer.
///
/// Cloning is cheap and yields the same identity.
#[derive(Clone)]
pub struct Layer {
    inner: Arc<LayerInner>,
}

struct LayerInner {
    name: Option<String>,
}

impl Layer {
    /// Create a fresh layer with an optional name.
    pub fn new(name: Option<&str>) -> Self {
        Self {
            inner: Arc::new(LayerInner {
                name: name.map(str::to_string),
            }),
        }
    }

    /// Create a fresh named layer.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(LayerInner {
                name: Some(name.into()),
            }),
        }
    }

    /// Create a fresh layer without a name.
    pub fn anonymous() -> Self {
        Self::new(None)
    }

    /// The display name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Identifier for display and debugging: the name, or an address-like
    /// string that is stable for the lifetime of the layer.
    pub fn identifier(&self) -> String {
        match &self.inner.name {
            Some(name) => name.clone(),
            None => format!("{:#x}", self.addr()),
        }
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl PartialEq for Layer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Layer {}

impl Hash for Layer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<layer {}>", self.identifier())
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.name {
            Some(name) => write!(f, "layer(name=\"{name}\")"),
            None => write!(f, "layer({:#x})", self.addr()),
        }
    }
}

/// An ordered, immutable sequence of layers: the base layers followed by the
/// layers activated on the current thread.
///
/// Later entries take precedence. Used as the chain-cache key, so equality
/// and hashing follow element identity and order.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct LayerCombination {
    layers: Arc<[Layer]>,
}

impl LayerCombination {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self {
            layers: layers.into(),
        }
    }

    /// The empty combination.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `base` followed by `active`.
    pub fn concat(base: &[Layer], active: &[Layer]) -> Self {
        let mut layers = Vec::with_capacity(base.len() + active.len());
        layers.extend_from_slice(base);
        layers.extend_from_slice(active);
        Self::new(layers)
    }

    pub fn contains(&self, layer: &Layer) -> bool {
        self.layers.contains(layer)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }

    pub fn as_slice(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl fmt::Debug for LayerCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.layers.iter()).finish()
    }
}

impl fmt::Display for LayerCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.layers.iter().map(Layer::identifier).collect();
        write!(f, "[{}]", ids.join(", "))
    }
}

impl<'a> IntoIterator for &'a LayerCombination {
    type Item = &'a Layer;
    type IntoIter = std::slice::Iter<'a, Layer>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

impl From<Vec<Layer>> for LayerCombination {
    fn from(layers: Vec<Layer>) -> Self {
        Self::new(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn layers_compare_by_identity() {
        let a = Layer::named("Loud");
        let b = Layer::named("Loud");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn identifier_prefers_name() {
        assert_eq!(Layer::named("Loud").identifier(), "Loud");
        let anon = Layer::anonymous();
        assert!(anon.identifier().starts_with("0x"));
        assert_eq!(anon.identifier(), anon.clone().identifier());
    }

    #[test]
    fn display_and_debug_formats() {
        let layer = Layer::named("Polite");
        assert_eq!(layer.to_string(), "<layer Polite>");
        assert_eq!(format!("{layer:?}"), "layer(name=\"Polite\")");
    }

    #[test]
    fn combination_order_matters_for_equality() {
        let a = Layer::named("A");
        let b = Layer::named("B");
        let ab = LayerCombination::new(vec![a.clone(), b.clone()]);
        let ba = LayerCombination::new(vec![b.clone(), a.clone()]);
        assert_ne!(ab, ba);
        assert_eq!(ab, LayerCombination::concat(&[a], &[b]));

        let set: HashSet<LayerCombination> = [ab.clone(), ba, ab].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn combination_display_lists_identifiers() {
        let combo = LayerCombination::new(vec![Layer::named("A"), Layer::named("B")]);
        assert_eq!(combo.to_string(), "[A, B]");
        assert!(LayerCombination::empty().is_empty());
    }
}
