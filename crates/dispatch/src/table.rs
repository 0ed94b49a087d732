//! Method table — an explicit registry of layered methods keyed by name.
//!
//! Declaring advice by name chains it onto the method already registered
//! under that name, or creates the method on first use. Methods of different
//! signatures share one table; lookups name the signature they expect.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use stratum_core::{ConfigurationError, Layer, Result};
use tracing::info;

use crate::advice::{AdviceKind, AdviceSummary, Guard};
use crate::dispatch::{Invocation, Proceeding};
use crate::method::LayeredMethod;

/// Signature-independent view of a layered method.
pub trait Layered: Send + Sync {
    fn name(&self) -> &str;

    fn summaries(&self) -> Vec<AdviceSummary>;

    fn unregister(&self, name: &str, layer: Option<&Layer>) -> usize;

    fn cached_chains(&self) -> usize;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<S, A, R> Layered for LayeredMethod<S, A, R>
where
    S: 'static,
    A: Clone + 'static,
    R: 'static,
{
    fn name(&self) -> &str {
        LayeredMethod::name(self)
    }

    fn summaries(&self) -> Vec<AdviceSummary> {
        LayeredMethod::summaries(self)
    }

    fn unregister(&self, name: &str, layer: Option<&Layer>) -> usize {
        LayeredMethod::unregister(self, name, layer)
    }

    fn cached_chains(&self) -> usize {
        LayeredMethod::cached_chains(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A registry of layered methods.
#[derive(Default)]
pub struct MethodTable {
    methods: RwLock<HashMap<String, Arc<dyn Layered>>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the method registered under `name` with the given signature.
    pub fn method<S, A, R>(&self, name: &str) -> Result<Arc<LayeredMethod<S, A, R>>>
    where
        S: 'static,
        A: Clone + 'static,
        R: 'static,
    {
        let entry = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownMethod(name.to_string()))?;
        downcast(name, entry)
    }

    /// Get the method under `name`, creating an empty one if absent.
    pub fn get_or_create<S, A, R>(&self, name: &str) -> Result<Arc<LayeredMethod<S, A, R>>>
    where
        S: 'static,
        A: Clone + 'static,
        R: 'static,
    {
        let mut methods = self.methods.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = methods.get(name) {
            return downcast(name, Arc::clone(entry));
        }
        let method = Arc::new(LayeredMethod::<S, A, R>::new(name));
        methods.insert(name.to_string(), Arc::clone(&method) as Arc<dyn Layered>);
        info!(method = %name, "Declared layered method");
        Ok(method)
    }

    /// Register an already built method, replacing any method of that name.
    pub fn insert<S, A, R>(&self, method: Arc<LayeredMethod<S, A, R>>)
    where
        S: 'static,
        A: Clone + 'static,
        R: 'static,
    {
        let name = method.name().to_string();
        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, method);
    }

    pub fn declare_before<S, A, R, F>(
        &self,
        name: &str,
        layer: &Layer,
        guard: Guard,
        f: F,
    ) -> Result<Arc<LayeredMethod<S, A, R>>>
    where
        S: 'static,
        A: Clone + 'static,
        R: 'static,
        F: Fn(&Invocation<'_, S, A>) -> Result<()> + Send + Sync + 'static,
    {
        let method = self.get_or_create::<S, A, R>(name)?;
        method.before_when(layer, guard, f);
        Ok(method)
    }

    pub fn declare_after<S, A, R, F>(
        &self,
        name: &str,
        layer: &Layer,
        guard: Guard,
        f: F,
    ) -> Result<Arc<LayeredMethod<S, A, R>>>
    where
        S: 'static,
        A: Clone + 'static,
        R: 'static,
        F: Fn(&Invocation<'_, S, A>, R) -> Result<R> + Send + Sync + 'static,
    {
        let method = self.get_or_create::<S, A, R>(name)?;
        method.after_when(layer, guard, f);
        Ok(method)
    }

    pub fn declare_around<S, A, R, F>(
        &self,
        name: &str,
        layer: &Layer,
        guard: Guard,
        f: F,
    ) -> Result<Arc<LayeredMethod<S, A, R>>>
    where
        S: 'static,
        A: Clone + 'static,
        R: 'static,
        F: Fn(&Proceeding<'_, S, A, R>) -> Result<R> + Send + Sync + 'static,
    {
        let method = self.get_or_create::<S, A, R>(name)?;
        method.around_when(layer, guard, f);
        Ok(method)
    }

    /// Add a base implementation to the method under `name`.
    pub fn declare_base<S, A, R, F>(&self, name: &str, f: F) -> Result<Arc<LayeredMethod<S, A, R>>>
    where
        S: 'static,
        A: Clone + 'static,
        R: 'static,
        F: Fn(&Proceeding<'_, S, A, R>) -> Result<R> + Send + Sync + 'static,
    {
        let method = self.get_or_create::<S, A, R>(name)?;
        method.base(f);
        Ok(method)
    }

    /// Remove advice `advice` on `layer` from the method under `name`.
    pub fn unregister(&self, name: &str, advice: &str, layer: Option<&Layer>) -> Result<usize> {
        let methods = self.methods.read().unwrap_or_else(PoisonError::into_inner);
        let method = methods
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownMethod(name.to_string()))?;
        Ok(method.unregister(advice, layer))
    }

    /// Summaries of the advice registered under `name`.
    pub fn describe(&self, name: &str) -> Result<Vec<AdviceSummary>> {
        let methods = self.methods.read().unwrap_or_else(PoisonError::into_inner);
        let method = methods
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownMethod(name.to_string()))?;
        Ok(method.summaries())
    }

    /// Whether `name` has a base implementation.
    pub fn has_base(&self, name: &str) -> bool {
        self.describe(name)
            .map(|summaries| summaries.iter().any(|s| s.kind == AdviceKind::BaseAround))
            .unwrap_or(false)
    }

    /// All method names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn downcast<S, A, R>(name: &str, entry: Arc<dyn Layered>) -> Result<Arc<LayeredMethod<S, A, R>>>
where
    S: 'static,
    A: Clone + 'static,
    R: 'static,
{
    entry
        .into_any()
        .downcast::<LayeredMethod<S, A, R>>()
        .map_err(|_| {
            ConfigurationError::SignatureMismatch {
                method: name.to_string(),
            }
            .into()
        })
}
