//! Layered methods — advice registry, chain cache and dispatch.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use stratum_core::{Layer, LayerCombination, Result, current_combination};
use tracing::{debug, trace};

use crate::advice::{AdviceKind, AdviceRecord, AdviceSummary, Guard, Implementation, always};
use crate::chain::{self, AdviceChain};
use crate::dispatch::{Binding, CallContext, Invocation, Proceeding};

/// A layered method without a receiver.
pub type LayeredFn<A, R> = LayeredMethod<(), A, R>;

/// A method whose behavior depends on the active layers.
///
/// `S` is the receiver type, `A` the argument value (cloned when advice
/// proceeds with the original arguments) and `R` the result.
///
/// Records and cache sit behind separate locks. Mutations take the records
/// write lock and clear the cache before releasing it; chain builds hold the
/// records read lock until the new chain is cached, so a chain built from an
/// outdated record list can never be cached.
///
/// Guards run while the records lock is held and must not register advice on
/// the same method.
pub struct LayeredMethod<S, A, R> {
    name: Arc<str>,
    records: RwLock<Vec<AdviceRecord<S, A, R>>>,
    cache: RwLock<HashMap<LayerCombination, AdviceChain<S, A, R>>>,
}

impl<S, A, R> LayeredMethod<S, A, R>
where
    S: 'static,
    A: Clone + 'static,
    R: 'static,
{
    /// Create a method with no advice. Calling it fails until a base
    /// implementation is registered.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            records: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create a method with a base implementation.
    pub fn with_base<F>(name: impl Into<String>, base: F) -> Self
    where
        F: Fn(&Proceeding<'_, S, A, R>) -> Result<R> + Send + Sync + 'static,
    {
        let method = Self::new(name);
        method.base(base);
        method
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Registration ──────────────────────────────────────────────────

    /// Append a record and invalidate every cached chain.
    pub fn register(&self, record: AdviceRecord<S, A, R>) -> &Self {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        self.append(&mut records, record);
        self
    }

    fn append(&self, records: &mut Vec<AdviceRecord<S, A, R>>, record: AdviceRecord<S, A, R>) {
        debug!(
            method = %self.name,
            advice = %record.name,
            kind = %record.kind,
            "Registered advice"
        );
        records.push(record);
        self.invalidate();
    }

    /// Remove every record with display name `name` on `layer`. Returns how
    /// many were removed.
    pub fn unregister(&self, name: &str, layer: Option<&Layer>) -> usize {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|r| r.name != name || r.layer.as_ref() != layer);
        let removed = before - records.len();
        if removed > 0 {
            debug!(method = %self.name, advice = %name, removed, "Unregistered advice");
            self.invalidate();
        }
        removed
    }

    /// Replace all records.
    pub fn set_records(&self, new_records: Vec<AdviceRecord<S, A, R>>) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        *records = new_records;
        self.invalidate();
    }

    /// Copy of the registered records, in registration order.
    pub fn records(&self) -> Vec<AdviceRecord<S, A, R>> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn summaries(&self) -> Vec<AdviceSummary> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(AdviceRecord::summary)
            .collect()
    }

    /// Register with a default name, suffixed `#2`, `#3`, ... when the plain
    /// name is already taken, so each record can be unregistered alone.
    fn push(
        &self,
        kind: AdviceKind,
        layer: Option<&Layer>,
        guard: Guard,
        implementation: Implementation<S, A, R>,
    ) -> &Self {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let base_name = AdviceRecord::<S, A, R>::default_name(kind, layer);
        let taken = |candidate: &str| records.iter().any(|r| r.name == candidate);
        let mut name = base_name.clone();
        let mut n = 2;
        while taken(&name) {
            name = format!("{base_name}#{n}");
            n += 1;
        }
        let record = AdviceRecord {
            name,
            layer: layer.cloned(),
            kind,
            implementation,
            guard,
        };
        self.append(&mut records, record);
        self
    }

    pub fn before<F>(&self, layer: &Layer, f: F) -> &Self
    where
        F: Fn(&Invocation<'_, S, A>) -> Result<()> + Send + Sync + 'static,
    {
        self.before_when(layer, always(), f)
    }

    pub fn before_when<F>(&self, layer: &Layer, guard: Guard, f: F) -> &Self
    where
        F: Fn(&Invocation<'_, S, A>) -> Result<()> + Send + Sync + 'static,
    {
        self.push(AdviceKind::Before, Some(layer), guard, Implementation::Observe(Arc::new(f)))
    }

    pub fn after<F>(&self, layer: &Layer, f: F) -> &Self
    where
        F: Fn(&Invocation<'_, S, A>, R) -> Result<R> + Send + Sync + 'static,
    {
        self.after_when(layer, always(), f)
    }

    pub fn after_when<F>(&self, layer: &Layer, guard: Guard, f: F) -> &Self
    where
        F: Fn(&Invocation<'_, S, A>, R) -> Result<R> + Send + Sync + 'static,
    {
        self.push(AdviceKind::After, Some(layer), guard, Implementation::Transform(Arc::new(f)))
    }

    pub fn around<F>(&self, layer: &Layer, f: F) -> &Self
    where
        F: Fn(&Proceeding<'_, S, A, R>) -> Result<R> + Send + Sync + 'static,
    {
        self.around_when(layer, always(), f)
    }

    pub fn around_when<F>(&self, layer: &Layer, guard: Guard, f: F) -> &Self
    where
        F: Fn(&Proceeding<'_, S, A, R>) -> Result<R> + Send + Sync + 'static,
    {
        self.push(AdviceKind::Around, Some(layer), guard, Implementation::Intercept(Arc::new(f)))
    }

    /// Register a base implementation (no layer, always eligible).
    pub fn base<F>(&self, f: F) -> &Self
    where
        F: Fn(&Proceeding<'_, S, A, R>) -> Result<R> + Send + Sync + 'static,
    {
        self.push(AdviceKind::BaseAround, None, always(), Implementation::Intercept(Arc::new(f)))
    }

    /// Register advice under an explicit display name, validating that the
    /// implementation fits `kind`.
    pub fn register_named(
        &self,
        name: &str,
        kind: AdviceKind,
        layer: Option<&Layer>,
        guard: Guard,
        implementation: Implementation<S, A, R>,
    ) -> Result<&Self> {
        let record = AdviceRecord::new(kind, layer.cloned(), implementation, guard, name)?;
        Ok(self.register(record))
    }

    // ── Chains ────────────────────────────────────────────────────────

    fn invalidate(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if !cache.is_empty() {
            debug!(method = %self.name, dropped = cache.len(), "Invalidated chain cache");
        }
        cache.clear();
    }

    /// The chain for `combination`, from the cache or freshly built.
    pub fn chain_for(&self, combination: &LayerCombination) -> AdviceChain<S, A, R> {
        let cached = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(combination)
            .cloned();
        if let Some(chain) = cached {
            trace!(method = %self.name, %combination, "Chain cache hit");
            return chain;
        }
        self.build_chain(combination)
    }

    /// Build the chain for `combination` and cache it.
    pub fn build_chain(&self, combination: &LayerCombination) -> AdviceChain<S, A, R> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let selected = chain::select(&records, combination);
        let built = chain::compose(&selected);
        debug!(
            method = %self.name,
            %combination,
            links = built.len(),
            "Built advice chain"
        );
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(combination.clone(), built.clone());
        built
    }

    /// Number of cached chains.
    pub fn cached_chains(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    // ── Dispatch ──────────────────────────────────────────────────────

    /// Dispatch with an explicit binding on the current thread's layers.
    pub fn invoke(&self, binding: Binding<S>, args: A) -> Result<R> {
        let combination = current_combination();
        let chain = self.chain_for(&combination);
        let cx = CallContext {
            binding,
            combination,
            method: Arc::clone(&self.name),
        };
        chain.invoke(&cx, args)
    }

    /// Call as a plain function.
    pub fn call(&self, args: A) -> Result<R> {
        self.invoke(Binding::Unbound, args)
    }

    /// Call bound to `receiver`.
    pub fn call_on(&self, receiver: &Arc<S>, args: A) -> Result<R> {
        self.invoke(Binding::Instance(Arc::clone(receiver)), args)
    }

    /// Call bound to the receiver type.
    pub fn call_static(&self, args: A) -> Result<R> {
        self.invoke(Binding::Type, args)
    }
}

impl<S, A, R> std::fmt::Debug for LayeredMethod<S, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("LayeredMethod")
            .field("name", &self.name)
            .field("records", &*records)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use stratum_core::{ConfigurationError, Error, with_active_layer, with_active_layers};

    fn greet() -> LayeredFn<String, String> {
        LayeredMethod::with_base("greet", |p: &Proceeding<'_, (), String, String>| {
            Ok(format!("Hello, {}", p.args()))
        })
    }

    #[test]
    fn base_runs_without_layers() {
        assert_eq!(greet().call("sam".into()).unwrap(), "Hello, sam");
    }

    #[test]
    fn around_modifies_args_and_result() {
        let loud = Layer::named("Loud");
        let method = greet();
        method.around(&loud, |p| {
            let result = p.proceed_with(p.args().to_uppercase())?;
            Ok(format!("{result}!!!"))
        });

        assert_eq!(method.call("sam".into()).unwrap(), "Hello, sam");
        let _g = with_active_layer(&loud);
        assert_eq!(method.call("sam".into()).unwrap(), "Hello, SAM!!!");
    }

    #[test]
    fn same_kind_on_same_layer_gets_distinct_names() {
        let logged = Layer::named("Logged");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let method = greet();
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            method.before(&logged, move |_| {
                seen.lock().unwrap().push(tag);
                Ok(())
            });
        }

        let names: Vec<String> = method.summaries().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["base", "before@Logged", "before@Logged#2"]);

        assert_eq!(method.unregister("before@Logged", Some(&logged)), 1);
        let _g = with_active_layer(&logged);
        method.call("sam".into()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn records_copy_reflects_registration_order() {
        let loud = Layer::named("Loud");
        let method = greet();
        method.after(&loud, |_, r| Ok(r));

        let records = method.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind(), AdviceKind::BaseAround);
        assert!(records[0].layer().is_none());
        assert_eq!(records[1].kind(), AdviceKind::After);
        assert_eq!(records[1].layer(), Some(&loud));
        assert_eq!(records[1].name(), "after@Loud");

        // The copy outlives changes to the method, and can seed a replacement.
        method.set_records(Vec::new());
        assert!(method.call("sam".into()).is_err());
        method.set_records(records);
        assert_eq!(method.call("sam".into()).unwrap(), "Hello, sam");
    }

    #[test]
    fn register_named_validates_and_unregisters_by_name() {
        let polite = Layer::named("Polite");
        let method = greet();
        let suffix = |_: &Invocation<'_, (), String>, r: String| -> Result<String> {
            Ok(format!("{r}, please"))
        };
        method
            .register_named(
                "please",
                AdviceKind::After,
                Some(&polite),
                always(),
                Implementation::Transform(Arc::new(suffix)),
            )
            .unwrap();

        let err = method
            .register_named(
                "wrong",
                AdviceKind::Around,
                Some(&polite),
                always(),
                Implementation::Transform(Arc::new(suffix)),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::InvalidAdviceKind { .. })
        ));

        {
            let _g = with_active_layer(&polite);
            assert_eq!(method.call("sam".into()).unwrap(), "Hello, sam, please");
        }
        assert_eq!(method.unregister("please", Some(&polite)), 1);
        let _g = with_active_layer(&polite);
        assert_eq!(method.call("sam".into()).unwrap(), "Hello, sam");
    }

    #[test]
    fn missing_base_is_a_configuration_error() {
        let layer = Layer::named("L");
        let method: LayeredFn<u32, u32> = LayeredMethod::new("orphan");
        method.around(&layer, |p| p.proceed());

        let err = method.call(1).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::NothingToProceed { ref method }) if method == "orphan"
        ));
        let _g = with_active_layer(&layer);
        assert!(method.call(1).is_err());
    }

    #[test]
    fn cache_is_keyed_by_exact_combination() {
        let a = Layer::named("A");
        let b = Layer::named("B");
        let method = greet();
        method.after(&a, |_, r| Ok(format!("{r} [a]")));
        method.after(&b, |_, r| Ok(format!("{r} [b]")));

        let ab = LayerCombination::new(vec![a.clone(), b.clone()]);
        let ba = LayerCombination::new(vec![b.clone(), a.clone()]);
        assert_eq!(method.chain_for(&ab).names(), ["after@B", "after@A", "base"]);
        assert_eq!(method.chain_for(&ba).names(), ["after@A", "after@B", "base"]);
        assert_eq!(method.cached_chains(), 2);

        let _g = with_active_layers(&[a, b]);
        // Outermost after runs last.
        assert_eq!(method.call("x".into()).unwrap(), "Hello, x [a] [b]");
    }

    #[test]
    fn registration_invalidates_cached_chains() {
        let layer = Layer::named("Tagged");
        let method = greet();
        let _g = with_active_layer(&layer);
        assert_eq!(method.call("x".into()).unwrap(), "Hello, x");
        assert_eq!(method.cached_chains(), 1);

        method.after(&layer, |_, r| Ok(format!("<{r}>")));
        assert_eq!(method.cached_chains(), 0);
        assert_eq!(method.call("x".into()).unwrap(), "<Hello, x>");

        assert_eq!(method.unregister("after@Tagged", Some(&layer)), 1);
        assert_eq!(method.call("x".into()).unwrap(), "Hello, x");
        assert_eq!(method.unregister("after@Tagged", Some(&layer)), 0);
    }

    #[test]
    fn before_runs_then_continues_with_same_args() {
        let logged = Layer::named("Logged");
        let log = Arc::new(Mutex::new(Vec::new()));
        let method = greet();
        let sink = Arc::clone(&log);
        method.before(&logged, move |inv| {
            sink.lock().unwrap().push(inv.args().clone());
            Ok(())
        });

        let _g = with_active_layer(&logged);
        assert_eq!(method.call("ada".into()).unwrap(), "Hello, ada");
        assert_eq!(*log.lock().unwrap(), vec!["ada".to_string()]);
    }

    #[test]
    fn guard_sees_full_combination() {
        let polite = Layer::named("Polite");
        let formal = Layer::named("Formal");
        let method = greet();
        let needs = formal.clone();
        method.after_when(
            &polite,
            Arc::new(move |combo: &LayerCombination| combo.contains(&needs)),
            |_, r| Ok(format!("{r}, if you please")),
        );

        let _p = with_active_layer(&polite);
        assert_eq!(method.call("x".into()).unwrap(), "Hello, x");
        let _f = with_active_layer(&formal);
        assert_eq!(method.call("x".into()).unwrap(), "Hello, x, if you please");
    }

    #[test]
    fn advice_errors_propagate_unchanged() {
        let strict = Layer::named("Strict");
        let method = greet();
        method.before(&strict, |inv| {
            if inv.args().is_empty() {
                return Err(Error::advice("validate", "empty name"));
            }
            Ok(())
        });
        let _g = with_active_layer(&strict);
        let err = method.call(String::new()).unwrap_err();
        assert_eq!(err.to_string(), "Advice 'validate' failed: empty name");
    }

    #[test]
    fn set_records_replaces_everything() {
        let method = greet();
        method.set_records(Vec::new());
        assert!(method.summaries().is_empty());
        assert!(method.call("x".into()).is_err());
    }

    struct Counter {
        step: u32,
    }

    #[test]
    fn instance_and_type_binding() {
        let method: LayeredMethod<Counter, u32, u32> =
            LayeredMethod::with_base("advance", |p: &Proceeding<'_, Counter, u32, u32>| {
                match p.receiver() {
                    Some(counter) => Ok(p.args() + counter.step),
                    None if p.binding().is_bound() => Ok(*p.args()),
                    None => Err(Error::advice("advance", "unbound")),
                }
            });

        let counter = Arc::new(Counter { step: 5 });
        assert_eq!(method.call_on(&counter, 1).unwrap(), 6);
        assert_eq!(method.call_static(1).unwrap(), 1);
        assert!(method.call(1).is_err());
    }
}
