//! Layer activation — scoped per-thread state plus process-wide base layers.
//!
//! Two independent pieces of state feed every dispatch:
//!
//! 1. **Active layers** — thread-local, changed only through scope guards
//!    returned by [`with_active_layers`] / [`with_inactive_layers`]. Dropping a
//!    guard undoes exactly its own change, so scopes nest with stack
//!    discipline, survive `?` and panics, and may even be dropped out of
//!    order.
//! 2. **Base layers** — shared by all threads, changed through
//!    [`global_activate_layer`] / [`global_deactivate_layer`]. Guarded by an
//!    `RwLock`; expected to change rarely (typically during startup).
//!
//! The dispatch key is always `base ++ active`, see [`current_combination`].

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, trace};

use crate::error::{ConfigurationError, Result};
use crate::layer::{Layer, LayerCombination};

thread_local! {
    static ACTIVE: RefCell<ScopeStack> = RefCell::new(ScopeStack::default());
}

static BASE_LAYERS: RwLock<Vec<Layer>> = RwLock::new(Vec::new());

/// How one scope changes the set it was entered with.
enum ScopeOp {
    Activate(Arc<[Layer]>),
    Deactivate(Arc<[Layer]>),
    Install(Arc<[Layer]>),
}

impl ScopeOp {
    fn apply(&self, current: &[Layer]) -> Arc<[Layer]> {
        match self {
            Self::Activate(layers) => {
                let mut next: Vec<Layer> = current
                    .iter()
                    .filter(|layer| !layers.contains(layer))
                    .cloned()
                    .collect();
                for (i, layer) in layers.iter().enumerate() {
                    // A layer listed twice keeps its last position.
                    if !layers[i + 1..].contains(layer) {
                        next.push(layer.clone());
                    }
                }
                next.into()
            }
            Self::Deactivate(layers) => current
                .iter()
                .filter(|layer| !layers.contains(layer))
                .cloned()
                .collect::<Vec<_>>()
                .into(),
            Self::Install(layers) => Arc::clone(layers),
        }
    }
}

struct Scope {
    id: u64,
    op: ScopeOp,
    /// The set this scope was entered with.
    before: Arc<[Layer]>,
}

/// Open scopes on one thread, innermost last, plus the resulting set.
struct ScopeStack {
    scopes: Vec<Scope>,
    current: Arc<[Layer]>,
    next_id: u64,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self {
            scopes: Vec::new(),
            current: Arc::from(Vec::new()),
            next_id: 0,
        }
    }
}

impl ScopeStack {
    fn push(&mut self, op: ScopeOp) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let before = Arc::clone(&self.current);
        self.current = op.apply(&before);
        self.scopes.push(Scope { id, op, before });
        id
    }

    /// Close scope `id`. Scopes opened after it are replayed on top of the
    /// set it was entered with, so closing out of order drops only its own
    /// effect.
    fn close(&mut self, id: u64) {
        let Some(pos) = self.scopes.iter().position(|scope| scope.id == id) else {
            return;
        };
        let removed = self.scopes.remove(pos);
        if pos == self.scopes.len() {
            self.current = removed.before;
            return;
        }
        debug!(
            closed = pos,
            open = self.scopes.len(),
            "Layer scope closed out of order, replaying inner scopes"
        );
        let mut current = removed.before;
        for scope in &mut self.scopes[pos..] {
            scope.before = Arc::clone(&current);
            current = scope.op.apply(&current);
        }
        self.current = current;
    }
}

/// Restores the previous set of active layers when dropped.
///
/// Guards are tied to the thread that created them. A guard dropped while
/// newer guards are still alive removes only its own change; the newer
/// scopes keep theirs.
#[must_use = "layers are deactivated again as soon as the guard is dropped"]
pub struct ActivationGuard {
    id: u64,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        // The thread-local may already be gone during thread teardown.
        let _ = ACTIVE.try_with(|stack| stack.borrow_mut().close(self.id));
        trace!(scope = self.id, "Closed layer scope");
    }
}

fn enter(op: ScopeOp) -> ActivationGuard {
    let id = ACTIVE.with(|stack| stack.borrow_mut().push(op));
    ActivationGuard {
        id,
        _not_send: PhantomData,
    }
}

/// Activate `layers` for the lifetime of the returned guard.
///
/// Layers already active are moved to the end, so the listed layers take the
/// highest precedence in the order given.
pub fn with_active_layers(layers: &[Layer]) -> ActivationGuard {
    trace!(activated = layers.len(), "Entering active-layer scope");
    enter(ScopeOp::Activate(layers.into()))
}

/// Deactivate `layers` for the lifetime of the returned guard.
pub fn with_inactive_layers(layers: &[Layer]) -> ActivationGuard {
    trace!(deactivated = layers.len(), "Entering inactive-layer scope");
    enter(ScopeOp::Deactivate(layers.into()))
}

pub fn with_active_layer(layer: &Layer) -> ActivationGuard {
    with_active_layers(std::slice::from_ref(layer))
}

pub fn with_inactive_layer(layer: &Layer) -> ActivationGuard {
    with_inactive_layers(std::slice::from_ref(layer))
}

/// Run `f` with `layers` active.
pub fn active_scope<T>(layers: &[Layer], f: impl FnOnce() -> T) -> T {
    let _guard = with_active_layers(layers);
    f()
}

/// Run `f` with `layers` inactive.
pub fn inactive_scope<T>(layers: &[Layer], f: impl FnOnce() -> T) -> T {
    let _guard = with_inactive_layers(layers);
    f()
}

/// The layers activated on the current thread, lowest precedence first.
pub fn active_layers() -> Vec<Layer> {
    ACTIVE.with(|stack| stack.borrow().current.to_vec())
}

/// The process-wide base layers.
pub fn base_layers() -> Vec<Layer> {
    BASE_LAYERS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// `base ++ active` for the current thread.
pub fn current_combination() -> LayerCombination {
    let base = BASE_LAYERS.read().unwrap_or_else(PoisonError::into_inner);
    ACTIVE.with(|stack| LayerCombination::concat(&base, &stack.borrow().current))
}

/// Add `layer` to the base layers. Returns the resulting base set.
pub fn global_activate_layer(layer: &Layer) -> Result<Vec<Layer>> {
    let mut base = BASE_LAYERS.write().unwrap_or_else(PoisonError::into_inner);
    if base.contains(layer) {
        return Err(ConfigurationError::LayerAlreadyActive {
            layer: layer.identifier(),
        }
        .into());
    }
    base.push(layer.clone());
    info!(layer = %layer.identifier(), base = base.len(), "Globally activated layer");
    Ok(base.clone())
}

/// Remove `layer` from the base layers. Returns the resulting base set.
pub fn global_deactivate_layer(layer: &Layer) -> Result<Vec<Layer>> {
    let mut base = BASE_LAYERS.write().unwrap_or_else(PoisonError::into_inner);
    if !base.contains(layer) {
        return Err(ConfigurationError::LayerNotActive {
            layer: layer.identifier(),
        }
        .into());
    }
    base.retain(|l| l != layer);
    info!(layer = %layer.identifier(), base = base.len(), "Globally deactivated layer");
    Ok(base.clone())
}

/// A captured copy of the current thread's active layers.
///
/// Active layers never leak across threads; a snapshot is how a caller hands
/// its layer context to a thread it spawns.
#[derive(Debug, Clone)]
pub struct ActivationSnapshot {
    layers: Arc<[Layer]>,
}

impl ActivationSnapshot {
    pub fn capture() -> Self {
        Self {
            layers: ACTIVE.with(|stack| Arc::clone(&stack.borrow().current)),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Install the captured layers on the current thread until the guard drops.
    pub fn enter(&self) -> ActivationGuard {
        enter(ScopeOp::Install(Arc::clone(&self.layers)))
    }

    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.enter();
        f()
    }
}
