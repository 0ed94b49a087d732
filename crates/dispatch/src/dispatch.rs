//! Per-call dispatch state: the receiver binding and what an advice body can
//! see about the call it is part of.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use stratum_core::{Layer, LayerCombination, Result};

use crate::chain::Link;

/// How a layered method is bound for one call.
pub enum Binding<S> {
    /// Plain function call; implementations run without a receiver.
    Unbound,
    /// Bound to a receiver instance.
    Instance(Arc<S>),
    /// Bound to the receiver type (associated function).
    Type,
}

impl<S> Binding<S> {
    pub fn receiver(&self) -> Option<&Arc<S>> {
        match self {
            Self::Instance(receiver) => Some(receiver),
            Self::Unbound | Self::Type => None,
        }
    }

    /// Name of the bound type, or `None` for unbound calls.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            Self::Unbound => None,
            Self::Instance(_) | Self::Type => Some(std::any::type_name::<S>()),
        }
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self, Self::Unbound)
    }
}

impl<S> Clone for Binding<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Unbound => Self::Unbound,
            Self::Instance(receiver) => Self::Instance(Arc::clone(receiver)),
            Self::Type => Self::Type,
        }
    }
}

impl<S> fmt::Debug for Binding<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => f.write_str("Unbound"),
            Self::Instance(_) => write!(f, "Instance({})", std::any::type_name::<S>()),
            Self::Type => write!(f, "Type({})", std::any::type_name::<S>()),
        }
    }
}

/// Owned context shared by every link of one dispatch.
pub(crate) struct CallContext<S> {
    pub(crate) binding: Binding<S>,
    pub(crate) combination: LayerCombination,
    pub(crate) method: Arc<str>,
}

impl<S> Clone for CallContext<S> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding.clone(),
            combination: self.combination.clone(),
            method: Arc::clone(&self.method),
        }
    }
}

/// What a before/after advice body sees of the current call.
pub struct Invocation<'a, S, A> {
    cx: &'a CallContext<S>,
    args: &'a A,
}

impl<'a, S, A> Invocation<'a, S, A> {
    pub(crate) fn new(cx: &'a CallContext<S>, args: &'a A) -> Self {
        Self { cx, args }
    }

    /// The arguments this advice was called with.
    pub fn args(&self) -> &A {
        self.args
    }

    pub fn binding(&self) -> &Binding<S> {
        &self.cx.binding
    }

    /// The receiver, when the call is instance-bound.
    pub fn receiver(&self) -> Option<&S> {
        self.cx.binding.receiver().map(|r| r.as_ref())
    }

    /// The active-layer combination this call dispatched on.
    pub fn combination(&self) -> &LayerCombination {
        &self.cx.combination
    }

    pub fn is_active(&self, layer: &Layer) -> bool {
        self.cx.combination.contains(layer)
    }

    pub fn method_name(&self) -> &str {
        &self.cx.method
    }
}

/// What an around (or base) advice body sees: the invocation plus the next
/// link of the chain.
pub struct Proceeding<'a, S, A, R> {
    invocation: Invocation<'a, S, A>,
    next: &'a Link<S, A, R>,
}

impl<'a, S, A: Clone, R> Proceeding<'a, S, A, R> {
    pub(crate) fn new(cx: &'a CallContext<S>, args: &'a A, next: &'a Link<S, A, R>) -> Self {
        Self {
            invocation: Invocation::new(cx, args),
            next,
        }
    }

    /// Continue with the arguments this advice received.
    pub fn proceed(&self) -> Result<R> {
        (self.next)(self.invocation.cx, self.invocation.args.clone())
    }

    /// Continue with different arguments.
    pub fn proceed_with(&self, args: A) -> Result<R> {
        (self.next)(self.invocation.cx, args)
    }
}

impl<'a, S, A, R> Deref for Proceeding<'a, S, A, R> {
    type Target = Invocation<'a, S, A>;

    fn deref(&self) -> &Self::Target {
        &self.invocation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter;

    #[test]
    fn binding_variants() {
        let unbound: Binding<Greeter> = Binding::Unbound;
        assert!(!unbound.is_bound());
        assert!(unbound.receiver().is_none());
        assert!(unbound.type_name().is_none());

        let instance = Binding::Instance(Arc::new(Greeter));
        assert!(instance.is_bound());
        assert!(instance.receiver().is_some());
        assert!(instance.type_name().unwrap().ends_with("Greeter"));

        let ty: Binding<Greeter> = Binding::Type;
        assert!(ty.receiver().is_none());
        assert!(ty.type_name().is_some());
        assert!(format!("{ty:?}").starts_with("Type("));
    }
}
