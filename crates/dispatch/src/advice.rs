//! Advice records — one piece of layered behavior registered on a method.

use std::fmt;
use std::sync::Arc;

use stratum_core::{ConfigurationError, Layer, LayerCombination, Result};

use crate::dispatch::{Invocation, Proceeding};

/// When an advice runs relative to the rest of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdviceKind {
    /// Runs first, then the chain continues with the same arguments.
    Before,
    /// Full control over whether and how the chain continues.
    Around,
    /// Runs on the downstream result and replaces it.
    After,
    /// The layer-independent default implementation.
    BaseAround,
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Before => "before",
            Self::Around => "around",
            Self::After => "after",
            Self::BaseAround => "base",
        };
        f.pad(s)
    }
}

/// Eligibility predicate over the full active-layer combination.
pub type Guard = Arc<dyn Fn(&LayerCombination) -> bool + Send + Sync>;

/// The guard every advice gets unless one is supplied.
pub fn always() -> Guard {
    Arc::new(|_: &LayerCombination| true)
}

pub type BeforeFn<S, A> = Arc<dyn Fn(&Invocation<'_, S, A>) -> Result<()> + Send + Sync>;
pub type AfterFn<S, A, R> = Arc<dyn Fn(&Invocation<'_, S, A>, R) -> Result<R> + Send + Sync>;
pub type AroundFn<S, A, R> = Arc<dyn Fn(&Proceeding<'_, S, A, R>) -> Result<R> + Send + Sync>;

/// An advice body. Each shape fits specific kinds, see [`AdviceRecord::new`].
pub enum Implementation<S, A, R> {
    /// Sees the call, cannot change its result.
    Observe(BeforeFn<S, A>),
    /// Receives the downstream result and returns the new one.
    Transform(AfterFn<S, A, R>),
    /// Controls the rest of the chain through `proceed`.
    Intercept(AroundFn<S, A, R>),
}

impl<S, A, R> Implementation<S, A, R> {
    fn shape(&self) -> &'static str {
        match self {
            Self::Observe(_) => "observe",
            Self::Transform(_) => "transform",
            Self::Intercept(_) => "intercept",
        }
    }
}

impl<S, A, R> Clone for Implementation<S, A, R> {
    fn clone(&self) -> Self {
        match self {
            Self::Observe(f) => Self::Observe(Arc::clone(f)),
            Self::Transform(f) => Self::Transform(Arc::clone(f)),
            Self::Intercept(f) => Self::Intercept(Arc::clone(f)),
        }
    }
}

/// One registered advice: (layer, implementation, kind, guard, name).
///
/// `layer = None` marks base behavior, eligible under every combination.
pub struct AdviceRecord<S, A, R> {
    pub(crate) layer: Option<Layer>,
    pub(crate) kind: AdviceKind,
    pub(crate) implementation: Implementation<S, A, R>,
    pub(crate) guard: Guard,
    pub(crate) name: String,
}

impl<S, A, R> AdviceRecord<S, A, R> {
    /// Build a record, checking that `implementation` fits `kind` and that
    /// base advice carries no layer.
    pub fn new(
        kind: AdviceKind,
        layer: Option<Layer>,
        implementation: Implementation<S, A, R>,
        guard: Guard,
        name: impl Into<String>,
    ) -> Result<Self> {
        let fits = matches!(
            (kind, &implementation),
            (AdviceKind::Before, Implementation::Observe(_))
                | (AdviceKind::After, Implementation::Transform(_))
                | (AdviceKind::Around, Implementation::Intercept(_))
                | (AdviceKind::BaseAround, Implementation::Intercept(_))
        );
        if !fits {
            return Err(ConfigurationError::InvalidAdviceKind {
                kind: kind.to_string(),
                expected: implementation.shape().to_string(),
            }
            .into());
        }
        if let (AdviceKind::BaseAround, Some(layer)) = (kind, &layer) {
            return Err(ConfigurationError::BaseWithLayer {
                layer: layer.identifier(),
            }
            .into());
        }
        Ok(Self {
            layer,
            kind,
            implementation,
            guard,
            name: name.into(),
        })
    }

    pub fn layer(&self) -> Option<&Layer> {
        self.layer.as_ref()
    }

    pub fn kind(&self) -> AdviceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn summary(&self) -> AdviceSummary {
        AdviceSummary {
            layer: self.layer.clone(),
            kind: self.kind,
            name: self.name.clone(),
        }
    }

    /// Default display name: kind plus layer.
    pub(crate) fn default_name(kind: AdviceKind, layer: Option<&Layer>) -> String {
        match layer {
            Some(layer) => format!("{kind}@{}", layer.identifier()),
            None => kind.to_string(),
        }
    }
}

impl<S, A, R> Clone for AdviceRecord<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            layer: self.layer.clone(),
            kind: self.kind,
            implementation: self.implementation.clone(),
            guard: Arc::clone(&self.guard),
            name: self.name.clone(),
        }
    }
}

impl<S, A, R> fmt::Debug for AdviceRecord<S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdviceRecord")
            .field("layer", &self.layer)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

/// Signature-independent description of a registered advice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdviceSummary {
    pub layer: Option<Layer>,
    pub kind: AdviceKind,
    pub name: String,
}
