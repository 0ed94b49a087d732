//! # Stratum Core
//!
//! Layers, layer activation and error definitions for the Stratum
//! context-oriented runtime. Method dispatch itself lives in
//! `stratum-dispatch`; this crate only answers "which layers are active
//! right now".
//!
//! ## Model
//!
//! - A [`Layer`] is an identity token.
//! - Each thread has its own stack of scoped active layers, changed through
//!   guards ([`with_active_layers`], [`with_inactive_layers`]).
//! - The process shares a set of base layers that are always active
//!   ([`global_activate_layer`]).
//! - [`current_combination`] is base layers followed by active layers, the
//!   key every layered call dispatches on.

pub mod activation;
pub mod catalog;
pub mod error;
pub mod layer;

// Re-export key types at crate root for ergonomics
pub use activation::{
    ActivationGuard, ActivationSnapshot, active_layers, active_scope, base_layers,
    current_combination, global_activate_layer, global_deactivate_layer, inactive_scope,
    with_active_layer, with_active_layers, with_inactive_layer, with_inactive_layers,
};
pub use catalog::LayerCatalog;
pub use error::{ConfigurationError, Error, Result, UsageError};
pub use layer::{Layer, LayerCombination};
