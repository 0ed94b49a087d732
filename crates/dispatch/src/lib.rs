//! # Stratum Dispatch
//!
//! Layered methods for the Stratum context-oriented runtime.
//!
//! A [`LayeredMethod`] holds an ordered list of advice records, each tagged
//! with a layer (or none, for base behavior) and a guard. On every call the
//! method reads the current layer combination, fetches or builds the
//! matching [`AdviceChain`] and runs it:
//!
//! - **before** advice runs first and passes the arguments on,
//! - **after** advice receives the downstream result and returns the new one,
//! - **around** advice decides when and how to [`proceed`],
//! - **base** advice is the innermost, layer-independent implementation.
//!
//! The most recently activated layer composes outermost.
//!
//! ```ignore
//! use stratum_dispatch::{Layer, LayeredMethod, with_active_layer};
//!
//! let loud = Layer::named("Loud");
//! let greet = LayeredMethod::<(), String, String>::with_base("greet", |p| {
//!     Ok(format!("Hello, {}", p.args()))
//! });
//! greet.around(&loud, |p| Ok(format!("{}!!!", p.proceed_with(p.args().to_uppercase())?)));
//!
//! let _scope = with_active_layer(&loud);
//! assert_eq!(greet.call("sam".into())?, "Hello, SAM!!!");
//! ```

pub mod advice;
pub mod chain;
pub mod dispatch;
pub mod method;
pub mod proceed;
pub mod table;

pub use advice::{AdviceKind, AdviceRecord, AdviceSummary, Guard, Implementation, always};
pub use chain::AdviceChain;
pub use dispatch::{Binding, Invocation, Proceeding};
pub use method::{LayeredFn, LayeredMethod};
pub use proceed::{proceed, proceed_with};
pub use table::{Layered, MethodTable};

// The layer model is part of this crate's API.
pub use stratum_core::{
    ActivationGuard, ActivationSnapshot, ConfigurationError, Error, Layer, LayerCatalog,
    LayerCombination, Result, UsageError, active_layers, active_scope, base_layers,
    current_combination, global_activate_layer, global_deactivate_layer, inactive_scope,
    with_active_layer, with_active_layers, with_inactive_layer, with_inactive_layers,
};
