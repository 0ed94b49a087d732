//! Advice chains — the composed call sequence for one layer combination.
//!
//! Chain construction works in two steps:
//!
//! 1. [`select`] picks the eligible records: base records first, then each
//!    layer of the combination in order, each group in registration order,
//!    keeping only records whose guard accepts the combination. The whole
//!    list is then reversed, so the most recently activated layer ends up
//!    outermost and base behavior innermost.
//! 2. [`compose`] folds that list from the inside out into linked closures.
//!    The innermost continuation is a terminal link that fails with
//!    `NothingToProceed`.

use std::sync::Arc;

use stratum_core::{ConfigurationError, LayerCombination, Result};

use crate::advice::{AdviceRecord, Implementation};
use crate::dispatch::{CallContext, Invocation, Proceeding};
use crate::proceed;

/// One link of a chain: runs its advice and whatever follows it.
pub(crate) type Link<S, A, R> = Arc<dyn Fn(&CallContext<S>, A) -> Result<R> + Send + Sync>;

/// An immutable, composed chain for one exact layer combination.
pub struct AdviceChain<S, A, R> {
    head: Link<S, A, R>,
    names: Arc<[String]>,
}

impl<S, A, R> Clone for AdviceChain<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            head: Arc::clone(&self.head),
            names: Arc::clone(&self.names),
        }
    }
}

impl<S, A, R> AdviceChain<S, A, R> {
    /// Advice names, outermost first.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of advice links, not counting the terminal link.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub(crate) fn invoke(&self, cx: &CallContext<S>, args: A) -> Result<R> {
        (self.head)(cx, args)
    }
}

impl<S, A, R> std::fmt::Debug for AdviceChain<S, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdviceChain").field("links", &self.names).finish()
    }
}

/// Eligible records for `combination`, outermost first.
pub(crate) fn select<'r, S, A, R>(
    records: &'r [AdviceRecord<S, A, R>],
    combination: &LayerCombination,
) -> Vec<&'r AdviceRecord<S, A, R>> {
    // A layer listed twice (say, a base layer also activated in a scope)
    // contributes its advice once per listing.
    let slots = std::iter::once(None).chain(combination.iter().map(Some));

    let mut selected = Vec::new();
    for slot in slots {
        for record in records {
            if record.layer.as_ref() == slot && (record.guard)(combination) {
                selected.push(record);
            }
        }
    }
    selected.reverse();
    selected
}

/// Fold `records` (outermost first) into a chain.
pub(crate) fn compose<S, A, R>(records: &[&AdviceRecord<S, A, R>]) -> AdviceChain<S, A, R>
where
    S: 'static,
    A: Clone + 'static,
    R: 'static,
{
    let mut next: Link<S, A, R> = terminal();
    for record in records.iter().rev() {
        next = wrap(&record.implementation, next);
    }
    AdviceChain {
        head: next,
        names: records.iter().map(|r| r.name.clone()).collect(),
    }
}

fn terminal<S: 'static, A: 'static, R: 'static>() -> Link<S, A, R> {
    Arc::new(|cx: &CallContext<S>, _: A| -> Result<R> {
        Err(ConfigurationError::NothingToProceed {
            method: cx.method.to_string(),
        }
        .into())
    })
}

fn wrap<S, A, R>(implementation: &Implementation<S, A, R>, next: Link<S, A, R>) -> Link<S, A, R>
where
    S: 'static,
    A: Clone + 'static,
    R: 'static,
{
    match implementation {
        Implementation::Observe(f) => {
            let f = Arc::clone(f);
            Arc::new(move |cx: &CallContext<S>, args: A| -> Result<R> {
                f(&Invocation::new(cx, &args))?;
                next(cx, args)
            })
        }
        Implementation::Transform(f) => {
            let f = Arc::clone(f);
            Arc::new(move |cx: &CallContext<S>, args: A| -> Result<R> {
                let result = next(cx, args.clone())?;
                f(&Invocation::new(cx, &args), result)
            })
        }
        Implementation::Intercept(f) => {
            let f = Arc::clone(f);
            Arc::new(move |cx: &CallContext<S>, args: A| -> Result<R> {
                let _frame = proceed::enter(cx, &next, &args);
                f(&Proceeding::new(cx, &args, &next))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::{AdviceKind, Guard, always};
    use stratum_core::Layer;

    type Rec = AdviceRecord<(), u32, u32>;

    fn around(layer: Option<&Layer>, name: &str, guard: Guard) -> Rec {
        let kind = if layer.is_some() {
            AdviceKind::Around
        } else {
            AdviceKind::BaseAround
        };
        let body = |p: &Proceeding<'_, (), u32, u32>| p.proceed();
        AdviceRecord::new(kind, layer.cloned(), Implementation::Intercept(Arc::new(body)), guard, name)
            .unwrap()
    }

    fn names(selected: &[&Rec]) -> Vec<String> {
        selected.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn most_recent_layer_is_outermost() {
        let l1 = Layer::named("L1");
        let l2 = Layer::named("L2");
        let records = vec![
            around(None, "base", always()),
            around(Some(&l2), "l2", always()),
            around(Some(&l1), "l1", always()),
        ];
        let combo = LayerCombination::new(vec![l1, l2]);
        assert_eq!(names(&select(&records, &combo)), vec!["l2", "l1", "base"]);
    }

    #[test]
    fn registration_order_within_layer_is_reversed_with_the_list() {
        let l = Layer::named("L");
        let records = vec![
            around(Some(&l), "first", always()),
            around(Some(&l), "second", always()),
        ];
        let combo = LayerCombination::new(vec![l]);
        assert_eq!(names(&select(&records, &combo)), vec!["second", "first"]);
    }

    #[test]
    fn inactive_layers_and_false_guards_are_skipped() {
        let on = Layer::named("On");
        let off = Layer::named("Off");
        let never: Guard = Arc::new(|_: &LayerCombination| false);
        let records = vec![
            around(None, "base", always()),
            around(Some(&off), "off", always()),
            around(Some(&on), "guarded", never),
            around(Some(&on), "on", always()),
        ];
        let combo = LayerCombination::new(vec![on]);
        assert_eq!(names(&select(&records, &combo)), vec!["on", "base"]);
    }

    #[test]
    fn repeated_layer_contributes_once_per_listing() {
        let a = Layer::named("A");
        let b = Layer::named("B");
        let records = vec![
            around(Some(&a), "a", always()),
            around(Some(&b), "b", always()),
        ];
        let combo = LayerCombination::new(vec![a.clone(), b, a]);
        assert_eq!(names(&select(&records, &combo)), vec!["a", "b", "a"]);
    }

    #[test]
    fn empty_chain_hits_terminal_link() {
        let chain: AdviceChain<(), u32, u32> = compose(&[]);
        assert!(chain.is_empty());
        let cx = CallContext {
            binding: crate::dispatch::Binding::Unbound,
            combination: LayerCombination::empty(),
            method: Arc::from("nothing"),
        };
        let err = chain.invoke(&cx, 1).unwrap_err();
        assert!(err.to_string().contains("nothing"));
    }
}
