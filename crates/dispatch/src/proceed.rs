//! Free-standing `proceed` for around advice.
//!
//! Every around link pushes a frame onto a thread-local stack while its body
//! runs and pops it when the body returns or unwinds. [`proceed`] continues
//! the innermost frame, so helper functions called from an advice body can
//! delegate without being handed the [`Proceeding`](crate::Proceeding).

use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use stratum_core::{Result, UsageError};
use tracing::trace;

use crate::chain::Link;
use crate::dispatch::CallContext;

thread_local! {
    static FRAMES: RefCell<Vec<Rc<dyn Any>>> = const { RefCell::new(Vec::new()) };
}

/// The continuation of one around link, erased over the receiver type.
struct Frame<A, R> {
    next: Box<dyn Fn(A) -> Result<R>>,
    args: A,
}

/// Pops the frame it pushed when dropped.
pub(crate) struct FrameGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        let _ = FRAMES.try_with(|frames| frames.borrow_mut().pop());
    }
}

pub(crate) fn enter<S, A, R>(cx: &CallContext<S>, next: &Link<S, A, R>, args: &A) -> FrameGuard
where
    S: 'static,
    A: Clone + 'static,
    R: 'static,
{
    let cx = cx.clone();
    let next = Arc::clone(next);
    let frame: Rc<dyn Any> = Rc::new(Frame::<A, R> {
        next: Box::new(move |args: A| next(&cx, args)),
        args: args.clone(),
    });
    FRAMES.with(|frames| frames.borrow_mut().push(frame));
    FrameGuard {
        _not_send: PhantomData,
    }
}

fn current<A: 'static, R: 'static>() -> Result<Rc<Frame<A, R>>> {
    let frame = FRAMES
        .with(|frames| frames.borrow().last().cloned())
        .ok_or(UsageError::OutsideDispatch)?;
    frame
        .downcast::<Frame<A, R>>()
        .map_err(|_| UsageError::SignatureMismatch.into())
}

/// Continue the current around advice with the arguments it received.
///
/// Fails with [`UsageError::OutsideDispatch`] when no around advice is
/// running on this thread, and [`UsageError::SignatureMismatch`] when the
/// running method does not take `A` and return `R`.
pub fn proceed<A: Clone + 'static, R: 'static>() -> Result<R> {
    let frame = current::<A, R>()?;
    trace!(depth = depth(), "proceed()");
    (frame.next)(frame.args.clone())
}

/// Continue the current around advice with different arguments.
pub fn proceed_with<A: 'static, R: 'static>(args: A) -> Result<R> {
    let frame = current::<A, R>()?;
    trace!(depth = depth(), "proceed_with()");
    (frame.next)(args)
}

/// Number of around frames currently running on this thread.
pub fn depth() -> usize {
    FRAMES.with(|frames| frames.borrow().len())
}
