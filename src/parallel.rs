//! Ordered fan-out over the rayon thread pool.
//!
//! Modules that transform each document independently (rendering, writing,
//! hashing) parallelize through [`map_ordered`] rather than ad-hoc
//! `par_iter` chains. The fan-out and fan-in are explicit: each input gets a
//! result slot up front, workers fill their own slot, and the fan-in walks
//! the slots in input order. Output order therefore always matches input
//! order, and when several workers fail, the error for the earliest input
//! wins, so a failing run reports the same document regardless of thread
//! timing.

use crate::module::EngineError;

/// Apply `f` to every item on the thread pool, preserving input order.
///
/// `f` receives the item's index alongside the item. Blocks until every
/// worker finishes, then returns the outputs in input order, or the error
/// from the lowest-indexed failed item.
pub fn map_ordered<T, U, F>(items: &[T], f: F) -> Result<Vec<U>, EngineError>
where
    T: Sync,
    U: Send,
    F: Fn(usize, &T) -> Result<U, EngineError> + Sync,
{
    let mut slots: Vec<Option<Result<U, EngineError>>> = Vec::with_capacity(items.len());
    slots.resize_with(items.len(), || None);

    rayon::scope(|scope| {
        for (index, (slot, item)) in slots.iter_mut().zip(items).enumerate() {
            let f = &f;
            scope.spawn(move |_| {
                *slot = Some(f(index, item));
            });
        }
    });

    let mut outputs = Vec::with_capacity(items.len());
    for slot in slots {
        match slot {
            Some(Ok(output)) => outputs.push(output),
            Some(Err(err)) => return Err(err),
            // A worker panic unwinds out of rayon::scope, so every slot is
            // filled by the time we get here.
            None => return Err(EngineError::module("worker produced no result")),
        }
    }
    Ok(outputs)
}
