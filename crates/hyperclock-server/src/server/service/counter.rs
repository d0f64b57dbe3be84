use hyperclock_core::Error;
use portable_atomic::{AtomicI64, Ordering};

/// The service's one piece of externally visible mutable state.
///
/// Updates are a single checked fetch-and-add, so any number of concurrent
/// callers each observe the value right after their own update and no update
/// is ever lost.
#[derive(Debug)]
pub struct SharedCounter {
    value: AtomicI64,
}

impl SharedCounter {
    pub const fn new(initial: i64) -> Self {
        Self {
            value: AtomicI64::new(initial),
        }
    }

    /// Adds `delta` and returns the value after the update.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] without touching the value if the result
    /// would not fit in an `i64`.
    pub fn increment(&self, delta: i64) -> Result<i64, Error> {
        let previous = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(delta)
            })
            .map_err(|current| Error::Overflow {
                context: format!("counter at {current} cannot be incremented by {delta}"),
            })?;

        // Cannot overflow: `fetch_update` just stored this exact sum.
        Ok(previous + delta)
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }
}
