//! Hooks a caller hands to long-running encodes: a [`Progress`] sink for
//! completion fractions, and an [`enough::Stop`] probe for cancellation.

pub use enough::{Stop, Unstoppable};

use crate::CodecResult;
use crate::CodecError::*;


/// Receives completion fractions in `0.0..=1.0`
///
/// Fractions reported by a single operation never decrease, and a successful
/// operation reports `1.0` last.  Reports may arrive from worker threads.
///
/// Any `Fn(f32) + Sync` closure is a [`Progress`]:
/// ```
/// # use frame_codec::Progress;
/// # use std::sync::Mutex;
/// let seen = Mutex::new(vec![]);
/// let sink = |f: f32| seen.lock().unwrap().push(f);
/// sink.report(0.5);
/// assert_eq!(*seen.lock().unwrap(), vec![0.5]);
/// ```
pub trait Progress: Sync {
	/// Record that `fraction` of the work is done.
	fn report(&self, fraction: f32);
}


impl<F> Progress for F where F: Fn(f32) + Sync {
	fn report(&self, fraction: f32) {
		self(fraction);
	}
}


/// [`Progress`] that discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;


impl Progress for NoProgress {
	fn report(&self, _fraction: f32) {}
}


/// Poll `stop`, mapping a stop request to [`Cancelled`].
///
/// # Errors
/// - [`Cancelled`]: `stop` asked the operation to stop.
pub(crate) fn check_stop(stop: &dyn Stop) -> CodecResult<()> {
	stop.check().map_err(|_| Cancelled)
}


#[test]
fn unstoppable_never_cancels() {
	assert_eq!(check_stop(&Unstoppable), Ok(()));
	NoProgress.report(0.25);
}
