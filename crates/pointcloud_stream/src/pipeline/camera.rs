//! CameraSlot - the one piece of state shared between actors.
//!
//! The renderer publishes the combined camera matrix after each quiet frame;
//! the scheduler snapshots it once per tick. A condition variable gates the
//! scheduler until the first matrix exists.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use glam::DMat4;

use crate::error::StreamError;

/// Lock-guarded camera matrix with an initialization gate.
#[derive(Debug, Default)]
pub struct CameraSlot {
	matrix: Mutex<Option<DMat4>>,
	ready: Condvar,
}

impl CameraSlot {
	pub fn new() -> Self {
		Self::default()
	}

	/// Store `matrix` and wake any waiter.
	pub fn publish(&self, matrix: DMat4) {
		*self.lock() = Some(matrix);
		self.ready.notify_all();
	}

	/// Latest matrix, if one has been published.
	pub fn snapshot(&self) -> Option<DMat4> {
		*self.lock()
	}

	/// Block until the first matrix is published.
	///
	/// Fails with [`StreamError::InitializationTimeout`] after `timeout`.
	pub fn wait_ready(&self, timeout: Duration) -> Result<DMat4, StreamError> {
		let guard = self.lock();
		let (guard, _) = self
			.ready
			.wait_timeout_while(guard, timeout, |matrix| matrix.is_none())
			.unwrap_or_else(PoisonError::into_inner);
		(*guard).ok_or(StreamError::InitializationTimeout(timeout))
	}

	// The slot holds plain data, so a poisoned lock is still usable.
	fn lock(&self) -> MutexGuard<'_, Option<DMat4>> {
		self.matrix.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::thread;

	use super::*;

	#[test]
	fn test_snapshot_before_publish() {
		let slot = CameraSlot::new();
		assert!(slot.snapshot().is_none());
		slot.publish(DMat4::IDENTITY);
		assert_eq!(slot.snapshot(), Some(DMat4::IDENTITY));
	}

	#[test]
	fn test_wait_ready_times_out() {
		let slot = CameraSlot::new();
		let err = slot.wait_ready(Duration::from_millis(20)).unwrap_err();
		assert!(matches!(err, StreamError::InitializationTimeout(d) if d == Duration::from_millis(20)));
	}

	#[test]
	fn test_wait_ready_wakes_on_publish() {
		let slot = Arc::new(CameraSlot::new());
		let publisher = {
			let slot = slot.clone();
			thread::spawn(move || {
				thread::sleep(Duration::from_millis(10));
				slot.publish(DMat4::from_scale(glam::DVec3::splat(2.0)));
			})
		};
		let matrix = slot.wait_ready(Duration::from_secs(5)).unwrap();
		assert_eq!(matrix, DMat4::from_scale(glam::DVec3::splat(2.0)));
		publisher.join().unwrap();
	}
}
