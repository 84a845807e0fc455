use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tokio_util::sync::CancellationToken;
use tracing;

/// State shared between a `WorkRequest` and the job it was returned for.
///
/// The worker holds `delivery_lock` from the cancellation check until the
/// callback returns, and cancellation takes the same lock. The lock is
/// reentrant so a callback may drop its own request on the worker thread.
pub(crate) struct RequestState {
  request_id: u64,
  token: CancellationToken,
  delivery_lock: ReentrantMutex<()>,
}

impl RequestState {
  pub(crate) fn new(request_id: u64) -> Arc<Self> {
    Arc::new(Self {
      request_id,
      token: CancellationToken::new(),
      delivery_lock: ReentrantMutex::new(()),
    })
  }

  pub(crate) fn is_canceled(&self) -> bool {
    self.token.is_cancelled()
  }

  /// Runs `deliver` unless the request was canceled. Returns whether it ran.
  pub(crate) fn deliver<F: FnOnce()>(&self, deliver: F) -> bool {
    let _guard = self.delivery_lock.lock();
    if self.token.is_cancelled() {
      return false;
    }
    deliver();
    true
  }

  /// Blocks while a callback for this request is running on another thread.
  fn cancel(&self) {
    let _guard = self.delivery_lock.lock();
    self.token.cancel();
  }
}

impl fmt::Debug for RequestState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RequestState")
      .field("request_id", &self.request_id)
      .field("canceled", &self.token.is_cancelled())
      .finish_non_exhaustive()
  }
}

/// A handle to a job dispatched on a `WorkerPool`.
///
/// Dropping it tells the pool the result is no longer wanted. After `drop`
/// returns the job's callback will not be invoked; if the callback was already
/// running, `drop` waits for it to finish first.
///
/// Because of that wait, do not drop a request while holding a lock its
/// callback also takes: the dropping thread and the worker would deadlock.
/// Dropping the request from inside its own callback is fine.
#[must_use = "dropping a WorkRequest cancels delivery of the job's result"]
pub struct WorkRequest {
  state: Arc<RequestState>,
}

impl WorkRequest {
  pub(crate) fn new(state: Arc<RequestState>) -> Self {
    Self { state }
  }
}

impl fmt::Debug for WorkRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkRequest")
      .field("request_id", &self.state.request_id)
      .finish()
  }
}

impl Drop for WorkRequest {
  fn drop(&mut self) {
    if !self.state.is_canceled() {
      tracing::trace!(request_id = %self.state.request_id, "WorkRequest dropped, canceling delivery.");
    }
    self.state.cancel();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::mpsc;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn deliver_runs_while_request_is_alive() {
    let state = RequestState::new(1);
    let _request = WorkRequest::new(state.clone());
    let ran = AtomicBool::new(false);

    assert!(state.deliver(|| ran.store(true, Ordering::SeqCst)));
    assert!(ran.load(Ordering::SeqCst));
  }

  #[test]
  fn dropped_request_suppresses_delivery() {
    let state = RequestState::new(2);
    drop(WorkRequest::new(state.clone()));

    assert!(state.is_canceled());
    assert!(!state.deliver(|| panic!("callback must not run after cancellation")));
  }

  #[test]
  fn callback_may_drop_its_own_request() {
    let state = RequestState::new(3);
    let slot = parking_lot::Mutex::new(Some(WorkRequest::new(state.clone())));

    let delivered = state.deliver(|| {
      slot.lock().take();
    });

    assert!(delivered);
    assert!(state.is_canceled());
  }

  #[test]
  fn drop_waits_for_in_flight_callback() {
    let state = RequestState::new(4);
    let request = WorkRequest::new(state.clone());
    let finished = Arc::new(AtomicBool::new(false));
    let (started_tx, started_rx) = mpsc::channel();

    let worker = {
      let state = state.clone();
      let finished = finished.clone();
      thread::spawn(move || {
        state.deliver(|| {
          started_tx.send(()).unwrap();
          thread::sleep(Duration::from_millis(100));
          finished.store(true, Ordering::SeqCst);
        });
      })
    };

    started_rx.recv().unwrap();
    drop(request);
    assert!(
      finished.load(Ordering::SeqCst),
      "drop returned before the running callback completed"
    );
    worker.join().unwrap();
  }
}
