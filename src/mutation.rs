//! Generic "mutation with optimistic rollback" execution facility.
//!
//! A [`Mutation`] drives one caller-supplied asynchronous write operation
//! through a [`MutationLifecycle`]: the lifecycle's `begin` runs synchronously
//! (cancel refetches, snapshot, optimistic cache write) before the write is
//! dispatched, and once the write settles the success or error handler
//! reconciles or rolls back the cache.
//!
//! # Example
//!
//! ```ignore
//! let lifecycle = OptimisticCreate::new(cache.clone(), QueryKey::new(["todos"]));
//! let mut mutation = Mutation::new(lifecycle);
//!
//! // Cache is updated optimistically before the write goes out.
//! mutation.dispatch(json!({"title": "new todo"}), move |item| {
//!     let api = api.clone();
//!     let item = item.clone();
//!     async move { api.create_todo(item).await }
//! })?;
//!
//! // In the event loop tick
//! if mutation.poll() {
//!     // Settled: cache reconciled (success) or rolled back (error).
//! }
//! ```

use std::future::Future;
use tokio::sync::mpsc;

use crate::error::Error;

/// One optimistic operation's lifecycle handlers.
///
/// `begin` produces the operation's [`Context`](MutationLifecycle::Context) -
/// an explicit value (snapshot, temp id, undo state) threaded through the
/// remaining phases, owned by the single invocation that created it.
pub trait MutationLifecycle {
  /// What the write operation is invoked with.
  type Payload;
  /// What a successful write resolves to.
  type Output;
  /// Per-invocation state carried from `begin` to settlement.
  type Context;

  /// Pre-flight: cancel in-flight fetches, snapshot the cache entry, apply
  /// the optimistic transform, write it back. Runs before the write is
  /// dispatched.
  fn begin(&self, payload: &Self::Payload) -> Result<Self::Context, Error>;

  /// The write resolved: reconcile the cache with server-confirmed data.
  fn on_success(&self, context: &mut Self::Context, output: &Self::Output) -> Result<(), Error>;

  /// The write failed: restore the snapshot captured in `begin`.
  fn on_error(&self, context: &mut Self::Context);

  /// Runs after success or error handling, regardless of outcome. Extension
  /// point for cache invalidation; does nothing by default.
  fn on_settled(&self, _context: &mut Self::Context) {}
}

/// The state of a mutation.
#[derive(Debug, Clone)]
pub enum MutationState<T, E> {
  /// Mutation has not been dispatched
  Idle,
  /// Write operation is in flight; the cache already holds the optimistic value
  Pending,
  /// Write resolved and the cache was reconciled
  Success(T),
  /// Write failed (or reconciliation did); rollback has run where applicable
  Error(E),
}

impl<T, E> MutationState<T, E> {
  pub fn is_pending(&self) -> bool {
    matches!(self, MutationState::Pending)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, MutationState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, MutationState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      MutationState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&E> {
    match self {
      MutationState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// Drives one lifecycle around one asynchronous write operation.
///
/// The error type `E` is the caller's own write error; it travels through
/// unchanged. Library failures (abandoned write task, reconciliation errors)
/// enter it via `From<Error>`.
pub struct Mutation<L: MutationLifecycle, E> {
  lifecycle: L,
  state: MutationState<L::Output, E>,
  context: Option<L::Context>,
  receiver: Option<mpsc::UnboundedReceiver<Result<L::Output, E>>>,
}

impl<L, E> Mutation<L, E>
where
  L: MutationLifecycle,
  L::Output: Send + 'static,
  E: From<Error> + Send + 'static,
{
  /// Wrap a lifecycle, ready to dispatch.
  pub fn new(lifecycle: L) -> Self {
    Self {
      lifecycle,
      state: MutationState::Idle,
      context: None,
      receiver: None,
    }
  }

  /// Current state of the mutation.
  pub fn state(&self) -> &MutationState<L::Output, E> {
    &self.state
  }

  /// The in-flight (or settled) invocation's context, if any.
  pub fn context(&self) -> Option<&L::Context> {
    self.context.as_ref()
  }

  /// The underlying lifecycle.
  pub fn lifecycle(&self) -> &L {
    &self.lifecycle
  }

  /// Run `begin` synchronously, then spawn the write operation.
  ///
  /// By the time this returns, the cache already holds the optimistic value.
  /// A no-op while a previous dispatch is still pending. A `begin` failure
  /// is returned without dispatching anything - the cache was not touched
  /// beyond what `begin` itself did before failing.
  pub fn dispatch<F, Fut>(&mut self, payload: L::Payload, write: F) -> Result<(), Error>
  where
    F: FnOnce(&L::Payload) -> Fut,
    Fut: Future<Output = Result<L::Output, E>> + Send + 'static,
  {
    if self.state.is_pending() {
      return Ok(());
    }

    let context = self.lifecycle.begin(&payload)?;
    self.context = Some(context);

    let future = write(&payload);
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = MutationState::Pending;

    tokio::spawn(async move {
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(future.await);
    });

    Ok(())
  }

  /// Poll for the write's settlement.
  ///
  /// Returns `true` if the state changed, in which case the success/error
  /// handler and then `on_settled` have already run. Call this in your event
  /// loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(result) => {
        self.receiver = None;
        self.settle(result);
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Writer dropped without sending - roll back as if the write failed.
        self.receiver = None;
        self.settle(Err(E::from(Error::WriteAbandoned)));
        true
      }
    }
  }

  /// Dispatch and await settlement in place, for callers without an event
  /// loop. Equivalent to `dispatch` followed by a successful `poll`.
  pub async fn execute<F, Fut>(&mut self, payload: L::Payload, write: F) -> &MutationState<L::Output, E>
  where
    F: FnOnce(&L::Payload) -> Fut,
    Fut: Future<Output = Result<L::Output, E>>,
  {
    if self.state.is_pending() {
      return &self.state;
    }

    let context = match self.lifecycle.begin(&payload) {
      Ok(context) => context,
      Err(e) => {
        self.state = MutationState::Error(E::from(e));
        return &self.state;
      }
    };
    self.context = Some(context);
    self.state = MutationState::Pending;

    let result = write(&payload).await;
    self.settle(result);
    &self.state
  }

  /// Run the appropriate handler pair for a settled write.
  fn settle(&mut self, result: Result<L::Output, E>) {
    let context = match self.context.as_mut() {
      Some(context) => context,
      None => return,
    };

    self.state = match result {
      Ok(output) => match self.lifecycle.on_success(context, &output) {
        Ok(()) => MutationState::Success(output),
        Err(e) => MutationState::Error(E::from(e)),
      },
      Err(error) => {
        self.lifecycle.on_error(context);
        MutationState::Error(error)
      }
    };

    self.lifecycle.on_settled(context);
  }
}

impl<L, E> std::fmt::Debug for Mutation<L, E>
where
  L: MutationLifecycle,
  L::Output: std::fmt::Debug,
  E: std::fmt::Debug,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Mutation")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}
