//! Optimistic updates for client-visible collections.
//!
//! A mutation is applied locally before its request completes, then settled:
//! the server's collection replaces the guess on success, the snapshot taken
//! just before the guess is restored on failure.
//!
//! Snapshot capture and the speculative apply happen under a single lock and
//! before the first `.await`, so nobody can observe one without the other.
//! Concurrent mutations are not serialized: a later snapshot may include an
//! earlier mutation's unconfirmed change.
//!
//! A mutation whose future is dropped before it settles (a timeout, a lost
//! `select!`) is rolled back as if its request had failed.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;

/// Where a mutation attempt ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  /// No mutation in flight.
  Idle,
  /// Local state shows the intended result; the request is in flight.
  Speculative,
  /// The server's collection replaced the speculative one.
  Confirmed,
  /// The pre-mutation snapshot was restored.
  RolledBack,
}

/// The collection as it was right before a speculative change.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
  previous_items: Vec<T>,
}

impl<T> Snapshot<T> {
  pub fn items(&self) -> &[T] {
    &self.previous_items
  }

  pub fn into_items(self) -> Vec<T> {
    self.previous_items
  }
}

/// A local change that can be undone.
pub trait MutationCommand<T> {
  /// The collection as it should look once the mutation succeeds.
  fn apply(&self, state: &[T]) -> Vec<T>;

  /// The collection to show when the mutation fails.
  fn rollback(&self, snapshot: Snapshot<T>) -> Vec<T> {
    snapshot.into_items()
  }
}

/// How a successful request settles the collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement<T> {
  /// Replace local state with the server's collection.
  Confirm(Vec<T>),
  /// The response didn't carry a usable collection; leave local state as is.
  KeepCurrent,
  /// Nothing changed server side; put the pre-mutation collection back.
  Restore,
}

/// Result of a settled mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled<T> {
  pub phase: Phase,
  pub items: Vec<T>,
}

/// A collection that supports optimistic mutations. Clones share state.
///
/// Two views are kept: `items` is what callers see, speculative changes
/// included; `confirmed` only changes when the server has answered.
#[derive(Debug)]
pub struct OptimisticCollection<T> {
  items: Arc<Mutex<Vec<T>>>,
  confirmed: Arc<Mutex<Vec<T>>>,
  in_flight: Arc<AtomicUsize>,
}

impl<T> Clone for OptimisticCollection<T> {
  fn clone(&self) -> Self {
    Self {
      items: Arc::clone(&self.items),
      confirmed: Arc::clone(&self.confirmed),
      in_flight: Arc::clone(&self.in_flight),
    }
  }
}

impl<T: Clone> Default for OptimisticCollection<T> {
  fn default() -> Self {
    Self::new(Vec::new())
  }
}

impl<T: Clone> OptimisticCollection<T> {
  pub fn new(items: Vec<T>) -> Self {
    Self {
      confirmed: Arc::new(Mutex::new(items.clone())),
      items: Arc::new(Mutex::new(items)),
      in_flight: Arc::new(AtomicUsize::new(0)),
    }
  }

  /// `Speculative` while any mutation is waiting on its request.
  pub fn phase(&self) -> Phase {
    if self.in_flight.load(Ordering::SeqCst) > 0 {
      Phase::Speculative
    } else {
      Phase::Idle
    }
  }

  pub fn items(&self) -> Vec<T> {
    self.lock().clone()
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  /// Whether any visible item satisfies `pred`.
  pub fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
    self.lock().iter().any(pred)
  }

  /// The collection as of the last server answer, without pending changes.
  pub fn confirmed(&self) -> Vec<T> {
    lock(&self.confirmed).clone()
  }

  /// Whether any confirmed item satisfies `pred`.
  pub fn any_confirmed(&self, pred: impl Fn(&T) -> bool) -> bool {
    lock(&self.confirmed).iter().any(pred)
  }

  /// Overwrite the collection with authoritative data.
  pub fn replace(&self, items: Vec<T>) {
    *lock(&self.confirmed) = items.clone();
    *self.lock() = items;
  }

  /// Overwrite only what callers see.
  fn show(&self, items: Vec<T>) {
    *self.lock() = items;
  }

  /// Capture a snapshot and apply `command` in one step.
  pub fn begin<C: MutationCommand<T>>(&self, command: &C) -> Snapshot<T> {
    let mut items = self.lock();
    let snapshot = Snapshot {
      previous_items: items.clone(),
    };
    *items = command.apply(&items);
    snapshot
  }

  /// Run `command` optimistically around `operation`.
  ///
  /// On error the command's rollback is installed before the error is
  /// returned. Dropping the returned future before it completes rolls back
  /// the same way.
  pub async fn execute<C, F, Fut>(&self, command: &C, operation: F) -> Result<Settled<T>>
  where
    C: MutationCommand<T>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Settlement<T>>>,
  {
    let in_flight = InFlight::start(self, command);
    tracing::trace!(
      before = in_flight.snapshot.items().len(),
      after = self.len(),
      "speculative update applied"
    );

    let outcome = operation().await;
    let snapshot = in_flight.finish();

    match outcome {
      Ok(Settlement::Confirm(items)) => {
        self.replace(items.clone());
        Ok(Settled {
          phase: Phase::Confirmed,
          items,
        })
      }
      Ok(Settlement::KeepCurrent) => {
        tracing::debug!("response had no collection, keeping local state");
        {
          let mut confirmed = lock(&self.confirmed);
          *confirmed = command.apply(&confirmed);
        }
        Ok(Settled {
          phase: Phase::Confirmed,
          items: self.items(),
        })
      }
      Ok(Settlement::Restore) => {
        let items = command.rollback(snapshot);
        self.show(items.clone());
        Ok(Settled {
          phase: Phase::RolledBack,
          items,
        })
      }
      Err(e) => {
        tracing::debug!(error = %e, "mutation failed, rolling back");
        self.show(command.rollback(snapshot));
        Err(e)
      }
    }
  }

  fn lock(&self) -> MutexGuard<'_, Vec<T>> {
    lock(&self.items)
  }
}

// A panic while holding the lock leaves a whole Vec behind; keep using it.
fn lock<T>(items: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
  items
    .lock()
    .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Counts a mutation as in flight until it settles or is dropped.
///
/// Dropped without [`InFlight::finish`], it installs the command's rollback.
struct InFlight<'a, T: Clone, C: MutationCommand<T>> {
  collection: &'a OptimisticCollection<T>,
  command: &'a C,
  snapshot: Snapshot<T>,
  settled: bool,
}

impl<'a, T: Clone, C: MutationCommand<T>> InFlight<'a, T, C> {
  fn start(collection: &'a OptimisticCollection<T>, command: &'a C) -> Self {
    let snapshot = collection.begin(command);
    collection.in_flight.fetch_add(1, Ordering::SeqCst);
    Self {
      collection,
      command,
      snapshot,
      settled: false,
    }
  }

  /// Stop counting and hand the snapshot back for settling.
  fn finish(mut self) -> Snapshot<T> {
    self.settled = true;
    Snapshot {
      previous_items: std::mem::take(&mut self.snapshot.previous_items),
    }
  }
}

impl<T: Clone, C: MutationCommand<T>> Drop for InFlight<'_, T, C> {
  fn drop(&mut self) {
    self.collection.in_flight.fetch_sub(1, Ordering::SeqCst);
    if self.settled {
      return;
    }

    tracing::debug!("mutation dropped before settling, rolling back");
    let snapshot = Snapshot {
      previous_items: std::mem::take(&mut self.snapshot.previous_items),
    };
    self.collection.show(self.command.rollback(snapshot));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ApiError;

  struct Push(&'static str);

  impl MutationCommand<&'static str> for Push {
    fn apply(&self, state: &[&'static str]) -> Vec<&'static str> {
      let mut next = state.to_vec();
      next.push(self.0);
      next
    }
  }

  #[tokio::test]
  async fn test_failure_restores_exact_snapshot() {
    let list = OptimisticCollection::new(vec!["b", "a", "c"]);

    let err = list
      .execute(&Push("x"), || async {
        Err::<Settlement<&str>, _>(ApiError::Network("down".into()))
      })
      .await
      .unwrap_err();

    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(list.items(), vec!["b", "a", "c"]);
  }

  #[tokio::test]
  async fn test_confirm_uses_server_collection() {
    let list = OptimisticCollection::new(vec!["a"]);

    let settled = list
      .execute(&Push("x"), || async {
        Ok(Settlement::Confirm(vec!["x", "a"]))
      })
      .await
      .unwrap();

    assert_eq!(settled.phase, Phase::Confirmed);
    assert_eq!(list.items(), vec!["x", "a"]);
  }

  #[tokio::test]
  async fn test_keep_current_leaves_speculative_state() {
    let list = OptimisticCollection::new(vec!["a"]);

    list
      .execute(&Push("x"), || async { Ok(Settlement::KeepCurrent) })
      .await
      .unwrap();

    assert_eq!(list.items(), vec!["a", "x"]);
  }

  #[tokio::test]
  async fn test_restore_is_not_an_error() {
    let list = OptimisticCollection::new(vec!["a"]);

    let settled = list
      .execute(&Push("x"), || async { Ok(Settlement::Restore) })
      .await
      .unwrap();

    assert_eq!(settled.phase, Phase::RolledBack);
    assert_eq!(list.items(), vec!["a"]);
  }

  #[tokio::test]
  async fn test_speculative_state_visible_during_operation() {
    let list = OptimisticCollection::new(vec!["a"]);
    let observer = list.clone();

    list
      .execute(&Push("x"), || {
        let seen = observer.items();
        let phase = observer.phase();
        async move {
          assert_eq!(seen, vec!["a", "x"]);
          assert_eq!(phase, Phase::Speculative);
          Ok(Settlement::Confirm(seen))
        }
      })
      .await
      .unwrap();

    assert_eq!(list.phase(), Phase::Idle);
  }

  #[tokio::test]
  async fn test_dropped_mutation_rolls_back_and_goes_idle() {
    let list = OptimisticCollection::new(vec!["a"]);

    let outcome = tokio::time::timeout(
      std::time::Duration::from_millis(20),
      list.execute(&Push("x"), || {
        std::future::pending::<Result<Settlement<&'static str>>>()
      }),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(list.phase(), Phase::Idle);
    assert_eq!(list.items(), vec!["a"]);
  }

  #[tokio::test]
  async fn test_confirmed_view_excludes_pending_changes() {
    let list = OptimisticCollection::new(vec!["a"]);
    let observer = list.clone();

    list
      .execute(&Push("x"), || {
        let visible = observer.items();
        let confirmed = observer.confirmed();
        async move {
          assert_eq!(visible, vec!["a", "x"]);
          assert_eq!(confirmed, vec!["a"]);
          Ok(Settlement::KeepCurrent)
        }
      })
      .await
      .unwrap();

    assert_eq!(list.confirmed(), vec!["a", "x"]);
    assert!(list.any_confirmed(|item| *item == "x"));
  }

  #[tokio::test]
  async fn test_rollback_leaves_confirmed_view_alone() {
    let list = OptimisticCollection::new(vec!["a"]);

    list
      .execute(&Push("x"), || async { Ok(Settlement::Restore) })
      .await
      .unwrap();

    assert_eq!(list.confirmed(), vec!["a"]);
    assert!(!list.any_confirmed(|item| *item == "x"));
  }

  #[tokio::test]
  async fn test_settled_mutation_is_not_rolled_back_by_the_guard() {
    let list = OptimisticCollection::new(vec!["a"]);

    list
      .execute(&Push("x"), || async { Ok(Settlement::KeepCurrent) })
      .await
      .unwrap();

    assert_eq!(list.phase(), Phase::Idle);
    assert_eq!(list.items(), vec!["a", "x"]);
  }

  #[test]
  fn test_begin_returns_pre_mutation_snapshot() {
    let list = OptimisticCollection::new(vec!["a"]);
    let snapshot = list.begin(&Push("b"));
    assert_eq!(snapshot.items(), &["a"]);
    assert_eq!(list.items(), vec!["a", "b"]);
  }
}
