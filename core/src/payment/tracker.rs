// core/src/payment/tracker.rs

//! Follows pending payment attempts until they resolve.
//!
//! Each tracked attempt gets its own tokio task, registered under the order id.
//! The task polls the gateway on an interval and listens for provider callbacks
//! forwarded through a channel. It stops at the first terminal outcome, on
//! abort, or when the maximum wait elapses (the attempt is then `expired`).
//! A status query in progress races the deadline and the signals like any
//! other branch, so a provider that never answers cannot hold the task.
//! Whatever ends it, the task records the attempt and drives the order's
//! status machine before deregistering itself.

use super::gateway::{GatewayError, PaymentCallback, PaymentGateway, ProviderStatus};
use crate::error::{CheckoutError, CheckoutResult};
use crate::model::{AttemptStatus, PaymentAttempt, PaymentOutcome};
use crate::orders::OrderStatusMachine;
use crate::store::OrderStore;
use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{event, info_span, Instrument, Level};
use uuid::Uuid;

const SIGNAL_BUFFER: usize = 4;

#[derive(Debug)]
enum TrackerSignal {
  Outcome(PaymentOutcome),
  Abort,
}

struct ActiveTracker {
  attempt_id: Uuid,
  provider_reference: String,
  signals: mpsc::Sender<TrackerSignal>,
  status: watch::Receiver<AttemptStatus>,
}

/// How a provider callback was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackDisposition {
  /// Handed to the live tracker for that attempt.
  Forwarded,
  /// No tracker was running; the persisted attempt was resolved directly.
  Applied,
  /// The attempt had already reached a terminal status.
  AlreadyResolved,
  /// No attempt carries that provider reference.
  UnknownReference,
}

/// Read side of a tracked attempt's status.
#[derive(Debug, Clone)]
pub struct PaymentWatch {
  pub order_id: Uuid,
  pub attempt_id: Uuid,
  status: watch::Receiver<AttemptStatus>,
}

impl PaymentWatch {
  pub fn current(&self) -> AttemptStatus {
    *self.status.borrow()
  }

  /// Waits until the attempt is terminal and returns that status. If the
  /// tracker goes away first, returns the last status it published.
  pub async fn wait_terminal(&mut self) -> AttemptStatus {
    loop {
      let current = *self.status.borrow_and_update();
      if current.is_terminal() {
        return current;
      }
      if self.status.changed().await.is_err() {
        return *self.status.borrow();
      }
    }
  }
}

struct TrackerInner {
  gateway: Arc<dyn PaymentGateway>,
  orders: Arc<dyn OrderStore>,
  status_machine: OrderStatusMachine,
  poll_interval: Duration,
  active: Mutex<HashMap<Uuid, ActiveTracker>>,
}

#[derive(Clone)]
pub struct PaymentStatusTracker {
  inner: Arc<TrackerInner>,
}

enum Resolution {
  Outcome(PaymentOutcome),
  Expired,
  Aborted,
}

impl PaymentStatusTracker {
  pub fn new(
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderStore>,
    status_machine: OrderStatusMachine,
    poll_interval: Duration,
  ) -> Self {
    Self {
      inner: Arc::new(TrackerInner {
        gateway,
        orders,
        status_machine,
        poll_interval,
        active: Mutex::new(HashMap::new()),
      }),
    }
  }

  /// Starts following `attempt`. At most one tracker runs per order.
  pub fn track(&self, attempt: PaymentAttempt, max_wait: Duration) -> CheckoutResult<PaymentWatch> {
    let provider_reference = attempt
      .provider_reference
      .clone()
      .ok_or_else(|| CheckoutError::PaymentInitiationFailed("attempt has no provider reference".to_string()))?;
    if attempt.status.is_terminal() {
      return Err(CheckoutError::PaymentNotRetryable {
        order_id: attempt.order_id,
        reason: format!("attempt is already {}", attempt.status),
      });
    }

    let order_id = attempt.order_id;
    let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_BUFFER);
    let (status_tx, status_rx) = watch::channel(attempt.status);
    {
      let mut active = self.inner.active.lock();
      if active.get(&order_id).is_some_and(|t| !t.signals.is_closed()) {
        return Err(CheckoutError::PaymentInFlight { order_id });
      }
      active.insert(
        order_id,
        ActiveTracker {
          attempt_id: attempt.id,
          provider_reference: provider_reference.clone(),
          signals: signal_tx,
          status: status_rx.clone(),
        },
      );
    }

    let span = info_span!("payment_tracker", order_id = %order_id, attempt_id = %attempt.id, %provider_reference);
    let watch = PaymentWatch {
      order_id,
      attempt_id: attempt.id,
      status: status_rx,
    };
    tokio::spawn(
      run_tracker(self.inner.clone(), attempt, provider_reference, signal_rx, status_tx, max_wait).instrument(span),
    );
    Ok(watch)
  }

  pub fn is_tracking(&self, order_id: Uuid) -> bool {
    self.inner.active.lock().contains_key(&order_id)
  }

  pub fn watch(&self, order_id: Uuid) -> Option<PaymentWatch> {
    self.inner.active.lock().get(&order_id).map(|t| PaymentWatch {
      order_id,
      attempt_id: t.attempt_id,
      status: t.status.clone(),
    })
  }

  /// Stops the tracker for `order_id` without touching the order. Returns
  /// whether one was running.
  pub fn abort(&self, order_id: Uuid) -> bool {
    let sender = self.inner.active.lock().get(&order_id).map(|t| t.signals.clone());
    match sender {
      Some(sender) => {
        if sender.try_send(TrackerSignal::Abort).is_err() {
          event!(Level::WARN, order_id = %order_id, "Tracker did not accept abort signal.");
        }
        true
      }
      None => false,
    }
  }

  /// Routes a provider callback to the live tracker, or resolves the persisted
  /// attempt when none is running (for example after a restart).
  pub async fn handle_callback(&self, callback: PaymentCallback) -> CheckoutResult<CallbackDisposition> {
    let live_sender = self
      .inner
      .active
      .lock()
      .values()
      .find(|t| t.provider_reference == callback.provider_reference)
      .map(|t| t.signals.clone());

    if let Some(sender) = live_sender {
      match sender.try_send(TrackerSignal::Outcome(callback.outcome.clone())) {
        Ok(()) => {
          event!(Level::INFO, provider_reference = %callback.provider_reference, "Callback forwarded to tracker.");
          return Ok(CallbackDisposition::Forwarded);
        }
        Err(e) => {
          event!(Level::WARN, provider_reference = %callback.provider_reference, error = %e, "Tracker unavailable, resolving from store.");
        }
      }
    }

    let Some(mut attempt) = self.inner.orders.find_attempt_by_reference(&callback.provider_reference).await? else {
      event!(Level::WARN, provider_reference = %callback.provider_reference, "Callback for unknown payment reference ignored.");
      return Ok(CallbackDisposition::UnknownReference);
    };
    if attempt.status.is_terminal() {
      event!(Level::INFO, attempt_id = %attempt.id, status = %attempt.status, "Callback for resolved attempt ignored.");
      return Ok(CallbackDisposition::AlreadyResolved);
    }

    attempt.resolve_with(&callback.outcome);
    settle(&self.inner, &attempt).await;
    Ok(CallbackDisposition::Applied)
  }
}

async fn run_tracker(
  inner: Arc<TrackerInner>,
  mut attempt: PaymentAttempt,
  provider_reference: String,
  mut signals: mpsc::Receiver<TrackerSignal>,
  status_tx: watch::Sender<AttemptStatus>,
  max_wait: Duration,
) {
  event!(Level::INFO, max_wait_secs = max_wait.as_secs(), "Tracking payment attempt.");
  let deadline = time::sleep(max_wait);
  tokio::pin!(deadline);
  let mut poll = time::interval_at(Instant::now() + inner.poll_interval, inner.poll_interval);
  poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

  let mut status_query: Option<StatusQuery> = None;

  let resolution = loop {
    tokio::select! {
      biased;
      signal = signals.recv() => match signal {
        Some(TrackerSignal::Outcome(outcome)) => break Resolution::Outcome(outcome),
        Some(TrackerSignal::Abort) | None => break Resolution::Aborted,
      },
      _ = &mut deadline => break Resolution::Expired,
      result = await_query(&mut status_query), if status_query.is_some() => {
        status_query = None;
        match result {
          Ok(ProviderStatus::Pending) => {
            event!(Level::TRACE, "Payment still pending.");
          }
          Ok(status) => {
            if let Some(outcome) = status.into_outcome() {
              break Resolution::Outcome(outcome);
            }
          }
          Err(e) => {
            event!(Level::WARN, error = %e, "Payment status poll failed, will retry.");
          }
        }
      },
      _ = poll.tick(), if status_query.is_none() => {
        let gateway = inner.gateway.clone();
        let reference = provider_reference.clone();
        status_query = Some(async move { gateway.query_status(&reference).await }.boxed());
      },
    }
  };
  if status_query.take().is_some() {
    event!(Level::DEBUG, "Dropped unanswered status query.");
  }

  match resolution {
    Resolution::Outcome(outcome) => {
      attempt.resolve_with(&outcome);
      settle(&inner, &attempt).await;
    }
    Resolution::Expired => {
      event!(Level::WARN, "No payment outcome before the deadline, expiring attempt.");
      attempt.resolve(AttemptStatus::Expired, Some("no response from provider".to_string()));
      settle(&inner, &attempt).await;
    }
    Resolution::Aborted => {
      event!(Level::INFO, "Tracker aborted.");
      attempt.resolve(AttemptStatus::Failed, Some("aborted".to_string()));
      if let Err(e) = inner.orders.save_attempt(&attempt).await {
        event!(Level::ERROR, error = %e, "Could not record aborted attempt.");
      }
    }
  }

  {
    let mut active = inner.active.lock();
    if active.get(&attempt.order_id).is_some_and(|t| t.attempt_id == attempt.id) {
      active.remove(&attempt.order_id);
    }
  }
  // Receivers may all be gone; nothing to do then.
  let _ = status_tx.send(attempt.status);
}

type StatusQuery = BoxFuture<'static, Result<ProviderStatus, GatewayError>>;

async fn await_query(query: &mut Option<StatusQuery>) -> Result<ProviderStatus, GatewayError> {
  match query.as_mut() {
    Some(query) => query.await,
    None => std::future::pending().await,
  }
}

/// Persists a resolved attempt and moves the order accordingly.
async fn settle(inner: &TrackerInner, attempt: &PaymentAttempt) {
  // Another path (a callback after restart) may have resolved it already.
  match inner.orders.attempts_for_order(attempt.order_id).await {
    Ok(stored) => {
      if let Some(existing) = stored.iter().find(|a| a.id == attempt.id && a.status.is_terminal()) {
        event!(Level::INFO, attempt_id = %attempt.id, status = %existing.status, "Attempt already resolved elsewhere.");
        return;
      }
    }
    Err(e) => event!(Level::WARN, attempt_id = %attempt.id, error = %e, "Could not re-read attempt before resolving."),
  }
  if let Err(e) = inner.orders.save_attempt(attempt).await {
    event!(Level::ERROR, attempt_id = %attempt.id, error = %e, "Could not record resolved attempt.");
  }
  let result = match attempt.status {
    AttemptStatus::Succeeded => inner.status_machine.record_payment_success(attempt.order_id).await,
    AttemptStatus::Failed | AttemptStatus::Expired => inner.status_machine.record_payment_failure(attempt.order_id).await,
    AttemptStatus::Initiated | AttemptStatus::Pending => return,
  };
  match result {
    Ok(outcome) => event!(
      Level::INFO,
      order_id = %attempt.order_id,
      attempt_status = %attempt.status,
      applied = outcome.was_applied(),
      "Payment outcome recorded."
    ),
    Err(e) => event!(Level::ERROR, order_id = %attempt.order_id, error = %e, "Could not apply payment outcome to order."),
  }
}
