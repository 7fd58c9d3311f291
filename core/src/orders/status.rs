// core/src/orders/status.rs

//! Forward-only state changes on a persisted order.
//!
//! Every change is a read followed by a compare-and-set against the state that
//! was read, retried a bounded number of times when another writer got in
//! between. Decisions are made on the freshly read state, so a late payment
//! signal for an order cancelled in the meantime is seen and dropped.

use crate::error::{CheckoutError, CheckoutResult};
use crate::model::{OrderState, OrderStatus, PaymentStatus};
use crate::store::{OrderStore, StoreError};
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

const MAX_CAS_ROUNDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
  /// The store now holds this state because of this call.
  Applied(OrderState),
  /// The order was already in the target state.
  AlreadyApplied(OrderState),
  /// The signal no longer applies to the order's current state.
  Ignored(OrderState),
}

impl TransitionOutcome {
  pub fn state(&self) -> OrderState {
    match self {
      TransitionOutcome::Applied(s) | TransitionOutcome::AlreadyApplied(s) | TransitionOutcome::Ignored(s) => *s,
    }
  }

  pub fn was_applied(&self) -> bool {
    matches!(self, TransitionOutcome::Applied(_))
  }
}

enum Decision {
  Next(OrderState),
  Already,
  Ignore,
  Reject(CheckoutError),
}

#[derive(Clone)]
pub struct OrderStatusMachine {
  orders: Arc<dyn OrderStore>,
}

impl OrderStatusMachine {
  pub fn new(orders: Arc<dyn OrderStore>) -> Self {
    Self { orders }
  }

  /// `paid`, and `pending -> confirmed` if the order is still pending.
  /// Cancelled orders are left untouched.
  #[instrument(name = "OrderStatusMachine::record_payment_success", skip(self), err(Display))]
  pub async fn record_payment_success(&self, order_id: Uuid) -> CheckoutResult<TransitionOutcome> {
    self
      .apply(order_id, |state| {
        if state.payment_status == PaymentStatus::Paid {
          return Decision::Already;
        }
        if state.order_status == OrderStatus::Cancelled || !state.payment_status.can_transition_to(PaymentStatus::Paid) {
          return Decision::Ignore;
        }
        let order_status = if state.order_status == OrderStatus::Pending {
          OrderStatus::Confirmed
        } else {
          state.order_status
        };
        Decision::Next(OrderState {
          order_status,
          payment_status: PaymentStatus::Paid,
        })
      })
      .await
  }

  /// `payment_failed`; the order itself stays where it is so the buyer can retry.
  #[instrument(name = "OrderStatusMachine::record_payment_failure", skip(self), err(Display))]
  pub async fn record_payment_failure(&self, order_id: Uuid) -> CheckoutResult<TransitionOutcome> {
    self
      .apply(order_id, |state| match state.payment_status {
        PaymentStatus::PaymentFailed => Decision::Already,
        _ if state.order_status == OrderStatus::Cancelled => Decision::Ignore,
        PaymentStatus::Paid => Decision::Ignore,
        PaymentStatus::AwaitingPayment => Decision::Next(OrderState {
          payment_status: PaymentStatus::PaymentFailed,
          ..state
        }),
      })
      .await
  }

  /// Back to `awaiting_payment` ahead of a new attempt.
  #[instrument(name = "OrderStatusMachine::reopen_payment", skip(self), err(Display))]
  pub async fn reopen_payment(&self, order_id: Uuid) -> CheckoutResult<TransitionOutcome> {
    self
      .apply(order_id, |state| {
        if state.order_status == OrderStatus::Cancelled {
          return Decision::Reject(CheckoutError::PaymentNotRetryable {
            order_id,
            reason: "order is cancelled".to_string(),
          });
        }
        match state.payment_status {
          PaymentStatus::AwaitingPayment => Decision::Already,
          PaymentStatus::Paid => Decision::Reject(CheckoutError::PaymentNotRetryable {
            order_id,
            reason: "order is already paid".to_string(),
          }),
          PaymentStatus::PaymentFailed => Decision::Next(OrderState {
            payment_status: PaymentStatus::AwaitingPayment,
            ..state
          }),
        }
      })
      .await
  }

  /// Moves `order_status` along the DAG. Asking for the current status is a no-op.
  #[instrument(name = "OrderStatusMachine::transition", skip(self, to), fields(to = %to), err(Display))]
  pub async fn transition(&self, order_id: Uuid, to: OrderStatus) -> CheckoutResult<TransitionOutcome> {
    self
      .apply(order_id, |state| {
        if state.order_status == to {
          Decision::Already
        } else if state.order_status.can_transition_to(to) {
          Decision::Next(OrderState {
            order_status: to,
            ..state
          })
        } else {
          Decision::Reject(CheckoutError::InvalidTransition {
            from: state.order_status.to_string(),
            to: to.to_string(),
          })
        }
      })
      .await
  }

  async fn apply(&self, order_id: Uuid, decide: impl Fn(OrderState) -> Decision) -> CheckoutResult<TransitionOutcome> {
    for round in 0..MAX_CAS_ROUNDS {
      let order = self
        .orders
        .find_order(order_id)
        .await?
        .ok_or(CheckoutError::OrderNotFound(order_id))?;
      let current = order.state();

      let next = match decide(current) {
        Decision::Next(next) => next,
        Decision::Already => return Ok(TransitionOutcome::AlreadyApplied(current)),
        Decision::Ignore => {
          event!(
            Level::INFO,
            order_id = %order_id,
            order_status = %current.order_status,
            payment_status = %current.payment_status,
            "Signal does not apply to current order state, ignoring."
          );
          return Ok(TransitionOutcome::Ignored(current));
        }
        Decision::Reject(err) => return Err(err),
      };

      if self.orders.compare_and_set_state(order_id, current, next).await? {
        event!(
          Level::INFO,
          order_id = %order_id,
          order_status = %next.order_status,
          payment_status = %next.payment_status,
          "Order state changed."
        );
        return Ok(TransitionOutcome::Applied(next));
      }
      event!(Level::DEBUG, order_id = %order_id, round, "Order state changed underneath us, re-reading.");
    }

    Err(CheckoutError::Persistence(StoreError::Backend(anyhow::anyhow!(
      "order {} kept changing during {} compare-and-set rounds",
      order_id,
      MAX_CAS_ROUNDS
    ))))
  }
}
