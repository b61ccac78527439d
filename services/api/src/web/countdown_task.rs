//! services/api/src/web/countdown_task.rs
//!
//! This module contains the asynchronous "worker" that drives an order
//! countdown once per second.
//!
//! The task owns the [`OrderCountdown`] while it runs and reports each tick
//! over a channel. It stops when the countdown expires, when its
//! `CancellationToken` fires, or when nobody is listening any more. Dropping
//! the [`CountdownHandle`] cancels it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vidmart_core::{CountdownPhase, OrderCountdown};

use crate::web::state::SessionState;

/// What the timer reports after each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    Tick { remaining_secs: u32 },
    Expired,
}

/// Owner's side of a running countdown timer.
pub struct CountdownHandle {
    token: CancellationToken,
    task: Option<JoinHandle<OrderCountdown>>,
    events: mpsc::Receiver<CountdownEvent>,
}

/// Spawns the timer for `countdown`. Every tick is applied to the session's
/// flags under the session lock.
pub fn start_countdown(
    countdown: OrderCountdown,
    session: Arc<Mutex<SessionState>>,
) -> CountdownHandle {
    let token = CancellationToken::new();
    let (tx, rx) = mpsc::channel(8);
    let task = tokio::spawn(countdown_process(countdown, session, tx, token.clone()));

    CountdownHandle {
        token,
        task: Some(task),
        events: rx,
    }
}

impl CountdownHandle {
    /// The next tick, or `None` once the timer has stopped.
    pub async fn next_event(&mut self) -> Option<CountdownEvent> {
        self.events.recv().await
    }

    /// Cancels the timer and hands back the countdown in the state it had
    /// reached. Returns `None` if the task panicked.
    pub async fn stop(mut self) -> Option<OrderCountdown> {
        // Closing the channel first unblocks a task waiting to deliver a tick.
        self.events.close();
        self.token.cancel();
        let task = self.task.take()?;
        match task.await {
            Ok(countdown) => Some(countdown),
            Err(e) => {
                warn!("Countdown task did not finish cleanly: {}", e);
                None
            }
        }
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The main loop of the timer task.
async fn countdown_process(
    mut countdown: OrderCountdown,
    session: Arc<Mutex<SessionState>>,
    events: mpsc::Sender<CountdownEvent>,
    cancellation_token: CancellationToken,
) -> OrderCountdown {
    let order_id = countdown.order_id();
    info!(%order_id, "Countdown task started.");

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                debug!(%order_id, "Countdown task cancelled.");
                break;
            }
            _ = interval.tick() => {
                let phase = {
                    let mut session = session.lock().await;
                    countdown.tick(&mut session.flags)
                };
                let event = match phase {
                    CountdownPhase::Running { remaining_secs } => CountdownEvent::Tick { remaining_secs },
                    CountdownPhase::Expired => CountdownEvent::Expired,
                    // Only a running countdown is ever handed to the timer.
                    CountdownPhase::Paused { .. } => break,
                };
                if events.send(event).await.is_err() {
                    debug!(%order_id, "Countdown listener gone, stopping.");
                    break;
                }
                if phase.is_expired() {
                    info!(%order_id, "Countdown expired.");
                    break;
                }
            }
        }
    }

    countdown
}
