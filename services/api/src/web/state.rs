//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-user session state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;
use vidmart_core::ports::{BackendGateway, BlockchainGateway};
use vidmart_core::{Cart, SessionFlags};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn BackendGateway>,
    pub blockchain: Arc<dyn BlockchainGateway>,
    pub sessions: SessionRegistry,
    /// Whether `POST /wallet/rewards` may credit the caller's own ledger.
    pub self_rewards: bool,
}

impl AppState {
    pub fn new(backend: Arc<dyn BackendGateway>, blockchain: Arc<dyn BlockchainGateway>) -> Self {
        Self {
            backend,
            blockchain,
            sessions: SessionRegistry::default(),
            self_rewards: false,
        }
    }

    pub fn with_self_rewards(mut self, allowed: bool) -> Self {
        self.self_rewards = allowed;
        self
    }
}

//=========================================================================================
// SessionState (Specific to One User)
//=========================================================================================

/// The cart and countdown flags of one user. A session stays in the
/// registry while it holds anything; empty ones are swept.
#[derive(Debug, Default)]
pub struct SessionState {
    pub cart: Cart,
    pub flags: SessionFlags,
}

impl SessionState {
    /// Nothing in the cart and no countdown flags.
    pub fn is_idle(&self) -> bool {
        self.cart.is_empty() && self.flags.is_empty()
    }
}

/// Hands out one lock per user. Every mutation of a user's cart or flags
/// goes through that lock, so they are applied in arrival order.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, Arc<Mutex<SessionState>>>>>,
}

impl SessionRegistry {
    /// Returns the user's session, creating an empty one on first use.
    pub async fn session(&self, user_id: Uuid) -> Arc<Mutex<SessionState>> {
        self.sessions
            .lock()
            .await
            .entry(user_id)
            .or_default()
            .clone()
    }

    /// Drops sessions that are idle and not held by any request or socket.
    /// Returns how many were removed.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            if Arc::strong_count(session) > 1 {
                return true;
            }
            match session.try_lock() {
                Ok(state) => !state.is_idle(),
                Err(_) => true,
            }
        });
        before - sessions.len()
    }

    /// Runs [`evict_idle`](Self::evict_idle) every `period`.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let evicted = registry.evict_idle().await;
                if evicted > 0 {
                    debug!(evicted, "Swept idle sessions.");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use vidmart_core::CartItem;

    fn bread() -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            name: "Bread".to_string(),
            unit_price: Decimal::from(40),
            image_url: String::new(),
            quantity: 1,
        }
    }

    #[tokio::test]
    async fn only_idle_unheld_sessions_are_evicted() {
        let registry = SessionRegistry::default();
        let idle = Uuid::new_v4();
        let shopping = Uuid::new_v4();
        let paused = Uuid::new_v4();
        let held = Uuid::new_v4();

        registry.session(idle).await;
        registry.session(shopping).await.lock().await.cart.add_to_cart(bread());
        registry
            .session(paused)
            .await
            .lock()
            .await
            .flags
            .set_active_order(Uuid::new_v4());
        let in_use = registry.session(held).await;

        assert_eq!(registry.evict_idle().await, 1);
        assert_eq!(registry.sessions.lock().await.len(), 3);

        drop(in_use);
        assert_eq!(registry.evict_idle().await, 1);
        assert_eq!(registry.sessions.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn evicted_users_get_a_fresh_session() {
        let registry = SessionRegistry::default();
        let user = Uuid::new_v4();
        registry.session(user).await;

        registry.evict_idle().await;
        let session = registry.session(user).await;

        assert!(session.lock().await.is_idle());
        assert_eq!(registry.sessions.lock().await.len(), 1);
    }
}
