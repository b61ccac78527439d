use std::sync::Arc;
use std::time::Duration;

use api_lib::web::countdown_task::{start_countdown, CountdownEvent};
use api_lib::web::state::SessionState;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;
use vidmart_core::{CountdownPhase, OrderCountdown};

/// A countdown for an order placed `elapsed_secs` ago, plus the session it
/// ticks against.
async fn countdown_after(
    elapsed_secs: i64,
) -> (Uuid, OrderCountdown, Arc<Mutex<SessionState>>) {
    let order_id = Uuid::new_v4();
    let now = Utc::now();
    let created_at = now - chrono::Duration::seconds(elapsed_secs);

    let session = Arc::new(Mutex::new(SessionState::default()));
    let countdown = {
        let mut session = session.lock().await;
        session.flags.set_active_order(order_id);
        OrderCountdown::observe(order_id, created_at, &mut session.flags, now)
    };
    (order_id, countdown, session)
}

#[tokio::test(start_paused = true)]
async fn ticks_down_to_expiry_and_stops() {
    let (_, countdown, session) = countdown_after(57).await;
    assert_eq!(countdown.phase(), CountdownPhase::Running { remaining_secs: 3 });

    let mut timer = start_countdown(countdown, session.clone());
    assert_eq!(
        timer.next_event().await,
        Some(CountdownEvent::Tick { remaining_secs: 2 })
    );
    assert_eq!(
        timer.next_event().await,
        Some(CountdownEvent::Tick { remaining_secs: 1 })
    );
    assert_eq!(timer.next_event().await, Some(CountdownEvent::Expired));
    assert_eq!(timer.next_event().await, None);

    // Expiry releases the active order.
    assert_eq!(session.lock().await.flags.active_order(), None);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_timer() {
    let (order_id, countdown, session) = countdown_after(55).await;

    let timer = start_countdown(countdown, session.clone());
    drop(timer);
    tokio::time::sleep(Duration::from_secs(120)).await;

    // Had the timer kept running, expiry would have cleared the slot.
    assert_eq!(session.lock().await.flags.active_order(), Some(order_id));
}

#[tokio::test(start_paused = true)]
async fn stop_hands_back_the_countdown_where_it_was() {
    let (order_id, countdown, session) = countdown_after(0).await;

    let mut timer = start_countdown(countdown, session.clone());
    assert_eq!(
        timer.next_event().await,
        Some(CountdownEvent::Tick { remaining_secs: 59 })
    );
    assert_eq!(
        timer.next_event().await,
        Some(CountdownEvent::Tick { remaining_secs: 58 })
    );

    let Some(mut countdown) = timer.stop().await else {
        panic!("countdown task should finish cleanly");
    };
    assert_eq!(countdown.order_id(), order_id);
    assert_eq!(countdown.phase(), CountdownPhase::Running { remaining_secs: 58 });

    // The returned countdown can be paused like any other.
    let mut session = session.lock().await;
    assert_eq!(countdown.pause(&mut session.flags), Some(58));
    assert_eq!(session.flags.active_order(), Some(order_id));
}
