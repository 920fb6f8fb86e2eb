use std::sync::Arc;
use std::time::Duration;

use chainsync_engine::{BlockClock, ClockSettings};
use chainsync_test::{FakeChain, Method};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

fn settings() -> ClockSettings {
    ClockSettings {
        tick_interval: Duration::from_secs(1),
        block_poll_interval: Duration::from_secs(1),
        subscribe_retry: Duration::from_secs(2),
    }
}

/// Lets the clock task process what is already queued without crossing a
/// tick boundary.
async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn counts_seconds_since_last_block() {
    let chain = Arc::new(FakeChain::new());
    let clock = BlockClock::spawn(chain.clone(), settings(), CancellationToken::new());
    settle().await;

    assert_eq!(chain.active_subscriptions(), 1);
    assert_eq!(clock.state().latest_block, None);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(clock.state().seconds_since_last_block, 3);

    clock.stop().await;
}

#[tokio::test(start_paused = true)]
async fn block_notification_resets_and_wins_over_the_next_tick() {
    let chain = Arc::new(FakeChain::new());
    let clock = BlockClock::spawn(chain.clone(), settings(), CancellationToken::new());
    settle().await;
    sleep(Duration::from_secs(2)).await;
    assert_eq!(clock.state().seconds_since_last_block, 2);

    chain.announce_block(5);
    settle().await;
    let state = clock.state();
    assert_eq!(state.latest_block, Some(5));
    assert_eq!(state.seconds_since_last_block, 0);

    // The tick right after the reset is swallowed.
    sleep(Duration::from_secs(1)).await;
    assert_eq!(clock.state().seconds_since_last_block, 0);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(clock.state().seconds_since_last_block, 1);

    clock.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_subscription_is_retried_without_stopping_the_tick() {
    let chain = Arc::new(FakeChain::new());
    chain.fail(Method::Subscribe);
    let clock = BlockClock::spawn(chain.clone(), settings(), CancellationToken::new());
    settle().await;

    sleep(Duration::from_secs(5)).await;
    assert_eq!(clock.state().seconds_since_last_block, 5);
    assert_eq!(chain.calls(Method::Subscribe), 3);
    assert_eq!(chain.active_subscriptions(), 0);

    chain.recover(Method::Subscribe);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(chain.active_subscriptions(), 1);

    chain.announce_block(9);
    settle().await;
    assert_eq!(clock.state().latest_block, Some(9));

    clock.stop().await;
}

#[tokio::test(start_paused = true)]
async fn lost_subscription_is_reestablished() {
    let chain = Arc::new(FakeChain::new());
    let clock = BlockClock::spawn(chain.clone(), settings(), CancellationToken::new());
    settle().await;
    assert_eq!(chain.calls(Method::Subscribe), 1);

    chain.break_subscriptions();
    settle().await;
    assert_eq!(chain.active_subscriptions(), 0);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(chain.calls(Method::Subscribe), 2);
    assert_eq!(chain.active_subscriptions(), 1);

    clock.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stopping_unsubscribes_and_freezes_state() {
    let chain = Arc::new(FakeChain::new());
    let cancel_token = CancellationToken::new();
    let clock = BlockClock::spawn(chain.clone(), settings(), cancel_token.clone());
    settle().await;
    let mut updates = clock.watch();

    cancel_token.cancel();
    settle().await;
    assert_eq!(chain.active_subscriptions(), 0);

    let frozen = *updates.borrow_and_update();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(*updates.borrow(), frozen);
    assert!(updates.has_changed().is_err());
}

#[tokio::test(start_paused = true)]
async fn resubscribe_reporting_the_same_head_keeps_counting() {
    let chain = Arc::new(FakeChain::new());
    let clock = BlockClock::spawn(chain.clone(), settings(), CancellationToken::new());
    settle().await;

    chain.announce_block(5);
    settle().await;
    sleep(Duration::from_secs(3)).await;
    assert_eq!(clock.state().seconds_since_last_block, 2);

    chain.break_subscriptions();
    settle().await;
    sleep(Duration::from_secs(2)).await;
    assert_eq!(chain.active_subscriptions(), 1);
    assert_eq!(clock.state().seconds_since_last_block, 4);

    // A fresh subscription starts by reporting the head it finds.
    chain.announce_block(5);
    settle().await;
    let state = clock.state();
    assert_eq!(state.latest_block, Some(5));
    assert_eq!(state.seconds_since_last_block, 4);

    chain.announce_block(6);
    settle().await;
    assert_eq!(clock.state().seconds_since_last_block, 0);

    clock.stop().await;
}
