//! Engine behaviour through the registry, the way consoles and displays reach it.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use fop_timer::{
    timer::commands, BreakType, Clock, DomainEvent, EngineSettings, EventKind, FieldOfPlayRegistry,
    FopId, Issuer, ManualClock, NotificationKind, Remaining,
};

fn setup() -> (ManualClock, FieldOfPlayRegistry, fop_timer::DerivedEventReceiver) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 4, 9, 0, 0).unwrap());
    let (registry, derived) =
        FieldOfPlayRegistry::new(EngineSettings::quiet(), Arc::new(clock.clone()));
    (clock, registry, derived)
}

fn fop() -> FopId {
    FopId::new("A")
}

#[tokio::test]
async fn stop_then_resume_then_expire() {
    let (clock, registry, mut derived) = setup();
    let controller = registry.controller(&fop());

    controller
        .apply(DomainEvent::break_started(
            Issuer::new("A"),
            BreakType::FirstSnatch,
            Some(180_000),
        ))
        .await
        .unwrap();
    clock.advance_ms(170_000);
    let paused = controller.stop(Issuer::new("A")).await.unwrap();
    assert_eq!(paused.remaining, Remaining::Millis(10_000));
    assert_eq!(controller.live_remaining(), Remaining::Millis(10_000));

    controller.start(Issuer::new("B")).await.unwrap();
    clock.advance_ms(10_050);
    assert!(controller.signal_time_over(Issuer::new("board")).await.unwrap());

    let (from, event) = derived.recv().await.unwrap();
    assert_eq!(from, fop());
    assert_eq!(
        event.kind(),
        &EventKind::BreakDone {
            break_type: BreakType::FirstSnatch
        }
    );
}

#[tokio::test]
async fn late_joiner_sees_target_anchored_time() {
    let (clock, registry, _derived) = setup();
    let end = (clock.now() + Duration::milliseconds(30_000)).to_rfc3339();

    commands::set_target_end_time(&registry, "A", "marshal", Some(&end))
        .await
        .unwrap();
    clock.advance_ms(25_000);

    let snapshot = commands::get_timer_state(&registry, "A").unwrap();
    assert_eq!(snapshot.remaining, Remaining::Millis(5_000));
}

#[tokio::test]
async fn target_mode_queries_differ_by_elapsed_time() {
    let (clock, registry, _derived) = setup();
    let controller = registry.controller(&fop());
    controller
        .set_target_end_time(
            Issuer::new("marshal"),
            Some(clock.now() + Duration::minutes(10)),
        )
        .await
        .unwrap();

    let first = controller.live_remaining().millis().unwrap();
    clock.advance_ms(4_321);
    let second = controller.live_remaining().millis().unwrap();

    assert_eq!(first - second, 4_321);
}

#[tokio::test]
async fn set_indefinite_always_reports_indefinite() {
    let (clock, registry, _derived) = setup();
    let controller = registry.controller(&fop());

    controller.set_duration(Issuer::new("a"), 60_000).await.unwrap();
    controller.start(Issuer::new("a")).await.unwrap();
    controller.set_indefinite(Issuer::new("a")).await.unwrap();
    assert_eq!(controller.live_remaining(), Remaining::Indefinite);

    controller
        .set_target_end_time(Issuer::new("a"), Some(clock.now() + Duration::seconds(5)))
        .await
        .unwrap();
    controller.set_indefinite(Issuer::new("a")).await.unwrap();
    controller.start(Issuer::new("a")).await.unwrap();
    clock.advance_ms(60_000);
    assert_eq!(controller.live_remaining(), Remaining::Indefinite);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_signals_produce_one_break_done() {
    let (clock, registry, mut derived) = setup();
    let controller = registry.controller(&fop());
    controller
        .apply(DomainEvent::break_started(
            Issuer::new("marshal"),
            BreakType::BeforeIntroduction,
            Some(5_000),
        ))
        .await
        .unwrap();
    clock.advance_ms(5_000);

    let mut tasks = Vec::new();
    for board in 0..20 {
        let controller = controller.clone();
        tasks.push(tokio::spawn(async move {
            controller
                .signal_time_over(Issuer::new(format!("board-{board}")))
                .await
                .unwrap()
        }));
    }
    let mut accepted = 0;
    for task in tasks {
        if task.await.unwrap() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 1);
    let (_, event) = derived.recv().await.unwrap();
    assert!(matches!(event.kind(), EventKind::BreakDone { .. }));
    assert!(derived.try_recv().is_err());
}

#[tokio::test]
async fn signals_within_window_collapse_but_later_breaks_count() {
    let (clock, registry, mut derived) = setup();
    let controller = registry.controller(&fop());

    for (round, break_type) in [BreakType::FirstSnatch, BreakType::FirstCleanAndJerk]
        .into_iter()
        .enumerate()
    {
        controller
            .apply(DomainEvent::break_started(
                Issuer::new("marshal"),
                break_type,
                Some(2_000),
            ))
            .await
            .unwrap();
        clock.advance_ms(2_000);
        for board in 0..5 {
            controller
                .signal_time_over(Issuer::new(format!("board-{round}-{board}")))
                .await
                .unwrap();
            clock.advance_ms(50);
        }
        clock.advance_ms(1_000);
    }

    let (_, first) = derived.recv().await.unwrap();
    let (_, second) = derived.recv().await.unwrap();
    assert_eq!(
        first.kind(),
        &EventKind::BreakDone {
            break_type: BreakType::FirstSnatch
        }
    );
    assert_eq!(
        second.kind(),
        &EventKind::BreakDone {
            break_type: BreakType::FirstCleanAndJerk
        }
    );
    assert!(derived.try_recv().is_err());
}

#[tokio::test]
async fn subscribers_get_notifications_with_origin_and_break_type() {
    let (_clock, registry, _derived) = setup();
    let mut subscription = registry.subscribe(&fop());

    commands::post_event(
        &registry,
        "A",
        DomainEvent::break_started(Issuer::new("marshal"), BreakType::Marshal, None),
    )
    .await
    .unwrap();
    commands::stop_timer(&registry, "A", "jury").await.unwrap();

    let set = subscription.recv().await.unwrap();
    let started = subscription.recv().await.unwrap();
    let paused = subscription.recv().await.unwrap();

    assert!(matches!(
        set.kind,
        NotificationKind::TimeSet {
            remaining: Remaining::Indefinite,
            ..
        }
    ));
    assert_eq!(started.origin, Issuer::new("marshal"));
    assert_eq!(started.break_type, Some(BreakType::Marshal));
    assert_eq!(
        paused.kind,
        NotificationKind::TimerPaused {
            remaining: Remaining::Indefinite
        }
    );
    assert_eq!(paused.origin, Issuer::new("jury"));
}

#[tokio::test]
async fn unsubscribed_display_does_not_disturb_publisher() {
    let (_clock, registry, _derived) = setup();
    let subscription = registry.subscribe(&fop());
    let mut other = registry.subscribe(&fop());
    subscription.handle().cancel();
    drop(subscription);

    commands::set_duration(&registry, "A", "marshal", 60_000)
        .await
        .unwrap();
    commands::start_timer(&registry, "A", "marshal").await.unwrap();

    assert!(other.recv().await.is_some());
    assert!(other.recv().await.is_some());
    assert_eq!(registry.relay().subscriber_count(&fop()), 1);
}

#[tokio::test]
async fn fields_of_play_run_independently() {
    let (clock, registry, mut derived) = setup();
    let a = registry.controller(&FopId::new("A"));
    let b = registry.controller(&FopId::new("B"));

    a.set_duration(Issuer::new("a"), 1_000).await.unwrap();
    b.set_duration(Issuer::new("b"), 1_000).await.unwrap();
    a.start(Issuer::new("a")).await.unwrap();
    b.start(Issuer::new("b")).await.unwrap();
    clock.advance_ms(1_000);

    // Same instant on two platforms: one signal each, no cross-field debounce.
    assert!(a.signal_time_over(Issuer::new("board-a")).await.unwrap());
    assert!(b.signal_time_over(Issuer::new("board-b")).await.unwrap());

    let mut fops = vec![derived.recv().await.unwrap().0, derived.recv().await.unwrap().0];
    fops.sort();
    assert_eq!(fops, vec![FopId::new("A"), FopId::new("B")]);
}
