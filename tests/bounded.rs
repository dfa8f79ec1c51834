//! Buffer, ToList and SequenceEqual, including their resource settings.

use resumable_rx::operators::SubscribableExt;
use resumable_rx::settings::keys;
use resumable_rx::testing::{
    on_completed, on_error, on_next, subscribed, HotObservable, TestRun, TestScheduler,
};
use resumable_rx::{RxError, SequenceError, Settings};
use std::sync::Arc;

fn seven(scheduler: &TestScheduler) -> Arc<HotObservable<i32>> {
    scheduler.create_hot_observable(vec![
        on_next(210, 1),
        on_next(220, 2),
        on_next(230, 3),
        on_next(240, 4),
        on_next(250, 5),
        on_next(260, 6),
        on_next(270, 7),
        on_completed(300),
    ])
}

fn exhausted(setting: &str, limit: usize) -> SequenceError {
    SequenceError::ResourceExhausted {
        setting: setting.to_string(),
        limit,
    }
}

// --- Buffer ---

#[test]
fn test_buffer_count() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let scheduler = TestScheduler::new();
    let xs = seven(&scheduler);

    let source = xs.clone();
    let results = scheduler
        .start(move || source.clone().buffer(3).unwrap())
        .unwrap();

    assert_eq!(
        results.messages(),
        vec![
            on_next(230, vec![1, 2, 3]),
            on_next(260, vec![4, 5, 6]),
            on_next(300, vec![7]),
            on_completed(300),
        ]
    );
    assert_eq!(xs.subscriptions(), vec![subscribed(200, 300)]);
}

#[test]
fn test_buffer_overlapping() {
    let scheduler = TestScheduler::new();
    let xs = seven(&scheduler);

    let results = scheduler
        .start(move || xs.clone().buffer_skip(3, 2).unwrap())
        .unwrap();

    assert_eq!(
        results.messages(),
        vec![
            on_next(230, vec![1, 2, 3]),
            on_next(250, vec![3, 4, 5]),
            on_next(270, vec![5, 6, 7]),
            on_next(300, vec![7]),
            on_completed(300),
        ]
    );
}

#[test]
fn test_buffer_with_gaps() {
    let scheduler = TestScheduler::new();
    let xs = seven(&scheduler);

    let results = scheduler
        .start(move || xs.clone().buffer_skip(2, 3).unwrap())
        .unwrap();

    assert_eq!(
        results.messages(),
        vec![
            on_next(220, vec![1, 2]),
            on_next(250, vec![4, 5]),
            on_next(300, vec![7]),
            on_completed(300),
        ]
    );
}

#[test]
fn test_buffer_rejects_zero_arguments() {
    let scheduler = TestScheduler::new();
    let xs = seven(&scheduler);

    assert!(matches!(
        xs.clone().buffer(0),
        Err(RxError::InvalidArgument { name: "count", .. })
    ));
    assert!(matches!(
        xs.clone().buffer_skip(2, 0),
        Err(RxError::InvalidArgument { name: "skip", .. })
    ));
}

#[test]
fn test_buffer_open_buffer_limit() {
    let scheduler = TestScheduler::with_settings(Settings::new().with(keys::MAX_BUFFER_COUNT, 1));
    let xs = seven(&scheduler);

    let source = xs.clone();
    let results = scheduler
        .start(move || source.clone().buffer_skip(3, 1).unwrap())
        .unwrap();

    assert_eq!(
        results.messages(),
        vec![on_error(220, exhausted(keys::MAX_BUFFER_COUNT, 1))]
    );
    assert_eq!(xs.subscriptions(), vec![subscribed(200, 220)]);
}

#[test]
fn test_buffer_size_limit() {
    let scheduler = TestScheduler::with_settings(Settings::new().with(keys::MAX_BUFFER_SIZE, 2));
    let xs = seven(&scheduler);

    let results = scheduler
        .start(move || xs.clone().buffer(3).unwrap())
        .unwrap();

    assert_eq!(
        results.messages(),
        vec![on_error(230, exhausted(keys::MAX_BUFFER_SIZE, 2))]
    );
}

#[test]
fn test_buffer_invalid_setting_fails_initialization() {
    let scheduler =
        TestScheduler::with_settings(Settings::new().with(keys::MAX_BUFFER_COUNT, "lots"));
    let xs = seven(&scheduler);

    let source = xs.clone();
    let result = scheduler.start(move || source.clone().buffer(3).unwrap());

    assert!(matches!(result, Err(RxError::InvalidSetting { .. })));
    assert_eq!(xs.subscriptions(), vec![subscribed(200, 200)]);
}

#[test]
fn test_buffer_checkpoint() {
    let scheduler = TestScheduler::new();
    let xs = seven(&scheduler);

    let results = scheduler
        .run(
            TestRun::new(move || xs.clone().buffer_skip(3, 2).unwrap())
                .save_at(235)
                .load_at(238),
        )
        .unwrap();

    assert_eq!(
        results.messages(),
        vec![
            on_next(230, vec![1, 2, 3]),
            on_next(250, vec![3, 4, 5]),
            on_next(270, vec![5, 6, 7]),
            on_next(300, vec![7]),
            on_completed(300),
        ]
    );
}

// --- ToList ---

#[test]
fn test_to_list() {
    let scheduler = TestScheduler::new();
    let xs = seven(&scheduler);

    let results = scheduler.start(move || xs.clone().to_list()).unwrap();

    assert_eq!(
        results.messages(),
        vec![on_next(300, vec![1, 2, 3, 4, 5, 6, 7]), on_completed(300)]
    );
}

#[test]
fn test_to_list_empty() {
    let scheduler = TestScheduler::new();
    let xs = scheduler.create_hot_observable::<i32>(vec![on_completed(250)]);

    let results = scheduler.start(move || xs.clone().to_list()).unwrap();

    assert_eq!(results.messages(), vec![on_next(250, vec![]), on_completed(250)]);
}

#[test]
fn test_to_list_limit() {
    let scheduler = TestScheduler::with_settings(Settings::new().with(keys::MAX_LIST_SIZE, 2));
    let xs = seven(&scheduler);

    let source = xs.clone();
    let results = scheduler.start(move || source.clone().to_list()).unwrap();

    assert_eq!(
        results.messages(),
        vec![on_error(230, exhausted(keys::MAX_LIST_SIZE, 2))]
    );
    assert_eq!(xs.subscriptions(), vec![subscribed(200, 230)]);
}

#[test]
fn test_to_list_checkpoint() {
    let scheduler = TestScheduler::new();
    let xs = seven(&scheduler);

    let results = scheduler
        .run(TestRun::new(move || xs.clone().to_list()).save_at(245).load_at(248))
        .unwrap();

    assert_eq!(
        results.messages(),
        vec![on_next(300, vec![1, 2, 3, 4, 5, 6, 7]), on_completed(300)]
    );
}

// --- SequenceEqual ---

fn left(scheduler: &TestScheduler) -> Arc<HotObservable<i32>> {
    scheduler.create_hot_observable(vec![
        on_next(210, 1),
        on_next(220, 2),
        on_next(230, 3),
        on_completed(300),
    ])
}

#[test]
fn test_sequence_equal_true() {
    let scheduler = TestScheduler::new();
    let xs = left(&scheduler);
    let ys = scheduler.create_hot_observable(vec![
        on_next(215, 1),
        on_next(240, 2),
        on_next(250, 3),
        on_completed(320),
    ]);

    let (l, r) = (xs.clone(), ys.clone());
    let results = scheduler
        .start(move || l.clone().sequence_equal(r.clone()))
        .unwrap();

    assert_eq!(results.messages(), vec![on_next(320, true), on_completed(320)]);
    assert_eq!(xs.subscriptions(), vec![subscribed(200, 320)]);
    assert_eq!(ys.subscriptions(), vec![subscribed(200, 320)]);
}

#[test]
fn test_sequence_equal_differing_element() {
    let scheduler = TestScheduler::new();
    let xs = left(&scheduler);
    let ys = scheduler.create_hot_observable(vec![
        on_next(215, 1),
        on_next(240, 9),
        on_next(250, 3),
        on_completed(320),
    ]);

    let (l, r) = (xs.clone(), ys.clone());
    let results = scheduler
        .start(move || l.clone().sequence_equal(r.clone()))
        .unwrap();

    assert_eq!(results.messages(), vec![on_next(240, false), on_completed(240)]);
    assert_eq!(xs.subscriptions(), vec![subscribed(200, 240)]);
    assert_eq!(ys.subscriptions(), vec![subscribed(200, 240)]);
}

#[test]
fn test_sequence_equal_longer_right() {
    let scheduler = TestScheduler::new();
    let xs = left(&scheduler);
    let ys = scheduler.create_hot_observable(vec![
        on_next(215, 1),
        on_next(240, 2),
        on_next(250, 3),
        on_next(350, 4),
        on_completed(400),
    ]);

    let results = scheduler
        .start(move || xs.clone().sequence_equal(ys.clone()))
        .unwrap();

    assert_eq!(results.messages(), vec![on_next(350, false), on_completed(350)]);
}

#[test]
fn test_sequence_equal_by_comparer() {
    let scheduler = TestScheduler::new();
    let xs = left(&scheduler);
    let ys = scheduler.create_hot_observable(vec![
        on_next(215, 11),
        on_next(240, 22),
        on_next(250, 33),
        on_completed(320),
    ]);

    let results = scheduler
        .start(move || {
            xs.clone()
                .sequence_equal_by(ys.clone(), |a, b| Ok(a % 10 == b % 10))
        })
        .unwrap();

    assert_eq!(results.messages(), vec![on_next(320, true), on_completed(320)]);
}

#[test]
fn test_sequence_equal_comparer_failure() {
    let scheduler = TestScheduler::new();
    let xs = left(&scheduler);
    let ys = scheduler.create_hot_observable(vec![on_next(215, 1), on_completed(320)]);

    let results = scheduler
        .start(move || {
            xs.clone()
                .sequence_equal_by(ys.clone(), |_, _| Err(SequenceError::user("compare")))
        })
        .unwrap();

    assert_eq!(
        results.messages(),
        vec![on_error(215, SequenceError::user("compare"))]
    );
}

#[test]
fn test_sequence_equal_queue_limit() {
    let scheduler = TestScheduler::with_settings(Settings::new().with(keys::MAX_QUEUE_SIZE, 1));
    let xs = left(&scheduler);
    let ys = scheduler.create_hot_observable(vec![on_next(300, 1), on_completed(320)]);

    let results = scheduler
        .start(move || xs.clone().sequence_equal(ys.clone()))
        .unwrap();

    assert_eq!(
        results.messages(),
        vec![on_error(220, exhausted(keys::MAX_QUEUE_SIZE, 1))]
    );
}

#[test]
fn test_sequence_equal_checkpoint_keeps_queue() {
    let scheduler = TestScheduler::new();
    let xs = left(&scheduler);
    let ys = scheduler.create_hot_observable(vec![
        on_next(215, 1),
        on_next(240, 2),
        on_next(250, 3),
        on_completed(320),
    ]);

    let (l, r) = (xs.clone(), ys.clone());
    let results = scheduler
        .run(
            TestRun::new(move || l.clone().sequence_equal(r.clone()))
                .save_at(232)
                .load_at(235),
        )
        .unwrap();

    assert_eq!(results.messages(), vec![on_next(320, true), on_completed(320)]);
    assert_eq!(
        xs.subscriptions(),
        vec![subscribed(200, 235), subscribed(235, 320)]
    );
    assert_eq!(
        ys.subscriptions(),
        vec![subscribed(200, 235), subscribed(235, 320)]
    );
}
