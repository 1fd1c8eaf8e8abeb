#![forbid(unsafe_code)]

//! Change batching: one delivery per tick, deferral of re-entrant changes,
//! cancellation and observer isolation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tabula_core::{KeySelector, Row};
use tabula_harness::{TableFixture, capture, people};
use tabula_runtime::reactive::{ChangeRecord, ObserverError};
use tabula_runtime::{IndexedCollection, Observable, TaskQueue};

fn record(source: &Rc<str>, n: i32) -> ChangeRecord<i32> {
    ChangeRecord::splice(source, 0, Vec::new(), vec![n])
}

#[test]
fn notifies_in_one_tick_are_delivered_once() {
    let queue = TaskQueue::new();
    let obs: Observable<i32> = Observable::new("nums", queue.handle());
    let batches = Rc::new(RefCell::new(Vec::new()));
    let b = Rc::clone(&batches);
    obs.observe(move |batch| {
        b.borrow_mut()
            .push(batch.iter().map(|r| r.added[0]).collect::<Vec<_>>());
        Ok(())
    });

    let source = Rc::clone(obs.source());
    obs.notify([record(&source, 1)]);
    obs.notify([record(&source, 2), record(&source, 3)]);
    assert_eq!(queue.pending(), 1);
    assert!(batches.borrow().is_empty());

    queue.tick();
    assert_eq!(*batches.borrow(), vec![vec![1, 2, 3]]);
    assert_eq!(obs.flush_count(), 1);
}

#[test]
fn clear_changes_is_idempotent() {
    let queue = TaskQueue::new();
    let obs: Observable<i32> = Observable::new("nums", queue.handle());
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    obs.observe(move |_| {
        h.set(h.get() + 1);
        Ok(())
    });
    let source = Rc::clone(obs.source());
    obs.notify([record(&source, 1)]);

    assert_eq!(obs.clear_changes(), 1);
    assert_eq!(obs.clear_changes(), 0);
    assert!(!obs.is_flush_scheduled());
    queue.run_until_idle(4);
    assert_eq!(hits.get(), 0);
}

#[test]
fn changes_made_during_a_flush_wait_for_the_next_one() {
    let queue = TaskQueue::new();
    let data = IndexedCollection::new("data", KeySelector::<Row>::field("id"), queue.handle());
    let sizes = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&sizes);
    let inner = data.clone();
    data.observe(move |batch| {
        s.borrow_mut().push(batch.len());
        if inner.len() < 3 {
            inner.push(people(&[inner.len() as i64 + 10])).map_err(ObserverError::failed)?;
        }
        Ok(())
    });

    data.push(people(&[1])).unwrap();
    assert_eq!(queue.tick(), 1);
    assert_eq!(*sizes.borrow(), [1]);
    assert_eq!(data.len(), 2);

    assert_eq!(queue.tick(), 1);
    assert_eq!(*sizes.borrow(), [1, 1]);
    queue.run_until_idle(8);
    assert_eq!(*sizes.borrow(), [1, 1, 1]);
    assert_eq!(data.len(), 3);
}

#[test]
fn failing_observer_does_not_starve_the_rest() {
    let queue = TaskQueue::new();
    let obs: Observable<i32> = Observable::new("nums", queue.handle());
    let reached = Rc::new(Cell::new(false));
    let sunk = Rc::new(RefCell::new(Vec::new()));

    obs.observe(|_| Err(ObserverError::failed("boom")));
    obs.observe(|_| panic!("kaboom"));
    let r = Rc::clone(&reached);
    obs.observe(move |_| {
        r.set(true);
        Ok(())
    });
    let s = Rc::clone(&sunk);
    obs.set_error_sink(move |failure| s.borrow_mut().push(failure.error.clone()));

    let source = Rc::clone(obs.source());
    obs.notify([record(&source, 1)]);
    queue.tick();

    assert!(reached.get());
    assert_eq!(
        *sunk.borrow(),
        [
            ObserverError::Failed("boom".into()),
            ObserverError::Panicked("kaboom".into())
        ]
    );
}

#[test]
fn unsunk_observer_errors_are_logged() {
    let queue = TaskQueue::new();
    let obs: Observable<i32> = Observable::new("nums", queue.handle());
    obs.observe(|_| Err(ObserverError::failed("boom")));
    let source = Rc::clone(obs.source());
    obs.notify([record(&source, 1)]);

    let (report, logs) = capture(|| obs.flush_now());
    assert_eq!(report.errors.len(), 1);
    assert!(
        logs.iter()
            .any(|e| e.message == "observer failed during flush" && e.field("source") == Some("nums"))
    );
}

#[test]
fn table_renders_one_tick_after_mutation() {
    let fx = TableFixture::people(&[1]).unwrap();
    fx.table.data().push(people(&[2])).unwrap();
    fx.table.data().push(people(&[3])).unwrap();
    assert_eq!(fx.keys(), ["1"]);

    assert_eq!(fx.queue.tick(), 1);
    assert_eq!(fx.keys(), ["1", "2", "3"]);
    assert_eq!(fx.events.names(), ["dataspliced", "dataspliced"]);
}
