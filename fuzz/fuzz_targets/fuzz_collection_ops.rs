#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tabula_core::{Comparator, KeySelector, Row, SortDescriptor};
use tabula_runtime::reactive::replay;
use tabula_runtime::{IndexedCollection, TaskQueue};

#[derive(Debug, Arbitrary)]
enum Op {
    Push(Vec<u8>),
    Unshift(Vec<u8>),
    Splice { index: i8, remove: u8, ids: Vec<u8> },
    RemoveKey(u8),
    Update { index: u8, id: u8 },
    Sort(bool),
    Reverse,
    ClearComparator,
    Reset(Vec<u8>),
    Flush,
    ClearChanges,
}

fn rows(ids: &[u8]) -> Vec<Row> {
    ids.iter()
        .take(8)
        .map(|&id| Row::new().with("id", i64::from(id)))
        .collect()
}

fuzz_target!(|ops: Vec<Op>| {
    let queue = TaskQueue::new();
    let data = IndexedCollection::new("data", KeySelector::<Row>::field("id"), queue.handle());
    let mut mirror: Vec<Row> = Vec::new();

    for op in ops.iter().take(64) {
        match op {
            Op::Push(ids) => {
                let _ = data.push(rows(ids));
            }
            Op::Unshift(ids) => {
                let _ = data.unshift(rows(ids));
            }
            Op::Splice { index, remove, ids } => {
                let _ = data.splice(isize::from(*index), usize::from(*remove % 8), rows(ids));
            }
            Op::RemoveKey(id) => {
                data.remove_key(&i64::from(*id).into());
            }
            Op::Update { index, id } => {
                if !data.is_empty() {
                    let index = usize::from(*index) % data.len();
                    let _ = data.update(index, |r| r.insert("id", i64::from(*id)));
                }
            }
            Op::Sort(asc) => {
                let by_id = SortDescriptor::new("id", |r: &Row| r.get("id").clone()).ascending(*asc);
                data.sort(Comparator::by(by_id));
            }
            Op::Reverse => data.reverse(),
            Op::ClearComparator => data.clear_comparator(),
            Op::Reset(ids) => {
                let _ = data.reset(rows(ids));
            }
            Op::Flush => {
                let pending = data.pending_changes();
                replay(&mut mirror, &pending);
                data.flush_now();
            }
            Op::ClearChanges => {
                // Discarded records break the mirror; resync it.
                data.clear_changes();
                mirror = data.to_vec();
            }
        }
        assert!(data.is_consistent());
    }

    let pending = data.pending_changes();
    replay(&mut mirror, &pending);
    assert_eq!(mirror, data.to_vec());
});
