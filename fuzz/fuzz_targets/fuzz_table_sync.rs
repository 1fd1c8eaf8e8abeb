#![no_main]

use std::cell::RefCell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tabula_core::{Key, KeySelector, Row};
use tabula_render::{Document, Tree};
use tabula_runtime::TaskQueue;
use tabula_widgets::builder::{ATTR_INDEX, ATTR_KEY};
use tabula_widgets::{ColumnDef, Table, TableConfig};

#[derive(Debug, Arbitrary)]
enum Op {
    Push(Vec<u8>),
    Splice { index: i8, remove: u8, ids: Vec<u8> },
    Remove(u8),
    Touch(u8),
    Sort(bool),
    Reverse,
    Select(u8),
    Filter(Option<u8>),
    Tick,
}

fn rows(ids: &[u8]) -> Vec<Row> {
    ids.iter()
        .take(6)
        .map(|&id| Row::new().with("id", i64::from(id % 32)).with("n", 0))
        .collect()
}

fuzz_target!(|ops: Vec<Op>| {
    let queue = TaskQueue::new();
    let doc = Rc::new(RefCell::new(Document::new()));
    let columns = vec![
        ColumnDef::<Row>::field("id", "Id").into_ref(),
        ColumnDef::<Row>::field("n", "N").into_ref(),
    ];
    let Ok(table) = Table::new(
        Rc::clone(&doc),
        KeySelector::field("id"),
        columns,
        TableConfig::new().selectable(true),
        queue.handle(),
    ) else {
        return;
    };
    let Ok(_) = table.mount(None) else {
        return;
    };
    let mut filtered = false;

    for op in ops.iter().take(48) {
        let data = table.data();
        match op {
            Op::Push(ids) => {
                let _ = data.push(rows(ids));
            }
            Op::Splice { index, remove, ids } => {
                let _ = data.splice(isize::from(*index), usize::from(*remove % 6), rows(ids));
            }
            Op::Remove(id) => {
                data.remove_key(&Key::Int(i64::from(*id % 32)));
            }
            Op::Touch(index) => {
                if !data.is_empty() {
                    let index = usize::from(*index) % data.len();
                    let _ = data.update(index, |r| {
                        let n = r.get("n").to_number() as i64;
                        r.insert("n", n + 1);
                    });
                }
            }
            Op::Sort(asc) => {
                let _ = table.sort_by("id", *asc);
            }
            Op::Reverse => data.reverse(),
            Op::Select(id) => {
                let _ = table.toggle(&Key::Int(i64::from(*id % 32)));
            }
            Op::Filter(Some(m)) => {
                let m = i64::from(*m % 4 + 1);
                let _ = table.set_filter(move |r: &Row| (r.get("id").to_number() as i64) % m == 0);
                filtered = true;
            }
            Op::Filter(None) => {
                let _ = table.clear_filter();
                filtered = false;
            }
            Op::Tick => {
                queue.tick();
            }
        }
    }
    queue.run_until_idle(64);

    let Some(body) = table.body() else {
        return;
    };
    let doc = doc.borrow();
    let rendered: Vec<(String, String)> = doc
        .children(body)
        .into_iter()
        .filter_map(|row| {
            Some((
                doc.attribute(row, ATTR_INDEX)?.to_owned(),
                doc.attribute(row, ATTR_KEY)?.to_owned(),
            ))
        })
        .collect();
    let keys = table.data().keys();
    for (index, key) in &rendered {
        let index: usize = index.parse().unwrap();
        assert_eq!(keys[index].to_attribute(), *key);
    }
    if !filtered {
        assert_eq!(rendered.len(), keys.len());
    }
    for key in table.selected_keys() {
        assert!(table.data().contains_key(&key));
    }
});
