#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tabula_render::{Document, NodeId, Tree, merge_nodes};

const TAGS: [&str; 3] = ["div", "span", "td"];
const NAMES: [&str; 3] = ["id", "class", "data-x"];

#[derive(Debug, Arbitrary)]
enum Blueprint {
    Text(u8),
    Element {
        tag: u8,
        attrs: Vec<(u8, u8)>,
        children: Vec<Blueprint>,
    },
}

fn build(doc: &mut Document, blueprint: &Blueprint, depth: usize) -> NodeId {
    match blueprint {
        Blueprint::Text(n) => doc.create_text(&n.to_string()),
        Blueprint::Element {
            tag,
            attrs,
            children,
        } => {
            let node = doc.create_element(TAGS[usize::from(*tag) % TAGS.len()]);
            for (name, value) in attrs.iter().take(4) {
                doc.set_attribute(node, NAMES[usize::from(*name) % NAMES.len()], &value.to_string());
            }
            if depth < 4 {
                for child in children.iter().take(6) {
                    let child = build(doc, child, depth + 1);
                    let _ = doc.append_child(node, child);
                }
            }
            node
        }
    }
}

fuzz_target!(|input: (Blueprint, Blueprint)| {
    let (old, new) = input;
    let mut doc = Document::new();
    let parent = doc.create_element("tr");
    let a = build(&mut doc, &old, 0);
    let _ = doc.append_child(parent, a);
    let b = build(&mut doc, &new, 0);
    let text = doc.text_content(b);
    let tag = doc.tag(b).map(str::to_owned);
    let same_kind = doc.kind(a) == doc.kind(b);

    let Ok(result) = merge_nodes(&mut doc, Some(parent), a, b) else {
        return;
    };
    assert_eq!(doc.children(parent), vec![result]);
    assert_eq!(doc.text_content(result), text);
    assert_eq!(doc.tag(result).map(str::to_owned), tag);
    assert_eq!(result == a, same_kind);
});
