//! Tree → S-expression text.

use core::fmt::Write;

use gumleaf::Tree;
use gumleaf::indextree::NodeId;

fn write_string(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Print `tree` in the format [`parse`](crate::parse) reads, one node per
/// line. Only `String` metadata is printed; other values are skipped.
pub fn to_sexp(tree: &Tree) -> String {
    let mut out = String::new();
    let Some(root) = tree.root() else {
        return out;
    };

    // (node, depth, closing) with closing entries emitting the `)`
    let mut stack: Vec<(NodeId, usize, bool)> = vec![(root, 0, false)];
    while let Some((id, depth, closing)) = stack.pop() {
        if closing {
            out.push(')');
            continue;
        }
        if depth > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:indent$}({}", "", tree.kind(id), indent = depth * 2);
        if let Some(value) = tree.value(id) {
            out.push(' ');
            write_string(&mut out, value);
        }
        let metadata = &tree.get(id).metadata;
        for key in metadata.keys() {
            if let Some(value) = metadata.get::<String>(key) {
                let _ = write!(out, " @{key}=");
                write_string(&mut out, value);
            }
        }

        stack.push((id, depth, true));
        let children: Vec<NodeId> = tree.children(id).collect();
        stack.extend(children.into_iter().rev().map(|c| (c, depth + 1, false)));
    }
    out.push('\n');
    out
}
