//! Compact tree literals for unit tests.

use crate::tree::{NodeData, Tree, TreeBuilder};
use indextree::NodeId;

pub(crate) struct N {
    data: NodeData,
    children: Vec<N>,
}

pub(crate) fn n(kind: &str) -> N {
    N {
        data: NodeData::new(kind),
        children: Vec::new(),
    }
}

impl N {
    pub(crate) fn v(mut self, value: &str) -> N {
        self.data = self.data.with_value(value);
        self
    }

    pub(crate) fn meta(mut self, key: &str, value: &str) -> N {
        self.data = self.data.with_metadata(key, value.to_string());
        self
    }

    pub(crate) fn c(mut self, children: impl IntoIterator<Item = N>) -> N {
        self.children.extend(children);
        self
    }
}

pub(crate) fn tree(root: N) -> Tree {
    fn add(builder: &mut TreeBuilder, parent: NodeId, node: N) {
        let id = builder.add_child(parent, node.data);
        for child in node.children {
            add(builder, id, child);
        }
    }

    let mut builder = TreeBuilder::new();
    let root_id = builder.set_root(root.data);
    for child in root.children {
        add(&mut builder, root_id, child);
    }
    builder.build()
}

/// Node at a dotted path, panicking when absent.
pub(crate) fn at(tree: &Tree, path: &str) -> NodeId {
    tree.node_at(&path.parse().unwrap())
        .unwrap_or_else(|| panic!("no node at {path:?}"))
}
