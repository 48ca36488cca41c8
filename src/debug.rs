use std::{collections::VecDeque, fmt, fmt::Write as _};

use crate::{
    node::{links, Link, Node},
    EditTree,
};

impl<T: fmt::Debug> EditTree<T> {
    /// Writes a Graphviz rendering of the tree structure to `w`.
    ///
    /// Nodes are labelled `element:rank:balance` and laid out one tree level per row; missing
    /// children are drawn as points. Node identifiers are in-order positions.
    pub fn dotgraph<W>(&self, name: &str, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
    {
        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        enum Item<T> {
            // A node and the position of its subtree's minimum.
            Node(core::ptr::NonNull<Node<T>>, usize),
            Missing(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root, 0));

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        let mut missing = 0;
        let mut edges = String::new();

        while !queue.is_empty() {
            let remaining = queue.len();

            write!(w, "{{rank=same; ")?;

            for _ in 0..remaining {
                let Some(item) = queue.pop_front() else {
                    break;
                };

                let (node, offset) = match item {
                    Item::Node(node, offset) => (node, offset),
                    Item::Missing(id) => {
                        write!(w, "\"graph{name}-missing{id}\" [shape=point]; ")?;
                        continue;
                    }
                };

                let node_links = unsafe { links(node) };
                let rank = node_links.rank();
                let pos = offset + rank;
                let element = unsafe { &node.as_ref().element };
                let label = format!("{element:?}")
                    .replace('\\', "\\\\")
                    .replace('"', "\\\"");
                let balance = node_links.balance();

                write!(
                    w,
                    "\"graph{name}-{pos}\" [label=\"{label}:{rank}:{balance:?}\"]; "
                )?;

                let children: [(Link<T>, usize); 2] = [
                    (node_links.left(), offset),
                    (node_links.right(), pos + 1),
                ];

                for (child, child_offset) in children {
                    match child {
                        Some(child) => {
                            let child_pos = child_offset + unsafe { links(child).rank() };
                            queue.push_back(Item::Node(child, child_offset));
                            writeln!(edges, "\"graph{name}-{pos}\" -> \"graph{name}-{child_pos}\";")?;
                        }
                        None => {
                            queue.push_back(Item::Missing(missing));
                            writeln!(
                                edges,
                                "\"graph{name}-{pos}\" -> \"graph{name}-missing{missing}\";"
                            )?;
                            missing += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&edges)?;

        w.write_str(" }\n}")
    }
}
