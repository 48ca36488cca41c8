use core::{iter::FusedIterator, marker::PhantomData};

use crate::{
    node::{self, links, Dir, Link},
    EditTree,
};

enum CameFrom {
    Parent,
    LeftChild,
    Here,
    RightChild,
}

/// An in-order iterator over the elements of an [`EditTree`].
///
/// Created by [`EditTree::iter`]. Walks parent links instead of keeping a stack, so it needs no
/// allocation.
pub struct Iter<'tree, T> {
    front_cur: Link<T>,
    front_from: CameFrom,

    len: usize,
    _tree: PhantomData<&'tree EditTree<T>>,
}

impl<'tree, T> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree EditTree<T>) -> Self {
        Iter {
            front_cur: tree.root,
            front_from: CameFrom::Parent,
            len: tree.len(),
            _tree: PhantomData,
        }
    }
}

impl<'tree, T> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let mut cur = self.front_cur?;

        loop {
            match self.front_from {
                CameFrom::Parent => {
                    // Upon entering a new subtree, find the minimum element.
                    cur = unsafe { node::edge(cur, Dir::Left) };

                    // Once the minimum is found, its (empty) left subtree has been exhausted.
                    self.front_from = CameFrom::LeftChild;
                }

                CameFrom::LeftChild => {
                    // The left subtree has been exhausted, so this node is up next. Save off the
                    // iterator state and return it.
                    self.front_cur = Some(cur);
                    self.front_from = CameFrom::Here;
                    self.len -= 1;

                    return Some(unsafe { &cur.as_ref().element });
                }

                CameFrom::Here => {
                    // The current node was just yielded.
                    if let Some(right) = unsafe { links(cur).right() } {
                        // If the right subtree is not empty, go there.
                        self.front_from = CameFrom::Parent;

                        cur = right;
                    } else if let Some(parent) = unsafe { links(cur).parent() } {
                        // Otherwise, ascend one level.
                        self.front_from = match unsafe { node::which_child(parent, cur) } {
                            Dir::Left => CameFrom::LeftChild,
                            Dir::Right => CameFrom::RightChild,
                        };

                        cur = parent;
                    } else {
                        unreachable!("ran out of nodes before `len` reached zero")
                    }
                }

                CameFrom::RightChild => {
                    // The subtree of `cur` is exhausted. Ascend until arriving from a left child;
                    // that ancestor is the successor element.
                    loop {
                        let Some(parent) = (unsafe { links(cur).parent() }) else {
                            unreachable!("ran out of nodes before `len` reached zero")
                        };
                        let from = unsafe { node::which_child(parent, cur) };
                        cur = parent;

                        if from == Dir::Left {
                            break;
                        }
                    }

                    self.front_from = CameFrom::LeftChild;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}
