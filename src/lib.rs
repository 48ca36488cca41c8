//! A position-indexed AVL tree for use as a text editor buffer.
//!
//! [`EditTree`] stores a sequence of elements in in-order position. Instead of keys, every node
//! records its _rank_ (the size of its left subtree) and a two-state-plus-equal balance code, so
//! that lookups, insertions and removals by position take _O(log n)_, and whole trees can be
//! split and concatenated in _O(log n)_.
//!
//! ```
//! use edit_tree::EditTree;
//!
//! let mut text = EditTree::from("helloworld");
//! let world = text.split_off(5).unwrap();
//! assert_eq!(text.to_string(), "hello");
//! assert_eq!(world.to_string(), "world");
//! ```

// Conventions and invariants are described at the top of `node.rs`. In short, for every node:
// 1. The heights of its two subtrees differ by at most one, and its balance code names the
//    taller side (or `Same`).
// 2. Its rank equals the number of nodes in its left subtree.
// 3. Its children point back at it through their parent links.

use core::{fmt, marker::PhantomData, mem, ptr::NonNull};

use tracing::debug;

use crate::node::{links, Balance, Link, Node, Subtree};

mod debug;
mod error;
mod iter;
mod node;
mod split;
mod text;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use error::{EditTreeError, Result};
pub use iter::Iter;

/// A sequence of elements stored in a height-balanced tree ordered by position.
///
/// Most operations are _O(log n)_. Note that [`height`](EditTree::height) is derived from the
/// balance codes on every call and is _O(log n)_ as well.
pub struct EditTree<T> {
    root: Link<T>,
    len: usize,
    rotations: usize,
    _owns: PhantomData<Box<Node<T>>>,
}

// SAFETY: an `EditTree` exclusively owns its nodes, so it can move between threads whenever its
// elements can. Shared access never writes to the nodes.
unsafe impl<T: Send> Send for EditTree<T> {}
unsafe impl<T: Sync> Sync for EditTree<T> {}

impl<T> EditTree<T> {
    /// Returns a new empty tree.
    pub const fn new() -> EditTree<T> {
        EditTree {
            root: None,
            len: 0,
            rotations: 0,
            _owns: PhantomData,
        }
    }

    /// Returns a tree holding the single element `element`.
    pub fn from_element(element: T) -> EditTree<T> {
        let mut tree = EditTree::new();
        tree.root = Some(Node::alloc(element));
        tree.len = 1;
        tree
    }

    /// Returns a balanced tree holding `elements` in order.
    ///
    /// This operation completes in _O(n)_ time.
    pub fn from_vec(elements: Vec<T>) -> EditTree<T> {
        let len = elements.len();
        let mut tree = EditTree::new();
        tree.set_subtree(node::build(len, &mut elements.into_iter()));
        tree
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the height of the tree. The empty tree has height -1 and a single node height 0.
    pub fn height(&self) -> isize {
        unsafe { node::height(self.root) }
    }

    /// Returns the total number of rotations performed on this tree since it was created.
    ///
    /// A double rotation counts as two.
    pub const fn rotation_count(&self) -> usize {
        self.rotations
    }

    /// Returns a reference to the element at position `pos`.
    pub fn get(&self, pos: usize) -> Result<&T> {
        match unsafe { node::locate(self.root, pos) } {
            Some(node) => Ok(unsafe { &node.as_ref().element }),
            None => Err(EditTreeError::IndexOutOfBounds {
                index: pos,
                len: self.len,
            }),
        }
    }

    /// Returns the first element of the tree.
    pub fn first(&self) -> Option<&T> {
        let root = self.root?;
        unsafe { Some(&node::edge(root, node::Dir::Left).as_ref().element) }
    }

    /// Returns the last element of the tree.
    pub fn last(&self) -> Option<&T> {
        let root = self.root?;
        unsafe { Some(&node::edge(root, node::Dir::Right).as_ref().element) }
    }

    /// Returns `length` elements starting at position `pos`.
    ///
    /// Each element is looked up separately, so this takes _O(length · log n)_.
    pub fn get_range(&self, pos: usize, length: usize) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.check_range(pos, length)?;

        (pos..pos + length)
            .map(|i| self.get(i).cloned())
            .collect()
    }

    /// Appends `element` to the end of the tree.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn push(&mut self, element: T) {
        self.insert_unchecked(self.len, element);
    }

    /// Inserts `element` so that it ends up at position `pos`, shifting later elements back.
    ///
    /// `pos` may equal the length of the tree, in which case this is [`push`](EditTree::push).
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, pos: usize, element: T) -> Result<()> {
        if pos > self.len {
            return Err(EditTreeError::IndexOutOfBounds {
                index: pos,
                len: self.len,
            });
        }

        self.insert_unchecked(pos, element);
        Ok(())
    }

    fn insert_unchecked(&mut self, pos: usize, element: T) {
        let node = Node::alloc(element);

        match self.root {
            // Tree is empty. Set `node` as the root and return.
            None => self.root = Some(node),
            Some(root) => {
                let retraced = unsafe { node::insert_at(root, pos, node) };
                self.rotations += retraced.rotations;

                // Only a rotation can replace the root, and only at the top of the retrace.
                if unsafe { links(retraced.top).parent() }.is_none() {
                    self.root = Some(retraced.top);
                }
            }
        }

        self.len += 1;
    }

    /// Removes and returns the element at position `pos`.
    ///
    /// This operation completes in _O(log(n))_ time, though it may rotate at every level.
    pub fn remove(&mut self, pos: usize) -> Result<T> {
        if pos >= self.len {
            return Err(EditTreeError::IndexOutOfBounds {
                index: pos,
                len: self.len,
            });
        }

        let node = self.unlink(pos);
        Ok(unsafe { Node::free(node) })
    }

    // Detaches the node at `pos`, which the caller has validated.
    fn unlink(&mut self, pos: usize) -> NonNull<Node<T>> {
        debug_assert!(pos < self.len);

        let root = self
            .root
            .expect("a tree with a valid position is not empty");
        let unlinked = unsafe { node::unlink_at(root, pos) };

        self.root = unlinked.root;
        self.rotations += unlinked.rotations;
        self.len -= 1;

        unlinked.node
    }

    /// Removes `length` elements starting at `start`, returning them as a new tree.
    ///
    /// This is a split at `start`, a split at `length` within the result, and a concatenation of
    /// the outer pieces, so it completes in _O(log(n))_ time.
    pub fn delete_range(&mut self, start: usize, length: usize) -> Result<EditTree<T>> {
        self.check_range(start, length)?;

        let mut removed = self.split_off(start)?;
        let mut rest = removed.split_off(length)?;
        self.concatenate(&mut rest);

        debug!(start, length, len = self.len, "deleted range");

        Ok(removed)
    }

    /// Removes all elements from the tree.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root.take();

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let cur = node::edge(cur, node::Dir::Left);
                let parent = links(cur).parent();
                let right = links(cur).right();

                // Elevate the node's right child (which may be None).
                if let Some(parent) = parent {
                    links(parent).set_left(right);
                }
                if let Some(right) = right {
                    links(right).set_parent(parent);
                }

                // Drop the node.
                drop(Node::free(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert_eq!(self.len, 0);
    }

    /// Returns an iterator over the elements in order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns the elements in order.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    /// Returns the position of the first occurrence of `pattern` starting at or after `from`.
    ///
    /// This flattens the tree and scans it linearly.
    pub fn find_seq(&self, pattern: &[T], from: usize) -> Option<usize>
    where
        T: PartialEq,
    {
        if from > self.len {
            return None;
        }

        if pattern.is_empty() {
            return Some(from);
        }

        let haystack: Vec<&T> = self.iter().skip(from).collect();
        haystack
            .windows(pattern.len())
            .position(|window| window.iter().copied().eq(pattern.iter()))
            .map(|i| i + from)
    }

    fn check_range(&self, start: usize, length: usize) -> Result<()> {
        match start.checked_add(length) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(EditTreeError::RangeOutOfBounds {
                start,
                length,
                len: self.len,
            }),
        }
    }

    // Moves the whole tree out as a detached subtree, leaving `self` empty.
    fn take_subtree(&mut self) -> Subtree<T> {
        Subtree {
            height: self.height(),
            root: self.root.take(),
            len: mem::take(&mut self.len),
        }
    }

    fn set_subtree(&mut self, subtree: Subtree<T>) {
        debug_assert!(self.root.is_none());
        self.root = subtree.root;
        self.len = subtree.len;
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.len, 0);
            return;
        };

        unsafe {
            assert_eq!(links(root).parent(), None, "root must not have a parent");

            let (height, len) = self.assert_invariants_at(root);
            assert_eq!(len, self.len, "cached length disagrees with node count");
            assert_eq!(node::subtree_len(self.root), self.len);
            assert_eq!(node::height(self.root), height);
        }
    }

    // Returns the height and size of the subtree under `node`.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at(&self, node: NonNull<Node<T>>) -> (isize, usize) {
        unsafe {
            let node_links = links(node);
            let mut heights = [-1isize; 2];
            let mut lens = [0usize; 2];

            for (i, child) in [node_links.left(), node_links.right()].into_iter().enumerate() {
                if let Some(child) = child {
                    // Ensure child's parent link points to this node.
                    let parent = links(child)
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    (heights[i], lens[i]) = self.assert_invariants_at(child);
                }
            }

            // Ensure the rank counts the left subtree.
            assert_eq!(node_links.rank(), lens[0], "rank must equal left subtree size");

            // Ensure the balance code matches the actual heights, which differ by at most one.
            let expected = match heights[1] - heights[0] {
                -1 => Balance::Left,
                0 => Balance::Same,
                1 => Balance::Right,
                diff => panic!("subtree heights differ by {diff}"),
            };
            assert_eq!(node_links.balance(), expected);

            (1 + heights[0].max(heights[1]), lens[0] + lens[1] + 1)
        }
    }
}

impl<T> Default for EditTree<T> {
    fn default() -> Self {
        EditTree::new()
    }
}

impl<T> Drop for EditTree<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: Clone> Clone for EditTree<T> {
    /// Returns a copy with all new nodes, the same shape and the same contents.
    ///
    /// The rotation counter of the copy starts at zero.
    fn clone(&self) -> Self {
        let mut tree = EditTree::new();
        tree.root = unsafe { node::copy_subtree(self.root, None) };
        tree.len = self.len;
        tree
    }
}

impl<T> FromIterator<T> for EditTree<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        EditTree::from_vec(iter.into_iter().collect())
    }
}

impl<T> Extend<T> for EditTree<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for element in iter {
            self.push(element);
        }
    }
}

impl<'tree, T> IntoIterator for &'tree EditTree<T> {
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq> PartialEq for EditTree<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for EditTree<T> {}

impl<T: fmt::Debug> fmt::Debug for EditTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
