use core::mem;

use tracing::debug;

use crate::{node, EditTree, EditTreeError, Result};

impl<T> EditTree<T> {
    /// Splits the tree at position `pos`.
    ///
    /// Elements at positions `< pos` stay in `self`; the returned tree holds the elements at
    /// positions `>= pos`. Both trees are balanced afterwards.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn split_off(&mut self, pos: usize) -> Result<EditTree<T>> {
        if pos > self.len {
            return Err(EditTreeError::IndexOutOfBounds {
                index: pos,
                len: self.len,
            });
        }

        let mut tail = EditTree::new();

        if pos == self.len {
            return Ok(tail);
        }

        if pos == 0 {
            mem::swap(&mut self.root, &mut tail.root);
            mem::swap(&mut self.len, &mut tail.len);
            return Ok(tail);
        }

        let whole = self.take_subtree();
        let (head, rest, rotations) = unsafe { node::split(whole, pos) };

        self.set_subtree(head);
        self.rotations += rotations;
        tail.set_subtree(rest);

        debug!(pos, head = self.len, tail = tail.len, rotations, "split tree");

        Ok(tail)
    }

    /// Moves all elements of `other` to the end of `self`, leaving `other` empty.
    ///
    /// The element on the seam of the shorter tree is detached and used to splice both trees
    /// together, so this completes in _O(log(n))_ time.
    pub fn concatenate(&mut self, other: &mut EditTree<T>) {
        if other.is_empty() {
            return;
        }

        if self.is_empty() {
            mem::swap(&mut self.root, &mut other.root);
            mem::swap(&mut self.len, &mut other.len);
            return;
        }

        // Take the splice node from the side facing the taller tree, so that the taller tree is
        // left intact and only its spine is walked.
        let splice = if self.height() >= other.height() {
            other.unlink(0)
        } else {
            self.unlink(self.len - 1)
        };

        let left = self.take_subtree();
        let right = other.take_subtree();
        let (left_len, right_len) = (left.len, right.len);

        let (joined, rotations) = unsafe { node::join(left, splice, right) };
        self.set_subtree(joined);
        self.rotations += rotations;

        debug!(left_len, right_len, rotations, "concatenated trees");
    }
}
