//! Node storage and the structural primitives shared by every tree operation.
//
// Conventions used in comments:
// - The rank of a node `x`, `r(x)`, is the number of nodes in its left subtree.
// - The offset of a subtree is the position of its minimum within the whole tree. The position
//   of a node `x` is therefore `offset + r(x)`.
// - `h(x)` is the height of the subtree rooted at `x`; the empty subtree has height -1.
//
// Heights are never stored. A node only records which of its subtrees is taller (or that both
// are equal), which is enough to recover `h(x)` by walking down the taller side.

use core::{cell::UnsafeCell, ops::Not, ptr::NonNull};

use cordyceps::Linked;
use tracing::trace;

pub(crate) type Link<T> = Option<NonNull<Node<T>>>;

/// The balance code of a node: which of its subtrees is taller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Balance {
    /// The left subtree is one level taller than the right.
    Left,
    /// Both subtrees have the same height.
    Same,
    /// The right subtree is one level taller than the left.
    Right,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

impl From<Dir> for Balance {
    fn from(dir: Dir) -> Balance {
        match dir {
            Dir::Left => Balance::Left,
            Dir::Right => Balance::Right,
        }
    }
}

pub(crate) struct Node<T> {
    links: Links<T>,
    pub(crate) element: T,
}

pub(crate) struct Links<T> {
    inner: UnsafeCell<LinksInner<T>>,
}

struct LinksInner<T> {
    parent: Link<T>,
    children: [Link<T>; 2],
    rank: usize,
    balance: Balance,
}

unsafe impl<T> Linked<Links<T>> for Node<T> {
    type Handle = Box<Node<T>>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<T>> {
        let ptr = ptr.as_ptr();
        // SAFETY: `ptr` is non-null, so a pointer to one of its fields is too.
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<T> Node<T> {
    /// Allocates a detached leaf holding `element`.
    pub(crate) fn alloc(element: T) -> NonNull<Node<T>> {
        <Node<T> as Linked<Links<T>>>::into_ptr(Box::new(Node {
            links: Links::new(),
            element,
        }))
    }

    /// Frees a detached node, returning its element.
    ///
    /// # Safety
    ///
    /// `node` must have come from [`Node::alloc`] and must no longer be reachable from any tree.
    pub(crate) unsafe fn free(node: NonNull<Node<T>>) -> T {
        unsafe { <Node<T> as Linked<Links<T>>>::from_ptr(node).element }
    }
}

/// Returns the links of `node`.
///
/// # Safety
///
/// `node` must point to a live node, and the returned reference must not outlive it.
#[inline]
pub(crate) unsafe fn links<'a, T>(node: NonNull<Node<T>>) -> &'a Links<T> {
    unsafe { <Node<T> as Linked<Links<T>>>::links(node).as_ref() }
}

// All accessors take `&self`. Node links are only ever reached through raw pointers owned by a
// single tree, and no reference into `inner` escapes these methods.
impl<T> Links<T> {
    const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                rank: 0,
                balance: Balance::Same,
            }),
        }
    }

    #[inline]
    pub(crate) fn rank(&self) -> usize {
        unsafe { (*self.inner.get()).rank }
    }

    #[inline]
    pub(crate) fn balance(&self) -> Balance {
        unsafe { (*self.inner.get()).balance }
    }

    #[inline]
    pub(crate) fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    pub(crate) fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    pub(crate) fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    pub(crate) fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    pub(crate) fn set_rank(&self, rank: usize) {
        unsafe { (*self.inner.get()).rank = rank };
    }

    #[inline]
    pub(crate) fn set_balance(&self, balance: Balance) {
        unsafe { (*self.inner.get()).balance = balance };
    }

    #[inline]
    pub(crate) fn set_parent(&self, parent: Link<T>) {
        unsafe { (*self.inner.get()).parent = parent };
    }

    #[inline]
    pub(crate) fn set_child(&self, dir: Dir, child: Link<T>) {
        unsafe { (*self.inner.get()).children[dir as usize] = child };
    }

    #[inline]
    pub(crate) fn set_left(&self, left: Link<T>) {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    pub(crate) fn set_right(&self, right: Link<T>) {
        self.set_child(Dir::Right, right)
    }

    /// Turns the node back into a detached leaf.
    fn reset(&self) {
        unsafe {
            let inner = &mut *self.inner.get();
            inner.parent = None;
            inner.children = [None; 2];
            inner.rank = 0;
            inner.balance = Balance::Same;
        }
    }
}

/// A detached subtree along with its cached length and height.
pub(crate) struct Subtree<T> {
    pub(crate) root: Link<T>,
    pub(crate) len: usize,
    pub(crate) height: isize,
}

impl<T> Subtree<T> {
    pub(crate) const EMPTY: Subtree<T> = Subtree {
        root: None,
        len: 0,
        height: -1,
    };
}

/// The outcome of walking back up the tree after a structural edit.
pub(crate) struct Retraced<T> {
    /// The highest node visited. Climbing its parent links leads to the tree root.
    pub(crate) top: NonNull<Node<T>>,
    /// Whether the height increase propagated past `top`, i.e. the whole tree grew.
    pub(crate) grew: bool,
    pub(crate) rotations: usize,
}

struct Rebalanced<T> {
    top: NonNull<Node<T>>,
    shorter: bool,
    rotations: usize,
}

/// Returns `h(link)` by following balance codes. This is _O(h)_.
pub(crate) unsafe fn height<T>(mut link: Link<T>) -> isize {
    let mut height = -1;

    while let Some(node) = link {
        height += 1;

        let node = unsafe { links(node) };
        link = match node.balance() {
            Balance::Left => node.left(),
            Balance::Same | Balance::Right => node.right(),
        };
    }

    height
}

/// Returns the number of nodes under `link` by accumulating ranks along the right spine.
pub(crate) unsafe fn subtree_len<T>(mut link: Link<T>) -> usize {
    let mut len = 0;

    while let Some(node) = link {
        let node = unsafe { links(node) };
        len += node.rank() + 1;
        link = node.right();
    }

    len
}

/// Returns the node at in-order position `pos`, if any.
pub(crate) unsafe fn locate<T>(root: Link<T>, pos: usize) -> Link<T> {
    let mut opt_cur = root;
    let mut offset = 0;

    loop {
        let cur = opt_cur?;
        let cur_links = unsafe { links(cur) };
        let here = offset + cur_links.rank();

        match pos.cmp(&here) {
            core::cmp::Ordering::Less => opt_cur = cur_links.left(),
            core::cmp::Ordering::Equal => return Some(cur),
            core::cmp::Ordering::Greater => {
                offset = here + 1;
                opt_cur = cur_links.right();
            }
        }
    }
}

/// Returns the last node reached by repeatedly following `dir` from `node`.
pub(crate) unsafe fn edge<T>(mut node: NonNull<Node<T>>, dir: Dir) -> NonNull<Node<T>> {
    while let Some(next) = unsafe { links(node).child(dir) } {
        node = next;
    }

    node
}

/// Climbs parent links to the root of the tree containing `node`.
pub(crate) unsafe fn topmost<T>(mut node: NonNull<Node<T>>) -> NonNull<Node<T>> {
    while let Some(parent) = unsafe { links(node).parent() } {
        node = parent;
    }

    node
}

pub(crate) unsafe fn which_child<T>(parent: NonNull<Node<T>>, child: NonNull<Node<T>>) -> Dir {
    if unsafe { links(parent).left() } == Some(child) {
        Dir::Left
    } else {
        debug_assert_eq!(unsafe { links(parent).right() }, Some(child));
        Dir::Right
    }
}

// Moves `down` one level towards `dir`, promoting its child on the opposite side.
//
// Parent links and ranks are kept consistent. Balance codes are left to the caller, which knows
// the heights involved.
unsafe fn rotate<T>(down: NonNull<Node<T>>, dir: Dir) -> NonNull<Node<T>> {
    unsafe {
        let down_links = links(down);
        let up = down_links
            .child(!dir)
            .expect("rotation requires a child on the promoted side");
        let up_links = links(up);

        // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
        // - `down` becomes the `dir` child of `up`.
        let across = up_links.child(dir);
        down_links.set_child(!dir, across);
        if let Some(across) = across {
            links(across).set_parent(Some(down));
        }

        let parent = down_links.parent();
        up_links.set_child(dir, Some(down));
        down_links.set_parent(Some(up));
        up_links.set_parent(parent);

        if let Some(parent) = parent {
            let side = if links(parent).left() == Some(down) {
                Dir::Left
            } else {
                Dir::Right
            };
            links(parent).set_child(side, Some(up));
        }

        match dir {
            // `down` and its left subtree now sit in the left subtree of `up`.
            Dir::Left => up_links.set_rank(up_links.rank() + down_links.rank() + 1),
            // `up` and its left subtree left the left subtree of `down`.
            Dir::Right => down_links.set_rank(down_links.rank() - up_links.rank() - 1),
        }

        up
    }
}

/// Promotes the right child of `parent`. Returns the new subtree root.
pub(crate) unsafe fn single_left_rotation<T>(parent: NonNull<Node<T>>) -> NonNull<Node<T>> {
    unsafe { rotate(parent, Dir::Left) }
}

/// Promotes the left child of `parent`. Returns the new subtree root.
pub(crate) unsafe fn single_right_rotation<T>(parent: NonNull<Node<T>>) -> NonNull<Node<T>> {
    unsafe { rotate(parent, Dir::Right) }
}

/// Promotes the left child of the right child of `parent` by two levels.
pub(crate) unsafe fn double_left_rotation<T>(parent: NonNull<Node<T>>) -> NonNull<Node<T>> {
    unsafe {
        let child = links(parent)
            .right()
            .expect("double rotation requires a right child");
        single_right_rotation(child);
        single_left_rotation(parent)
    }
}

/// Promotes the right child of the left child of `parent` by two levels.
pub(crate) unsafe fn double_right_rotation<T>(parent: NonNull<Node<T>>) -> NonNull<Node<T>> {
    unsafe {
        let child = links(parent)
            .left()
            .expect("double rotation requires a left child");
        single_left_rotation(child);
        single_right_rotation(parent)
    }
}

// Restores the balance of `z`, whose `heavy` subtree is two levels taller than the other one.
//
// Let `y` be the `heavy` child of `z`. There are three cases:
//
// 1. `y` leans towards `heavy`. A single rotation promotes `y`; both nodes end up balanced and
//    the subtree is one level shorter than before the rotation.
// 2. `y` is balanced, which only happens after a removal or a join. A single rotation promotes
//    `y`; the subtree keeps its height and `y` now leans away from `heavy`.
// 3. `y` leans away from `heavy`. Its inner child `x` is promoted twice, and the subtree is one
//    level shorter.
unsafe fn rebalance<T>(z: NonNull<Node<T>>, heavy: Dir) -> Rebalanced<T> {
    unsafe {
        let y = links(z)
            .child(heavy)
            .expect("the taller side of an unbalanced node cannot be empty");
        let y_balance = links(y).balance();

        if y_balance == Balance::from(!heavy) {
            let x = links(y)
                .child(!heavy)
                .expect("a node leaning to one side has a child on that side");
            let x_balance = links(x).balance();

            let top = match heavy {
                Dir::Left => double_right_rotation(z),
                Dir::Right => double_left_rotation(z),
            };

            let (z_balance, y_balance) = if x_balance == Balance::from(heavy) {
                (Balance::from(!heavy), Balance::Same)
            } else if x_balance == Balance::from(!heavy) {
                (Balance::Same, Balance::from(heavy))
            } else {
                (Balance::Same, Balance::Same)
            };
            links(z).set_balance(z_balance);
            links(y).set_balance(y_balance);
            links(x).set_balance(Balance::Same);

            trace!(?heavy, ?x_balance, "double rotation");

            return Rebalanced {
                top,
                shorter: true,
                rotations: 2,
            };
        }

        let top = match heavy {
            Dir::Left => single_right_rotation(z),
            Dir::Right => single_left_rotation(z),
        };

        let shorter = y_balance != Balance::Same;
        if shorter {
            links(z).set_balance(Balance::Same);
            links(y).set_balance(Balance::Same);
        } else {
            links(z).set_balance(Balance::from(heavy));
            links(y).set_balance(Balance::from(!heavy));
        }

        trace!(?heavy, ?y_balance, "single rotation");

        Rebalanced {
            top,
            shorter,
            rotations: 1,
        }
    }
}

/// Walks up from `child`, whose subtree just became one level taller, fixing balance codes.
///
/// Stops as soon as an ancestor absorbs the growth, either because it was leaning the other way
/// or because a rotation brought the subtree back to its previous height.
pub(crate) unsafe fn retrace_grown<T>(mut child: NonNull<Node<T>>) -> Retraced<T> {
    let mut rotations = 0;

    while let Some(parent) = unsafe { links(child).parent() } {
        let side = unsafe { which_child(parent, child) };
        let parent_links = unsafe { links(parent) };
        let balance = parent_links.balance();

        if balance == Balance::Same {
            parent_links.set_balance(side.into());
            child = parent;
        } else if balance == Balance::from(!side) {
            parent_links.set_balance(Balance::Same);
            return Retraced {
                top: parent,
                grew: false,
                rotations,
            };
        } else {
            let fixed = unsafe { rebalance(parent, side) };
            rotations += fixed.rotations;

            if fixed.shorter {
                return Retraced {
                    top: fixed.top,
                    grew: false,
                    rotations,
                };
            }

            // Only a join can get here: the promoted child was balanced, so the rotated subtree
            // is still one level taller than it was before the edit.
            child = fixed.top;
        }
    }

    Retraced {
        top: child,
        grew: true,
        rotations,
    }
}

/// Walks up from `parent`, whose `side` subtree just became one level shorter.
///
/// Unlike growth, shrinkage can require a rotation at every level up to the root.
pub(crate) unsafe fn retrace_shrunk<T>(mut parent: NonNull<Node<T>>, mut side: Dir) -> Retraced<T> {
    let mut rotations = 0;

    loop {
        let parent_links = unsafe { links(parent) };
        let balance = parent_links.balance();

        let top = if balance == Balance::Same {
            parent_links.set_balance((!side).into());
            return Retraced {
                top: parent,
                grew: false,
                rotations,
            };
        } else if balance == Balance::from(side) {
            parent_links.set_balance(Balance::Same);
            parent
        } else {
            let fixed = unsafe { rebalance(parent, !side) };
            rotations += fixed.rotations;

            if !fixed.shorter {
                return Retraced {
                    top: fixed.top,
                    grew: false,
                    rotations,
                };
            }

            fixed.top
        };

        match unsafe { links(top).parent() } {
            Some(grandparent) => {
                side = unsafe { which_child(grandparent, top) };
                parent = grandparent;
            }
            None => {
                return Retraced {
                    top,
                    grew: false,
                    rotations,
                }
            }
        }
    }
}

/// Links the detached leaf `node` in at position `pos` of the tree rooted at `root`.
///
/// The caller guarantees `pos <= len(root)`.
pub(crate) unsafe fn insert_at<T>(
    root: NonNull<Node<T>>,
    pos: usize,
    node: NonNull<Node<T>>,
) -> Retraced<T> {
    let mut cur = root;
    let mut offset = 0;

    // Descend the tree, looking for the gap in front of position `pos`.
    loop {
        let cur_links = unsafe { links(cur) };

        let dir = if pos <= offset + cur_links.rank() {
            // The new node lands in the left subtree.
            cur_links.set_rank(cur_links.rank() + 1);
            Dir::Left
        } else {
            offset += cur_links.rank() + 1;
            Dir::Right
        };

        match cur_links.child(dir) {
            // Descend.
            Some(child) => cur = child,

            // Set `node` as child.
            None => {
                cur_links.set_child(dir, Some(node));
                unsafe { links(node).set_parent(Some(cur)) };
                break;
            }
        }
    }

    unsafe { retrace_grown(node) }
}

/// A node removed from a tree by [`unlink_at`].
pub(crate) struct Unlinked<T> {
    /// The detached node, holding the element that was at the requested position.
    pub(crate) node: NonNull<Node<T>>,
    /// The new root of the tree.
    pub(crate) root: Link<T>,
    pub(crate) rotations: usize,
}

/// Detaches the node at position `pos` from the tree rooted at `root`.
///
/// The caller guarantees `pos < len(root)`.
pub(crate) unsafe fn unlink_at<T>(root: NonNull<Node<T>>, pos: usize) -> Unlinked<T> {
    // There are three possible cases:
    //
    // 1. The target node is a leaf. It is simply removed.
    // 2. The target node has one child, which takes its place.
    // 3. The target node has two children. Its successor (the least node of its right subtree)
    //    has no left child, so the successor is removed as in case 1 or 2 after the two nodes
    //    trade elements.
    //
    // Every left descent on the way to the removed node loses one node from its left subtree.
    unsafe {
        let mut cur = root;
        let mut offset = 0;

        let target = loop {
            let cur_links = links(cur);
            let here = offset + cur_links.rank();

            let next = match pos.cmp(&here) {
                core::cmp::Ordering::Less => {
                    cur_links.set_rank(cur_links.rank() - 1);
                    cur_links.left()
                }
                core::cmp::Ordering::Equal => break cur,
                core::cmp::Ordering::Greater => {
                    offset = here + 1;
                    cur_links.right()
                }
            };

            cur = next.expect("position must be validated against the tree length");
        };

        let removed = match (links(target).left(), links(target).right()) {
            (Some(_), Some(right)) => {
                let mut successor = right;
                while let Some(left) = links(successor).left() {
                    links(successor).set_rank(links(successor).rank() - 1);
                    successor = left;
                }

                core::ptr::swap(
                    core::ptr::addr_of_mut!((*target.as_ptr()).element),
                    core::ptr::addr_of_mut!((*successor.as_ptr()).element),
                );

                successor
            }
            _ => target,
        };

        let removed_links = links(removed);
        let child = removed_links.left().or(removed_links.right());
        let parent = removed_links.parent();

        if let Some(child) = child {
            links(child).set_parent(parent);
        }

        let (root, rotations) = match parent {
            None => (child, 0),
            Some(parent) => {
                let side = which_child(parent, removed);
                links(parent).set_child(side, child);

                let retraced = retrace_shrunk(parent, side);
                (Some(topmost(retraced.top)), retraced.rotations)
            }
        };

        removed_links.reset();

        Unlinked {
            node: removed,
            root,
            rotations,
        }
    }
}

/// Joins `left`, the detached node `mid` and `right`, in that order, into one tree.
///
/// Descends the taller tree along the spine facing the seam until it reaches a subtree within
/// one level of the shorter tree, hangs `mid` there with both trees as children, and retraces.
/// The work done is proportional to the height difference of the two trees.
pub(crate) unsafe fn join<T>(
    left: Subtree<T>,
    mid: NonNull<Node<T>>,
    right: Subtree<T>,
) -> (Subtree<T>, usize) {
    let len = left.len + 1 + right.len;

    let (tall, short, seam) = if left.height >= right.height {
        (left, right, Dir::Right)
    } else {
        (right, left, Dir::Left)
    };

    unsafe {
        let mut parent = None;
        let mut opt_cur = tall.root;
        let mut cur_height = tall.height;
        // Nodes passed on the right spine of the left tree, together with their left subtrees.
        let mut skipped = 0;

        while cur_height - short.height > 1 {
            let cur = opt_cur.expect("a subtree taller than its sibling cannot be empty");
            let cur_links = links(cur);

            cur_height -= if cur_links.balance() == Balance::from(!seam) {
                2
            } else {
                1
            };

            match seam {
                Dir::Right => skipped += cur_links.rank() + 1,
                // `mid` and the whole left tree end up in this node's left subtree.
                Dir::Left => cur_links.set_rank(cur_links.rank() + short.len + 1),
            }

            parent = Some(cur);
            opt_cur = cur_links.child(seam);
        }

        let mid_links = links(mid);
        mid_links.set_child(!seam, opt_cur);
        if let Some(cur) = opt_cur {
            links(cur).set_parent(Some(mid));
        }

        mid_links.set_child(seam, short.root);
        if let Some(short_root) = short.root {
            links(short_root).set_parent(Some(mid));
        }

        mid_links.set_rank(match seam {
            Dir::Right => tall.len - skipped,
            Dir::Left => short.len,
        });
        mid_links.set_balance(if cur_height == short.height {
            Balance::Same
        } else {
            Balance::from(!seam)
        });
        mid_links.set_parent(parent);

        let Some(parent) = parent else {
            let joined = Subtree {
                root: Some(mid),
                len,
                height: cur_height + 1,
            };
            return (joined, 0);
        };

        links(parent).set_child(seam, Some(mid));

        let retraced = retrace_grown(mid);
        let joined = Subtree {
            root: Some(topmost(retraced.top)),
            len,
            height: tall.height + isize::from(retraced.grew),
        };

        (joined, retraced.rotations)
    }
}

/// Splits `tree` into the nodes at positions `< pos` and those at positions `>= pos`.
///
/// The caller guarantees `pos <= tree.len`. Returns both halves and the number of rotations
/// performed while reassembling them.
pub(crate) unsafe fn split<T>(tree: Subtree<T>, pos: usize) -> (Subtree<T>, Subtree<T>, usize) {
    // Each visited node is detached along with the subtree that lies entirely on one side of
    // `pos`. The detached pieces are then joined bottom-up, which costs _O(log n)_ in total
    // since the heights of the pieces grow monotonically along the way up.
    struct Piece<T> {
        node: NonNull<Node<T>>,
        subtree: Subtree<T>,
        went: Dir,
    }

    let mut pieces = Vec::new();
    let mut cur = tree;
    let mut pos = pos;

    while let Some(node) = cur.root {
        unsafe {
            let node_links = links(node);
            let rank = node_links.rank();

            let (left_height, right_height) = match node_links.balance() {
                Balance::Left => (cur.height - 1, cur.height - 2),
                Balance::Same => (cur.height - 1, cur.height - 1),
                Balance::Right => (cur.height - 2, cur.height - 1),
            };

            let left = Subtree {
                root: node_links.left(),
                len: rank,
                height: left_height,
            };
            let right = Subtree {
                root: node_links.right(),
                len: cur.len - rank - 1,
                height: right_height,
            };

            for child in [left.root, right.root].into_iter().flatten() {
                links(child).set_parent(None);
            }
            node_links.reset();

            if pos <= rank {
                pieces.push(Piece {
                    node,
                    subtree: right,
                    went: Dir::Left,
                });
                cur = left;
            } else {
                pos -= rank + 1;
                pieces.push(Piece {
                    node,
                    subtree: left,
                    went: Dir::Right,
                });
                cur = right;
            }
        }
    }

    let mut below = Subtree::EMPTY;
    let mut above = Subtree::EMPTY;
    let mut rotations = 0;

    for piece in pieces.into_iter().rev() {
        rotations += match piece.went {
            Dir::Left => {
                let (joined, r) = unsafe { join(above, piece.node, piece.subtree) };
                above = joined;
                r
            }
            Dir::Right => {
                let (joined, r) = unsafe { join(piece.subtree, piece.node, below) };
                below = joined;
                r
            }
        };
    }

    (below, above, rotations)
}

/// Builds a perfectly balanced tree from the next `len` items of `elements`.
pub(crate) fn build<T, I>(len: usize, elements: &mut I) -> Subtree<T>
where
    I: Iterator<Item = T>,
{
    if len == 0 {
        return Subtree::EMPTY;
    }

    let left_len = len / 2;
    let left = build(left_len, elements);

    let Some(element) = elements.next() else {
        unreachable!("iterator yielded fewer than {len} elements");
    };
    let mid = Node::alloc(element);

    let right = build(len - left_len - 1, elements);

    // Both halves differ in height by at most one, so this never descends or rotates.
    let (tree, _) = unsafe { join(left, mid, right) };
    tree
}

/// Deep-copies the subtree under `link`, keeping its shape, ranks and balance codes.
pub(crate) unsafe fn copy_subtree<T: Clone>(link: Link<T>, parent: Link<T>) -> Link<T> {
    let node = link?;

    unsafe {
        let source = links(node);
        let copy = Node::alloc(node.as_ref().element.clone());
        let copy_links = links(copy);

        copy_links.set_parent(parent);
        copy_links.set_rank(source.rank());
        copy_links.set_balance(source.balance());
        copy_links.set_left(copy_subtree(source.left(), Some(copy)));
        copy_links.set_right(copy_subtree(source.right(), Some(copy)));

        Some(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_from(s: &str) -> Subtree<char> {
        build(s.chars().count(), &mut s.chars())
    }

    unsafe fn collect(link: Link<char>, out: &mut String) {
        let Some(node) = link else { return };
        unsafe {
            collect(links(node).left(), out);
            out.push(node.as_ref().element);
            collect(links(node).right(), out);
        }
    }

    unsafe fn free_all(link: Link<char>) {
        let Some(node) = link else { return };
        unsafe {
            free_all(links(node).left());
            free_all(links(node).right());
            Node::free(node);
        }
    }

    #[test]
    fn build_is_balanced() {
        for n in 0..40 {
            let s: String = (0..n).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
            let tree = build_from(&s);

            unsafe {
                assert_eq!(tree.len, n);
                assert_eq!(subtree_len(tree.root), n);
                assert_eq!(height(tree.root), tree.height);
                assert!(tree.height < 1 + (n as f64 + 1.0).log2() as isize);

                let mut out = String::new();
                collect(tree.root, &mut out);
                assert_eq!(out, s);

                free_all(tree.root);
            }
        }
    }

    #[test]
    fn single_rotations_keep_ranks() {
        // c(b(a, _), e(d, _))
        let tree = build_from("abcde");

        unsafe {
            let root = tree.root.unwrap();
            assert_eq!(root.as_ref().element, 'c');

            let top = single_right_rotation(root);
            assert_eq!(top.as_ref().element, 'b');
            assert_eq!(links(top).rank(), 1);
            assert_eq!(links(root).rank(), 0);
            assert_eq!(links(top).parent(), None);
            assert_eq!(links(root).parent(), Some(top));

            let mut out = String::new();
            collect(Some(top), &mut out);
            assert_eq!(out, "abcde");

            let back = single_left_rotation(top);
            assert_eq!(back, root);
            assert_eq!(links(root).rank(), 2);
            assert_eq!(links(top).rank(), 1);

            free_all(Some(back));
        }
    }

    #[test]
    fn double_rotation_promotes_grandchild() {
        // Build a(_, c(b, _)) by hand.
        let a = Node::alloc('a');
        let b = Node::alloc('b');
        let c = Node::alloc('c');

        unsafe {
            links(a).set_right(Some(c));
            links(c).set_parent(Some(a));
            links(c).set_left(Some(b));
            links(c).set_rank(1);
            links(b).set_parent(Some(c));

            let top = double_left_rotation(a);
            assert_eq!(top, b);
            assert_eq!(links(b).rank(), 1);
            assert_eq!(links(a).rank(), 0);
            assert_eq!(links(c).rank(), 0);
            assert_eq!(links(b).left(), Some(a));
            assert_eq!(links(b).right(), Some(c));

            let mut out = String::new();
            collect(Some(top), &mut out);
            assert_eq!(out, "abc");

            free_all(Some(top));
        }
    }

    #[test]
    fn locate_follows_ranks() {
        let tree = build_from("rank");

        unsafe {
            for (pos, expected) in "rank".chars().enumerate() {
                let node = locate(tree.root, pos).unwrap();
                assert_eq!(node.as_ref().element, expected);
            }
            assert!(locate(tree.root, 4).is_none());

            assert_eq!(edge(tree.root.unwrap(), Dir::Left).as_ref().element, 'r');
            assert_eq!(edge(tree.root.unwrap(), Dir::Right).as_ref().element, 'k');

            free_all(tree.root);
        }
    }
}
