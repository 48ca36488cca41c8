use std::ops::Range;

use proptest::prelude::*;

use crate::model;

use super::*;

// Replays `positions` as insertions of increasing numbers, so that the numbers end up ordered by
// the order in which they were inserted at each position.
fn insert_get_all(positions: &[usize]) -> (EditTree<usize>, Vec<usize>) {
    let mut tree = EditTree::new();
    let mut vec = Vec::new();

    for (value, &pos) in positions.iter().enumerate() {
        tree.insert(pos, value).unwrap();
        vec.insert(pos, value);
        tree.assert_invariants();
    }

    for (pos, value) in vec.iter().enumerate() {
        assert_eq!(tree.get(pos), Ok(value));
    }
    assert_eq!(
        tree.get(vec.len()),
        Err(EditTreeError::IndexOutOfBounds {
            index: vec.len(),
            len: vec.len(),
        })
    );

    (tree, vec)
}

// Calls `f` with every sequence of insertion positions that builds a tree of `n` elements.
fn for_each_insertion_order(n: usize, f: &mut impl FnMut(&[usize])) {
    fn go(positions: &mut Vec<usize>, n: usize, f: &mut impl FnMut(&[usize])) {
        if positions.len() == n {
            f(&positions[..]);
            return;
        }

        for pos in 0..=positions.len() {
            positions.push(pos);
            go(positions, n, f);
            positions.pop();
        }
    }

    go(&mut Vec::with_capacity(n), n, f)
}

#[test]
fn zero_elems_get() {
    insert_get_all(&[]);
}

#[test]
fn single_elem_get() {
    insert_get_all(&[0]);
}

#[test]
fn all_small_insertion_orders() {
    for n in 2..=7 {
        for_each_insertion_order(n, &mut |positions| {
            insert_get_all(positions);
        });
    }
}

fn insert_remove_all(positions: &[usize]) {
    let (tree, vec) = insert_get_all(positions);

    // Remove in the order the elements were inserted.
    let mut front = tree.clone();
    let mut expected = vec.clone();
    for value in 0..positions.len() {
        let pos = expected.iter().position(|&v| v == value).unwrap();
        assert_eq!(front.remove(pos), Ok(expected.remove(pos)));
        front.assert_invariants();
    }
    assert!(front.is_empty());

    // Remove from the middle outward.
    let mut middle = tree;
    let mut expected = vec;
    while !expected.is_empty() {
        let pos = expected.len() / 2;
        assert_eq!(middle.remove(pos), Ok(expected.remove(pos)));
        middle.assert_invariants();
        assert!(middle.iter().eq(expected.iter()));
    }
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_all_small_insertion_orders() {
    for n in 2..=6 {
        for_each_insertion_order(n, &mut |positions| insert_remove_all(positions));
    }
}

#[test]
fn push_builds_in_order() {
    let mut tree = EditTree::new();
    for c in ['a', 'b', 'c'] {
        tree.push(c);
    }

    assert_eq!(tree.len(), 3);
    assert_eq!(tree.height(), 1);
    assert_eq!(tree.to_string(), "abc");
    assert_eq!(tree.first(), Some(&'a'));
    assert_eq!(tree.last(), Some(&'c'));
}

#[test]
fn remove_returns_element() {
    let mut tree = EditTree::from("editor");

    assert_eq!(tree.remove(2), Ok('i'));
    assert_eq!(tree.to_string(), "edtor");
    assert_eq!(tree.len(), 5);
    assert_eq!(
        tree.remove(5),
        Err(EditTreeError::IndexOutOfBounds { index: 5, len: 5 })
    );
}

#[test]
fn split_and_concatenate_text() {
    let mut hello = EditTree::from("helloworld");
    let world = hello.split_off(5).unwrap();

    assert_eq!(hello.to_string(), "hello");
    assert_eq!(world.to_string(), "world");

    let mut hello = EditTree::from("hello");
    let mut world = EditTree::from("world");
    hello.concatenate(&mut world);

    hello.assert_invariants();
    assert_eq!(hello.to_string(), "helloworld");
    assert_eq!(hello.len(), 10);
    assert!(world.is_empty());
    assert_eq!(world.height(), -1);
}

#[test]
fn repeated_front_insertion_stays_balanced() {
    let mut tree = EditTree::from("aaaa");
    for _ in 0..10 {
        tree.insert(0, 'b').unwrap();
        tree.assert_invariants();
    }

    assert_eq!(tree.len(), 14);
    assert!(tree.height() <= 5);
    assert_eq!(tree.to_string(), "bbbbbbbbbbaaaa");
}

#[test]
fn rotation_counts() {
    let mut single = EditTree::new();
    single.push('a');
    single.push('b');
    assert_eq!(single.rotation_count(), 0);
    single.push('c');
    assert_eq!(single.rotation_count(), 1);

    let mut double = EditTree::new();
    double.push('a');
    double.insert(1, 'c').unwrap();
    double.insert(1, 'b').unwrap();
    assert_eq!(double.to_string(), "abc");
    assert_eq!(double.rotation_count(), 2);

    // Counts are never reset, and copies start over.
    assert_eq!(double.clone().rotation_count(), 0);
    assert_eq!(EditTree::from("a balanced build").rotation_count(), 0);
}

// Builds the sparsest AVL tree of height `height`: every node leans left, with a left subtree one
// level taller than its right. Elements are numbered in order starting at `*next`.
fn fibonacci_tree(height: isize, next: &mut usize) -> crate::node::Subtree<usize> {
    if height < 0 {
        return crate::node::Subtree::EMPTY;
    }

    let left = fibonacci_tree(height - 1, next);
    let mid = crate::node::Node::alloc(*next);
    *next += 1;
    let right = fibonacci_tree(height - 2, next);

    let (tree, _) = unsafe { crate::node::join(left, mid, right) };
    tree
}

#[test]
fn remove_rotates_at_several_levels() {
    let mut len = 0;
    let mut tree = EditTree::new();
    tree.set_subtree(fibonacci_tree(8, &mut len));
    tree.assert_invariants();
    assert_eq!(tree.height(), 8);
    assert_eq!(tree.rotation_count(), 0);

    // The last element is a leaf at the bottom of the right spine. Removing it unbalances each
    // of the four spine nodes above it in turn, and each takes one single rotation.
    assert_eq!(tree.remove(len - 1), Ok(len - 1));
    tree.assert_invariants();
    assert_eq!(tree.rotation_count(), 4);
    assert!(tree.iter().copied().eq(0..len - 1));
}

#[test]
fn remove_rotations_stay_logarithmic() {
    let mut tree = EditTree::new();
    for i in 0..1000usize {
        tree.insert((i * 7) % (tree.len() + 1), i).unwrap();
    }

    for i in 0..1000usize {
        let height = tree.height();
        let before = tree.rotation_count();
        tree.remove((i * 13) % tree.len()).unwrap();

        let rotations = tree.rotation_count() - before;
        assert!(rotations <= 2 * (height as usize + 1));
    }

    assert!(tree.is_empty());
}

#[test]
fn height_stays_logarithmic() {
    let mut tree = EditTree::new();

    for i in 0..2000usize {
        // Insert around a moving cursor, the way an editor does.
        let pos = (i * 7) % (tree.len() + 1);
        tree.insert(pos, i).unwrap();

        let bound = 1.44 * ((tree.len() + 2) as f64).log2();
        assert!((tree.height() as f64) <= bound);
    }
    tree.assert_invariants();

    for i in 0..1500usize {
        let pos = (i * 13) % tree.len();
        tree.remove(pos).unwrap();

        let bound = 1.44 * ((tree.len() + 2) as f64).log2();
        assert!((tree.height() as f64) <= bound);
    }
    tree.assert_invariants();
}

#[test]
fn ranges() {
    let mut tree = EditTree::from("the quick brown fox");

    assert_eq!(tree.get_range(4, 5).unwrap(), "quick".chars().collect::<Vec<_>>());
    assert_eq!(tree.get_range(19, 0).unwrap(), vec![]);
    assert_eq!(
        tree.get_range(15, 5),
        Err(EditTreeError::RangeOutOfBounds {
            start: 15,
            length: 5,
            len: 19
        })
    );
    assert!(tree.get_range(usize::MAX, 2).is_err());

    let removed = tree.delete_range(4, 6).unwrap();
    tree.assert_invariants();
    removed.assert_invariants();
    assert_eq!(removed.to_string(), "quick ");
    assert_eq!(tree.to_string(), "the brown fox");

    let removed = tree.delete_range(0, tree.len()).unwrap();
    assert_eq!(removed.to_string(), "the brown fox");
    assert!(tree.is_empty());

    assert!(tree.delete_range(0, 0).unwrap().is_empty());
    assert!(tree.delete_range(0, 1).is_err());
}

#[test]
fn out_of_bounds_positions() {
    let mut tree = EditTree::from("abc");

    assert_eq!(
        tree.get(3),
        Err(EditTreeError::IndexOutOfBounds { index: 3, len: 3 })
    );
    assert_eq!(
        tree.insert(4, 'x'),
        Err(EditTreeError::IndexOutOfBounds { index: 4, len: 3 })
    );
    assert!(tree.split_off(4).is_err());

    // Failed operations leave the tree untouched.
    tree.assert_invariants();
    assert_eq!(tree.to_string(), "abc");
    assert_eq!(tree.rotation_count(), 0);

    let mut empty = EditTree::<char>::new();
    assert!(empty.get(0).is_err());
    assert!(empty.remove(0).is_err());
    assert_eq!(empty.first(), None);
    assert_eq!(empty.height(), -1);
    assert_eq!(empty.to_string(), "");
}

#[test]
fn clones_are_independent() {
    let mut original = EditTree::from("shared");
    let mut copy = original.clone();
    copy.assert_invariants();
    assert_eq!(copy, original);
    assert_eq!(copy.height(), original.height());

    copy.insert(0, '!').unwrap();
    original.remove(0).unwrap();

    assert_eq!(copy.to_string(), "!shared");
    assert_eq!(original.to_string(), "hared");

    drop(original);
    assert_eq!(copy.len(), 7);
}

#[test]
fn from_element_and_collect() {
    let single = EditTree::from_element(42);
    single.assert_invariants();
    assert_eq!(single.height(), 0);
    assert_eq!(single.get(0), Ok(&42));

    let mut collected: EditTree<u32> = (0..100).collect();
    collected.assert_invariants();
    collected.extend(100..110);
    collected.assert_invariants();
    assert!(collected.iter().copied().eq(0..110));
    assert_eq!(format!("{:?}", EditTree::from("ab")), "['a', 'b']");

    collected.clear();
    assert!(collected.is_empty());
    collected.push(7);
    assert_eq!(collected.to_vec(), vec![7]);
}

#[test]
fn drops_every_element() {
    use std::rc::Rc;

    let counter = Rc::new(());
    let mut tree: EditTree<Rc<()>> = (0..50).map(|_| Rc::clone(&counter)).collect();
    let mut tail = tree.split_off(20).unwrap();
    let removed = tail.delete_range(5, 10).unwrap();
    assert_eq!(Rc::strong_count(&counter), 51);

    drop(removed);
    assert_eq!(Rc::strong_count(&counter), 41);

    tree.concatenate(&mut tail);
    drop(tree);
    drop(tail);
    assert_eq!(Rc::strong_count(&counter), 1);
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn vec_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_vec_equivalence(ops);
    }

    #[test]
    fn split_join_equivalence(input in model::split_join_input_strategy()) {
        model::run_split_join_equivalence(input.text, input.cuts);
    }
}
