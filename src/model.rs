//! Equivalence checks between [`EditTree`] and a plain `Vec`, shared by the property tests and
//! the fuzz targets.

use arbitrary::Arbitrary;
use proptest::strategy::{Just, Strategy};

use crate::{EditTree, EditTreeError};

/// A position argument.
///
/// `Index` is reduced modulo the current length (plus one), so it is almost always valid;
/// `Random` is used as is, and frequently out of bounds.
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Position {
    Index(usize),
    Random(usize),
}

impl Position {
    fn resolve(self, len: usize) -> usize {
        match self {
            Position::Index(idx) => idx % (len + 1),
            Position::Random(pos) => pos,
        }
    }
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> Position {
        Position::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0usize..64,
    ) -> Position {
        Position::Random(random)
    }
}

fn position_strategy() -> impl Strategy<Value = Position> {
    proptest::prop_oneof![3 => index_strategy(), 1 => random_strategy()]
}

fn char_strategy() -> impl Strategy<Value = char> {
    proptest::char::range('a', 'e')
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Push(char),
    Insert(Position, char),
    Get(Position),
    Remove(Position),
    GetRange(Position, u8),
    DeleteRange(Position, u8),
    SplitConcatenate(Position),
    Find(Position, u8),
    Duplicate,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        char_strategy().prop_map(Op::Push),
        (position_strategy(), char_strategy()).prop_map(|(p, c)| Op::Insert(p, c)),
        (position_strategy(), char_strategy()).prop_map(|(p, c)| Op::Insert(p, c)),
        position_strategy().prop_map(Op::Get),
        position_strategy().prop_map(Op::Remove),
        (position_strategy(), 0u8..8).prop_map(|(p, l)| Op::GetRange(p, l)),
        (position_strategy(), 0u8..8).prop_map(|(p, l)| Op::DeleteRange(p, l)),
        position_strategy().prop_map(Op::SplitConcatenate),
        (position_strategy(), 0u8..4).prop_map(|(p, l)| Op::Find(p, l)),
        Just(Op::Duplicate),
    ]
}

fn index_error(index: usize, len: usize) -> EditTreeError {
    EditTreeError::IndexOutOfBounds { index, len }
}

fn range_error(start: usize, length: usize, len: usize) -> EditTreeError {
    EditTreeError::RangeOutOfBounds { start, length, len }
}

fn vec_find(haystack: &[char], pattern: &[char], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }

    (from..=haystack.len())
        .find(|&i| haystack[i..].starts_with(pattern))
}

pub fn run_vec_equivalence(ops: Vec<Op>) {
    let mut vec: Vec<char> = Vec::with_capacity(ops.len());
    let mut tree: EditTree<char> = EditTree::new();

    for (op_id, op) in ops.into_iter().enumerate() {
        let len = vec.len();

        match op {
            Op::Push(c) => {
                vec.push(c);
                tree.push(c);
            }

            Op::Insert(pos, c) => {
                let pos = pos.resolve(len);

                let from_vec = if pos <= len {
                    vec.insert(pos, c);
                    Ok(())
                } else {
                    Err(index_error(pos, len))
                };
                let from_tree = tree.insert(pos, c);

                assert_eq!(from_vec, from_tree, "Op #{op_id}: {op:?}");
                if from_tree.is_ok() {
                    assert_eq!(tree.get(pos), Ok(&c), "Op #{op_id}: {op:?}");
                }
            }

            Op::Get(pos) => {
                let pos = pos.resolve(len);

                let from_vec = vec.get(pos).ok_or(index_error(pos, len));
                let from_tree = tree.get(pos);

                assert_eq!(from_vec, from_tree, "Op #{op_id}: {op:?}");
            }

            Op::Remove(pos) => {
                let pos = pos.resolve(len);

                let from_vec = if pos < len {
                    Ok(vec.remove(pos))
                } else {
                    Err(index_error(pos, len))
                };
                let height = tree.height();
                let rotations = tree.rotation_count();
                let from_tree = tree.remove(pos);

                assert_eq!(from_vec, from_tree, "Op #{op_id}: {op:?}");

                // At most one rebalance, single or double, per ancestor of the removed node.
                let bound = 2 * usize::try_from(height + 1).unwrap_or(0);
                assert!(
                    tree.rotation_count() - rotations <= bound,
                    "Op #{op_id}: {op:?}"
                );
            }

            Op::GetRange(pos, length) => {
                let pos = pos.resolve(len);
                let length = usize::from(length);

                let from_vec = if pos + length <= len {
                    Ok(vec[pos..pos + length].to_vec())
                } else {
                    Err(range_error(pos, length, len))
                };
                let from_tree = tree.get_range(pos, length);

                assert_eq!(from_vec, from_tree, "Op #{op_id}: {op:?}");
            }

            Op::DeleteRange(pos, length) => {
                let pos = pos.resolve(len);
                let length = usize::from(length);

                let from_vec = if pos + length <= len {
                    Ok(vec.drain(pos..pos + length).collect::<Vec<_>>())
                } else {
                    Err(range_error(pos, length, len))
                };
                let from_tree = tree.delete_range(pos, length).map(|removed| {
                    removed.assert_invariants();
                    removed.to_vec()
                });

                assert_eq!(from_vec, from_tree, "Op #{op_id}: {op:?}");
            }

            Op::SplitConcatenate(pos) => {
                let pos = pos.resolve(len);

                match tree.split_off(pos) {
                    Ok(mut tail) => {
                        assert!(pos <= len, "Op #{op_id}: {op:?}");

                        tree.assert_invariants();
                        tail.assert_invariants();
                        assert_eq!(tree.to_vec(), vec[..pos], "Op #{op_id}: {op:?}");
                        assert_eq!(tail.to_vec(), vec[pos..], "Op #{op_id}: {op:?}");

                        tree.concatenate(&mut tail);
                        assert!(tail.is_empty(), "Op #{op_id}: {op:?}");
                    }
                    Err(err) => {
                        assert_eq!(err, index_error(pos, len), "Op #{op_id}: {op:?}");
                    }
                }
            }

            Op::Find(pos, length) => {
                let pos = pos.resolve(len);

                // Search for a piece of the text itself when possible, so that matches happen.
                let start = pos.min(len);
                let end = (start + usize::from(length)).min(len);
                let pattern: String = vec[start..end].iter().collect();
                let from = pos / 2;

                let from_vec = vec_find(&vec, &vec[start..end], from);
                let from_tree = tree.find_from(&pattern, from);

                assert_eq!(from_vec, from_tree, "Op #{op_id}: {op:?}");
            }

            Op::Duplicate => {
                let copy = tree.clone();
                copy.assert_invariants();
                assert_eq!(copy, tree, "Op #{op_id}: {op:?}");
                assert_eq!(copy.height(), tree.height(), "Op #{op_id}: {op:?}");
                assert_eq!(copy.rotation_count(), 0, "Op #{op_id}: {op:?}");
            }
        }

        tree.assert_invariants();
        assert_eq!(vec.len(), tree.len());
        assert!(vec.iter().eq(tree.iter()));

        // AVL trees with n nodes are less than 1.4405 · log2(n + 2) tall.
        let bound = 1.4405 * ((tree.len() + 2) as f64).log2();
        assert!((tree.height() as f64) < bound, "Op #{op_id}: {op:?}");
    }
}

/// A text and the positions at which to cut it into pieces.
#[derive(Clone, Debug)]
pub struct SplitJoinInput {
    pub text: Vec<char>,
    pub cuts: Vec<usize>,
}

impl<'a> arbitrary::Arbitrary<'a> for SplitJoinInput {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        fn value(u: &mut arbitrary::Unstructured<'_>) -> char {
            char::arbitrary(u).unwrap_or('a')
        }

        fn cut(u: &mut arbitrary::Unstructured<'_>) -> usize {
            usize::from(u16::arbitrary(u).unwrap_or(0))
        }

        let num_chars = u16::arbitrary(u)? % 2000;
        let num_cuts = u8::arbitrary(u)? % 32;

        let text = core::iter::repeat_with(|| value(u))
            .take(num_chars.into())
            .collect();

        let cuts = core::iter::repeat_with(|| cut(u))
            .take(num_cuts.into())
            .collect();

        Ok(SplitJoinInput { text, cuts })
    }
}

pub fn split_join_input_strategy() -> impl Strategy<Value = SplitJoinInput> {
    (
        proptest::collection::vec(char_strategy(), 0..300),
        proptest::collection::vec(0usize..400, 0..16),
    )
        .prop_map(|(text, cuts)| SplitJoinInput { text, cuts })
}

/// Cuts a tree holding `text` into pieces at `cuts`, then glues the pieces back together in a
/// shuffled association order, checking the invariants of every intermediate tree.
pub fn run_split_join_equivalence(text: Vec<char>, mut cuts: Vec<usize>) {
    let len = text.len();

    cuts.iter_mut().for_each(|cut| *cut %= len + 1);
    cuts.sort_unstable();
    cuts.dedup();

    let mut tree = EditTree::from_vec(text.clone());
    tree.assert_invariants();

    // Cut from the back so that every position refers to the original text.
    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut end = len;
    for &cut in cuts.iter().rev() {
        let piece = tree.split_off(cut).expect("cut positions are reduced to the text length");

        tree.assert_invariants();
        piece.assert_invariants();
        assert_eq!(piece.to_vec(), text[cut..end]);

        pieces.push(piece);
        end = cut;
    }
    assert_eq!(tree.to_vec(), text[..end]);
    pieces.push(tree);
    pieces.reverse();

    // Alternate between appending to the left and prepending to the right.
    while pieces.len() > 1 {
        let mid = pieces.len() / 2;
        let mut right = pieces.remove(mid);
        let left = &mut pieces[mid - 1];

        left.concatenate(&mut right);
        left.assert_invariants();
        right.assert_invariants();
        assert!(right.is_empty());
    }

    let joined = pieces.pop().unwrap_or_default();
    assert_eq!(joined.to_vec(), text);
}
