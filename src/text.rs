//! Conveniences for the text-buffer instantiation, `EditTree<char>`.

use core::fmt;

use crate::{EditTree, Result};

impl From<&str> for EditTree<char> {
    /// Builds a balanced tree holding the characters of `s`, in _O(n)_ time.
    fn from(s: &str) -> Self {
        s.chars().collect()
    }
}

impl fmt::Display for EditTree<char> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write;

        self.iter().try_for_each(|&c| f.write_char(c))
    }
}

impl EditTree<char> {
    /// Returns the `length` characters starting at position `pos`.
    pub fn substring(&self, pos: usize, length: usize) -> Result<String> {
        Ok(self.get_range(pos, length)?.into_iter().collect())
    }

    /// Returns the position of the first occurrence of `pattern`, if any.
    ///
    /// This is a naive linear scan.
    pub fn find(&self, pattern: &str) -> Option<usize> {
        self.find_from(pattern, 0)
    }

    /// Returns the position of the first occurrence of `pattern` that starts at or after
    /// position `from`.
    ///
    /// The empty pattern matches at `from` itself. Returns `None` if `from` is past the end.
    pub fn find_from(&self, pattern: &str, from: usize) -> Option<usize> {
        let pattern: Vec<char> = pattern.chars().collect();
        self.find_seq(&pattern, from)
    }
}

#[cfg(test)]
mod tests {
    use crate::{EditTree, EditTreeError};

    #[test]
    fn find_scans_from_position() {
        let tree = EditTree::from("abcabc");

        assert_eq!(tree.find("bc"), Some(1));
        assert_eq!(tree.find_from("bc", 3), Some(4));
        assert_eq!(tree.find_from("bc", 5), None);
        assert_eq!(tree.find("cab"), Some(2));
        assert_eq!(tree.find("abcabcd"), None);
        assert_eq!(tree.find(""), Some(0));
        assert_eq!(tree.find_from("", 6), Some(6));
        assert_eq!(tree.find_from("", 7), None);

        assert_eq!(EditTree::from("").find(""), Some(0));
    }

    #[test]
    fn substring_checks_bounds() {
        let tree = EditTree::from("position");

        assert_eq!(tree.substring(0, 3).unwrap(), "pos");
        assert_eq!(tree.substring(3, 5).unwrap(), "ition");
        assert_eq!(tree.substring(8, 0).unwrap(), "");
        assert_eq!(
            tree.substring(4, 5),
            Err(EditTreeError::RangeOutOfBounds {
                start: 4,
                length: 5,
                len: 8
            })
        );
    }

    #[test]
    fn display_round_trips() {
        for s in ["", "a", "ab", "editor", "a longer line of text, with punctuation!"] {
            assert_eq!(EditTree::from(s).to_string(), s);
        }
    }
}
