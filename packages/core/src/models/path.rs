//! Path and Label Value Types
//!
//! A node's position in the tree is a [`Path`]: an ordered, non-empty sequence
//! of fixed-width numeric [`Label`]s rendered as a dotted string, e.g.
//! `000000001000000000.000000002000000000`.
//!
//! # Ordering
//!
//! Every label renders to exactly [`PAD_LENGTH`] zero-padded digits, so the
//! numeric order of labels equals the lexicographic order of their text. The
//! derived `Ord` on [`Path`] (component-wise, shorter prefix first) therefore
//! equals the byte order of rendered paths, which in turn equals pre-order
//! tree traversal with siblings sorted by label.
//!
//! # Prefix relation
//!
//! `A` is an ancestor of `B` iff `A`'s labels are a strict, component-wise
//! prefix of `B`'s labels. Self is never its own ancestor or descendant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of decimal digits in every rendered label
pub const PAD_LENGTH: usize = 18;

/// Separator between labels in a rendered path
pub const SEPARATOR: char = '.';

/// Exclusive upper bound of the label space (`10^PAD_LENGTH`)
pub const LABEL_SPACE: u64 = 1_000_000_000_000_000_000;

/// Errors raised by path parsing and path arithmetic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Stored or supplied text is not a dotted sequence of padded labels
    #[error("Malformed path '{text}': {reason}")]
    MalformedPath { text: String, reason: String },

    /// `parent()` was called on a depth-1 path
    #[error("Path '{path}' is a root and has no parent")]
    RootHasNoParent { path: String },

    /// A computed label does not fit in `PAD_LENGTH` digits
    #[error("Label value {value} does not fit in {width} digits", width = PAD_LENGTH)]
    LabelOverflow { value: u128 },

    /// A path must contain at least one label
    #[error("A path must contain at least one label")]
    EmptyPath,
}

impl PathError {
    /// Create a malformed path error
    pub fn malformed(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            text: text.into(),
            reason: reason.into(),
        }
    }
}

/// One zero-padded numeric component of a [`Path`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(u64);

impl Label {
    /// Smallest representable label
    pub const MIN: Label = Label(0);

    /// Largest representable label (`10^PAD_LENGTH - 1`)
    pub const MAX: Label = Label(LABEL_SPACE - 1);

    /// Create a label, rejecting values that would not fit the padding
    pub fn new(value: u64) -> Result<Self, PathError> {
        if value >= LABEL_SPACE {
            return Err(PathError::LabelOverflow {
                value: u128::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Numeric value of the label
    pub fn value(self) -> u64 {
        self.0
    }

    /// Parse a single label: exactly `PAD_LENGTH` ASCII digits
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if text.len() != PAD_LENGTH {
            return Err(PathError::malformed(
                text,
                format!("label must be {} digits, found {}", PAD_LENGTH, text.len()),
            ));
        }
        if !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PathError::malformed(text, "label contains non-digit characters"));
        }
        // 18 digits always fit in u64
        let value = text
            .parse::<u64>()
            .map_err(|e| PathError::malformed(text, e.to_string()))?;
        Ok(Self(value))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = PAD_LENGTH)
    }
}

impl FromStr for Label {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ordered, non-empty sequence of labels identifying a node's tree position
///
/// Serializes as its dotted string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path(Vec<Label>);

impl Path {
    /// Parse dotted text into a path
    ///
    /// Fails with [`PathError::MalformedPath`] when the text is empty or any
    /// component is not exactly `PAD_LENGTH` digits.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pathtree_core::models::Path;
    ///
    /// let path = Path::parse("000000001000000000.000000002000000000").unwrap();
    /// assert_eq!(path.depth(), 2);
    /// assert!(Path::parse("1.2").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if text.is_empty() {
            return Err(PathError::malformed(text, "path is empty"));
        }
        let labels = text
            .split(SEPARATOR)
            .map(|component| {
                Label::parse(component).map_err(|_| {
                    PathError::malformed(
                        text,
                        format!(
                            "component '{}' is not a {}-digit label",
                            component, PAD_LENGTH
                        ),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(labels))
    }

    /// Single-component (root level) path
    pub fn root(label: Label) -> Self {
        Self(vec![label])
    }

    /// Build a path from labels, rejecting an empty sequence
    pub fn from_labels(labels: Vec<Label>) -> Result<Self, PathError> {
        if labels.is_empty() {
            return Err(PathError::EmptyPath);
        }
        Ok(Self(labels))
    }

    /// Dotted text form
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn labels(&self) -> &[Label] {
        &self.0
    }

    /// Number of labels; root nodes have depth 1
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Trailing label (the node's position among its siblings)
    pub fn last_label(&self) -> Label {
        // Non-empty by construction
        self.0[self.0.len() - 1]
    }

    /// Drop the last component
    ///
    /// Fails with [`PathError::RootHasNoParent`] on a depth-1 path.
    pub fn parent(&self) -> Result<Path, PathError> {
        self.parent_prefix().ok_or_else(|| PathError::RootHasNoParent {
            path: self.render(),
        })
    }

    /// Parent path, or `None` for a root
    pub fn parent_prefix(&self) -> Option<Path> {
        if self.is_root() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Append a label
    pub fn child(&self, label: Label) -> Path {
        let mut labels = Vec::with_capacity(self.0.len() + 1);
        labels.extend_from_slice(&self.0);
        labels.push(label);
        Self(labels)
    }

    /// Same path with the trailing label replaced
    pub fn with_last_label(&self, label: Label) -> Path {
        match self.parent_prefix() {
            Some(prefix) => prefix.child(label),
            None => Path::root(label),
        }
    }

    /// Non-strict prefix check (`self` starts with every label of `prefix`)
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Strict prefix check: `self` is a proper ancestor of `other`
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        self.0.len() < other.0.len() && other.starts_with(self)
    }

    /// Strict prefix check: `other` is a proper ancestor of `self`
    pub fn is_descendant_of(&self, other: &Path) -> bool {
        other.is_ancestor_of(self)
    }

    /// Same depth, same parent prefix, different path
    pub fn is_sibling_of(&self, other: &Path) -> bool {
        self != other
            && self.0.len() == other.0.len()
            && self.0[..self.0.len() - 1] == other.0[..other.0.len() - 1]
    }

    /// Number of leading labels shared with `other`
    pub fn common_depth(&self, other: &Path) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Every proper prefix, shortest first (the ancestor paths)
    pub fn proper_prefixes(&self) -> impl Iterator<Item = Path> + '_ {
        (1..self.0.len()).map(move |len| Self(self.0[..len].to_vec()))
    }

    /// Swap the leading `old_prefix` for `new_prefix`, keeping the suffix
    ///
    /// Returns `None` when `old_prefix` is not a prefix of `self`. This is
    /// the per-row operation behind a subtree rewrite.
    pub fn with_prefix_replaced(&self, old_prefix: &Path, new_prefix: &Path) -> Option<Path> {
        if !self.starts_with(old_prefix) {
            return None;
        }
        let mut labels = Vec::with_capacity(new_prefix.0.len() + self.0.len() - old_prefix.0.len());
        labels.extend_from_slice(&new_prefix.0);
        labels.extend_from_slice(&self.0[old_prefix.0.len()..]);
        Some(Self(labels))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}", label)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Path {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(v: u64) -> Label {
        Label::new(v).unwrap()
    }

    fn path(values: &[u64]) -> Path {
        Path::from_labels(values.iter().map(|v| label(*v)).collect()).unwrap()
    }

    #[test]
    fn test_label_renders_zero_padded() {
        assert_eq!(label(1_000_000_000).to_string(), "000000001000000000");
        assert_eq!(Label::MIN, label(0));
        assert_eq!(Label::MIN.to_string(), "000000000000000000");
        assert_eq!(Label::MAX.to_string(), "999999999999999999");
    }

    #[test]
    fn test_label_rejects_overflow() {
        assert_eq!(
            Label::new(LABEL_SPACE),
            Err(PathError::LabelOverflow {
                value: u128::from(LABEL_SPACE)
            })
        );
    }

    #[test]
    fn test_label_parse_requires_exact_width() {
        assert!(Label::parse("1000000000").is_err());
        assert!(Label::parse("0000000010000000000").is_err());
        assert!(Label::parse("00000000100000000a").is_err());
        assert!(Label::parse("+00000001000000000").is_err());
        assert_eq!(Label::parse("000000001000000000").unwrap(), label(1_000_000_000));
    }

    #[test]
    fn test_parse_and_render() {
        let text = "000000001000000000.000000002000000000";
        let parsed = Path::parse(text).unwrap();
        assert_eq!(parsed, path(&[1_000_000_000, 2_000_000_000]));
        assert_eq!(parsed.render(), text);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            ".",
            "000000001000000000.",
            ".000000001000000000",
            "000000001000000000..000000001000000000",
            "abc",
            "000000001000000000.12",
        ] {
            assert!(
                matches!(Path::parse(bad), Err(PathError::MalformedPath { .. })),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parent_of_root_fails() {
        let root = path(&[5]);
        assert!(matches!(
            root.parent(),
            Err(PathError::RootHasNoParent { .. })
        ));
        assert_eq!(root.parent_prefix(), None);
    }

    #[test]
    fn test_parent_and_child() {
        let p = path(&[1, 2, 3]);
        assert_eq!(p.parent().unwrap(), path(&[1, 2]));
        assert_eq!(path(&[1, 2]).child(label(3)), p);
        assert_eq!(p.last_label(), label(3));
        assert_eq!(p.depth(), 3);
    }

    #[test]
    fn test_ancestor_relation_is_strict() {
        let a = path(&[1]);
        let b = path(&[1, 2]);
        let c = path(&[1, 2, 3]);
        assert!(a.is_ancestor_of(&b));
        assert!(a.is_ancestor_of(&c));
        assert!(c.is_descendant_of(&a));
        assert!(!a.is_ancestor_of(&a));
        assert!(!a.is_descendant_of(&a));
        assert!(!b.is_ancestor_of(&a));
        assert!(!path(&[2]).is_ancestor_of(&c));
    }

    #[test]
    fn test_siblings_and_common_depth() {
        assert!(path(&[1, 2]).is_sibling_of(&path(&[1, 3])));
        assert!(path(&[1]).is_sibling_of(&path(&[7])));
        assert!(!path(&[1, 2]).is_sibling_of(&path(&[1, 2])));
        assert!(!path(&[1, 2]).is_sibling_of(&path(&[2, 2])));
        assert_eq!(path(&[1, 2, 3]).common_depth(&path(&[1, 2, 9, 9])), 2);
        assert_eq!(path(&[4]).common_depth(&path(&[5])), 0);
    }

    #[test]
    fn test_ordering_matches_rendered_order() {
        let mut paths = vec![
            path(&[2]),
            path(&[1, 10]),
            path(&[1]),
            path(&[1, 9, 1]),
            path(&[1, 9]),
        ];
        let mut rendered: Vec<String> = paths.iter().map(Path::render).collect();
        paths.sort();
        rendered.sort();
        let resorted: Vec<String> = paths.iter().map(Path::render).collect();
        assert_eq!(resorted, rendered);
        assert_eq!(paths[0], path(&[1]));
        assert_eq!(paths[1], path(&[1, 9]));
        assert_eq!(paths[2], path(&[1, 9, 1]));
    }

    #[test]
    fn test_prefix_replacement_keeps_suffix() {
        let descendant = path(&[1, 2, 3, 4]);
        let moved = descendant
            .with_prefix_replaced(&path(&[1, 2]), &path(&[7, 8, 9]))
            .unwrap();
        assert_eq!(moved, path(&[7, 8, 9, 3, 4]));
        assert_eq!(
            descendant.with_prefix_replaced(&path(&[5]), &path(&[6])),
            None
        );
    }

    #[test]
    fn test_proper_prefixes_shortest_first() {
        let prefixes: Vec<Path> = path(&[1, 2, 3]).proper_prefixes().collect();
        assert_eq!(prefixes, vec![path(&[1]), path(&[1, 2])]);
        assert_eq!(path(&[1]).proper_prefixes().count(), 0);
    }

    #[test]
    fn test_serde_uses_dotted_string() {
        let p = path(&[1_000_000_000, 3]);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"000000001000000000.000000000000000003\"");
        let back: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(serde_json::from_str::<Path>("\"1.2\"").is_err());
    }
}
