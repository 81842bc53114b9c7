//! Hierarchical device names.
//!
//! A flattened device is named by the chain of assemblies that contained it followed
//! by its own local name, joined with [`SEPARATOR`]. Segments are used verbatim: they
//! are never escaped or truncated, so two distinct paths that spell the same string
//! collide and the flattener reports it as a duplicate.

/// Separator between hierarchy levels.
pub const SEPARATOR: char = '.';

/// Join a (possibly empty) prefix and a local name. An empty leaf names the prefix itself.
pub fn qualify(prefix: &str, leaf: &str) -> String {
    if prefix.is_empty() {
        return leaf.to_string();
    }
    if leaf.is_empty() {
        return prefix.to_string();
    }
    let mut out = String::with_capacity(prefix.len() + 1 + leaf.len());
    out.push_str(prefix);
    out.push(SEPARATOR);
    out.push_str(leaf);
    out
}

/// The stack of enclosing assembly names during a recursive walk.
///
/// This is explicit call state: each flatten operation owns its own prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamePrefix {
    segments: Vec<String>,
    joined: String,
}

impl NamePrefix {
    /// An empty prefix (the top-level graph).
    pub fn root() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: &str) {
        self.joined = qualify(&self.joined, segment);
        self.segments.push(segment.to_string());
    }

    pub fn pop(&mut self) -> Option<String> {
        let last = self.segments.pop()?;
        let keep = self.joined.len() - last.len();
        self.joined.truncate(keep.saturating_sub(1));
        Some(last)
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The prefix itself, e.g. `A.B.C`.
    pub fn as_str(&self) -> &str {
        &self.joined
    }

    /// The canonical flattened name of `leaf` under this prefix, e.g. `A.B.C.leaf`.
    pub fn qualify(&self, leaf: &str) -> String {
        qualify(&self.joined, leaf)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn qualify_splits_back_into_segments(
            segs in prop::collection::vec("[A-Za-z0-9_]{1,8}", 0..6),
            leaf in "[A-Za-z0-9_]{1,8}",
        ) {
            let mut prefix = NamePrefix::root();
            for s in &segs {
                prefix.push(s);
            }
            let name = prefix.qualify(&leaf);
            let parts: Vec<&str> = name.split(SEPARATOR).collect();
            prop_assert_eq!(parts.len(), segs.len() + 1);
            prop_assert_eq!(*parts.last().unwrap(), leaf.as_str());
            for _ in &segs {
                prefix.pop();
            }
            prop_assert!(prefix.is_root());
        }
    }
}
