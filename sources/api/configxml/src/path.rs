use log::trace;
use serde::{Serialize, Serializer};
use snafu::ensure;
use std::fmt;

use super::element::Element;
use super::{error, Result};

/// Characters that separate the segments of a path; "system/user" and "system.user" are the
/// same path.
pub const PATH_SEPARATORS: [char; 2] = ['/', '.'];
// The separator we use when we print a path back out.
pub const PATH_SEPARATOR_STR: &str = "/";

/// A ConfigPath selects elements of the configuration document by descending through child
/// tags, e.g. "system/user" is every `user` element under every `system` element under the
/// root.  There are no predicates; picking out one element by the value of one of its fields is
/// up to the caller.
///
/// Accepted forms:
/// * `system/user`, `./system/user`, `system.user` -- relative to the root element
/// * `/pfsense/system/user` -- absolute; the first segment must name the root element
/// * `.` -- the root element itself
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConfigPath {
    name: String,
    absolute: bool,
    segments: Vec<String>,
}

impl ConfigPath {
    /// Parses a path expression.
    pub fn new<S: AsRef<str>>(name: S) -> Result<Self> {
        let original = name.as_ref();
        let name = original.trim();

        ensure!(
            !name.is_empty(),
            error::InvalidPathSnafu {
                path: original,
                msg: "cannot be empty",
            }
        );

        if name == "." {
            return Ok(Self::root());
        }

        let (absolute, rest) = if let Some(rest) = name.strip_prefix("./") {
            (false, rest)
        } else if let Some(rest) = name.strip_prefix('/') {
            (true, rest)
        } else {
            (false, name)
        };

        let mut segments = Vec::new();
        for segment in rest.split(&PATH_SEPARATORS[..]) {
            Self::check_segment(original, segment)?;
            segments.push(segment.to_string());
        }

        let path = Self::build(absolute, segments);
        trace!("Parsed path '{}' to segments {:?}", original, path.segments);
        Ok(path)
    }

    /// Creates a relative path from the given tags.
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Result<Self> {
        let segments: Vec<String> = segments.iter().map(|s| s.as_ref().to_string()).collect();
        let joined = segments.join(PATH_SEPARATOR_STR);
        for segment in &segments {
            Self::check_segment(&joined, segment)?;
        }
        Ok(Self::build(false, segments))
    }

    /// The path that selects the root element.
    pub fn root() -> Self {
        Self::build(false, Vec::new())
    }

    fn build(absolute: bool, segments: Vec<String>) -> Self {
        let joined = segments.join(PATH_SEPARATOR_STR);
        let name = match (absolute, segments.is_empty()) {
            (_, true) => ".".to_string(),
            (true, false) => format!("{}{}", PATH_SEPARATOR_STR, joined),
            (false, false) => joined,
        };
        Self {
            name,
            absolute,
            segments,
        }
    }

    fn check_segment(path: &str, segment: &str) -> Result<()> {
        ensure!(
            !segment.is_empty(),
            error::InvalidPathSnafu {
                path,
                msg: "empty path segment",
            }
        );
        if let Some(c) = segment.chars().find(|c| !Self::valid_character(*c)) {
            return error::InvalidPathSnafu {
                path,
                msg: format!("invalid character in path: '{}'", c),
            }
            .fail();
        }
        Ok(())
    }

    /// Characters allowed in a tag name.  Anything fancier than this isn't used by the
    /// appliance's configuration document.
    fn valid_character(c: char) -> bool {
        matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | ':')
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Splits the path into the path of the parent and the tag of the last segment; used when
    /// inserting a new child.  Fails if the path has no separator, since nothing can be added
    /// next to the root.
    pub fn split_parent(&self) -> Result<(ConfigPath, String)> {
        match self.segments.split_last() {
            Some((tag, parent)) if !parent.is_empty() => {
                Ok((Self::build(self.absolute, parent.to_vec()), tag.clone()))
            }
            _ => error::InvalidPathSnafu {
                path: &self.name,
                msg: "path has no parent to insert under",
            }
            .fail(),
        }
    }

    /// Adds a tag to the end of the path, returning a new path.
    pub fn join<S: AsRef<str>>(&self, segment: S) -> Result<Self> {
        let segment = segment.as_ref();
        Self::check_segment(&self.name, segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self::build(self.absolute, segments))
    }

    /// The tags to descend through starting from the root element, or None if this is an
    /// absolute path naming some other root.
    fn descent<'a>(&'a self, root: &Element) -> Option<&'a [String]> {
        if !self.absolute {
            return Some(self.segments.as_slice());
        }
        match self.segments.split_first() {
            Some((first, rest)) if *first == root.tag => Some(rest),
            _ => None,
        }
    }

    /// Returns every element selected by this path, in document order.  Finding nothing isn't
    /// an error here; callers decide whether an empty result is acceptable.
    pub fn resolve<'a>(&self, root: &'a Element) -> Vec<&'a Element> {
        let mut found = Vec::new();
        if let Some(segments) = self.descent(root) {
            descend(root, segments, &mut found);
        }
        trace!("Path '{}' matched {} element(s)", self.name, found.len());
        found
    }

    /// Mutable version of `resolve`.
    pub fn resolve_mut<'a>(&self, root: &'a mut Element) -> Vec<&'a mut Element> {
        let mut found = Vec::new();
        if let Some(segments) = self.descent(root) {
            descend_mut(root, segments, &mut found);
        }
        trace!("Path '{}' matched {} element(s)", self.name, found.len());
        found
    }
}

fn descend<'a>(node: &'a Element, segments: &[String], found: &mut Vec<&'a Element>) {
    match segments.split_first() {
        None => found.push(node),
        Some((tag, rest)) => {
            for child in node.children.iter().filter(|c| c.tag == *tag) {
                descend(child, rest, found);
            }
        }
    }
}

fn descend_mut<'a>(node: &'a mut Element, segments: &[String], found: &mut Vec<&'a mut Element>) {
    match segments.split_first() {
        None => found.push(node),
        Some((tag, rest)) => {
            for child in node.children.iter_mut().filter(|c| c.tag == *tag) {
                descend_mut(child, rest, found);
            }
        }
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Serialize for ConfigPath {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.name)
    }
}

#[cfg(test)]
mod test {
    use super::ConfigPath;
    use crate::element::Element;

    fn doc() -> Element {
        Element::parse(
            r#"<pfsense>
                <system>
                    <user><name>a</name></user>
                    <group><name>g</name></group>
                    <user><name>b</name></user>
                </system>
                <system>
                    <user><name>c</name></user>
                </system>
            </pfsense>"#,
        )
        .unwrap()
    }

    fn names(found: &[&Element]) -> Vec<String> {
        found
            .iter()
            .map(|e| e.field_text("name").unwrap().to_string())
            .collect()
    }

    #[test]
    fn accepted_forms() {
        for form in &["system/user", "./system/user", "system.user", " system/user "] {
            let path = ConfigPath::new(form).unwrap();
            assert_eq!(path.segments(), &["system", "user"]);
            assert_eq!(path.name(), "system/user");
            assert!(!path.is_absolute());
        }

        let path = ConfigPath::new("/pfsense/system").unwrap();
        assert!(path.is_absolute());
        assert_eq!(path.name(), "/pfsense/system");

        assert!(ConfigPath::new(".").unwrap().is_root());
        assert_eq!(ConfigPath::root().to_string(), ".");
    }

    #[test]
    fn rejected_forms() {
        for bad in &["", "   ", "/", "./", "system//user", "system/", "system/us er", "a/b[1]"] {
            assert!(ConfigPath::new(bad).is_err(), "accepted '{}'", bad);
        }
        assert!(ConfigPath::from_segments(&["system", ""]).is_err());
    }

    #[test]
    fn split_parent() {
        let (parent, tag) = ConfigPath::new("./system/user").unwrap().split_parent().unwrap();
        assert_eq!(parent, ConfigPath::new("system").unwrap());
        assert_eq!(tag, "user");

        let (parent, tag) = ConfigPath::new("/pfsense/system").unwrap().split_parent().unwrap();
        assert_eq!(parent.name(), "/pfsense");
        assert_eq!(tag, "system");

        assert!(ConfigPath::new("system").unwrap().split_parent().is_err());
        assert!(ConfigPath::root().split_parent().is_err());
    }

    #[test]
    fn join() {
        let path = ConfigPath::new("system").unwrap().join("nextuid").unwrap();
        assert_eq!(path.name(), "system/nextuid");
        assert!(ConfigPath::root().join("a b").is_err());
    }

    #[test]
    fn resolve_in_document_order() {
        let root = doc();
        let path = ConfigPath::new("system/user").unwrap();
        assert_eq!(names(&path.resolve(&root)), vec!["a", "b", "c"]);

        let absolute = ConfigPath::new("/pfsense/system/group").unwrap();
        assert_eq!(names(&absolute.resolve(&root)), vec!["g"]);
    }

    #[test]
    fn resolve_nothing() {
        let root = doc();
        assert!(ConfigPath::new("system/nextuid").unwrap().resolve(&root).is_empty());
        assert!(ConfigPath::new("/other/system").unwrap().resolve(&root).is_empty());
    }

    #[test]
    fn resolve_root() {
        let root = doc();
        let found = ConfigPath::root().resolve(&root);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tag, "pfsense");
    }

    #[test]
    fn resolve_mut_edits_in_place() {
        let mut root = doc();
        let path = ConfigPath::new("system/user/name").unwrap();
        for name in path.resolve_mut(&mut root) {
            name.text = Some("x".to_string());
        }
        let found = ConfigPath::new("system/user").unwrap();
        assert_eq!(names(&found.resolve(&root)), vec!["x", "x", "x"]);
    }
}
