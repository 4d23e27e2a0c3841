//! Generic element tree with a small path-expression evaluator.
//!
//! The parser strips XML namespaces while building the tree, so path
//! expressions use bare element names. The supported grammar is a subset of
//! XPath sufficient for C-CDA entry extraction:
//!
//! - `code/@code` — attribute of a nested element
//! - `statusCode/@code` — attribute one level down
//! - `code/originalText/text()` — text content of a nested element
//! - `entry/act/entryRelationship/observation` — nested element selection
//!
//! Each step descends into all matching children, in document order.

/// One element of a parsed XML document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attribute value by name, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Select all nodes matching an element-only path such as
    /// `entry/act/entryRelationship/observation`.
    pub fn select<'a>(&'a self, path: &'a str) -> Vec<&'a XmlNode> {
        let mut current = vec![self];
        for step in path.split('/').filter(|s| !s.is_empty()) {
            if step.starts_with('@') || step == "text()" {
                break;
            }
            let mut next = Vec::new();
            for node in current {
                next.extend(node.children_named(step));
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// Evaluate a path ending in `@attr` or `text()` and return the first
    /// matching value. A path ending in an element name yields that element's
    /// text content. Returns `None` when nothing matches; an empty attribute
    /// value is returned as-is, callers decide whether empty counts.
    pub fn first_value(&self, path: &str) -> Option<String> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }

        let (element_path, leaf) = split_leaf(path);
        let nodes = if element_path.is_empty() {
            vec![self]
        } else {
            self.select(element_path)
        };

        let node = nodes.first()?;
        match leaf {
            Leaf::Attribute(name) => node.attr(name).map(String::from),
            Leaf::Text => Some(node.text.clone()),
        }
    }

    /// `first_value` filtered to non-empty strings.
    pub fn first_non_empty(&self, path: &str) -> Option<String> {
        self.first_value(path).filter(|v| !v.trim().is_empty())
    }
}

enum Leaf<'a> {
    Attribute(&'a str),
    Text,
}

fn split_leaf(path: &str) -> (&str, Leaf<'_>) {
    match path.rsplit_once('/') {
        Some((prefix, last)) if last.starts_with('@') => (prefix, Leaf::Attribute(&last[1..])),
        Some((prefix, "text()")) => (prefix, Leaf::Text),
        _ => {
            if let Some(name) = path.strip_prefix('@') {
                ("", Leaf::Attribute(name))
            } else if path == "text()" {
                ("", Leaf::Text)
            } else {
                (path, Leaf::Text)
            }
        }
    }
}
