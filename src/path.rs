//! Position of a store in the component tree.

use std::fmt;

/// Ordered list of component names from the root store down to one store.
///
/// Equality and containment are defined on the dot-joined string form, so
/// `App.Detail` contains `App` and `App.Detail.Item`'s path relative to
/// `App` is `Detail.Item`.
#[derive(Debug, Clone)]
pub struct ComponentPath {
    components: Vec<String>,
    suffix: Option<String>,
}

impl ComponentPath {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            components: vec![component.into()],
            suffix: None,
        }
    }

    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: components.into_iter().map(Into::into).collect(),
            suffix: None,
        }
    }

    /// Path of a child component below this one.
    pub fn appending(&self, component: impl Into<String>) -> Self {
        let mut components = self.components.clone();
        components.push(component.into());
        Self {
            components,
            suffix: None,
        }
    }

    /// Display-only suffix, e.g. the name of a scoped connection.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    /// Name of the component this path ends in.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Dot-joined form used for equality and containment.
    pub fn string(&self) -> String {
        self.components.join(".")
    }

    /// True when `other` is this path or one of its ancestors.
    pub fn contains(&self, other: &ComponentPath) -> bool {
        other.components.len() <= self.components.len()
            && self.components[..other.components.len()] == other.components[..]
    }

    /// The remainder of this path below `ancestor`, if `ancestor` contains it.
    pub fn relative(&self, ancestor: &ComponentPath) -> Option<ComponentPath> {
        if !self.contains(ancestor) {
            return None;
        }
        Some(ComponentPath {
            components: self.components[ancestor.components.len()..].to_vec(),
            suffix: self.suffix.clone(),
        })
    }
}

impl PartialEq for ComponentPath {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for ComponentPath {}

impl std::hash::Hash for ComponentPath {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.string())?;
        if let Some(suffix) = &self.suffix {
            write!(f, " ({})", suffix)?;
        }
        Ok(())
    }
}
