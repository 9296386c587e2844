//! Named field accessors.
//!
//! Stores never inspect state layout at runtime. Every field that takes part
//! in mutations, bindings or scoping is addressed through a [`KeyPath`] that
//! carries an explicit dotted name alongside its getter and setter.

use std::fmt;
use std::sync::Arc;

type Getter<Root, Value> = Arc<dyn Fn(&Root) -> Value + Send + Sync>;
type Setter<Root, Value> = Arc<dyn Fn(&mut Root, Value) + Send + Sync>;

/// Named, composable accessor for one field of `Root`.
pub struct KeyPath<Root, Value> {
    name: String,
    get: Getter<Root, Value>,
    set: Setter<Root, Value>,
}

impl<Root, Value> KeyPath<Root, Value>
where
    Root: 'static,
    Value: 'static,
{
    pub fn new(
        name: impl Into<String>,
        get: impl Fn(&Root) -> Value + Send + Sync + 'static,
        set: impl Fn(&mut Root, Value) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    /// Dotted property name, e.g. `resource.is_loading`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, root: &Root) -> Value {
        (self.get)(root)
    }

    pub fn set(&self, root: &mut Root, value: Value) {
        (self.set)(root, value)
    }

    /// Key path to a field of this key path's value.
    pub fn appending<Next: 'static>(&self, next: &KeyPath<Value, Next>) -> KeyPath<Root, Next> {
        let outer_get = Arc::clone(&self.get);
        let outer_get_for_set = Arc::clone(&self.get);
        let outer_set = Arc::clone(&self.set);
        let inner_get = Arc::clone(&next.get);
        let inner_set = Arc::clone(&next.set);

        KeyPath {
            name: format!("{}.{}", self.name, next.name),
            get: Arc::new(move |root: &Root| inner_get(&outer_get(root))),
            set: Arc::new(move |root: &mut Root, value: Next| {
                let mut intermediate = outer_get_for_set(root);
                inner_set(&mut intermediate, value);
                outer_set(root, intermediate);
            }),
        }
    }
}

impl<Root, Value> Clone for KeyPath<Root, Value> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<Root, Value> fmt::Debug for KeyPath<Root, Value> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyPath").field(&self.name).finish()
    }
}

/// Accessor for one case of an enum-shaped value.
pub struct CasePath<Enum, Payload> {
    name: String,
    extract: Arc<dyn Fn(&Enum) -> Option<Payload> + Send + Sync>,
    embed: Arc<dyn Fn(Payload) -> Enum + Send + Sync>,
}

impl<Enum, Payload> CasePath<Enum, Payload> {
    pub fn new(
        name: impl Into<String>,
        extract: impl Fn(&Enum) -> Option<Payload> + Send + Sync + 'static,
        embed: impl Fn(Payload) -> Enum + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            extract: Arc::new(extract),
            embed: Arc::new(embed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extract(&self, value: &Enum) -> Option<Payload> {
        (self.extract)(value)
    }

    pub fn embed(&self, payload: Payload) -> Enum {
        (self.embed)(payload)
    }

    pub fn matches(&self, value: &Enum) -> bool {
        self.extract(value).is_some()
    }
}

impl<Enum, Payload> Clone for CasePath<Enum, Payload> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            extract: Arc::clone(&self.extract),
            embed: Arc::clone(&self.embed),
        }
    }
}

impl<Enum, Payload> fmt::Debug for CasePath<Enum, Payload> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CasePath").field(&self.name).finish()
    }
}

/// Builds a [`KeyPath`] for a (possibly nested) field.
///
/// ```
/// use component_store::key_path;
///
/// #[derive(Clone)]
/// struct Inner { count: i32 }
/// #[derive(Clone)]
/// struct Outer { inner: Inner }
///
/// let path = key_path!(Outer, inner.count);
/// let mut value = Outer { inner: Inner { count: 1 } };
/// path.set(&mut value, 2);
/// assert_eq!(path.get(&value), 2);
/// assert_eq!(path.name(), "inner.count");
/// ```
#[macro_export]
macro_rules! key_path {
    ($root:ty, $($field:ident).+) => {
        $crate::KeyPath::new(
            [$(stringify!($field)),+].join("."),
            |root: &$root| root.$($field).+.clone(),
            |root: &mut $root, value| root.$($field).+ = value,
        )
    };
}

/// Builds a [`CasePath`] for a single-payload enum variant.
#[macro_export]
macro_rules! case_path {
    ($enum:ident :: $variant:ident) => {
        $crate::CasePath::new(
            stringify!($variant),
            |value: &$enum| match value {
                $enum::$variant(payload) => Some(payload.clone()),
                #[allow(unreachable_patterns)]
                _ => None,
            },
            $enum::$variant,
        )
    };
}
