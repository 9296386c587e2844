//! Async-loadable values.

use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;

use crate::component::Component;
use crate::error::TaskError;
use crate::events::Source;
use crate::key_path::KeyPath;
use crate::store::ComponentStore;

/// Content, error and loading flag of a value fetched by a task.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource<T> {
    pub content: Option<T>,
    pub error: Option<ResourceError>,
    pub is_loading: bool,
}

/// Summary of a [`Resource`]. Loading wins over a stale error or content.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceState<T> {
    Unloaded,
    Loading,
    Content(T),
    Error(ResourceError),
}

impl<T> Resource<T> {
    pub fn new() -> Self {
        Self {
            content: None,
            error: None,
            is_loading: false,
        }
    }

    pub fn with_content(content: T) -> Self {
        Self {
            content: Some(content),
            ..Self::new()
        }
    }

    pub fn set_content(&mut self, content: T) {
        self.content = Some(content);
        self.error = None;
        self.is_loading = false;
    }

    pub fn set_error(&mut self, error: impl Into<ResourceError>) {
        self.error = Some(error.into());
        self.is_loading = false;
    }

    pub fn set_loading(&mut self) {
        self.is_loading = true;
    }
}

impl<T: Clone> Resource<T> {
    pub fn state(&self) -> ResourceState<T> {
        if self.is_loading {
            ResourceState::Loading
        } else if let Some(error) = &self.error {
            ResourceState::Error(error.clone())
        } else if let Some(content) = &self.content {
            ResourceState::Content(content.clone())
        } else {
            ResourceState::Unloaded
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Resource<T> {
    pub fn content_path() -> KeyPath<Resource<T>, Option<T>> {
        KeyPath::new(
            "content",
            |resource: &Resource<T>| resource.content.clone(),
            |resource: &mut Resource<T>, content| resource.content = content,
        )
    }

    pub fn error_path() -> KeyPath<Resource<T>, Option<ResourceError>> {
        KeyPath::new(
            "error",
            |resource: &Resource<T>| resource.error.clone(),
            |resource: &mut Resource<T>, error| resource.error = error,
        )
    }

    pub fn is_loading_path() -> KeyPath<Resource<T>, bool> {
        KeyPath::new(
            "is_loading",
            |resource: &Resource<T>| resource.is_loading,
            |resource: &mut Resource<T>, is_loading| resource.is_loading = is_loading,
        )
    }
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Shareable load failure. Compares by message.
#[derive(Clone)]
pub struct ResourceError(Arc<anyhow::Error>);

impl ResourceError {
    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Debug for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceError({})", self.0)
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl PartialEq for ResourceError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.to_string() == other.0.to_string()
    }
}

impl From<anyhow::Error> for ResourceError {
    fn from(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }
}

impl From<Arc<anyhow::Error>> for ResourceError {
    fn from(error: Arc<anyhow::Error>) -> Self {
        Self(error)
    }
}

impl<C: Component> ComponentStore<C> {
    /// Load a value into the resource at `key_path`.
    ///
    /// Mutates `is_loading` to true, runs `load` as a cancellable task named
    /// after the key path, stores the content (clearing a previous error) or
    /// the error, then mutates `is_loading` back to false. A newer load of
    /// the same resource cancels this one, which then returns `None` and
    /// leaves the resource to the newer load.
    #[track_caller]
    pub fn load_resource<'a, T, F>(
        &'a self,
        key_path: &KeyPath<C::State, Resource<T>>,
        load: F,
    ) -> impl Future<Output = Option<T>> + Send + 'a
    where
        T: Clone + Debug + Send + Sync + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'a,
    {
        let source = Source::capture();
        let key_path = key_path.clone();
        async move {
            let is_loading = key_path.appending(&Resource::is_loading_path());
            self.mutate_at(&is_loading, true, source);

            let result = self
                .run_task(key_path.name().to_string(), true, load, source)
                .await;
            let content = match result {
                Ok(content) => {
                    self.mutate_at(
                        &key_path.appending(&Resource::content_path()),
                        Some(content.clone()),
                        source,
                    );
                    if self.read(|state| key_path.get(state).error.is_some()) {
                        self.mutate_at(&key_path.appending(&Resource::error_path()), None, source);
                    }
                    Some(content)
                }
                Err(TaskError::Failed { error, .. }) => {
                    self.mutate_at(
                        &key_path.appending(&Resource::error_path()),
                        Some(ResourceError::from(error)),
                        source,
                    );
                    None
                }
                Err(TaskError::Cancelled { .. }) => return None,
            };

            self.mutate_at(&is_loading, false, source);
            content
        }
    }
}
