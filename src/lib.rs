//! Unidirectional component stores.
//!
//! A [`Component`] declares its state, the actions a view sends, the inputs
//! its children send, the outputs it reports and the routes it presents. A
//! [`ComponentStore`] runs the component's hooks, records every operation as
//! an [`Event`](events::Event), runs named cancellable tasks and scopes child
//! stores onto parts of its state. The [`testing`] module replays scripted
//! steps against a store and checks the events they produce.

pub mod component;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod events;
pub mod key_path;
pub mod logging;
pub mod path;
pub mod resource;
pub mod runtime;
pub mod store;
pub mod testing;
pub mod view_model;

pub use component::{BoxFuture, Component, ComponentMessage, ComponentState, Never};
pub use config::RuntimeConfig;
pub use dependencies::{Dependencies, DependencyContext, DependencyKey};
pub use error::TaskError;
pub use events::{Event, EventKind, EventStore, Mutation, Source};
pub use key_path::{CasePath, KeyPath};
pub use path::ComponentPath;
pub use resource::{Resource, ResourceError, ResourceState};
pub use runtime::{ComponentGraph, ComponentRuntime};
pub use store::{
    ComponentRoute, ComponentStore, Connection, OutputHandler, StateBinding, StateProjection,
};
pub use view_model::{Binding, ViewModel};
