//! Structured event log.
//!
//! Every store operation produces one immutable [`Event`]. Events go to the
//! emitting store's local stream (and from there up through its ancestors)
//! and to the runtime-wide [`EventStore`].

mod event;
mod store;

pub use event::{
    case_name, Event, EventKind, EventValue, Mutation, Source, StoreId, TaskEvent, ViewEvent,
};
pub use store::EventStore;
