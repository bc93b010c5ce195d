//! Classy runtime module.
//!
//! # Architecture
//!
//! - [`object`]: the root class and its implicit state
//! - [`class`]: class composition, ancestor chains and upcasts
//! - [`dispatch`]: method slots
//! - [`event`]: event slots
//! - [`interface`]: structural interfaces and projections
//! - [`registry`]: one-time validation of class descriptions
//! - [`lifecycle`]: construction and destruction pipelines, owning handles
//! - [`concurrency`]: instance locks and async methods

pub mod class;
pub mod concurrency;
pub mod dispatch;
pub mod event;
pub mod interface;
pub mod lifecycle;
pub mod object;
pub mod registry;

pub use class::{Behavior, ChainLink, Class, Derived, Here, Inherits, There, upcast, upcast_mut};
pub use concurrency::{
    AsyncBody, AsyncHandle, CancelToken, Guarded, LockGuard, lock, sleep, spawn_async, try_lock,
};
pub use dispatch::{Imp, Method};
pub use event::{Event, EventRef};
pub use interface::{Interface, Projection};
pub use lifecycle::{Owned, Scoped, Shared, destroy, destroy_free, new_alloc, new_inplace, rebind};
pub use object::{Object, ObjectState};
pub use registry::ClassDescriptor;
