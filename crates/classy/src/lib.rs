//! Classy: single-inheritance objects for Rust
//!
//! Classy is a small object runtime. Classes are plain structs that embed
//! their ancestor as the first field, and methods are function-pointer slots
//! stored in the instance. It provides:
//!
//! - **Single inheritance** with a bounded ancestor chain and upcasts to any
//!   ancestor
//! - **Slot dispatch**: overrides replace the ancestor's binding at
//!   construction, so every call is one indirect jump
//! - **Events**: at most one handler per event and instance, firing an
//!   unbound event is a no-op
//! - **Structural interfaces** usable across unrelated classes through
//!   projections
//! - **Per-instance reentrant locks** and **async methods** on detached
//!   worker threads
//!
//! # Architecture
//!
//! - **Declaration layer**: [`class!`], [`interface!`] and [`implements!`]
//!   turn struct-like declarations into layouts, chain hooks and projections
//! - **Runtime layer**: the construction and destruction pipelines, the
//!   class registry and the concurrency primitives in [`runtime`]
//! - **Configuration**: [`config`] holds the process-wide settings
//!
//! # Example
//!
//! ```rust
//! use classy::{call, class, Behavior, Derived, Method, Object};
//!
//! class! {
//!     pub struct Greeter: Object {
//!         pub greet: Method<Greeter, (), String>,
//!     }
//! }
//!
//! fn greeter_greet(_: &mut Greeter, (): ()) -> String {
//!     "hello".to_owned()
//! }
//!
//! impl Behavior for Greeter {
//!     type Args = ();
//!
//!     fn install(&mut self) {
//!         Method::install(self, |g| &mut g.greet, greeter_greet);
//!     }
//!
//!     fn init(&mut self, _is_base: bool, (): ()) {}
//! }
//!
//! class! {
//!     pub struct Shouter: Greeter {}
//! }
//!
//! fn shouter_greet(shouter: &mut Shouter, (): ()) -> String {
//!     greeter_greet(shouter, ()).to_uppercase()
//! }
//!
//! impl Behavior for Shouter {
//!     type Args = ();
//!
//!     fn install(&mut self) {
//!         Method::install(self, |s| &mut s.greet, shouter_greet);
//!     }
//!
//!     fn init(&mut self, _is_base: bool, (): ()) {
//!         self.init_base(());
//!     }
//! }
//!
//! let mut shouter = classy::new_alloc::<Shouter>(()).unwrap();
//! let greeter: &mut Greeter = classy::upcast_mut(&mut *shouter);
//! assert_eq!(call!(greeter, greet()), "HELLO");
//! ```

pub mod config;
pub mod error;
pub mod runtime;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use runtime::{
    AsyncHandle, Behavior, CancelToken, Class, ClassDescriptor, Derived, Event, EventRef, Guarded,
    Here, Imp, Inherits, Interface, LockGuard, Method, Object, ObjectState, Owned, Projection,
    Scoped, Shared, There, destroy, destroy_free, lock, new_alloc, new_inplace, rebind, sleep,
    spawn_async, try_lock, upcast, upcast_mut,
};
