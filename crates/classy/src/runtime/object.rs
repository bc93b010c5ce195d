//! The root class.
//!
//! Every class hierarchy ends in [`Object`]. It carries the implicit fields
//! every instance has: the destruction state, the per-instance reentrant
//! lock and the identity of the instance. Because each class stores its
//! ancestor as its first field and all classes are `#[repr(C)]`, the
//! `Object` of any instance sits at offset zero.
//!
//! # Identity
//!
//! Construction records where the instance lives and its exact class. A
//! dispatch slot or event handler only runs on a receiver whose record
//! names the installing class (or a descendant of it) *and* whose record
//! sits at the address it was taken at. Ancestor views can be assigned and
//! swapped, which moves the record along with the slots; the address check
//! makes such a record stale instead of letting an implementation for a
//! larger class run on a smaller one.
//!
//! # Thread Safety
//!
//! Only the construction and destruction pipelines write these fields, and
//! both require exclusive access to the instance. Shared references only
//! read the state and acquire the lock. The lock is boxed so that its
//! address identifies the instance for [`Guarded`](crate::Guarded) fields,
//! even when the instance moves.

use crate::runtime::class::Class;
use parking_lot::ReentrantMutex;
use std::any::TypeId;
use std::fmt;
use std::ptr;

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectState {
    /// Zeroed memory that no construction pipeline has run on.
    #[default]
    Unconstructed,
    /// Fully constructed.
    Live,
    /// Cleanup code is running.
    Finalizing,
    /// Destroyed; further destruction requests are no-ops.
    Destroyed,
}

/// Root of every ancestor chain.
#[repr(C)]
pub struct Object {
    state: ObjectState,
    lock: Option<Box<ReentrantMutex<()>>>,
    home: usize,
    lineage: fn(TypeId) -> bool,
}

fn no_lineage(_class: TypeId) -> bool {
    false
}

impl Default for Object {
    fn default() -> Self {
        Object {
            state: ObjectState::Unconstructed,
            lock: None,
            home: 0,
            lineage: no_lineage,
        }
    }
}

impl Object {
    /// Returns the lifecycle state of the instance.
    #[must_use]
    pub fn state(&self) -> ObjectState {
        self.state
    }

    /// Returns `true` between construction and destruction.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state == ObjectState::Live
    }

    /// Returns `true` if the instance lock is installed.
    #[must_use]
    pub fn has_lock(&self) -> bool {
        self.lock.is_some()
    }

    pub(crate) fn mark_live(&mut self) {
        self.state = ObjectState::Live;
    }

    pub(crate) fn begin_finalize(&mut self) {
        self.state = ObjectState::Finalizing;
    }

    /// Returns `true` if the identity record was taken at the current
    /// address.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.home != 0 && self.home == ptr::from_ref(self) as usize
    }

    /// Records that `instance` lives at its current address and is exactly
    /// a `C`.
    pub(crate) fn settle<C: Class>(instance: &mut C) {
        let home = ptr::from_mut(instance) as usize;
        let object = instance.object_mut();
        object.home = home;
        object.lineage = C::descends_from;
    }

    /// Returns `true` if code installed by `class` may run on this instance.
    pub(crate) fn admits(&self, class: TypeId) -> bool {
        self.is_settled() && (self.lineage)(class)
    }

    pub(crate) fn install_lock(&mut self) {
        self.lock = Some(Box::new(ReentrantMutex::new(())));
    }

    pub(crate) fn lock_handle(&self) -> Option<&ReentrantMutex<()>> {
        self.lock.as_deref()
    }

    /// Releases the lock and marks the instance destroyed.
    pub(crate) fn release(&mut self) {
        self.lock = None;
        self.state = ObjectState::Destroyed;
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("state", &self.state)
            .field("locked", &self.lock.as_ref().is_some_and(|lock| lock.is_locked()))
            .field("settled", &self.is_settled())
            .finish()
    }
}
