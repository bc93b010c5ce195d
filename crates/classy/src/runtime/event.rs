//! Event slots.
//!
//! An [`Event`] is an optional callback stored in the instance. At most one
//! handler is bound per event and instance: registering replaces the current
//! handler without complaint, and firing an unbound event does nothing.
//!
//! Interface projections reach an event through a pointer to the slot
//! itself ([`EventRef`]), so a handler registered after the projection was
//! taken is still the one that fires.
//!
//! Firing checks the receiver the same way a method call does: the handler
//! only runs on an instance of the class that registered it, or of a
//! descendant.

use crate::runtime::class::{Class, Inherits};
use crate::runtime::dispatch::{Binding, Imp, check_receiver};
use crate::runtime::object::Object;
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

/// An event declared by class `B`, carrying arguments `A`.
#[repr(transparent)]
pub struct Event<B, A> {
    handler: Option<Binding<B, A, ()>>,
}

impl<B, A> Event<B, A> {
    /// Returns an event with no handler.
    #[must_use]
    pub const fn unbound() -> Self {
        Event { handler: None }
    }

    /// Returns `true` if a handler is registered.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.handler.is_some()
    }

    /// Removes the handler.
    pub fn clear(&mut self) {
        self.handler = None;
    }

    /// Registers `handler` on the event selected by `slot`, replacing any
    /// handler already registered there.
    pub fn register<D, P>(this: &mut D, slot: impl FnOnce(&mut D) -> &mut Self, handler: fn(&mut D, A))
    where
        D: Inherits<B, P>,
        B: Class,
    {
        // SAFETY: same ABI argument as `Method::install`; firing checks
        // that the receiver descends from `D`.
        let erased = unsafe { mem::transmute::<fn(&mut D, A), Imp<B, A, ()>>(handler) };
        slot(this).handler = Some(Binding {
            imp: erased,
            installer: TypeId::of::<D>(),
        });
    }

    /// Invokes the handler with `this` as the receiver.
    ///
    /// Returns `false`, doing nothing, if no handler is registered.
    ///
    /// # Panics
    ///
    /// Panics if `this` is not an instance of the class that registered the
    /// handler (or a descendant).
    pub fn fire<S, P>(self, this: &mut S, args: A) -> bool
    where
        S: Inherits<B, P>,
        B: Class,
    {
        let Some(handler) = self.handler else {
            return false;
        };
        check_receiver(this.object(), handler.installer, B::NAME);
        // SAFETY: the receiver descends from the registering class.
        unsafe { (handler.imp)(NonNull::from(this).cast::<B>(), args) };
        true
    }

    /// Erases the declaring class of a slot pointer.
    #[must_use]
    pub fn erase_ptr(slot: NonNull<Self>) -> NonNull<Event<(), A>> {
        // `Event` is `repr(transparent)` over a binding whose layout does
        // not depend on the receiver type.
        slot.cast()
    }
}

impl<B, A> Clone for Event<B, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B, A> Copy for Event<B, A> {}

impl<B, A> Default for Event<B, A> {
    fn default() -> Self {
        Self::unbound()
    }
}

impl<B, A> fmt::Debug for Event<B, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.handler {
            Some(handler) => write!(f, "Event({:p})", handler.imp as *const ()),
            None => f.write_str("Event(unbound)"),
        }
    }
}

/// An event reached through an interface projection.
///
/// Holds the receiver and a pointer to the instance's slot; the slot is read
/// when firing, not when the reference is created.
pub struct EventRef<'p, A> {
    this: NonNull<()>,
    slot: NonNull<Event<(), A>>,
    _borrow: PhantomData<&'p mut ()>,
}

impl<A> EventRef<'_, A> {
    /// # Safety
    ///
    /// `slot` must point into the live instance at `this`, and both must
    /// stay valid for the lifetime of the reference.
    #[doc(hidden)]
    pub unsafe fn __new(this: NonNull<()>, slot: NonNull<Event<(), A>>) -> Self {
        EventRef {
            this,
            slot,
            _borrow: PhantomData,
        }
    }

    /// Returns `true` if the instance currently has a handler registered.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        // SAFETY: guaranteed by `__new`.
        unsafe { self.slot.as_ref() }.is_bound()
    }

    /// Invokes the instance's current handler.
    ///
    /// Returns `false`, doing nothing, if no handler is registered.
    pub fn fire(&mut self, args: A) -> bool {
        // SAFETY: guaranteed by `__new`.
        let event = unsafe { *self.slot.as_ptr() };
        let Some(handler) = event.handler else {
            return false;
        };
        // SAFETY: every instance starts with its `Object`; the shared borrow
        // ends before the handler runs.
        check_receiver(unsafe { self.this.cast::<Object>().as_ref() }, handler.installer, "projected");
        // SAFETY: the receiver descends from the registering class.
        unsafe { (handler.imp)(self.this, args) };
        true
    }
}

/// Fires an event: `raise!(receiver, event(args...))`.
///
/// Evaluates to `true` if a handler ran.
#[macro_export]
macro_rules! raise {
    ($this:expr, $event:ident ( $($arg:expr),* $(,)? )) => {{
        let __receiver = &mut *$this;
        let __event = __receiver.$event;
        __event.fire(__receiver, ($($arg,)*))
    }};
}

/// Registers an event handler: `register!(receiver, event => handler)`.
#[macro_export]
macro_rules! register {
    ($this:expr, $event:ident => $handler:expr) => {
        $crate::Event::register(&mut *$this, |__this| &mut __this.$event, $handler)
    };
}
