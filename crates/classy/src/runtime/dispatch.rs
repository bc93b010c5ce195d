//! Dispatch slots.
//!
//! Every method of a class is a [`Method`] field: a single function pointer
//! that receives the instance explicitly. Slots are bound by
//! [`Behavior::install`](crate::Behavior::install), which the construction
//! pipeline runs root first, so an override written by a derived class
//! replaces the ancestor's binding in the shared slot. Calling through any
//! ancestor view therefore reaches the most derived implementation with one
//! indirection and no lookup.
//!
//! Implementations are ordinary functions taking the most derived receiver
//! they need and the arguments as a tuple:
//!
//! ```rust
//! use classy::{call, class, Behavior, Method, Object};
//!
//! class! {
//!     pub struct Counter: Object {
//!         pub value: i32,
//!         pub add: Method<Counter, (i32,), i32>,
//!     }
//! }
//!
//! fn counter_add(counter: &mut Counter, (delta,): (i32,)) -> i32 {
//!     counter.value += delta;
//!     counter.value
//! }
//!
//! impl Behavior for Counter {
//!     type Args = ();
//!
//!     fn install(&mut self) {
//!         Method::install(self, |c| &mut c.add, counter_add);
//!     }
//!
//!     fn init(&mut self, _is_base: bool, (): ()) {}
//! }
//!
//! let mut counter = classy::new_alloc::<Counter>(()).unwrap();
//! assert_eq!(call!(counter, add(5)), 5);
//! assert_eq!(call!(counter, add(2)), 7);
//! ```
//!
//! A binding remembers the class that installed it. Before the
//! implementation runs, the receiver's identity record (see
//! [`Object`](crate::Object)) must name that class or a descendant of it, so
//! a slot copied or swapped into an instance of an ancestor class panics
//! instead of running an implementation written for a larger receiver.

use crate::runtime::class::{Class, Inherits};
use crate::runtime::object::Object;
use std::any::TypeId;
use std::fmt;
use std::mem;
use std::ptr::NonNull;

/// Erased method implementation: the receiver is a pointer to the class that
/// declares the slot.
pub type Imp<B, A, R> = unsafe fn(NonNull<B>, A) -> R;

/// An implementation and the class whose receiver it expects.
#[doc(hidden)]
#[repr(C)]
pub struct Binding<B, A, R> {
    pub(crate) imp: Imp<B, A, R>,
    pub(crate) installer: TypeId,
}

impl<B, A, R> Binding<B, A, R> {
    pub(crate) fn erase(self) -> Binding<(), A, R> {
        Binding {
            // SAFETY: only the pointee type of the receiver changes.
            imp: unsafe { mem::transmute::<Imp<B, A, R>, Imp<(), A, R>>(self.imp) },
            installer: self.installer,
        }
    }
}

impl<B, A, R> Clone for Binding<B, A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B, A, R> Copy for Binding<B, A, R> {}

/// Panics unless the instance rooted at `object` may run code installed by
/// `installer`.
#[track_caller]
pub(crate) fn check_receiver(object: &Object, installer: TypeId, declared_by: &str) {
    if !object.admits(installer) {
        panic!(
            "{declared_by} binding used on an instance that is not of the installing class \
             (the slot was moved, or the instance was moved without `rebind`)"
        );
    }
}

/// A dispatch slot declared by class `B`, taking arguments `A` and returning
/// `R`.
#[repr(transparent)]
pub struct Method<B, A, R = ()> {
    binding: Option<Binding<B, A, R>>,
}

impl<B, A, R> Method<B, A, R> {
    /// Returns an unbound slot.
    #[must_use]
    pub const fn unbound() -> Self {
        Method { binding: None }
    }

    /// Returns `true` once an implementation has been installed.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Binds `imp` into the slot selected by `slot`.
    ///
    /// `D` is the class whose `install` is running and `imp` takes `D` as
    /// its receiver. Any previous binding is replaced.
    pub fn install<D, P>(this: &mut D, slot: impl FnOnce(&mut D) -> &mut Self, imp: fn(&mut D, A) -> R)
    where
        D: Inherits<B, P>,
        B: Class,
    {
        // SAFETY: `fn(&mut D, A) -> R` and `unsafe fn(NonNull<B>, A) -> R`
        // share their ABI: both receivers are non-null thin pointers. Every
        // call checks that the receiver descends from `D` first, and `D`
        // starts with `B`.
        let erased = unsafe { mem::transmute::<fn(&mut D, A) -> R, Imp<B, A, R>>(imp) };
        slot(this).binding = Some(Binding {
            imp: erased,
            installer: TypeId::of::<D>(),
        });
    }

    /// Calls the bound implementation with `this` as the receiver.
    ///
    /// # Panics
    ///
    /// Panics if the slot was never bound, or if `this` is not an instance
    /// of the class that installed the implementation (or a descendant).
    pub fn call<S, P>(self, this: &mut S, args: A) -> R
    where
        S: Inherits<B, P>,
        B: Class,
    {
        match self.try_call(this, args) {
            Some(result) => result,
            None => panic!("call through an unbound dispatch slot of {}", B::NAME),
        }
    }

    /// Calls the bound implementation, or returns `None` if the slot is
    /// unbound.
    ///
    /// # Panics
    ///
    /// Panics if `this` is not an instance of the class that installed the
    /// implementation (or a descendant).
    pub fn try_call<S, P>(self, this: &mut S, args: A) -> Option<R>
    where
        S: Inherits<B, P>,
        B: Class,
    {
        let binding = self.binding?;
        check_receiver(this.object(), binding.installer, B::NAME);
        // SAFETY: the receiver's class descends from the installing class,
        // whose implementation expects exactly this pointer.
        Some(unsafe { (binding.imp)(NonNull::from(this).cast::<B>(), args) })
    }

    /// Forgets the declaring class, for storage in interface projections.
    #[must_use]
    pub fn erase(self) -> Method<(), A, R> {
        Method {
            binding: self.binding.map(Binding::erase),
        }
    }
}

impl<A, R> Method<(), A, R> {
    /// Calls an erased slot.
    ///
    /// # Safety
    ///
    /// `this` must point to a valid instance, not otherwise borrowed for
    /// the duration of the call.
    ///
    /// # Panics
    ///
    /// Panics if the slot was never bound or the instance does not descend
    /// from the installing class.
    #[doc(hidden)]
    pub unsafe fn __call_raw(self, this: NonNull<()>, args: A) -> R {
        let Some(binding) = self.binding else {
            panic!("call through an unbound dispatch slot");
        };
        // SAFETY: every instance starts with its `Object`; the shared borrow
        // ends before the implementation runs.
        check_receiver(unsafe { this.cast::<Object>().as_ref() }, binding.installer, "projected");
        // SAFETY: the receiver descends from the installing class.
        unsafe { (binding.imp)(this, args) }
    }
}

impl<B, A, R> Clone for Method<B, A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B, A, R> Copy for Method<B, A, R> {}

impl<B, A, R> Default for Method<B, A, R> {
    fn default() -> Self {
        Self::unbound()
    }
}

impl<B, A, R> fmt::Debug for Method<B, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.binding {
            Some(binding) => write!(f, "Method({:p})", binding.imp as *const ()),
            None => f.write_str("Method(unbound)"),
        }
    }
}

/// Calls a method through its dispatch slot.
///
/// `call!(receiver, slot(args...))` reads `slot` from `receiver` and calls
/// it with `receiver` as the explicit first argument. The receiver is
/// reborrowed, so pass a reference or a `Box`/`Owned` handle.
///
/// # Panics
///
/// Panics if the slot is unbound.
#[macro_export]
macro_rules! call {
    ($this:expr, $slot:ident ( $($arg:expr),* $(,)? )) => {{
        let __receiver = &mut *$this;
        let __slot = __receiver.$slot;
        __slot.call(__receiver, ($($arg,)*))
    }};
}
