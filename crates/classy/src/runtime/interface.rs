//! Structural interfaces and projections.
//!
//! An interface names data fields, events and methods that a class must
//! provide, by declaration or inheritance, with identical names and types.
//! There is no common ancestor: two unrelated classes implementing the same
//! interface are used uniformly through a *projection*.
//!
//! # Architecture
//!
//! - [`interface!`](crate::interface) generates the projection type. It holds
//!   the receiver, one accessor per data field (aliasing the real field),
//!   one accessor per event (reaching the slot itself, so late
//!   registrations are visible), and a copy of each method slot taken at
//!   projection time.
//! - [`implements!`](crate::implements) checks the class against the
//!   interface at compile time and implements [`Projection`] for the class
//!   and all of its descendants.
//! - A projection mutably borrows the instance for its whole lifetime, so it
//!   cannot outlive it or be used alongside direct access.
//!
//! # Example
//!
//! ```rust
//! use classy::{class, implements, interface, Behavior, Class, Event, Method, Object};
//!
//! interface! {
//!     pub interface Named {
//!         data name: &'static str;
//!         event on_rename(&'static str);
//!         fn shout() -> usize;
//!     }
//! }
//!
//! class! {
//!     pub struct Dog: Object {
//!         pub name: &'static str,
//!         pub on_rename: Event<Dog, (&'static str,)>,
//!         pub shout: Method<Dog, (), usize>,
//!     }
//! }
//!
//! fn dog_shout(dog: &mut Dog, (): ()) -> usize {
//!     dog.name.len()
//! }
//!
//! impl Behavior for Dog {
//!     type Args = (&'static str,);
//!
//!     fn install(&mut self) {
//!         Method::install(self, |d| &mut d.shout, dog_shout);
//!     }
//!
//!     fn init(&mut self, _is_base: bool, (name,): (&'static str,)) {
//!         self.name = name;
//!     }
//! }
//!
//! implements!(Dog: Named {
//!     data name;
//!     event on_rename;
//!     fn shout;
//! });
//!
//! let mut dog = classy::new_alloc::<Dog>(("rex",)).unwrap();
//! let mut named: Named = dog.project();
//! *named.name() = "fido";
//! assert_eq!(named.shout(), 4);
//! assert!(!named.on_rename().fire(("x",)));
//! assert_eq!(dog.name, "fido");
//! ```

use crate::runtime::class::Class;
use crate::runtime::event::Event;
use std::ptr::NonNull;

/// Accessor from an erased receiver to one of its data fields.
pub type DataAccessor<T> = fn(NonNull<()>) -> NonNull<T>;

/// Accessor from an erased receiver to one of its event slots.
pub type EventAccessor<A> = fn(NonNull<()>) -> NonNull<Event<(), A>>;

/// Static description of an interface.
pub trait Interface {
    /// Interface name.
    const NAME: &'static str;

    /// Member names: data fields, then events, then methods.
    const MEMBERS: &'static [&'static str];
}

/// Builds projection `Self` from instances of `C`.
///
/// `A` is the class that declared the implementation and `P` its position
/// in `C`'s ancestor chain; both are inferred.
///
/// # Safety
///
/// The projection must only alias members of the instance it was built
/// from. Implemented by [`implements!`](crate::implements).
pub unsafe trait Projection<'a, C: Class, A: Class, P>: Interface + Sized {
    /// Projects `this`.
    fn project(this: &'a mut C) -> Self;
}

/// Compares member lists at compile time.
#[doc(hidden)]
#[must_use]
pub const fn same_members(expected: &[&str], listed: &[&str]) -> bool {
    if expected.len() != listed.len() {
        return false;
    }
    let mut i = 0;
    while i < expected.len() {
        if !same_name(expected[i], listed[i]) {
            return false;
        }
        i += 1;
    }
    true
}

const fn same_name(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Declares an interface and its projection type.
///
/// ```text
/// interface! {
///     pub interface Moveable {
///         data position: i32;
///         event on_move(i32);
///         fn move_(speed: i32, distance: i32) -> ();
///     }
/// }
/// ```
///
/// Members are listed as data fields, then events, then methods. The
/// projection `Moveable<'a>` gets one method per member: data accessors
/// return `&mut T`, event accessors return an [`EventRef`](crate::EventRef),
/// and methods call the copied slot with the projected instance as receiver.
#[macro_export]
macro_rules! interface {
    (
        $(#[$meta:meta])*
        $vis:vis interface $name:ident {
            $( data $d:ident : $dty:ty ; )*
            $( event $e:ident ( $( $ety:ty ),* $(,)? ) ; )*
            $( fn $m:ident ( $( $p:ident : $pty:ty ),* $(,)? ) -> $ret:ty ; )*
        }
    ) => {
        $(#[$meta])*
        $vis struct $name<'a> {
            this: ::core::ptr::NonNull<()>,
            $( $d: $crate::runtime::interface::DataAccessor<$dty>, )*
            $( $e: $crate::runtime::interface::EventAccessor<($($ety,)*)>, )*
            $( $m: $crate::Method<(), ($($pty,)*), $ret>, )*
            _borrow: ::core::marker::PhantomData<&'a mut ()>,
        }

        impl $crate::Interface for $name<'_> {
            const NAME: &'static str = ::core::stringify!($name);
            const MEMBERS: &'static [&'static str] = &[
                $( ::core::stringify!($d), )*
                $( ::core::stringify!($e), )*
                $( ::core::stringify!($m), )*
            ];
        }

        #[allow(dead_code)]
        impl<'a> $name<'a> {
            /// # Safety
            ///
            /// Every accessor must belong to the class of the instance at
            /// `this`, every method must be copied from that instance, and the
            /// instance must stay exclusively borrowed for `'a`.
            #[doc(hidden)]
            #[allow(clippy::too_many_arguments)]
            pub unsafe fn __from_parts(
                this: ::core::ptr::NonNull<()>,
                $( $d: $crate::runtime::interface::DataAccessor<$dty>, )*
                $( $e: $crate::runtime::interface::EventAccessor<($($ety,)*)>, )*
                $( $m: $crate::Method<(), ($($pty,)*), $ret>, )*
            ) -> Self {
                $name {
                    this,
                    $( $d, )*
                    $( $e, )*
                    $( $m, )*
                    _borrow: ::core::marker::PhantomData,
                }
            }

            /// Returns the root of the projected instance.
            pub fn object(&self) -> &$crate::Object {
                // SAFETY: every instance starts with its `Object`.
                unsafe { self.this.cast::<$crate::Object>().as_ref() }
            }

            /// Reborrows the projection for a shorter lifetime.
            pub fn reborrow(&mut self) -> $name<'_> {
                $name {
                    this: self.this,
                    $( $d: self.$d, )*
                    $( $e: self.$e, )*
                    $( $m: self.$m, )*
                    _borrow: ::core::marker::PhantomData,
                }
            }

            $(
                pub fn $d(&mut self) -> &mut $dty {
                    // SAFETY: the accessor belongs to the projected class.
                    unsafe { (self.$d)(self.this).as_mut() }
                }
            )*

            $(
                pub fn $e(&mut self) -> $crate::EventRef<'_, ($($ety,)*)> {
                    // SAFETY: the accessor belongs to the projected class.
                    unsafe { $crate::EventRef::__new(self.this, (self.$e)(self.this)) }
                }
            )*

            $(
                pub fn $m(&mut self, $( $p: $pty ),*) -> $ret {
                    // SAFETY: the slot was copied from the projected instance.
                    unsafe { self.$m.__call_raw(self.this, ($($p,)*)) }
                }
            )*
        }
    };
}

/// Declares that a class implements an interface.
///
/// ```text
/// implements!(Vehicle: Moveable {
///     data position;
///     event on_move;
///     fn move_;
/// });
/// ```
///
/// Members must be listed in the interface's order. The class must declare
/// or inherit every member with the interface's type; anything missing or
/// mismatched is a compile error. Descendants of the class are projected
/// through the same implementation.
#[macro_export]
macro_rules! implements {
    (
        $class:ty : $iface:ident {
            $( data $d:ident ; )*
            $( event $e:ident ; )*
            $( fn $m:ident ; )*
        }
    ) => {
        const _: () = ::core::assert!(
            $crate::runtime::interface::same_members(
                <$iface<'static> as $crate::Interface>::MEMBERS,
                &[
                    $( ::core::stringify!($d), )*
                    $( ::core::stringify!($e), )*
                    $( ::core::stringify!($m), )*
                ],
            ),
            "implements! must list every interface member in declaration order",
        );

        // SAFETY: every accessor reaches into the `$class` prefix of the
        // instance the projection was built from.
        unsafe impl<'a, __C, __P> $crate::Projection<'a, __C, $class, __P> for $iface<'a>
        where
            __C: $crate::Inherits<$class, __P>,
        {
            fn project(this: &'a mut __C) -> Self {
                let receiver = ::core::ptr::NonNull::from(this).cast::<$class>();
                // SAFETY: `receiver` comes from an exclusive borrow held for
                // `'a`, and `__C` starts with `$class`.
                unsafe {
                    $iface::__from_parts(
                        receiver.cast::<()>(),
                        $(
                            |this: ::core::ptr::NonNull<()>| {
                                ::core::ptr::NonNull::from(
                                    &mut (*this.cast::<$class>().as_ptr()).$d,
                                )
                            },
                        )*
                        $(
                            |this: ::core::ptr::NonNull<()>| {
                                $crate::Event::erase_ptr(::core::ptr::NonNull::from(
                                    &mut (*this.cast::<$class>().as_ptr()).$e,
                                ))
                            },
                        )*
                        $( (*receiver.as_ptr()).$m.erase(), )*
                    )
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::class::{Behavior, Derived};
    use crate::{Method, Object, class};

    crate::interface! {
        /// Something that can be measured.
        interface Measured {
            data length: u32;
            event on_resize(u32);
            fn area() -> u32;
        }
    }

    class! {
        struct Rect: Object {
            length: u32,
            width: u32,
            on_resize: Event<Rect, (u32,)>,
            area: Method<Rect, (), u32>,
        }
    }

    fn rect_area(rect: &mut Rect, (): ()) -> u32 {
        rect.length * rect.width
    }

    impl Behavior for Rect {
        type Args = (u32, u32);

        fn install(&mut self) {
            Method::install(self, |r| &mut r.area, rect_area);
        }

        fn init(&mut self, _is_base: bool, (length, width): (u32, u32)) {
            self.length = length;
            self.width = width;
        }
    }

    class! {
        struct Square: Rect {}
    }

    fn square_area(square: &mut Square, (): ()) -> u32 {
        square.length * square.length
    }

    impl Behavior for Square {
        type Args = (u32,);

        fn install(&mut self) {
            Method::install(self, |s| &mut s.area, square_area);
        }

        fn init(&mut self, _is_base: bool, (side,): (u32,)) {
            self.init_base((side, 0));
        }
    }

    crate::implements!(Rect: Measured {
        data length;
        event on_resize;
        fn area;
    });

    fn widen_then_rebind(rect: &mut Rect, (width,): (u32,)) {
        rect.width = width;
        crate::register!(rect, on_resize => halve);
    }

    fn halve(rect: &mut Rect, (width,): (u32,)) {
        rect.width = width / 2;
    }

    fn built<C: Class>(args: C::Args) -> Box<C> {
        crate::new_alloc(args).unwrap()
    }

    #[test]
    fn test_same_members() {
        assert!(same_members(&["a", "bc"], &["a", "bc"]));
        assert!(!same_members(&["a", "bc"], &["bc", "a"]));
        assert!(!same_members(&["a"], &["a", "b"]));
    }

    #[test]
    fn test_interface_description() {
        assert_eq!(<Measured<'_> as Interface>::NAME, "Measured");
        assert_eq!(<Measured<'_> as Interface>::MEMBERS, &["length", "on_resize", "area"]);
    }

    #[test]
    fn test_data_aliases_instance() {
        let mut rect = built::<Rect>((2, 3));
        {
            let mut measured: Measured = rect.project();
            assert_eq!(*measured.length(), 2);
            *measured.length() = 5;
            assert_eq!(measured.area(), 15);
            assert!(measured.object().is_live());
        }
        assert_eq!(rect.length, 5);
    }

    #[test]
    fn test_descendant_projects_with_override() {
        let mut square = built::<Square>((4,));
        let mut measured: Measured = square.project();
        assert_eq!(measured.area(), 16);
        let mut again = measured.reborrow();
        *again.length() = 3;
        assert_eq!(again.area(), 9);
    }

    #[test]
    fn test_event_slot_read_at_fire_time() {
        let mut rect = built::<Rect>((2, 3));
        let mut measured: Measured = rect.project();
        assert!(!measured.on_resize().fire((1,)));
        assert_eq!(measured.area(), 6);
    }

    #[test]
    fn test_event_registered_after_projection_fires() {
        let mut rect = built::<Rect>((2, 3));
        crate::register!(rect, on_resize => widen_then_rebind);

        let mut measured: Measured = rect.project();
        assert!(measured.on_resize().fire((7,)));
        assert_eq!(measured.area(), 14);

        // the first handler replaced itself while the projection was live
        assert!(measured.on_resize().fire((8,)));
        assert_eq!(measured.area(), 8);
    }

    #[test]
    #[should_panic(expected = "not of the installing class")]
    fn test_projection_rejects_foreign_slot() {
        let square = built::<Square>((4,));
        let mut rect = built::<Rect>((2, 3));
        rect.area = square.area;

        let mut measured: Measured = rect.project();
        measured.area();
    }
}
