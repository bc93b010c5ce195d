//! Class composition: layouts, ancestor chains and upcasts.
//!
//! A class is a `#[repr(C)]` struct whose first field is its ancestor. The
//! layout of an instance is therefore the concatenation of every ancestor's
//! fields, root first, followed by the class's own fields, and a pointer to
//! an instance is also a valid pointer to each of its ancestors.
//!
//! # Architecture
//!
//! - [`Class`] is implemented by the [`class!`](crate::class) macro. It knows
//!   the class name, its depth below the root and how to walk the chain for
//!   the construction and destruction pipelines.
//! - [`Derived`] names the immediate ancestor and provides the
//!   ancestor-step initializer ([`Derived::init_base`]).
//! - [`Behavior`] is written by hand for every class: slot installation,
//!   initialization and cleanup.
//! - [`Inherits`] is the transitive "is-a" relation. The second parameter is
//!   an inferred path index ([`Here`], [`There`]) so that the relation can be
//!   implemented generically without overlapping impls.
//!
//! # Example
//!
//! ```rust
//! use classy::{class, Behavior, Derived, Object};
//!
//! class! {
//!     pub struct Shape: Object {
//!         pub sides: u32,
//!     }
//! }
//!
//! impl Behavior for Shape {
//!     type Args = (u32,);
//!
//!     fn init(&mut self, _is_base: bool, (sides,): (u32,)) {
//!         self.sides = sides;
//!     }
//! }
//!
//! class! {
//!     pub struct Square: Shape {
//!         pub side: f64,
//!     }
//! }
//!
//! impl Behavior for Square {
//!     type Args = (f64,);
//!
//!     fn init(&mut self, _is_base: bool, (side,): (f64,)) {
//!         self.init_base((4,));
//!         self.side = side;
//!     }
//! }
//!
//! let square = classy::new_alloc::<Square>((2.0,)).unwrap();
//! assert_eq!(square.sides, 4);
//! assert_eq!(square.side, 2.0);
//! ```

use crate::runtime::interface::Projection;
use crate::runtime::object::Object;
use std::any::TypeId;
use std::marker::PhantomData;

/// Path index: the class itself.
#[derive(Debug)]
pub enum Here {}

/// Path index: somewhere above the immediate ancestor.
#[derive(Debug)]
pub struct There<P>(PhantomData<P>);

/// One entry of an ancestor chain, as seen by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    /// Class name.
    pub name: &'static str,
    /// Names of the members this class declares itself.
    pub members: &'static [&'static str],
}

impl ChainLink {
    /// Describes class `C` alone.
    #[must_use]
    pub fn of<C: Class>() -> Self {
        ChainLink {
            name: C::NAME,
            members: C::MEMBERS,
        }
    }
}

/// User-written class behavior.
///
/// `init` is mandatory; `install` and `fini` default to doing nothing.
pub trait Behavior {
    /// Arguments accepted by the constructor, as a tuple.
    type Args;

    /// Binds this class's dispatch slots.
    ///
    /// Runs root-first during construction, so an override installed here
    /// replaces whatever an ancestor bound into the same slot.
    fn install(&mut self) {}

    /// Initializes the instance.
    ///
    /// `is_base` is `true` when this runs as the ancestor step of a more
    /// derived construction (through [`Derived::init_base`]); side effects
    /// that only belong to a direct construction should be skipped then.
    fn init(&mut self, is_base: bool, args: Self::Args);

    /// Cleans up the instance.
    ///
    /// Runs most-derived first. `is_base` is `true` when this runs because a
    /// more derived instance is being destroyed.
    fn fini(&mut self, is_base: bool) {
        let _ = is_base;
    }
}

/// A class with a statically known ancestor chain.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` with their ancestor (or nothing, for
/// [`Object`]) as the first field, and the chain hooks must visit every
/// ancestor exactly once. Use the [`class!`](crate::class) macro instead of
/// implementing this by hand.
pub unsafe trait Class: Behavior + Default + Sized + 'static {
    /// Class name.
    const NAME: &'static str;

    /// Number of ancestors between this class and the root.
    const DEPTH: usize;

    /// Names of the members declared by this class itself.
    const MEMBERS: &'static [&'static str];

    /// Evaluating this constant fails compilation when the class is deeper
    /// than [`MAX_INHERITANCE_DEPTH`](crate::config::MAX_INHERITANCE_DEPTH).
    #[doc(hidden)]
    const DEPTH_WITHIN_LIMIT: () = assert!(
        Self::DEPTH <= crate::config::MAX_INHERITANCE_DEPTH,
        "inheritance chain is deeper than MAX_INHERITANCE_DEPTH"
    );

    /// Returns the root of the instance.
    fn object(&self) -> &Object;

    /// Returns the root of the instance mutably.
    fn object_mut(&mut self) -> &mut Object;

    /// Installs the structure of every class in the chain, root first.
    #[doc(hidden)]
    fn install_chain(&mut self);

    /// Runs cleanup of every class in the chain, most derived first.
    #[doc(hidden)]
    fn finalize_chain(&mut self, is_base: bool);

    /// Appends the chain to `chain`, root first.
    #[doc(hidden)]
    fn describe_chain(chain: &mut Vec<ChainLink>);

    /// Returns `true` if `class` is this class or one of its ancestors.
    #[doc(hidden)]
    fn descends_from(class: TypeId) -> bool;

    /// Views this instance as one of its ancestors.
    ///
    /// The ancestor shares the instance's fields and dispatch slots, so
    /// methods called through the view still reach the most derived
    /// implementation.
    fn upcast<A, P>(&self) -> &A
    where
        Self: Inherits<A, P>,
        A: Class,
    {
        upcast(self)
    }

    /// Views this instance mutably as one of its ancestors.
    fn upcast_mut<A, P>(&mut self) -> &mut A
    where
        Self: Inherits<A, P>,
        A: Class,
    {
        upcast_mut(self)
    }

    /// Projects this instance onto an interface it implements.
    ///
    /// The projection borrows the instance mutably for its whole lifetime.
    fn project<'a, I, A, P>(&'a mut self) -> I
    where
        I: Projection<'a, Self, A, P>,
        A: Class,
    {
        I::project(self)
    }
}

/// A class with an immediate ancestor.
///
/// # Safety
///
/// `Base` must be the first field of `Self`, and `Self` must be
/// `#[repr(C)]`. Implemented by the [`class!`](crate::class) macro.
pub unsafe trait Derived: Class {
    /// The immediate ancestor.
    type Base: Class;

    /// Returns the ancestor part of the instance.
    fn base(&self) -> &Self::Base;

    /// Returns the ancestor part of the instance mutably.
    fn base_mut(&mut self) -> &mut Self::Base;

    /// Runs the ancestor's initializer as an ancestor step.
    ///
    /// A class that never calls this leaves its ancestor's fields in their
    /// zero/default state.
    fn init_base(&mut self, args: <Self::Base as Behavior>::Args) {
        Behavior::init(self.base_mut(), true, args);
    }
}

/// `Self` is `A` or has `A` somewhere in its ancestor chain.
///
/// `P` is inferred; callers never name it.
///
/// # Safety
///
/// A pointer to `Self` must be a valid pointer to `A`. The two blanket
/// impls below are the only implementations.
pub unsafe trait Inherits<A: Class, P>: Class {}

// SAFETY: identity.
unsafe impl<C: Class> Inherits<C, Here> for C {}

// SAFETY: `C::Base` sits at offset zero of `C`, and `C::Base` inherits `A`.
unsafe impl<C, A, P> Inherits<A, There<P>> for C
where
    C: Derived,
    A: Class,
    C::Base: Inherits<A, P>,
{
}

/// Views `this` as its ancestor `A`.
pub fn upcast<C, A, P>(this: &C) -> &A
where
    C: Inherits<A, P>,
    A: Class,
{
    // SAFETY: `Inherits` guarantees `A` is a prefix of `C`.
    unsafe { &*std::ptr::from_ref(this).cast::<A>() }
}

/// Views `this` mutably as its ancestor `A`.
pub fn upcast_mut<C, A, P>(this: &mut C) -> &mut A
where
    C: Inherits<A, P>,
    A: Class,
{
    // SAFETY: `Inherits` guarantees `A` is a prefix of `C`.
    unsafe { &mut *std::ptr::from_mut(this).cast::<A>() }
}

// SAFETY: `Object` is `#[repr(C)]` and has no ancestor.
unsafe impl Class for Object {
    const NAME: &'static str = "Object";
    const DEPTH: usize = 0;
    const MEMBERS: &'static [&'static str] = &[];

    fn object(&self) -> &Object {
        self
    }

    fn object_mut(&mut self) -> &mut Object {
        self
    }

    fn install_chain(&mut self) {
        self.mark_live();
    }

    fn finalize_chain(&mut self, _is_base: bool) {
        self.release();
    }

    fn describe_chain(chain: &mut Vec<ChainLink>) {
        chain.push(ChainLink::of::<Self>());
    }

    fn descends_from(class: TypeId) -> bool {
        class == TypeId::of::<Self>()
    }
}

impl Behavior for Object {
    type Args = ();

    fn init(&mut self, _is_base: bool, (): ()) {}
}

/// Declares a class.
///
/// ```text
/// class! {
///     /// docs and attributes
///     pub struct Name: Base {
///         pub field: Type,
///         pub slot: Method<Name, (Arg,), Ret>,
///         pub event: Event<Name, (Arg,)>,
///     }
/// }
/// ```
///
/// The macro adds the ancestor as a hidden `base` field, derives `Default`,
/// implements [`Class`] and [`Derived`], and makes the ancestor's members
/// reachable through `Deref`/`DerefMut`. Every field type must implement
/// `Default`. The class must also implement [`Behavior`].
#[macro_export]
macro_rules! class {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $base:ty {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $fty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(C)]
        #[derive(Default)]
        $vis struct $name {
            base: $base,
            $( $(#[$fmeta])* $fvis $field: $fty, )*
        }

        // SAFETY: `#[repr(C)]` with the ancestor as the first field.
        unsafe impl $crate::Class for $name {
            const NAME: &'static str = ::core::stringify!($name);
            const DEPTH: usize = <$base as $crate::Class>::DEPTH + 1;
            const MEMBERS: &'static [&'static str] = &[$(::core::stringify!($field)),*];

            fn object(&self) -> &$crate::Object {
                $crate::Class::object(&self.base)
            }

            fn object_mut(&mut self) -> &mut $crate::Object {
                $crate::Class::object_mut(&mut self.base)
            }

            fn install_chain(&mut self) {
                $crate::Class::install_chain(&mut self.base);
                $crate::Behavior::install(self);
            }

            fn finalize_chain(&mut self, is_base: bool) {
                $crate::Behavior::fini(self, is_base);
                $crate::Class::finalize_chain(&mut self.base, true);
            }

            fn describe_chain(chain: &mut ::std::vec::Vec<$crate::runtime::class::ChainLink>) {
                <$base as $crate::Class>::describe_chain(chain);
                chain.push($crate::runtime::class::ChainLink::of::<Self>());
            }

            fn descends_from(class: ::core::any::TypeId) -> bool {
                class == ::core::any::TypeId::of::<Self>()
                    || <$base as $crate::Class>::descends_from(class)
            }
        }

        // SAFETY: `base` is the first field.
        unsafe impl $crate::Derived for $name {
            type Base = $base;

            fn base(&self) -> &$base {
                &self.base
            }

            fn base_mut(&mut self) -> &mut $base {
                &mut self.base
            }
        }

        impl ::core::ops::Deref for $name {
            type Target = $base;

            fn deref(&self) -> &$base {
                &self.base
            }
        }

        impl ::core::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut $base {
                &mut self.base
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class;

    class! {
        struct Animal: Object {
            legs: u32,
        }
    }

    impl Behavior for Animal {
        type Args = (u32,);

        fn init(&mut self, _is_base: bool, (legs,): (u32,)) {
            self.legs = legs;
        }
    }

    class! {
        struct Dog: Animal {
            name: &'static str,
        }
    }

    impl Behavior for Dog {
        type Args = (&'static str,);

        fn init(&mut self, _is_base: bool, (name,): (&'static str,)) {
            self.init_base((4,));
            self.name = name;
        }
    }

    class! {
        struct Puppy: Dog {}
    }

    impl Behavior for Puppy {
        type Args = ();

        fn init(&mut self, _is_base: bool, (): ()) {}
    }

    #[test]
    fn test_depth_and_names() {
        assert_eq!(Object::DEPTH, 0);
        assert_eq!(Animal::DEPTH, 1);
        assert_eq!(Dog::DEPTH, 2);
        assert_eq!(Puppy::DEPTH, 3);
        assert_eq!(Dog::NAME, "Dog");
        assert_eq!(Animal::MEMBERS, &["legs"]);
        assert!(Puppy::MEMBERS.is_empty());
    }

    #[test]
    fn test_describe_chain_is_root_first() {
        let mut chain = Vec::new();
        Puppy::describe_chain(&mut chain);
        let names: Vec<_> = chain.iter().map(|link| link.name).collect();
        assert_eq!(names, ["Object", "Animal", "Dog", "Puppy"]);
    }

    #[test]
    fn test_upcast_shares_fields() {
        let mut dog = Dog::default();
        dog.legs = 3;
        dog.name = "rex";

        let animal: &Animal = dog.upcast();
        assert_eq!(animal.legs, 3);

        let animal: &mut Animal = upcast_mut(&mut dog);
        animal.legs = 4;
        assert_eq!(dog.legs, 4);

        let object: &Object = dog.upcast();
        assert!(std::ptr::eq(object, dog.object()));
    }

    #[test]
    fn test_descends_from_walks_ancestors() {
        assert!(Puppy::descends_from(TypeId::of::<Puppy>()));
        assert!(Puppy::descends_from(TypeId::of::<Animal>()));
        assert!(Puppy::descends_from(TypeId::of::<Object>()));
        assert!(!Animal::descends_from(TypeId::of::<Dog>()));
    }

    #[test]
    fn test_empty_class_is_distinct_type() {
        assert_ne!(
            std::any::TypeId::of::<Puppy>(),
            std::any::TypeId::of::<Dog>()
        );
        assert_eq!(std::mem::size_of::<Puppy>(), std::mem::size_of::<Dog>());
    }

    #[test]
    fn test_init_base_runs_ancestor_step() {
        let mut dog = Dog::default();
        Behavior::init(&mut dog, false, ("fido",));
        assert_eq!(dog.legs, 4);
        assert_eq!(dog.name, "fido");
    }
}
