//! Construction and destruction pipelines.
//!
//! # Architecture
//!
//! Construction runs `Allocate -> InstallStructure -> RunUserInit`:
//!
//! 1. **Allocate**: [`new_alloc`] obtains zeroed heap memory for the full
//!    layout; [`new_inplace`] resets caller-provided memory to the
//!    zero/default state. A failed allocation stops the pipeline and nothing
//!    else runs.
//! 2. **InstallStructure**: every class's `install` runs root first, so the
//!    most derived binding of each dispatch slot survives. The root marks
//!    the instance live, and the instance lock is created once the whole
//!    slot table is in place.
//! 3. **RunUserInit**: the class's `init` runs with `is_base = false`. It may
//!    run its ancestor's initializer as an ancestor step through
//!    [`Derived::init_base`](crate::Derived::init_base).
//!
//! Destruction ([`destroy`]) is idempotent: only a live instance is
//! finalized. Cleanup runs most derived first, then each ancestor with
//! `is_base = true`, and the root finally releases the lock and marks the
//! instance destroyed.
//!
//! # Ownership
//!
//! Heap instances are plain `Box`es owned by whoever received them; release
//! them with [`destroy_free`]. [`Owned`], [`Scoped`] and [`Shared`] add
//! destroy-on-drop on top of the pipelines.
//!
//! Construction records the instance's address. An instance moved by value
//! afterwards must be [`rebind`]-ed before slots are called on it again;
//! [`Scoped`] and [`Shared`] do this themselves whenever they hand out
//! exclusive access.

use crate::config;
use crate::error::{Error, Result};
use crate::runtime::class::{Behavior, Class};
use crate::runtime::object::Object;
use crate::runtime::registry;
use classy_log::{error, trace};
use std::alloc::{self, Layout};
use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::Arc;

/// Rejects classes the runtime configuration does not admit.
fn admit<C: Class>() -> Result<()> {
    #[cfg(feature = "static-depth-check")]
    let () = C::DEPTH_WITHIN_LIMIT;

    if config::get().runtime_checks {
        registry::validate::<C>()?;
    }
    Ok(())
}

/// Runs structure installation and user initialization on zeroed memory.
fn build<C: Class>(instance: &mut C, args: C::Args) {
    Object::settle(instance);
    instance.install_chain();
    instance.object_mut().install_lock();
    Behavior::init(instance, false, args);
    trace!("constructed {} at {:p}", C::NAME, instance);
}

/// Constructs an instance of `C` on the heap.
///
/// # Arguments
///
/// * `args` - Constructor arguments, as declared by `C`'s [`Behavior`]
///
/// # Returns
///
/// The live instance. Every dispatch slot holds its most derived binding and
/// the instance lock is ready.
///
/// # Errors
///
/// - [`Error::InheritanceDepthExceeded`] / [`Error::DuplicateMember`] if `C`
///   fails validation on first construction
/// - [`Error::AllocationFailure`] if no memory is available
///
/// No partially constructed instance is ever returned.
pub fn new_alloc<C: Class>(args: C::Args) -> Result<Box<C>> {
    admit::<C>()?;

    let value = C::default();
    let layout = Layout::new::<C>();
    // SAFETY: every class contains `Object`, so the layout is non-zero.
    let raw = unsafe { alloc::alloc_zeroed(layout) }.cast::<C>();
    let Some(ptr) = NonNull::new(raw) else {
        error!("allocation of {} bytes for {} failed", layout.size(), C::NAME);
        return Err(Error::AllocationFailure {
            class: C::NAME,
            size: layout.size(),
        });
    };

    // SAFETY: `ptr` is a fresh allocation with `C`'s layout from the global
    // allocator, which is exactly what `Box::from_raw` expects once a value
    // has been written.
    let mut instance = unsafe {
        ptr.as_ptr().write(value);
        Box::from_raw(ptr.as_ptr())
    };
    build(&mut *instance, args);
    Ok(instance)
}

/// Constructs an instance of `C` in caller-provided memory.
///
/// `target` is reset to the zero/default state first, whatever it held
/// before; a previous live instance there is overwritten without running its
/// cleanup.
///
/// # Errors
///
/// Returns the same validation errors as [`new_alloc`]; `target` is left
/// untouched in that case.
pub fn new_inplace<C: Class>(target: &mut C, args: C::Args) -> Result<&mut C> {
    admit::<C>()?;

    *target = C::default();
    build(target, args);
    Ok(target)
}

/// Records the current address of an instance that was moved by value.
///
/// Dispatch slots and events only run on an instance found where its
/// identity was recorded. The instance is recorded as exactly `C`, so
/// rebinding through an ancestor view makes bindings installed by
/// descendants of `C` unusable until the instance is rebound as its own
/// class.
pub fn rebind<C: Class>(instance: &mut C) {
    Object::settle(instance);
}

/// Destroys an instance without releasing its memory.
///
/// Runs cleanup most derived first, then releases the lock. Destroying an
/// instance that is not live (never constructed, or already destroyed) does
/// nothing.
pub fn destroy<C: Class>(instance: &mut C) {
    if !instance.object().is_live() {
        return;
    }

    instance.object_mut().begin_finalize();
    instance.finalize_chain(false);
    trace!("destroyed {} at {:p}", C::NAME, instance);
}

/// Destroys a heap instance, releases its memory and clears the handle.
///
/// Calling this again on the cleared handle does nothing.
pub fn destroy_free<C: Class>(handle: &mut Option<Box<C>>) {
    if let Some(mut instance) = handle.take() {
        destroy(&mut *instance);
    }
}

/// Heap instance destroyed and released when dropped.
pub struct Owned<C: Class> {
    instance: ManuallyDrop<Box<C>>,
}

impl<C: Class> Owned<C> {
    /// Constructs an instance of `C` on the heap.
    ///
    /// # Errors
    ///
    /// See [`new_alloc`].
    pub fn new(args: C::Args) -> Result<Self> {
        new_alloc(args).map(Self::from_box)
    }

    /// Takes over an instance returned by [`new_alloc`].
    #[must_use]
    pub fn from_box(mut instance: Box<C>) -> Self {
        rebind(&mut *instance);
        Owned {
            instance: ManuallyDrop::new(instance),
        }
    }

    /// Gives up destroy-on-drop and returns the raw heap instance.
    #[must_use]
    pub fn into_box(self) -> Box<C> {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the box is moved out once.
        unsafe { ManuallyDrop::take(&mut this.instance) }
    }
}

impl<C: Class> Deref for Owned<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.instance
    }
}

impl<C: Class> DerefMut for Owned<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.instance
    }
}

impl<C: Class> Drop for Owned<C> {
    fn drop(&mut self) {
        destroy(&mut **self.instance);
        // SAFETY: dropped exactly once, here.
        unsafe { ManuallyDrop::drop(&mut self.instance) };
    }
}

impl<C: Class + fmt::Debug> fmt::Debug for Owned<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owned").field(&**self.instance).finish()
    }
}

/// Inline instance destroyed when dropped.
pub struct Scoped<C: Class> {
    instance: C,
}

impl<C: Class> Scoped<C> {
    /// Constructs an instance of `C` inline.
    ///
    /// # Errors
    ///
    /// See [`new_inplace`].
    pub fn new(args: C::Args) -> Result<Self> {
        let mut instance = C::default();
        new_inplace(&mut instance, args)?;
        Ok(Scoped { instance })
    }

    /// Takes over an instance built with [`new_inplace`].
    #[must_use]
    pub fn adopt(instance: C) -> Self {
        Scoped { instance }
    }
}

impl<C: Class> Deref for Scoped<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.instance
    }
}

impl<C: Class> DerefMut for Scoped<C> {
    fn deref_mut(&mut self) -> &mut C {
        // the handle moves with the instance inside it
        rebind(&mut self.instance);
        &mut self.instance
    }
}

impl<C: Class> Drop for Scoped<C> {
    fn drop(&mut self) {
        destroy(&mut **self);
    }
}

impl<C: Class + fmt::Debug> fmt::Debug for Scoped<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Scoped").field(&self.instance).finish()
    }
}

/// Instance shared between threads.
///
/// Clones hand out the same instance. The last clone to be dropped destroys
/// it, on whichever thread that happens.
pub struct Shared<C: Class> {
    instance: ManuallyDrop<Arc<C>>,
}

impl<C: Class> Shared<C> {
    /// Constructs an instance of `C` on the heap for sharing.
    ///
    /// # Errors
    ///
    /// See [`new_alloc`].
    pub fn new(args: C::Args) -> Result<Self> {
        new_alloc(args).map(Self::from_box)
    }

    /// Takes over an instance returned by [`new_alloc`].
    #[must_use]
    pub fn from_box(instance: Box<C>) -> Self {
        Shared {
            instance: ManuallyDrop::new(Arc::from(instance)),
        }
    }

    /// Returns `true` if both handles share one instance.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.instance, &other.instance)
    }

    /// Returns the number of handles sharing the instance.
    #[must_use]
    pub fn handle_count(this: &Self) -> usize {
        Arc::strong_count(&this.instance)
    }

    /// Returns the instance mutably if this is the only handle.
    pub fn get_mut(this: &mut Self) -> Option<&mut C> {
        let instance = Arc::get_mut(&mut this.instance)?;
        rebind(instance);
        Some(instance)
    }
}

impl<C: Class> Clone for Shared<C> {
    fn clone(&self) -> Self {
        Shared {
            instance: ManuallyDrop::new(Arc::clone(&self.instance)),
        }
    }
}

impl<C: Class> Deref for Shared<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.instance
    }
}

impl<C: Class> Drop for Shared<C> {
    fn drop(&mut self) {
        // SAFETY: dropped exactly once, here.
        let instance = unsafe { ManuallyDrop::take(&mut self.instance) };
        if let Some(mut last) = Arc::into_inner(instance) {
            rebind(&mut last);
            destroy(&mut last);
        }
    }
}

impl<C: Class + fmt::Debug> fmt::Debug for Shared<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&**self.instance).finish()
    }
}
