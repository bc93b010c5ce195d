//! Per-instance locking and async methods.
//!
//! # Locking
//!
//! Every live instance owns a reentrant lock, created by the construction
//! pipeline and released by the destruction pipeline. Taking it is up to
//! the caller: [`lock`] returns a [`LockGuard`], and dropping the guard (or
//! calling [`LockGuard::unlock`]) releases it on every exit path. Because
//! the lock is reentrant, a method holding it may call another method that
//! takes it again on the same thread.
//!
//! Plain fields stay advisory. State that async methods touch from several
//! threads goes into [`Guarded`] fields, which can only be reached with the
//! guard of the instance that contains them. When instances nest (a class
//! holding another class instance as a field), both locks enclose the inner
//! instance's fields; a `Guarded` field binds to the first lock it is
//! borrowed under, and every later borrow must come through that same lock.
//!
//! # Async methods
//!
//! [`spawn_async`] runs a method body on a detached worker thread and
//! returns an [`AsyncHandle`] immediately. The worker owns a bundle of the
//! receiver handle, the argument and the completion state; it drops the
//! bundle as soon as the body returns and then signals completion, so
//! [`AsyncHandle::join`] returning means the worker holds nothing any more.
//! There is no preemption: a body polls its [`CancelToken`] and returns
//! cooperatively.
//!
//! Without thread support (the `threads` feature is off, or
//! [`Config::threads`](crate::Config::threads) is `false`) the body runs
//! synchronously on the caller's thread and the returned handle is already
//! finished.
//!
//! # Example
//!
//! ```rust
//! use classy::{class, lock, spawn_async, Behavior, CancelToken, Guarded, Object, Shared};
//!
//! class! {
//!     pub struct Ticker: Object {
//!         pub ticks: Guarded<u32>,
//!     }
//! }
//!
//! impl Behavior for Ticker {
//!     type Args = ();
//!
//!     fn init(&mut self, _is_base: bool, (): ()) {}
//! }
//!
//! fn tick(ticker: &Ticker, times: u32, _cancel: &CancelToken) {
//!     for _ in 0..times {
//!         let guard = lock(ticker).unwrap();
//!         *ticker.ticks.borrow_mut(&guard) += 1;
//!     }
//! }
//!
//! let ticker = Shared::<Ticker>::new(()).unwrap();
//! let handle = spawn_async(&ticker, tick, 3).unwrap();
//! handle.join();
//!
//! let guard = lock(&*ticker).unwrap();
//! assert_eq!(*ticker.ticks.borrow(&guard), 3);
//! ```

use crate::config;
use crate::error::{Error, Result};
use crate::runtime::class::Class;
use crate::runtime::lifecycle::Shared;
use classy_log::{debug, error, trace};
use parking_lot::{Condvar, Mutex, ReentrantMutexGuard};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Proof that the current thread holds the lock of an instance of `C`.
pub struct LockGuard<'a, C: Class> {
    _held: ReentrantMutexGuard<'a, ()>,
    instance: &'a C,
    lock_id: usize,
}

impl<'a, C: Class> LockGuard<'a, C> {
    /// Returns the locked instance.
    #[must_use]
    pub fn instance(&self) -> &'a C {
        self.instance
    }

    /// Releases the lock.
    pub fn unlock(self) {}

    fn covers<T>(&self, field: &T) -> bool {
        let start = ptr::from_ref(self.instance) as usize;
        let end = start + mem::size_of::<C>();
        let addr = ptr::from_ref(field) as usize;
        (start..end).contains(&addr)
    }

    /// Address of the boxed lock, stable while the instance is live.
    fn lock_id(&self) -> usize {
        self.lock_id
    }
}

impl<C: Class> fmt::Debug for LockGuard<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("class", &C::NAME)
            .field("instance", &ptr::from_ref(self.instance))
            .finish()
    }
}

/// Acquires the lock of `instance`, blocking until it is available.
///
/// The lock is reentrant: the thread already holding it acquires it again
/// immediately.
///
/// # Errors
///
/// Returns [`Error::InstanceNotLive`] if the instance was never constructed
/// or has been destroyed.
pub fn lock<C: Class>(instance: &C) -> Result<LockGuard<'_, C>> {
    let Some(mutex) = instance.object().lock_handle() else {
        return Err(Error::InstanceNotLive { class: C::NAME });
    };
    Ok(LockGuard {
        _held: mutex.lock(),
        instance,
        lock_id: ptr::from_ref(mutex) as usize,
    })
}

/// Acquires the lock of `instance` if no other thread holds it.
///
/// # Errors
///
/// Returns [`Error::InstanceNotLive`] if the instance was never constructed
/// or has been destroyed.
pub fn try_lock<C: Class>(instance: &C) -> Result<Option<LockGuard<'_, C>>> {
    let Some(mutex) = instance.object().lock_handle() else {
        return Err(Error::InstanceNotLive { class: C::NAME });
    };
    Ok(mutex.try_lock().map(|held| LockGuard {
        _held: held,
        instance,
        lock_id: ptr::from_ref(mutex) as usize,
    }))
}

/// Instance state reachable only while the instance lock is held.
///
/// # Panics
///
/// [`borrow`](Guarded::borrow) and [`borrow_mut`](Guarded::borrow_mut)
/// panic if the guard belongs to an instance that does not contain this
/// field, if the field is already bound to a different lock (nested
/// instances), or if the value is already borrowed incompatibly on the
/// current thread.
#[derive(Default)]
pub struct Guarded<T> {
    owner: AtomicUsize,
    value: RefCell<T>,
}

// SAFETY: shared access to `value` requires a `LockGuard` of an instance
// containing it, and the field binds to exactly one such lock, so at most
// one thread touches the `RefCell` at a time.
unsafe impl<T: Send> Sync for Guarded<T> {}

impl<T> Guarded<T> {
    /// Wraps `value`.
    pub const fn new(value: T) -> Self {
        Guarded {
            owner: AtomicUsize::new(0),
            value: RefCell::new(value),
        }
    }

    #[track_caller]
    fn admit<C: Class>(&self, guard: &LockGuard<'_, C>) {
        assert!(guard.covers(self), "Guarded field accessed with the lock of another instance");
        let id = guard.lock_id();
        let owner = match self.owner.compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => id,
            Err(bound) => bound,
        };
        assert!(owner == id, "Guarded field is bound to the lock of another enclosing instance");
    }

    /// Borrows the value under the instance lock.
    pub fn borrow<'g, C: Class>(&'g self, guard: &'g LockGuard<'_, C>) -> Ref<'g, T> {
        self.admit(guard);
        self.value.borrow()
    }

    /// Borrows the value mutably under the instance lock.
    pub fn borrow_mut<'g, C: Class>(&'g self, guard: &'g LockGuard<'_, C>) -> RefMut<'g, T> {
        self.admit(guard);
        self.value.borrow_mut()
    }

    /// Returns the value through exclusive access; no lock needed.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Unwraps the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T> fmt::Debug for Guarded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guarded { .. }")
    }
}

/// Completion and cancellation state shared by a worker and its handles.
struct WorkerState {
    done: Mutex<bool>,
    finished: Condvar,
    cancelled: AtomicBool,
}

impl WorkerState {
    fn new() -> Arc<Self> {
        Arc::new(WorkerState {
            done: Mutex::new(false),
            finished: Condvar::new(),
            cancelled: AtomicBool::new(false),
        })
    }

    fn finish(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.finished.notify_all();
    }
}

/// Signals completion when dropped, also when the body unwinds.
struct Completion(Arc<WorkerState>);

impl Drop for Completion {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Cooperative cancellation flag handed to async method bodies.
pub struct CancelToken {
    state: Arc<WorkerState>,
}

impl CancelToken {
    /// Returns `true` once cancellation was requested through the handle.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Joinable reference to an async method invocation.
#[derive(Clone)]
pub struct AsyncHandle {
    state: Arc<WorkerState>,
}

impl AsyncHandle {
    /// Blocks until the method body has returned.
    #[doc(alias = "await")]
    pub fn join(&self) {
        let mut done = self.state.done.lock();
        while !*done {
            self.state.finished.wait(&mut done);
        }
    }

    /// Blocks until the method body has returned or `timeout` elapsed.
    ///
    /// Returns `true` if the body finished.
    #[must_use]
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.state.done.lock();
        while !*done {
            if self.state.finished.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
        true
    }

    /// Returns `true` if the method body has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        *self.state.done.lock()
    }

    /// Asks the method body to stop at its next poll of the token.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }
}

impl fmt::Debug for AsyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("finished", &self.is_finished())
            .field("cancelled", &self.state.cancelled.load(Ordering::Relaxed))
            .finish()
    }
}

/// Body of an async method: receiver, argument, cancellation token.
pub type AsyncBody<C, A> = fn(&C, A, &CancelToken);

/// Everything a worker owns while the body runs.
struct Bundle<C: Class, A> {
    receiver: Shared<C>,
    arg: A,
    completion: Completion,
}

impl<C: Class, A> Bundle<C, A> {
    fn run(self, body: AsyncBody<C, A>) {
        let Bundle {
            receiver,
            arg,
            completion,
        } = self;
        let token = CancelToken {
            state: Arc::clone(&completion.0),
        };
        body(&receiver, arg, &token);
        drop(token);
        drop(receiver);
        drop(completion);
    }
}

fn threads_enabled() -> bool {
    cfg!(feature = "threads") && config::get().threads
}

/// Invokes `body` on `receiver` asynchronously.
///
/// # Returns
///
/// A handle to join or cancel the invocation.
///
/// # Errors
///
/// Returns [`Error::WorkerSpawnFailure`] if the worker thread could not be
/// started. The bundle is dropped in that case, so nothing leaks.
pub fn spawn_async<C, A>(receiver: &Shared<C>, body: AsyncBody<C, A>, arg: A) -> Result<AsyncHandle>
where
    C: Class + Send + Sync,
    A: Send + 'static,
{
    let state = WorkerState::new();
    let bundle = Bundle {
        receiver: receiver.clone(),
        arg,
        completion: Completion(Arc::clone(&state)),
    };

    if !threads_enabled() {
        debug!("threads disabled, running async {} body inline", C::NAME);
        bundle.run(body);
        return Ok(AsyncHandle { state });
    }

    let spawned = thread::Builder::new()
        .name(format!("{}-async", C::NAME))
        .spawn(move || bundle.run(body));

    match spawned {
        // The join handle is dropped: the worker runs detached.
        Ok(_) => {
            trace!("spawned async worker for {}", C::NAME);
            Ok(AsyncHandle { state })
        }
        Err(err) => {
            error!("could not spawn async worker for {}: {err}", C::NAME);
            Err(Error::WorkerSpawnFailure {
                class: C::NAME,
                reason: err.to_string(),
            })
        }
    }
}

/// Blocks the calling thread for `duration`.
pub fn sleep(duration: Duration) {
    thread::sleep(duration);
}
