//! Error types for the `classy` runtime.
//!
//! Construction and async invocation are the only fallible operations of the
//! object model. Destroying an instance twice is not an error: the second
//! call is a defined no-op.

use std::fmt;

/// Errors that can occur in the `classy` runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The allocator could not provide memory for a new instance.
    AllocationFailure {
        /// Class being constructed.
        class: &'static str,
        /// Size of the full instance layout in bytes.
        size: usize,
    },

    /// The ancestor chain of a class is deeper than the configured limit.
    InheritanceDepthExceeded {
        /// Class being constructed.
        class: &'static str,
        /// Number of ancestors between the class and the root.
        depth: usize,
        /// Configured maximum depth.
        limit: usize,
    },

    /// A class declares a member whose name an ancestor already declares.
    DuplicateMember {
        /// Class redeclaring the member.
        class: &'static str,
        /// Name of the member.
        member: &'static str,
        /// Ancestor that declared it first.
        ancestor: &'static str,
    },

    /// An async method could not start its worker thread.
    WorkerSpawnFailure {
        /// Class of the receiver.
        class: &'static str,
        /// Reason reported by the platform.
        reason: String,
    },

    /// The instance is not live: it was never constructed or is destroyed.
    InstanceNotLive {
        /// Class of the instance.
        class: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AllocationFailure { class, size } => {
                write!(f, "Failed to allocate {size} bytes for an instance of {class}")
            }
            Error::InheritanceDepthExceeded { class, depth, limit } => {
                write!(f, "Class {class} has inheritance depth {depth}, limit is {limit}")
            }
            Error::DuplicateMember {
                class,
                member,
                ancestor,
            } => {
                write!(f, "Class {class} redeclares member `{member}` already declared by {ancestor}")
            }
            Error::WorkerSpawnFailure { class, reason } => {
                write!(f, "Failed to spawn async worker for {class}: {reason}")
            }
            Error::InstanceNotLive { class } => {
                write!(f, "Instance of {class} is not live")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result type for `classy` runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
