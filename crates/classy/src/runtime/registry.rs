//! Class validation registry.
//!
//! Classes are described statically by the [`class!`](crate::class) macro;
//! the registry checks each description once, the first time an instance
//! of the class is constructed, and remembers the result.
//!
//! Checks performed:
//!
//! - the ancestor chain is no deeper than
//!   [`Config::max_inheritance_depth`](crate::Config::max_inheritance_depth),
//! - no class redeclares a member name an ancestor already declares. A
//!   redeclared field would compile, but it would shadow the ancestor's
//!   field through `Deref` and split one logical member in two.
//!
//! # Thread Safety
//!
//! The table is an `FxHashMap` behind a `parking_lot::RwLock`. Lookups on
//! the construction fast path only take the read lock. Descriptors are
//! leaked and live for the rest of the program, like the classes they
//! describe.

use crate::config;
use crate::error::{Error, Result};
use crate::runtime::class::{ChainLink, Class};
use classy_log::{error, trace};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::TypeId;
use std::sync::OnceLock;

/// Validated description of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    /// Class name.
    pub name: &'static str,
    /// Number of ancestors between the class and the root.
    pub depth: usize,
    /// The ancestor chain, root first, ending with the class itself.
    pub chain: Vec<ChainLink>,
}

impl ClassDescriptor {
    /// Describes class `C`.
    #[must_use]
    pub fn of<C: Class>() -> Self {
        let mut chain = Vec::with_capacity(C::DEPTH + 1);
        C::describe_chain(&mut chain);
        ClassDescriptor {
            name: C::NAME,
            depth: C::DEPTH,
            chain,
        }
    }

    /// Returns the name of the immediate ancestor, or `None` for the root.
    #[must_use]
    pub fn base_name(&self) -> Option<&'static str> {
        self.chain.iter().rev().nth(1).map(|link| link.name)
    }

    /// Returns `true` if `name` appears in the ancestor chain.
    #[must_use]
    pub fn inherits_from(&self, name: &str) -> bool {
        self.chain.iter().any(|link| link.name == name)
    }

    /// Returns every member visible in the class, root first.
    pub fn members(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.chain.iter().flat_map(|link| link.members.iter().copied())
    }

    fn validate(&self, limit: usize) -> Result<()> {
        if self.depth > limit {
            return Err(Error::InheritanceDepthExceeded {
                class: self.name,
                depth: self.depth,
                limit,
            });
        }

        for (index, link) in self.chain.iter().enumerate() {
            for &member in link.members {
                let earlier = self.chain[..index]
                    .iter()
                    .find(|ancestor| ancestor.members.contains(&member));
                if let Some(ancestor) = earlier {
                    return Err(Error::DuplicateMember {
                        class: link.name,
                        member,
                        ancestor: ancestor.name,
                    });
                }
            }
        }

        Ok(())
    }
}

type Table = RwLock<FxHashMap<TypeId, &'static ClassDescriptor>>;

static REGISTRY: OnceLock<Table> = OnceLock::new();

fn table() -> &'static Table {
    REGISTRY.get_or_init(|| RwLock::new(FxHashMap::default()))
}

/// Validates class `C`, registering it on success.
///
/// Returns immediately if `C` was already accepted. Failures are reported
/// through the diagnostic log and are not cached, so every construction
/// attempt of a rejected class fails the same way.
///
/// # Errors
///
/// Returns [`Error::InheritanceDepthExceeded`] or [`Error::DuplicateMember`].
pub fn validate<C: Class>() -> Result<&'static ClassDescriptor> {
    let key = TypeId::of::<C>();
    if let Some(descriptor) = table().read().get(&key).copied() {
        return Ok(descriptor);
    }

    let descriptor = ClassDescriptor::of::<C>();
    if let Err(err) = descriptor.validate(config::get().max_inheritance_depth) {
        error!("{err}");
        return Err(err);
    }

    let mut classes = table().write();
    let entry = classes.entry(key).or_insert_with(|| {
        trace!("registered class {} at depth {}", descriptor.name, descriptor.depth);
        Box::leak(Box::new(descriptor))
    });
    Ok(*entry)
}

/// Returns the descriptor of `C` if it has been validated.
#[must_use]
pub fn descriptor<C: Class>() -> Option<&'static ClassDescriptor> {
    table().read().get(&TypeId::of::<C>()).copied()
}

/// Returns `true` if `C` has been validated.
#[must_use]
pub fn is_registered<C: Class>() -> bool {
    descriptor::<C>().is_some()
}
