//! Type-safe index wrappers for arena entities.
//!
//! Blocks, caches and robots live in indexed containers owned by the arena
//! (or by the simulation, for robots). Every other component refers to them
//! through these newtypes, so a stale reference can at worst fail a lookup;
//! it can never dangle.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around a `u32` index with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $prefix:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// Create an identifier from a raw index.
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Return the raw index.
            pub const fn index(self) -> u32 {
                self.0
            }

            /// Return the raw index as a `usize` for container lookups.
            pub fn as_usize(self) -> usize {
                usize::try_from(self.0).unwrap_or(usize::MAX)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl From<u32> for $name {
            fn from(index: u32) -> Self {
                Self(index)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Index of a block in the arena's block table.
    BlockId, "block"
}

define_id! {
    /// Index of a cache in the arena's cache table.
    CacheId, "cache"
}

define_id! {
    /// Index of a robot in the simulation's robot table.
    RobotId, "fb"
}

/// A reference to the entity occupying a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    /// A single free block.
    Block(BlockId),
    /// A cache of blocks.
    Cache(CacheId),
}

impl EntityRef {
    /// Return the block ID if this is a block reference.
    pub const fn block(self) -> Option<BlockId> {
        match self {
            Self::Block(id) => Some(id),
            Self::Cache(_) => None,
        }
    }

    /// Return the cache ID if this is a cache reference.
    pub const fn cache(self) -> Option<CacheId> {
        match self {
            Self::Cache(id) => Some(id),
            Self::Block(_) => None,
        }
    }
}

impl core::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Block(id) => write!(f, "{id}"),
            Self::Cache(id) => write!(f, "{id}"),
        }
    }
}
