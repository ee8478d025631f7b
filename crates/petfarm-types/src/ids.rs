//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every document in the record store has a strongly-typed ID so a pet id
//! can never be passed where a player id is expected. All IDs use UUID v7
//! (time-ordered) for efficient index locality.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a pet.
    PetId
}

define_id! {
    /// Unique identifier for a pet type (species definition).
    PetTypeId
}

define_id! {
    /// Unique identifier for a player.
    PlayerId
}

define_id! {
    /// Unique identifier for a poop attached to a pet.
    PoopId
}

define_id! {
    /// Unique identifier for a store catalog item.
    StoreItemId
}

define_id! {
    /// Unique identifier for a token ledger entry.
    LedgerEntryId
}

define_id! {
    /// Client-supplied identifier for one inbound request.
    ///
    /// A reconnecting client resends the same id, which lets handlers
    /// answer a repeated request without applying it twice.
    RequestId
}
