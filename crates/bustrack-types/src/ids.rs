//! Type-safe identifier wrappers around the numeric keys the feed uses.
//!
//! Every entity exchanged with the feed carries a database-assigned integer
//! key. Wrapping each one in its own newtype keeps vehicle ids from being
//! mixed up with route or stop ids at compile time.
//!
//! Ids deserialize leniently: the route-scoped channel echoes its route id
//! from the URL, so the same key may arrive as `3` or `"3"`.

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::lenient::NumberOrText;

/// Generates a newtype wrapper around `u32` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub u32);

        impl $name {
            /// Return the inner numeric key.
            pub const fn into_inner(self) -> u32 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl core::str::FromStr for $name {
            type Err = core::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match NumberOrText::<u32>::deserialize(deserializer)? {
                    NumberOrText::Number(n) => Ok(Self(n)),
                    NumberOrText::Text(s) => s.parse().map_err(D::Error::custom),
                }
            }
        }
    };
}

define_id! {
    /// Unique identifier for a bus (the roster key).
    VehicleId
}

define_id! {
    /// Unique identifier for a route.
    RouteId
}

define_id! {
    /// Unique identifier for a stop on a route.
    StopId
}

define_id! {
    /// Unique identifier for a single recorded location fix.
    LocationId
}
