//! Domain records and their row mappings

use crate::error::{Result, StoreError};
use uuid::Uuid;

/// Declares a closed set of string-valued labels stored as TEXT.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Every value, in declaration order
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            /// Stored label
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, String> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(format!("invalid {}: {}", stringify!($name), other)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
pub(crate) use text_enum;

mod child;
mod community;
mod development;
mod user;

pub use child::*;
pub use community::*;
pub use development::*;
pub use user::*;

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StoreError::InvalidData(format!("invalid {} id: {}", what, e)))
}

pub(crate) fn parse_label<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T> {
    raw.parse().map_err(StoreError::InvalidData)
}

/// Check a trimmed text length in characters
pub(crate) fn check_len(
    errors: &mut crate::error::FieldErrors,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.trim().chars().count();
    if len < min || len > max {
        if min > 0 && len == 0 {
            errors.add(field, "This field may not be blank.");
        } else {
            errors.add(
                field,
                format!("Must be between {} and {} characters.", min, max),
            );
        }
    }
}
