//! Domain records shared by the admin modules.
//!
//! # Responsibility
//! - Define the typed rows each gateway reads and writes.
//! - Own the record-level validation rules enforced before persistence.
//!
//! # Invariants
//! - Every record is identified by an auto-increment `RecordId`.
//! - Enum values map one-to-one onto the string values stored in SQLite.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Declares string conversions for an enum stored as SQLite text.
macro_rules! db_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stable string value stored in SQLite.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parses the stored string value.
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
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

pub mod care;
pub mod document;
pub mod finance;
pub mod photo;
pub mod sync;

/// Auto-increment primary key of any module table.
pub type RecordId = i64;
/// Host `person.personID`.
pub type PersonId = i64;
/// Host `family.familyID`.
pub type FamilyId = i64;
/// Host `schoolYear.schoolYearID`.
pub type SchoolYearId = i64;

/// Host role of the person acting on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Staff,
    Admin,
    Parent,
    Student,
}

db_enum!(Role {
    Staff => "Staff",
    Admin => "Admin",
    Parent => "Parent",
    Student => "Student",
});

/// Record-level validation failures raised before any SQL mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field is blank.
    EmptyField(&'static str),
    /// An end value precedes its start value.
    InvalidRange {
        field: &'static str,
        details: String,
    },
    /// A monetary amount breaks its sign or sum rule.
    InvalidAmount(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::InvalidRange { field, details } => {
                write!(f, "{field} has an invalid range: {details}")
            }
            Self::InvalidAmount(details) => write!(f, "invalid amount: {details}"),
        }
    }
}

impl Error for ValidationError {}

/// Rejects blank text for required columns.
pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}
