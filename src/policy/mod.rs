//! Package admission policy
//!
//! This module decides which packages may be loaded, based on include and
//! exclude lists of name/version specifiers.

pub mod matcher;
pub mod specifier;

pub use matcher::{is_matched, AdmissionPolicy};
pub use specifier::{PackageSpecifier, Pattern};
