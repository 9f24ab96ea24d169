//! Boundaries - components that catch what their descendants throw.
//!
//! - [`Suspense`] catches pending values and renders a fallback until they
//!   settle
//! - error boundaries (any class returning true from `catches_errors`)
//!   catch render errors

mod error;
mod suspense;

pub use error::*;
pub use suspense::*;
