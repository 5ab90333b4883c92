//! Recipe format implementations.
//!
//! Format-specific implementations of the
//! [`RecipeFormat`](crate::harvest::RecipeFormat) trait.

pub mod bitbake;

pub use bitbake::BitBake;
