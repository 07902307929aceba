//! Pure Rust runtime for Spine 4.2 exported skeletons (unofficial).
//!
//! Loads `.skel` and `.json` exports into an immutable [`SkeletonData`], poses [`Skeleton`]
//! instances with [`AnimationState`], and leaves rendering to the host.

#![forbid(unsafe_code)]

mod atlas;
mod error;
mod geometry;
#[cfg(any(feature = "json", feature = "binary"))]
mod loader;
mod model;
mod runtime;
mod version;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "binary")]
pub mod binary;

pub use atlas::*;
pub use error::*;
pub use geometry::*;
pub use model::*;
pub use runtime::*;
pub use version::*;

#[cfg(test)]
mod geometry_tests;

#[cfg(all(test, feature = "json"))]
mod json_tests;

#[cfg(all(test, feature = "binary", feature = "json"))]
mod binary_tests;
