mod animation;
mod animation_state;
mod constraint;
mod curve;
mod skeleton;
mod timeline;

pub use animation::*;
pub use animation_state::*;
pub use curve::{CurveFrames, search, search1};
pub use skeleton::*;
pub use timeline::*;

#[cfg(test)]
mod timeline_tests;

#[cfg(test)]
mod skeleton_tests;

#[cfg(test)]
mod animation_state_tests;

#[cfg(all(test, feature = "json"))]
mod animation_state_scenario_tests;
