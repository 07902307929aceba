use crate::{Event, Skeleton, Timeline};
use std::collections::HashSet;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixBlend {
    /// Transitions from the setup value to the timeline value.
    Setup,
    /// Transitions from the current value to the timeline value, falling back to setup
    /// before the first key. Used by the lowest track touching a property.
    First,
    /// Transitions from the current value to the timeline value.
    Replace,
    /// Adds the timeline value to the current value.
    Add,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixDirection {
    In,
    Out,
}

/// Skeleton property a timeline drives.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Property {
    Rotate,
    X,
    Y,
    ScaleX,
    ScaleY,
    ShearX,
    ShearY,
    Inherit,
    Rgb,
    Alpha,
    Rgb2,
    Attachment,
    Deform,
    Event,
    DrawOrder,
    IkConstraint,
    TransformConstraint,
    PathConstraintPosition,
    PathConstraintSpacing,
    PathConstraintMix,
    PhysicsConstraintInertia,
    PhysicsConstraintStrength,
    PhysicsConstraintDamping,
    PhysicsConstraintMass,
    PhysicsConstraintWind,
    PhysicsConstraintGravity,
    PhysicsConstraintMix,
    PhysicsConstraintReset,
    Sequence,
}

/// Identifies one property of one skeleton object. Two timelines with an equal id fight
/// over the same value when animations are mixed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PropertyId {
    pub property: Property,
    /// Bone, slot or constraint index; `None` for skeleton wide properties.
    pub target: Option<usize>,
    /// Attachment for deform and sequence timelines.
    pub attachment: Option<usize>,
}

impl PropertyId {
    pub const fn new(property: Property, target: usize) -> Self {
        Self {
            property,
            target: Some(target),
            attachment: None,
        }
    }

    pub const fn global(property: Property) -> Self {
        Self {
            property,
            target: None,
            attachment: None,
        }
    }

    pub const fn with_attachment(property: Property, slot: usize, attachment: usize) -> Self {
        Self {
            property,
            target: Some(slot),
            attachment: Some(attachment),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    pub duration: f32,
    timelines: Vec<Timeline>,
    timeline_ids: HashSet<PropertyId>,
}

impl Animation {
    pub fn new(name: impl Into<String>, timelines: Vec<Timeline>, duration: f32) -> Self {
        let timeline_ids = timelines.iter().flat_map(Timeline::property_ids).collect();
        Self {
            name: name.into(),
            duration,
            timelines,
            timeline_ids,
        }
    }

    pub fn timelines(&self) -> &[Timeline] {
        &self.timelines
    }

    pub fn timeline_ids(&self) -> &HashSet<PropertyId> {
        &self.timeline_ids
    }

    /// True when any timeline drives one of `ids`.
    pub fn has_timeline(&self, ids: &[PropertyId]) -> bool {
        ids.iter().any(|id| self.timeline_ids.contains(id))
    }

    /// Applies every timeline for the window `(last_time, time]`. Looping wraps both times
    /// into the duration; event timelines detect the wrap and fire across it.
    ///
    /// `events` collects fired events, pass `None` to ignore them.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        mut last_time: f32,
        mut time: f32,
        looped: bool,
        mut events: Option<&mut Vec<Event>>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        if looped && self.duration != 0.0 {
            time %= self.duration;
            if last_time > 0.0 {
                last_time %= self.duration;
            }
        }
        for timeline in &self.timelines {
            timeline.apply(
                skeleton,
                last_time,
                time,
                events.as_deref_mut(),
                alpha,
                blend,
                direction,
            );
        }
    }
}
