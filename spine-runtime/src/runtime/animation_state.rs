use super::curve::{search1, signum};
use crate::{
    Animation, AttachmentTimeline, BoneTimeline, Error, Event, MixBlend, MixDirection,
    PropertyId, Skeleton, SkeletonData, Timeline,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{trace, warn};

const EMPTY_ANIMATION_NAME: &str = "<empty>";

// Slot attachment state relative to `unkeyed_state`.
const SETUP: u32 = 1;
const CURRENT: u32 = 2;

/// How a timeline of a mixing entry is applied, computed whenever the set of playing
/// animations changes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum TimelineMode {
    /// A lower track or older entry keys the property; mix from the current pose.
    Subsequent,
    /// First to key the property; mix from the setup pose.
    First,
    /// Hold the value while mixing out, since the next entry keys it too.
    HoldSubsequent,
    HoldFirst,
    /// Like `HoldFirst`, but fades as the entry after the holder mixes in.
    HoldMix,
}

/// Mix durations between pairs of animations.
#[derive(Clone, Debug)]
pub struct AnimationStateData {
    pub skeleton_data: Arc<SkeletonData>,
    /// Used when no duration was set for a pair.
    pub default_mix: f32,
    mixes: HashMap<(String, String), f32>,
}

impl AnimationStateData {
    pub fn new(skeleton_data: Arc<SkeletonData>) -> Self {
        Self {
            skeleton_data,
            default_mix: 0.0,
            mixes: HashMap::new(),
        }
    }

    pub fn set_mix(&mut self, from: &str, to: &str, duration: f32) -> Result<(), Error> {
        for name in [from, to] {
            if self.skeleton_data.find_animation(name).is_none() {
                return Err(Error::UnknownAnimation {
                    name: name.to_string(),
                });
            }
        }
        self.insert_mix(from, to, duration)
    }

    pub fn set_mix_by_index(&mut self, from: usize, to: usize, duration: f32) -> Result<(), Error> {
        let name = |index: usize| {
            self.skeleton_data
                .animations
                .get(index)
                .map(|a| a.name.clone())
                .ok_or_else(|| Error::UnknownAnimation {
                    name: format!("#{index}"),
                })
        };
        let (from, to) = (name(from)?, name(to)?);
        self.insert_mix(&from, &to, duration)
    }

    fn insert_mix(&mut self, from: &str, to: &str, duration: f32) -> Result<(), Error> {
        if duration.is_nan() || duration < 0.0 {
            return Err(Error::InvalidValue {
                message: format!("mix duration must be >= 0, got {duration}"),
            });
        }
        self.mixes
            .insert((from.to_string(), to.to_string()), duration);
        Ok(())
    }

    /// Mix duration from `from` to `to`, or `default_mix`.
    pub fn mix(&self, from: &Animation, to: &Animation) -> f32 {
        self.mixes
            .get(&(from.name.clone(), to.name.clone()))
            .copied()
            .unwrap_or(self.default_mix)
    }
}

/// Refers to a pooled [`TrackEntry`]. Stale once the entry is disposed; lookups then return
/// `None` even after the pool reuses the storage.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TrackEntryHandle {
    index: usize,
    generation: u32,
}

/// One animation scheduled on a track.
pub struct TrackEntry {
    animation: Arc<Animation>,
    track_index: usize,
    next: Option<TrackEntryHandle>,
    previous: Option<TrackEntryHandle>,
    mixing_from: Option<TrackEntryHandle>,
    mixing_to: Option<TrackEntryHandle>,
    listener: Option<Box<dyn TrackEntryListener>>,

    pub looped: bool,
    /// Keys the previous entry's values at full alpha while this one mixes in.
    pub hold_previous: bool,
    pub reverse: bool,
    pub shortest_rotation: bool,

    pub delay: f32,
    pub track_time: f32,
    pub(crate) track_last: f32,
    pub(crate) next_track_last: f32,
    /// Track time at which the entry ends; `f32::MAX` plays forever.
    pub track_end: f32,
    pub time_scale: f32,

    pub animation_start: f32,
    pub animation_end: f32,
    pub(crate) animation_last: f32,
    pub(crate) next_animation_last: f32,

    pub alpha: f32,
    pub mix_time: f32,
    mix_duration: f32,
    pub(crate) interrupt_alpha: f32,
    pub(crate) total_alpha: f32,
    pub mix_blend: MixBlend,

    /// Event timelines of the entry fire while mixing out until the mix reaches this value.
    pub event_threshold: f32,
    pub attachment_threshold: f32,
    /// Attachment timelines key slots only while the entry's alpha is at least this value.
    pub alpha_attachment_threshold: f32,
    pub draw_order_threshold: f32,

    timeline_mode: Vec<TimelineMode>,
    timeline_hold_mix: Vec<Option<TrackEntryHandle>>,
    timelines_rotation: Vec<f32>,
}

impl TrackEntry {
    fn new(animation: Arc<Animation>) -> Self {
        let mut entry = Self {
            animation,
            track_index: 0,
            next: None,
            previous: None,
            mixing_from: None,
            mixing_to: None,
            listener: None,
            looped: false,
            hold_previous: false,
            reverse: false,
            shortest_rotation: false,
            delay: 0.0,
            track_time: 0.0,
            track_last: -1.0,
            next_track_last: -1.0,
            track_end: f32::MAX,
            time_scale: 1.0,
            animation_start: 0.0,
            animation_end: 0.0,
            animation_last: -1.0,
            next_animation_last: -1.0,
            alpha: 1.0,
            mix_time: 0.0,
            mix_duration: 0.0,
            interrupt_alpha: 1.0,
            total_alpha: 0.0,
            mix_blend: MixBlend::Replace,
            event_threshold: 0.0,
            attachment_threshold: 0.0,
            alpha_attachment_threshold: 0.0,
            draw_order_threshold: 0.0,
            timeline_mode: Vec::new(),
            timeline_hold_mix: Vec::new(),
            timelines_rotation: Vec::new(),
        };
        entry.animation_end = entry.animation.duration;
        entry
    }

    /// Reinitializes a pooled entry, keeping buffer capacity.
    fn reset(&mut self, track_index: usize, animation: Arc<Animation>, looped: bool, mix_duration: f32) {
        let mut timeline_mode = std::mem::take(&mut self.timeline_mode);
        let mut timeline_hold_mix = std::mem::take(&mut self.timeline_hold_mix);
        let mut timelines_rotation = std::mem::take(&mut self.timelines_rotation);
        timeline_mode.clear();
        timeline_hold_mix.clear();
        timelines_rotation.clear();

        *self = Self::new(animation);
        self.track_index = track_index;
        self.looped = looped;
        self.mix_duration = mix_duration;
        self.timeline_mode = timeline_mode;
        self.timeline_hold_mix = timeline_hold_mix;
        self.timelines_rotation = timelines_rotation;
    }

    pub fn animation(&self) -> &Arc<Animation> {
        &self.animation
    }

    pub fn track_index(&self) -> usize {
        self.track_index
    }

    /// Entry queued after this one, if any.
    pub fn next(&self) -> Option<TrackEntryHandle> {
        self.next
    }

    pub fn previous(&self) -> Option<TrackEntryHandle> {
        self.previous
    }

    /// Entry being mixed out while this one mixes in.
    pub fn mixing_from(&self) -> Option<TrackEntryHandle> {
        self.mixing_from
    }

    pub fn mixing_to(&self) -> Option<TrackEntryHandle> {
        self.mixing_to
    }

    /// Seconds this entry takes to mix in; see [`AnimationState::set_mix_duration`].
    pub fn mix_duration(&self) -> f32 {
        self.mix_duration
    }

    pub fn animation_last(&self) -> f32 {
        self.animation_last
    }

    /// Sets the time events fire from on the next apply.
    pub fn set_animation_last(&mut self, animation_last: f32) {
        self.animation_last = animation_last;
        self.next_animation_last = animation_last;
    }

    pub fn track_last(&self) -> f32 {
        self.track_last
    }

    pub fn interrupt_alpha(&self) -> f32 {
        self.interrupt_alpha
    }

    pub fn total_alpha(&self) -> f32 {
        self.total_alpha
    }

    /// True once the entry has been applied to a skeleton.
    pub fn was_applied(&self) -> bool {
        self.next_track_last != -1.0
    }

    /// True once track time reached the animation's duration.
    pub fn is_complete(&self) -> bool {
        self.track_time >= self.animation_end - self.animation_start
    }

    pub fn set_listener<L: TrackEntryListener + 'static>(&mut self, listener: L) {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    /// Forgets rotation directions so the next mix picks the shortest one again.
    pub fn reset_rotation_directions(&mut self) {
        self.timelines_rotation.clear();
    }

    /// Animation time for the current track time, wrapped when looping.
    pub fn animation_time(&self) -> f32 {
        if self.looped {
            let duration = self.animation_end - self.animation_start;
            if duration == 0.0 {
                return self.animation_start;
            }
            return self.track_time % duration + self.animation_start;
        }
        (self.track_time + self.animation_start).min(self.animation_end)
    }

    /// Track time at which the current loop iteration (or the animation) completes.
    pub fn track_complete(&self) -> f32 {
        let duration = self.animation_end - self.animation_start;
        if duration != 0.0 {
            if self.looped {
                return duration * (1.0 + (self.track_time / duration).trunc());
            }
            if self.track_time < duration {
                return duration;
            }
        }
        self.track_time
    }
}

impl std::fmt::Debug for TrackEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackEntry")
            .field("animation", &self.animation.name)
            .field("track_index", &self.track_index)
            .field("looped", &self.looped)
            .field("track_time", &self.track_time)
            .field("delay", &self.delay)
            .field("mix_time", &self.mix_time)
            .field("mix_duration", &self.mix_duration)
            .finish_non_exhaustive()
    }
}

/// What listeners see of an entry when an event is delivered.
#[derive(Clone, Debug)]
pub struct TrackEntrySnapshot {
    pub handle: TrackEntryHandle,
    pub track_index: usize,
    pub animation: Arc<Animation>,
    pub track_time: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnimationStateEvent {
    Start,
    Interrupt,
    /// The entry will never be applied again. Always followed by `Dispose`.
    End,
    /// The entry returns to the pool after this call.
    Dispose,
    Complete,
    Event(Event),
}

pub trait TrackEntryListener {
    fn on_event(
        &mut self,
        state: &mut AnimationState,
        entry: &TrackEntrySnapshot,
        event: &AnimationStateEvent,
    );
}

pub trait AnimationStateListener {
    fn on_event(
        &mut self,
        state: &mut AnimationState,
        entry: &TrackEntrySnapshot,
        event: &AnimationStateEvent,
    );
}

impl<F> TrackEntryListener for F
where
    F: FnMut(&mut AnimationState, &TrackEntrySnapshot, &AnimationStateEvent),
{
    fn on_event(
        &mut self,
        state: &mut AnimationState,
        entry: &TrackEntrySnapshot,
        event: &AnimationStateEvent,
    ) {
        self(state, entry, event)
    }
}

impl<F> AnimationStateListener for F
where
    F: FnMut(&mut AnimationState, &TrackEntrySnapshot, &AnimationStateEvent),
{
    fn on_event(
        &mut self,
        state: &mut AnimationState,
        entry: &TrackEntrySnapshot,
        event: &AnimationStateEvent,
    ) {
        self(state, entry, event)
    }
}

struct EntrySlot {
    generation: u32,
    live: bool,
    entry: TrackEntry,
}

#[derive(Debug)]
struct QueuedEvent {
    entry: TrackEntryHandle,
    event: AnimationStateEvent,
}

/// Events buffered during a public call and delivered when it returns. Nested calls made by
/// listeners queue more events, which the outermost drain delivers in the same pass.
#[derive(Debug, Default)]
struct EventQueue {
    events: VecDeque<QueuedEvent>,
    drain_disabled: bool,
}

/// Applies animations over time, queues animations for later playback, mixes (crossfades)
/// between animations and layers animations on top of each other on multiple tracks.
pub struct AnimationState {
    data: AnimationStateData,
    /// Multiplier for the delta passed to [`AnimationState::update`].
    pub time_scale: f32,
    tracks: Vec<Option<TrackEntryHandle>>,
    entries: Vec<EntrySlot>,
    free_list: Vec<usize>,
    queue: EventQueue,
    listeners: Vec<Box<dyn AnimationStateListener>>,
    listeners_cleared: bool,
    events: Vec<Event>,
    property_ids: HashSet<PropertyId>,
    animations_changed: bool,
    unkeyed_state: u32,
    empty_animation: Arc<Animation>,
}

impl AnimationState {
    pub fn new(data: AnimationStateData) -> Self {
        Self {
            data,
            time_scale: 1.0,
            tracks: Vec::new(),
            entries: Vec::new(),
            free_list: Vec::new(),
            queue: EventQueue::default(),
            listeners: Vec::new(),
            listeners_cleared: false,
            events: Vec::new(),
            property_ids: HashSet::new(),
            animations_changed: false,
            unkeyed_state: 0,
            empty_animation: Arc::new(Animation::new(EMPTY_ANIMATION_NAME, Vec::new(), 0.0)),
        }
    }

    pub fn data(&self) -> &AnimationStateData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut AnimationStateData {
        &mut self.data
    }

    pub fn tracks_len(&self) -> usize {
        self.tracks.len()
    }

    /// Entry currently playing on `track_index`.
    pub fn current(&self, track_index: usize) -> Option<TrackEntryHandle> {
        self.tracks.get(track_index).copied().flatten()
    }

    pub fn mixing_from(&self, handle: TrackEntryHandle) -> Option<TrackEntryHandle> {
        self.entry(handle).and_then(|e| e.mixing_from)
    }

    pub fn entry(&self, handle: TrackEntryHandle) -> Option<&TrackEntry> {
        let slot = self.entries.get(handle.index)?;
        (slot.live && slot.generation == handle.generation).then_some(&slot.entry)
    }

    pub fn entry_mut(&mut self, handle: TrackEntryHandle) -> Option<&mut TrackEntry> {
        let slot = self.entries.get_mut(handle.index)?;
        if slot.live && slot.generation == handle.generation {
            Some(&mut slot.entry)
        } else {
            None
        }
    }

    /// Entries allocated from the pool and not yet disposed.
    pub fn active_entry_count(&self) -> usize {
        self.entries.len() - self.free_list.len()
    }

    pub fn add_listener<L: AnimationStateListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
        self.listeners_cleared = true;
    }

    /// Discards queued events that were not delivered yet. Entries waiting for `End` or
    /// `Dispose` still return to the pool, without notifying listeners.
    pub fn clear_listener_notifications(&mut self) {
        let events = std::mem::take(&mut self.queue.events);
        for QueuedEvent { entry, event } in events {
            if matches!(event, AnimationStateEvent::End | AnimationStateEvent::Dispose) {
                self.free_entry(entry);
            }
        }
    }

    /// Sets the current animation for a track, discarding any queued animations. The entry
    /// being replaced is mixed out unless it was never applied.
    pub fn set_animation(
        &mut self,
        track_index: usize,
        animation: Arc<Animation>,
        looped: bool,
    ) -> TrackEntryHandle {
        let mut interrupt = true;
        let mut current = self.expand_to_index(track_index);
        if let Some(id) = current {
            if self.get(id).next_track_last == -1.0 {
                // Never applied: splice it out without a mix.
                let mixing_from = self.get(id).mixing_from;
                self.tracks[track_index] = mixing_from;
                self.queue_event(id, AnimationStateEvent::Interrupt);
                self.queue_event(id, AnimationStateEvent::End);
                self.clear_next(id);
                current = mixing_from;
                interrupt = false;
            } else {
                self.clear_next(id);
            }
        }
        let entry = self.track_entry(track_index, animation, looped, current);
        self.set_current(track_index, entry, interrupt);
        self.drain();
        entry
    }

    pub fn set_animation_by_name(
        &mut self,
        track_index: usize,
        name: &str,
        looped: bool,
    ) -> Result<TrackEntryHandle, Error> {
        let animation = self.find_animation(name)?;
        Ok(self.set_animation(track_index, animation, looped))
    }

    /// Queues an animation after the last entry on the track. A `delay <= 0` is relative to
    /// the end of the previous entry minus the mix duration.
    pub fn add_animation(
        &mut self,
        track_index: usize,
        animation: Arc<Animation>,
        looped: bool,
        mut delay: f32,
    ) -> TrackEntryHandle {
        let mut last = self.expand_to_index(track_index);
        if let Some(mut id) = last {
            while let Some(next) = self.get(id).next {
                id = next;
            }
            last = Some(id);
        }

        let entry = self.track_entry(track_index, animation, looped, last);
        match last {
            None => {
                self.set_current(track_index, entry, true);
                self.drain();
            }
            Some(last) => {
                self.get_mut(last).next = Some(entry);
                self.get_mut(entry).previous = Some(last);
                if delay <= 0.0 {
                    delay += self.get(last).track_complete() - self.get(entry).mix_duration;
                }
            }
        }
        self.get_mut(entry).delay = delay;
        entry
    }

    pub fn add_animation_by_name(
        &mut self,
        track_index: usize,
        name: &str,
        looped: bool,
        delay: f32,
    ) -> Result<TrackEntryHandle, Error> {
        let animation = self.find_animation(name)?;
        Ok(self.add_animation(track_index, animation, looped, delay))
    }

    /// Sets how long `entry` takes to mix in. For a queued entry a `delay <= 0` is resolved
    /// again against the end of the previous entry, as in [`AnimationState::add_animation`].
    /// Does nothing for a stale handle.
    pub fn set_mix_duration(&mut self, entry: TrackEntryHandle, mix_duration: f32, mut delay: f32) {
        let Some(e) = self.entry(entry) else {
            return;
        };
        if let Some(previous) = e.previous {
            if delay <= 0.0 {
                delay += self.get(previous).track_complete() - mix_duration;
            }
        }
        let e = self.get_mut(entry);
        e.mix_duration = mix_duration;
        e.delay = delay;
    }

    /// Mixes the track out to the setup pose over `mix_duration`.
    pub fn set_empty_animation(&mut self, track_index: usize, mix_duration: f32) -> TrackEntryHandle {
        let empty = Arc::clone(&self.empty_animation);
        let entry = self.set_animation(track_index, empty, false);
        let e = self.get_mut(entry);
        e.mix_duration = mix_duration;
        e.track_end = mix_duration;
        entry
    }

    pub fn add_empty_animation(
        &mut self,
        track_index: usize,
        mix_duration: f32,
        delay: f32,
    ) -> TrackEntryHandle {
        let empty = Arc::clone(&self.empty_animation);
        let entry = self.add_animation(track_index, empty, false, delay);
        let e = self.get_mut(entry);
        if delay <= 0.0 {
            e.delay += e.mix_duration - mix_duration;
        }
        e.mix_duration = mix_duration;
        e.track_end = mix_duration;
        entry
    }

    /// Mixes every track out to the setup pose.
    pub fn set_empty_animations(&mut self, mix_duration: f32) {
        let old_drain_disabled = self.queue.drain_disabled;
        self.queue.drain_disabled = true;
        for i in 0..self.tracks.len() {
            if self.tracks[i].is_some() {
                self.set_empty_animation(i, mix_duration);
            }
        }
        self.queue.drain_disabled = old_drain_disabled;
        self.drain();
    }

    /// Removes all animations from all tracks, leaving the skeleton in its current pose.
    pub fn clear_tracks(&mut self) {
        let old_drain_disabled = self.queue.drain_disabled;
        self.queue.drain_disabled = true;
        for i in 0..self.tracks.len() {
            self.clear_track(i);
        }
        self.tracks.clear();
        self.queue.drain_disabled = old_drain_disabled;
        self.drain();
    }

    /// Removes the current, queued and mixing-from entries of a track.
    pub fn clear_track(&mut self, track_index: usize) {
        let Some(current) = self.current(track_index) else {
            return;
        };
        trace!(track = track_index, animation = %self.get(current).animation.name, "clear track");
        self.queue_event(current, AnimationStateEvent::End);
        self.clear_next(current);

        let mut entry = current;
        while let Some(from) = self.get(entry).mixing_from {
            self.queue_event(from, AnimationStateEvent::End);
            let e = self.get_mut(entry);
            e.mixing_from = None;
            e.mixing_to = None;
            entry = from;
        }

        self.tracks[track_index] = None;
        self.drain();
    }

    /// Advances track and mix times, switching to queued entries whose delay has passed.
    pub fn update(&mut self, delta: f32) {
        let delta = delta * self.time_scale;
        for i in 0..self.tracks.len() {
            let Some(current) = self.tracks[i] else {
                continue;
            };
            let e = self.get_mut(current);
            e.animation_last = e.next_animation_last;
            e.track_last = e.next_track_last;

            let mut current_delta = delta * e.time_scale;

            if e.delay > 0.0 {
                e.delay -= current_delta;
                if e.delay > 0.0 {
                    continue;
                }
                current_delta = -e.delay;
                e.delay = 0.0;
            }

            if let Some(next) = e.next {
                // Switch once the next entry's delay passed, keeping leftover time.
                let (track_last, time_scale) = (e.track_last, e.time_scale);
                let next_time = track_last - self.get(next).delay;
                if next_time >= 0.0 {
                    let n = self.get_mut(next);
                    n.delay = 0.0;
                    n.track_time += if time_scale == 0.0 {
                        0.0
                    } else {
                        (next_time / time_scale + delta) * n.time_scale
                    };
                    self.get_mut(current).track_time += current_delta;
                    trace!(track = i, animation = %self.get(next).animation.name, "queued entry starts");
                    self.set_current(i, next, true);
                    let mut entry = next;
                    while let Some(from) = self.get(entry).mixing_from {
                        self.get_mut(entry).mix_time += delta;
                        entry = from;
                    }
                    continue;
                }
            } else if e.track_last >= e.track_end && e.mixing_from.is_none() {
                self.tracks[i] = None;
                self.queue_event(current, AnimationStateEvent::End);
                self.clear_next(current);
                continue;
            }

            if self.get(current).mixing_from.is_some() && self.update_mixing_from(current, delta) {
                // Every mixing from entry completed.
                let mut from = self.get(current).mixing_from;
                self.get_mut(current).mixing_from = None;
                if let Some(f) = from {
                    self.get_mut(f).mixing_to = None;
                }
                while let Some(f) = from {
                    self.queue_event(f, AnimationStateEvent::End);
                    from = self.get(f).mixing_from;
                }
            }

            self.get_mut(current).track_time += current_delta;
        }

        self.drain();
    }

    /// Returns true when every mixing from entry is complete.
    fn update_mixing_from(&mut self, to: TrackEntryHandle, delta: f32) -> bool {
        let Some(from) = self.get(to).mixing_from else {
            return true;
        };
        let finished = self.update_mixing_from(from, delta);

        let f = self.get_mut(from);
        f.animation_last = f.next_animation_last;
        f.track_last = f.next_track_last;
        let (from_total_alpha, from_mixing_from, from_interrupt_alpha) =
            (f.total_alpha, f.mixing_from, f.interrupt_alpha);

        let t = self.get(to);
        // mix_time > 0 ensures the from entry was applied at least once.
        if t.mix_time > 0.0 && t.mix_time >= t.mix_duration {
            // Unless the mix is a single frame, wait until the from entry no longer
            // contributes.
            if from_total_alpha == 0.0 || t.mix_duration == 0.0 {
                let t = self.get_mut(to);
                t.mixing_from = from_mixing_from;
                t.interrupt_alpha = from_interrupt_alpha;
                if let Some(older) = from_mixing_from {
                    self.get_mut(older).mixing_to = Some(to);
                }
                self.queue_event(from, AnimationStateEvent::End);
            }
            return finished;
        }

        let f = self.get_mut(from);
        f.track_time += delta * f.time_scale;
        self.get_mut(to).mix_time += delta;
        false
    }

    /// Poses `skeleton` with the current entries of every track. Applying has no side effects
    /// besides listener calls, so one state can pose several skeletons identically.
    ///
    /// Returns true when any entry was applied.
    pub fn apply(&mut self, skeleton: &mut Skeleton) -> bool {
        if self.animations_changed {
            self.recompute_timeline_modes();
        }

        let mut applied = false;
        for i in 0..self.tracks.len() {
            let Some(current) = self.tracks[i] else {
                continue;
            };
            if self.get(current).delay > 0.0 {
                continue;
            }
            applied = true;
            let blend = if i == 0 {
                MixBlend::First
            } else {
                self.get(current).mix_blend
            };

            let c = self.get(current);
            let mut mix = c.alpha;
            if c.mixing_from.is_some() {
                mix *= self.apply_mixing_from(current, skeleton, blend);
            } else if c.track_time >= c.track_end && c.next.is_none() {
                mix = 0.0;
            }

            let c = self.get(current);
            let attachments = mix >= c.alpha_attachment_threshold;
            let animation = Arc::clone(&c.animation);
            let animation_last = c.animation_last;
            let animation_time = c.animation_time();
            let reverse = c.reverse;
            let shortest_rotation = c.shortest_rotation;
            let apply_time = if reverse {
                animation.duration - animation_time
            } else {
                animation_time
            };
            let timelines = animation.timelines();
            let mut events = std::mem::take(&mut self.events);

            if (i == 0 && mix == 1.0) || blend == MixBlend::Add {
                for timeline in timelines {
                    if let Timeline::Attachment(t) = timeline {
                        self.apply_attachment_timeline(t, skeleton, apply_time, blend, attachments);
                    } else {
                        timeline.apply(
                            skeleton,
                            animation_last,
                            apply_time,
                            (!reverse).then_some(&mut events),
                            mix,
                            blend,
                            MixDirection::In,
                        );
                    }
                }
            } else {
                let c = self.get_mut(current);
                let timeline_mode = std::mem::take(&mut c.timeline_mode);
                let mut rotation = std::mem::take(&mut c.timelines_rotation);
                let first_frame = !shortest_rotation && rotation.len() != timelines.len() * 2;
                if first_frame {
                    rotation.resize(timelines.len() * 2, 0.0);
                }

                for (ii, timeline) in timelines.iter().enumerate() {
                    let timeline_blend = match timeline_mode.get(ii) {
                        Some(TimelineMode::Subsequent) => blend,
                        _ => MixBlend::Setup,
                    };
                    match timeline {
                        Timeline::Rotate(t) if !shortest_rotation => apply_rotate_timeline(
                            t,
                            skeleton,
                            apply_time,
                            mix,
                            timeline_blend,
                            &mut rotation,
                            ii * 2,
                            first_frame,
                        ),
                        Timeline::Attachment(t) => {
                            self.apply_attachment_timeline(t, skeleton, apply_time, timeline_blend, attachments)
                        }
                        _ => timeline.apply(
                            skeleton,
                            animation_last,
                            apply_time,
                            (!reverse).then_some(&mut events),
                            mix,
                            timeline_blend,
                            MixDirection::In,
                        ),
                    }
                }

                let c = self.get_mut(current);
                c.timeline_mode = timeline_mode;
                c.timelines_rotation = rotation;
            }

            self.events = events;
            self.queue_events(current, animation_time);
            self.events.clear();
            let c = self.get_mut(current);
            c.next_animation_last = animation_time;
            c.next_track_last = c.track_time;
        }

        // Slots keyed only by entries mixing out, or before their first key, return to the
        // setup attachment.
        let setup_state = self.unkeyed_state + SETUP;
        for slot in 0..skeleton.slots.len() {
            if skeleton.slots[slot].attachment_state == setup_state {
                skeleton.set_slot_attachment_to_setup(slot);
            }
        }
        self.unkeyed_state += 2;

        self.drain();
        applied
    }

    fn apply_mixing_from(&mut self, to: TrackEntryHandle, skeleton: &mut Skeleton, mut blend: MixBlend) -> f32 {
        let Some(from) = self.get(to).mixing_from else {
            return 1.0;
        };
        if self.get(from).mixing_from.is_some() {
            self.apply_mixing_from(from, skeleton, blend);
        }

        let t = self.get(to);
        let (to_mix_time, to_mix_duration, to_interrupt_alpha) =
            (t.mix_time, t.mix_duration, t.interrupt_alpha);
        let f = self.get(from);
        let mix = if to_mix_duration == 0.0 {
            // Single frame mix to undo the from entry's changes.
            if blend == MixBlend::First {
                blend = MixBlend::Setup;
            }
            1.0
        } else {
            if blend != MixBlend::First {
                blend = f.mix_blend;
            }
            (to_mix_time / to_mix_duration).min(1.0)
        };

        let attachments = mix < f.attachment_threshold;
        let alpha_attachment_threshold = f.alpha_attachment_threshold;
        let draw_order = mix < f.draw_order_threshold;
        let animation = Arc::clone(&f.animation);
        let timelines = animation.timelines();
        let alpha_hold = f.alpha * to_interrupt_alpha;
        let alpha_mix = alpha_hold * (1.0 - mix);
        let animation_last = f.animation_last;
        let animation_time = f.animation_time();
        let shortest_rotation = f.shortest_rotation;
        let (apply_time, fire_events) = if f.reverse {
            (animation.duration - animation_time, false)
        } else {
            (animation_time, mix < f.event_threshold)
        };
        let mut events = std::mem::take(&mut self.events);

        if blend == MixBlend::Add {
            for timeline in timelines {
                timeline.apply(
                    skeleton,
                    animation_last,
                    apply_time,
                    fire_events.then_some(&mut events),
                    alpha_mix,
                    blend,
                    MixDirection::Out,
                );
            }
        } else {
            let f = self.get_mut(from);
            let timeline_mode = std::mem::take(&mut f.timeline_mode);
            let timeline_hold_mix = std::mem::take(&mut f.timeline_hold_mix);
            let mut rotation = std::mem::take(&mut f.timelines_rotation);
            let first_frame = !shortest_rotation && rotation.len() != timelines.len() * 2;
            if first_frame {
                rotation.resize(timelines.len() * 2, 0.0);
            }

            let mut total_alpha = 0.0;
            for (i, timeline) in timelines.iter().enumerate() {
                let mode = timeline_mode.get(i).copied().unwrap_or(TimelineMode::First);
                let (timeline_blend, alpha) = match mode {
                    TimelineMode::Subsequent => {
                        if !draw_order && matches!(timeline, Timeline::DrawOrder(_)) {
                            continue;
                        }
                        (blend, alpha_mix)
                    }
                    TimelineMode::First => (MixBlend::Setup, alpha_mix),
                    TimelineMode::HoldSubsequent => (blend, alpha_hold),
                    TimelineMode::HoldFirst => (MixBlend::Setup, alpha_hold),
                    TimelineMode::HoldMix => {
                        let fade = timeline_hold_mix
                            .get(i)
                            .copied()
                            .flatten()
                            .and_then(|h| self.entry(h))
                            .map_or(0.0, |h| (1.0 - h.mix_time / h.mix_duration).max(0.0));
                        (MixBlend::Setup, alpha_hold * fade)
                    }
                };
                total_alpha += alpha;

                match timeline {
                    Timeline::Rotate(t) if !shortest_rotation => apply_rotate_timeline(
                        t,
                        skeleton,
                        apply_time,
                        alpha,
                        timeline_blend,
                        &mut rotation,
                        i * 2,
                        first_frame,
                    ),
                    Timeline::Attachment(t) => {
                        self.apply_attachment_timeline(
                            t,
                            skeleton,
                            apply_time,
                            timeline_blend,
                            attachments && alpha >= alpha_attachment_threshold,
                        )
                    }
                    _ => {
                        let direction = if draw_order
                            && timeline_blend == MixBlend::Setup
                            && matches!(timeline, Timeline::DrawOrder(_))
                        {
                            MixDirection::In
                        } else {
                            MixDirection::Out
                        };
                        timeline.apply(
                            skeleton,
                            animation_last,
                            apply_time,
                            fire_events.then_some(&mut events),
                            alpha,
                            timeline_blend,
                            direction,
                        );
                    }
                }
            }

            let f = self.get_mut(from);
            f.total_alpha = total_alpha;
            f.timeline_mode = timeline_mode;
            f.timeline_hold_mix = timeline_hold_mix;
            f.timelines_rotation = rotation;
        }

        self.events = events;
        if to_mix_duration > 0.0 {
            self.queue_events(from, animation_time);
        }
        self.events.clear();
        let f = self.get_mut(from);
        f.next_animation_last = animation_time;
        f.next_track_last = f.track_time;

        mix
    }

    fn apply_attachment_timeline(
        &self,
        timeline: &AttachmentTimeline,
        skeleton: &mut Skeleton,
        time: f32,
        blend: MixBlend,
        attachments: bool,
    ) {
        let slot = timeline.slot;
        if !skeleton.bones[skeleton.slots[slot].bone()].active {
            return;
        }

        if time < timeline.frames[0] {
            if matches!(blend, MixBlend::Setup | MixBlend::First) {
                skeleton.set_slot_attachment_to_setup(slot);
                if attachments {
                    skeleton.slots[slot].attachment_state = self.unkeyed_state + CURRENT;
                }
            }
        } else {
            let name = timeline.attachment_names[search1(&timeline.frames, time)].as_deref();
            skeleton.set_slot_attachment_by_name(slot, name);
            if attachments {
                skeleton.slots[slot].attachment_state = self.unkeyed_state + CURRENT;
            }
        }

        // Not set here, so the setup attachment is restored after all tracks are applied.
        let state = &mut skeleton.slots[slot].attachment_state;
        if *state <= self.unkeyed_state {
            *state = self.unkeyed_state + SETUP;
        }
    }

    /// Queues events fired by the last apply of `entry`: events before a loop boundary, then
    /// `Complete`, then the events after it.
    fn queue_events(&mut self, entry: TrackEntryHandle, animation_time: f32) {
        let e = self.get(entry);
        let animation_start = e.animation_start;
        let animation_end = e.animation_end;
        let duration = animation_end - animation_start;
        let track_last_wrapped = e.track_last % duration;

        let complete = if e.looped {
            // Whole loops counted, so a delta spanning a loop still completes once.
            let cycles = (e.track_time / duration) as i32;
            duration == 0.0 || (cycles > 0 && cycles > (e.track_last / duration) as i32)
        } else {
            animation_time >= animation_end && e.animation_last < animation_end
        };

        let events = std::mem::take(&mut self.events);
        let mut i = 0;
        while i < events.len() {
            let event = &events[i];
            if event.time < track_last_wrapped {
                break;
            }
            if event.time <= animation_end {
                self.queue_event(entry, AnimationStateEvent::Event(event.clone()));
            }
            i += 1;
        }

        if complete {
            self.queue_event(entry, AnimationStateEvent::Complete);
        }

        for event in &events[i..] {
            if event.time >= animation_start {
                self.queue_event(entry, AnimationStateEvent::Event(event.clone()));
            }
        }
        self.events = events;
    }

    fn set_current(&mut self, index: usize, current: TrackEntryHandle, interrupt: bool) {
        let from = self.expand_to_index(index);
        self.tracks[index] = Some(current);
        self.get_mut(current).previous = None;

        if let Some(from) = from {
            if interrupt {
                self.queue_event(from, AnimationStateEvent::Interrupt);
            }
            self.get_mut(from).mixing_to = Some(current);
            let f = self.get(from);
            let interrupted = if f.mixing_from.is_some() && f.mix_duration > 0.0 {
                (f.mix_time / f.mix_duration).min(1.0)
            } else {
                1.0
            };
            let c = self.get_mut(current);
            c.mixing_from = Some(from);
            c.mix_time = 0.0;
            // Keep the interrupted mix percentage.
            c.interrupt_alpha *= interrupted;
            // Reset rotation for mixing out, in case the entry was mixed in.
            self.get_mut(from).timelines_rotation.clear();
        }

        self.queue_event(current, AnimationStateEvent::Start);
    }

    fn expand_to_index(&mut self, index: usize) -> Option<TrackEntryHandle> {
        if index < self.tracks.len() {
            return self.tracks[index];
        }
        self.tracks.resize(index + 1, None);
        None
    }

    fn track_entry(
        &mut self,
        track_index: usize,
        animation: Arc<Animation>,
        looped: bool,
        last: Option<TrackEntryHandle>,
    ) -> TrackEntryHandle {
        let mix_duration = last.map_or(0.0, |last| self.data.mix(&self.get(last).animation, &animation));
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.entries[index];
            slot.live = true;
            slot.entry.reset(track_index, animation, looped, mix_duration);
            return TrackEntryHandle {
                index,
                generation: slot.generation,
            };
        }
        let mut entry = TrackEntry::new(Arc::clone(&self.empty_animation));
        entry.reset(track_index, animation, looped, mix_duration);
        self.entries.push(EntrySlot {
            generation: 0,
            live: true,
            entry,
        });
        TrackEntryHandle {
            index: self.entries.len() - 1,
            generation: 0,
        }
    }

    fn clear_next(&mut self, entry: TrackEntryHandle) {
        let mut next = self.get_mut(entry).next.take();
        while let Some(n) = next {
            self.queue_event(n, AnimationStateEvent::Dispose);
            next = self.get(n).next;
        }
    }

    fn recompute_timeline_modes(&mut self) {
        self.animations_changed = false;
        self.property_ids.clear();
        for i in 0..self.tracks.len() {
            let Some(mut entry) = self.tracks[i] else {
                continue;
            };
            while let Some(from) = self.get(entry).mixing_from {
                entry = from;
            }
            let mut next = Some(entry);
            while let Some(entry) = next {
                let e = self.get(entry);
                if e.mixing_to.is_none() || e.mix_blend != MixBlend::Add {
                    self.compute_hold(entry);
                }
                next = self.get(entry).mixing_to;
            }
        }
    }

    fn compute_hold(&mut self, entry: TrackEntryHandle) {
        let e = self.get(entry);
        let to = e.mixing_to;
        let animation = Arc::clone(&e.animation);
        let timelines = animation.timelines();
        let mut modes = Vec::with_capacity(timelines.len());
        let mut hold_mix = vec![None; timelines.len()];

        if to.is_some_and(|to| self.get(to).hold_previous) {
            for timeline in timelines {
                let added = self.add_property_ids(timeline);
                modes.push(if added {
                    TimelineMode::HoldFirst
                } else {
                    TimelineMode::HoldSubsequent
                });
            }
        } else {
            for (i, timeline) in timelines.iter().enumerate() {
                let ids = timeline.property_ids();
                let mode = if !self.add_property_ids(timeline) {
                    TimelineMode::Subsequent
                } else {
                    match to {
                        None => TimelineMode::First,
                        Some(_)
                            if matches!(
                                timeline,
                                Timeline::Attachment(_) | Timeline::DrawOrder(_) | Timeline::Event(_)
                            ) =>
                        {
                            TimelineMode::First
                        }
                        Some(to) if !self.get(to).animation.has_timeline(&ids) => TimelineMode::First,
                        Some(to) => {
                            let mut mode = TimelineMode::HoldFirst;
                            let mut next = self.get(to).mixing_to;
                            while let Some(n) = next {
                                let entry = self.get(n);
                                if entry.animation.has_timeline(&ids) {
                                    next = entry.mixing_to;
                                    continue;
                                }
                                if entry.mix_duration > 0.0 {
                                    mode = TimelineMode::HoldMix;
                                    hold_mix[i] = Some(n);
                                }
                                break;
                            }
                            mode
                        }
                    }
                };
                modes.push(mode);
            }
        }

        let e = self.get_mut(entry);
        e.timeline_mode = modes;
        e.timeline_hold_mix = hold_mix;
    }

    /// Returns true when any of the timeline's properties was not keyed yet.
    fn add_property_ids(&mut self, timeline: &Timeline) -> bool {
        let mut added = false;
        for id in timeline.property_ids() {
            added |= self.property_ids.insert(id);
        }
        added
    }

    fn find_animation(&self, name: &str) -> Result<Arc<Animation>, Error> {
        self.data
            .skeleton_data
            .find_animation(name)
            .cloned()
            .ok_or_else(|| Error::UnknownAnimation {
                name: name.to_string(),
            })
    }

    fn get(&self, handle: TrackEntryHandle) -> &TrackEntry {
        &self.entries[handle.index].entry
    }

    fn get_mut(&mut self, handle: TrackEntryHandle) -> &mut TrackEntry {
        &mut self.entries[handle.index].entry
    }

    fn queue_event(&mut self, entry: TrackEntryHandle, event: AnimationStateEvent) {
        if matches!(event, AnimationStateEvent::Start | AnimationStateEvent::End) {
            self.animations_changed = true;
        }
        self.queue.events.push_back(QueuedEvent { entry, event });
    }

    fn snapshot(&self, handle: TrackEntryHandle) -> TrackEntrySnapshot {
        let entry = self.get(handle);
        TrackEntrySnapshot {
            handle,
            track_index: entry.track_index,
            animation: Arc::clone(&entry.animation),
            track_time: entry.track_time,
        }
    }

    fn drain(&mut self) {
        if self.queue.drain_disabled {
            return;
        }
        self.queue.drain_disabled = true;

        while let Some(QueuedEvent { entry, event }) = self.queue.events.pop_front() {
            if self.entry(entry).is_none() {
                warn!(?event, "dropping event for a disposed track entry");
                continue;
            }
            let snapshot = self.snapshot(entry);
            match event {
                AnimationStateEvent::End => {
                    self.notify(&snapshot, &AnimationStateEvent::End);
                    self.notify(&snapshot, &AnimationStateEvent::Dispose);
                    self.free_entry(entry);
                }
                AnimationStateEvent::Dispose => {
                    self.notify(&snapshot, &event);
                    self.free_entry(entry);
                }
                _ => self.notify(&snapshot, &event),
            }
        }

        self.queue.drain_disabled = false;
    }

    /// Calls the entry's listener, then the state listeners.
    fn notify(&mut self, snapshot: &TrackEntrySnapshot, event: &AnimationStateEvent) {
        let handle = snapshot.handle;
        if let Some(mut listener) = self.entry_mut(handle).and_then(|e| e.listener.take()) {
            listener.on_event(self, snapshot, event);
            if let Some(entry) = self.entry_mut(handle) {
                if entry.listener.is_none() {
                    entry.listener = Some(listener);
                }
            }
        }

        self.listeners_cleared = false;
        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in &mut listeners {
            listener.on_event(self, snapshot, event);
            if self.listeners_cleared {
                break;
            }
        }
        if !self.listeners_cleared {
            let added = std::mem::replace(&mut self.listeners, listeners);
            self.listeners.extend(added);
        }
    }

    fn free_entry(&mut self, handle: TrackEntryHandle) {
        let slot = &mut self.entries[handle.index];
        if !slot.live || slot.generation != handle.generation {
            return;
        }
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.entry.listener = None;
        slot.entry.next = None;
        slot.entry.previous = None;
        slot.entry.mixing_from = None;
        slot.entry.mixing_to = None;
        self.free_list.push(handle.index);
    }
}

/// Mixes a rotate timeline along the shortest path on its first frame, then keeps that
/// direction while the bones cross each other. `rotation[i]` holds the total rotation of the
/// mix including loops, `rotation[i + 1]` the last difference between the bones.
#[allow(clippy::too_many_arguments)]
fn apply_rotate_timeline(
    timeline: &BoneTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    rotation: &mut [f32],
    i: usize,
    first_frame: bool,
) {
    if first_frame {
        rotation[i] = 0.0;
    }

    let setup = skeleton.data.bones[timeline.bone].rotation;
    let bone = &mut skeleton.bones[timeline.bone];
    if !bone.active {
        return;
    }
    if alpha == 1.0 {
        bone.rotation = timeline.curves.relative_value(time, 1.0, blend, bone.rotation, setup);
        return;
    }
    let (r1, r2) = if time < timeline.curves.start() {
        match blend {
            MixBlend::Setup => {
                bone.rotation = setup;
                return;
            }
            MixBlend::First => (bone.rotation, setup),
            _ => return,
        }
    } else {
        let r1 = if blend == MixBlend::Setup {
            setup
        } else {
            bone.rotation
        };
        (r1, setup + timeline.curves.value(time))
    };

    let mut diff = r2 - r1;
    diff -= (diff / 360.0 - 0.5).ceil() * 360.0;
    let total = if diff == 0.0 {
        rotation[i]
    } else {
        let (last_total, last_diff) = if first_frame {
            (0.0, diff)
        } else {
            (rotation[i], rotation[i + 1])
        };
        // Whole turns already made, kept when the bones cross again.
        let loops = last_total - last_total % 360.0;
        let mut total = diff + loops;
        let current = diff >= 0.0;
        let mut dir = last_total >= 0.0;
        // Detect a cross at 0, not 180.
        if last_diff.abs() <= 90.0 && signum(last_diff) != signum(diff) {
            if (last_total - loops).abs() > 180.0 {
                total += 360.0 * signum(last_total);
                dir = current;
            } else if loops != 0.0 {
                total -= 360.0 * signum(last_total);
            } else {
                dir = current;
            }
        }
        if dir != current {
            total += 360.0 * signum(last_total);
        }
        rotation[i] = total;
        total
    };
    rotation[i + 1] = diff;
    bone.rotation = r1 + total * alpha;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoneData, CurveFrames};

    fn rotate(keys: &[(f32, f32)]) -> BoneTimeline {
        let mut curves = CurveFrames::new(keys.len(), 0, 2);
        for (frame, &(time, value)) in keys.iter().enumerate() {
            curves.set_frame(frame, time, &[value]);
        }
        BoneTimeline { bone: 1, curves }
    }

    fn arm_skeleton() -> Skeleton {
        let mut data = SkeletonData::default();
        data.bones.push(BoneData::new(0, "root", None));
        data.bones.push(BoneData::new(1, "arm", Some(0)));
        Skeleton::new(Arc::new(data))
    }

    #[test]
    fn rotation_mix_keeps_loops_when_the_bones_cross_again() {
        let mut skeleton = arm_skeleton();
        let timeline = rotate(&[(0.0, 10.0)]);

        // One full turn made, then the difference crosses zero.
        let mut rotation = [400.0, -10.0];
        apply_rotate_timeline(&timeline, &mut skeleton, 0.5, 0.5, MixBlend::Setup, &mut rotation, 0, false);
        assert!((rotation[0] - 10.0).abs() < 1e-4, "total {}", rotation[0]);
        assert!((rotation[1] - 10.0).abs() < 1e-4);
        assert!((skeleton.bones[1].rotation - 5.0).abs() < 1e-4);
    }

    #[test]
    fn rotation_mix_crossing_past_half_a_turn_adds_a_loop() {
        let mut skeleton = arm_skeleton();
        let timeline = rotate(&[(0.0, -80.0)]);

        let mut rotation = [200.0, 80.0];
        apply_rotate_timeline(&timeline, &mut skeleton, 0.0, 0.5, MixBlend::Setup, &mut rotation, 0, false);
        assert!((rotation[0] - 280.0).abs() < 1e-4, "total {}", rotation[0]);
        assert!((skeleton.bones[1].rotation - 140.0).abs() < 1e-4);
    }

    #[test]
    fn rotation_mix_takes_the_shortest_route_on_the_first_frame() {
        let mut skeleton = arm_skeleton();
        let timeline = rotate(&[(0.0, 270.0)]);

        let mut rotation = [123.0, 45.0];
        apply_rotate_timeline(&timeline, &mut skeleton, 0.0, 0.5, MixBlend::Setup, &mut rotation, 0, true);
        assert!((rotation[0] - -90.0).abs() < 1e-4, "total {}", rotation[0]);
        assert!((skeleton.bones[1].rotation - -45.0).abs() < 1e-4);
    }

    #[test]
    fn held_timeline_fades_with_the_entry_that_stops_keying_it() {
        let mut data = SkeletonData::default();
        data.bones.push(BoneData::new(0, "root", None));
        data.bones.push(BoneData::new(1, "arm", Some(0)));
        let mut curves = CurveFrames::new(1, 0, 3);
        curves.set_frame(0, 0.0, &[5.0, 5.0]);
        data.animations = vec![
            Arc::new(Animation::new("walk", vec![Timeline::Rotate(rotate(&[(0.0, 0.0), (1.0, 90.0)]))], 1.0)),
            Arc::new(Animation::new("wave", vec![Timeline::Rotate(rotate(&[(0.0, -30.0)]))], 1.0)),
            Arc::new(Animation::new(
                "jump",
                vec![Timeline::Translate(BoneTimeline { bone: 1, curves })],
                1.0,
            )),
        ];
        let data = Arc::new(data);
        let mut skeleton = Skeleton::new(Arc::clone(&data));
        let mut state = AnimationState::new(AnimationStateData::new(data));
        state.data_mut().default_mix = 0.5;

        let walk = state.set_animation_by_name(0, "walk", true).unwrap();
        for name in ["wave", "jump"] {
            state.update(0.1);
            state.apply(&mut skeleton);
            state.set_animation_by_name(0, name, true).unwrap();
        }
        let jump = state.current(0).unwrap();
        state.update(0.1);
        state.apply(&mut skeleton);

        // walk's rotation is held by wave, which jump (no rotation) mixes out.
        let walk = state.entry(walk).unwrap();
        assert_eq!(walk.timeline_mode, vec![TimelineMode::HoldMix]);
        assert_eq!(walk.timeline_hold_mix, vec![Some(jump)]);
    }
}
