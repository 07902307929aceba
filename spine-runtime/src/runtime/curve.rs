use crate::{MixBlend, MixDirection};

pub const LINEAR: f32 = 0.0;
pub const STEPPED: f32 = 1.0;
pub const BEZIER: f32 = 2.0;
/// Floats per bezier lookup table: 9 sampled `(time, value)` points.
pub const BEZIER_SIZE: usize = 18;

/// Index of the last frame whose time is `<= time` in a one float per frame array.
pub fn search1(frames: &[f32], time: f32) -> usize {
    frames
        .iter()
        .skip(1)
        .position(|&t| t > time)
        .unwrap_or(frames.len().saturating_sub(1))
}

/// Like [`search1`] for frames of `step` floats; returns a float offset.
pub fn search(frames: &[f32], time: f32, step: usize) -> usize {
    let mut i = step;
    while i < frames.len() {
        if frames[i] > time {
            return i - step;
        }
        i += step;
    }
    frames.len().saturating_sub(step)
}

/// Keyframes of `entries` floats (time followed by values) plus their interpolation curves.
///
/// `curves` holds one entry per frame (`LINEAR`, `STEPPED` or `BEZIER + table offset`)
/// followed by one [`BEZIER_SIZE`] table per bezier segment and value. The last frame is
/// always stepped.
#[derive(Clone, Debug, PartialEq)]
pub struct CurveFrames {
    frames: Vec<f32>,
    entries: usize,
    curves: Vec<f32>,
}

impl CurveFrames {
    pub fn new(frame_count: usize, bezier_count: usize, entries: usize) -> Self {
        let mut curves = vec![LINEAR; frame_count + bezier_count * BEZIER_SIZE];
        if frame_count > 0 {
            curves[frame_count - 1] = STEPPED;
        }
        Self {
            frames: vec![0.0; frame_count * entries],
            entries,
            curves,
        }
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn curves(&self) -> &[f32] {
        &self.curves
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len() / self.entries
    }

    /// Time of the last key.
    pub fn duration(&self) -> f32 {
        self.frames
            .len()
            .checked_sub(self.entries)
            .map_or(0.0, |i| self.frames[i])
    }

    /// Time of the first key.
    pub fn start(&self) -> f32 {
        self.frames.first().copied().unwrap_or(0.0)
    }

    /// Stores `time` and `values` (at most `entries - 1` of them) for `frame`.
    pub fn set_frame(&mut self, frame: usize, time: f32, values: &[f32]) {
        let offset = frame * self.entries;
        self.frames[offset] = time;
        self.frames[offset + 1..offset + 1 + values.len()].copy_from_slice(values);
    }

    pub fn set_linear(&mut self, frame: usize) {
        self.curves[frame] = LINEAR;
    }

    pub fn set_stepped(&mut self, frame: usize) {
        self.curves[frame] = STEPPED;
    }

    /// Drops unused bezier tables when fewer segments were read than announced.
    pub fn shrink(&mut self, bezier_count: usize) {
        let size = self.frame_count() + bezier_count * BEZIER_SIZE;
        self.curves.truncate(size);
    }

    /// Samples the cubic bezier `(time1, value1) (cx1, cy1) (cx2, cy2) (time2, value2)` into
    /// table `bezier` using forward differences. `value` is the value column the table
    /// belongs to; only the first column marks `frame` as a bezier.
    #[allow(clippy::too_many_arguments)]
    pub fn set_bezier(
        &mut self,
        bezier: usize,
        frame: usize,
        value: usize,
        time1: f32,
        value1: f32,
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
        time2: f32,
        value2: f32,
    ) {
        let i = self.frame_count() + bezier * BEZIER_SIZE;
        if value == 0 {
            self.curves[frame] = BEZIER + i as f32;
        }
        let tmpx = (time1 - cx1 * 2.0 + cx2) * 0.03;
        let tmpy = (value1 - cy1 * 2.0 + cy2) * 0.03;
        let dddx = ((cx1 - cx2) * 3.0 - time1 + time2) * 0.006;
        let dddy = ((cy1 - cy2) * 3.0 - value1 + value2) * 0.006;
        let ddx = tmpx * 2.0 + dddx;
        let ddy = tmpy * 2.0 + dddy;
        let dx = (cx1 - time1) * 0.3 + tmpx + dddx * 0.166_666_67;
        let dy = (cy1 - value1) * 0.3 + tmpy + dddy * 0.166_666_67;
        self.fill_table(i, time1 + dx, value1 + dy, [dx, dy, ddx, ddy, dddx, dddy]);
    }

    /// Bezier table for timelines that interpolate a 0..1 percent instead of values
    /// (deform), where `cy1`/`cy2` are already normalized.
    #[allow(clippy::too_many_arguments)]
    pub fn set_bezier_percent(
        &mut self,
        bezier: usize,
        frame: usize,
        time1: f32,
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
        time2: f32,
    ) {
        let i = self.frame_count() + bezier * BEZIER_SIZE;
        self.curves[frame] = BEZIER + i as f32;
        let tmpx = (time1 - cx1 * 2.0 + cx2) * 0.03;
        let tmpy = cy2 * 0.03 - cy1 * 0.06;
        let dddx = ((cx1 - cx2) * 3.0 - time1 + time2) * 0.006;
        let dddy = (cy1 - cy2 + 0.333_333_33) * 0.018;
        let ddx = tmpx * 2.0 + dddx;
        let ddy = tmpy * 2.0 + dddy;
        let dx = (cx1 - time1) * 0.3 + tmpx + dddx * 0.166_666_67;
        let dy = cy1 * 0.3 + tmpy + dddy * 0.166_666_67;
        self.fill_table(i, time1 + dx, dy, [dx, dy, ddx, ddy, dddx, dddy]);
    }

    fn fill_table(&mut self, start: usize, mut x: f32, mut y: f32, steps: [f32; 6]) {
        let [mut dx, mut dy, mut ddx, mut ddy, dddx, dddy] = steps;
        for point in self.curves[start..start + BEZIER_SIZE].chunks_exact_mut(2) {
            point[0] = x;
            point[1] = y;
            dx += ddx;
            dy += ddy;
            ddx += dddx;
            ddy += dddy;
            x += dx;
            y += dy;
        }
    }

    /// Value of column `value_offset` at `time` using the table at curve offset `i`,
    /// where `frame_index` is the float offset of the bracketing key.
    pub fn bezier_value(&self, time: f32, frame_index: usize, value_offset: usize, i: usize) -> f32 {
        let curves = &self.curves;
        if curves[i] > time {
            let x = self.frames[frame_index];
            let y = self.frames[frame_index + value_offset];
            return y + (time - x) / (curves[i] - x) * (curves[i + 1] - y);
        }
        let n = i + BEZIER_SIZE;
        let mut i = i + 2;
        while i < n {
            if curves[i] >= time {
                let x = curves[i - 2];
                let y = curves[i - 1];
                return y + (time - x) / (curves[i] - x) * (curves[i + 1] - y);
            }
            i += 2;
        }
        // Past the last sample: finish on the next key.
        let next = frame_index + self.entries;
        let x = curves[n - 2];
        let y = curves[n - 1];
        y + (time - x) / (self.frames[next] - x) * (self.frames[next + value_offset] - y)
    }

    /// Interpolated values at `time` for the first `N` value columns. `time` must not be
    /// before the first key.
    pub fn values<const N: usize>(&self, time: f32) -> [f32; N] {
        let frames = &self.frames;
        let entries = self.entries;
        let i = search(frames, time, entries);
        let curve_type = self.curves[i / entries];
        let mut out = [0.0; N];
        if curve_type == LINEAR {
            let before = frames[i];
            let t = (time - before) / (frames[i + entries] - before);
            for (k, value) in out.iter_mut().enumerate() {
                let v = frames[i + 1 + k];
                *value = v + (frames[i + entries + 1 + k] - v) * t;
            }
        } else if curve_type == STEPPED {
            out.copy_from_slice(&frames[i + 1..i + 1 + N]);
        } else {
            let table = (curve_type - BEZIER) as usize;
            for (k, value) in out.iter_mut().enumerate() {
                *value = self.bezier_value(time, i, k + 1, table + k * BEZIER_SIZE);
            }
        }
        out
    }

    /// Single column interpolation.
    pub fn value(&self, time: f32) -> f32 {
        let [v] = self.values::<1>(time);
        v
    }

    /// Interpolation percent for one float per frame timelines (deform).
    pub fn percent(&self, time: f32, frame: usize) -> f32 {
        let curves = &self.curves;
        let curve_type = curves[frame];
        if curve_type == LINEAR {
            let x = self.frames[frame];
            return (time - x) / (self.frames[frame + self.entries] - x);
        }
        if curve_type == STEPPED {
            return 0.0;
        }
        let i = (curve_type - BEZIER) as usize;
        if curves[i] > time {
            let x = self.frames[frame];
            return curves[i + 1] * (time - x) / (curves[i] - x);
        }
        let n = i + BEZIER_SIZE;
        let mut i = i + 2;
        while i < n {
            if curves[i] >= time {
                let x = curves[i - 2];
                let y = curves[i - 1];
                return y + (time - x) / (curves[i] - x) * (curves[i + 1] - y);
            }
            i += 2;
        }
        let x = curves[n - 2];
        let y = curves[n - 1];
        y + (1.0 - y) * (time - x) / (self.frames[frame + self.entries] - x)
    }

    /// Before the first key: `Some` with the value to use for setup and first blends.
    fn before_first(&self, time: f32, alpha: f32, blend: MixBlend, current: f32, setup: f32) -> Option<f32> {
        if time >= self.start() {
            return None;
        }
        Some(match blend {
            MixBlend::Setup => setup,
            MixBlend::First => current + (setup - current) * alpha,
            MixBlend::Replace | MixBlend::Add => current,
        })
    }

    /// Keys store offsets from the setup value (rotation, translation, shear).
    pub fn relative_value(&self, time: f32, alpha: f32, blend: MixBlend, current: f32, setup: f32) -> f32 {
        if let Some(v) = self.before_first(time, alpha, blend, current, setup) {
            return v;
        }
        let value = self.value(time);
        match blend {
            MixBlend::Setup => setup + value * alpha,
            MixBlend::First | MixBlend::Replace => current + (value + setup - current) * alpha,
            MixBlend::Add => current + value * alpha,
        }
    }

    /// Keys store the final value (constraint mixes, path position, physics properties).
    pub fn absolute_value(&self, time: f32, alpha: f32, blend: MixBlend, current: f32, setup: f32) -> f32 {
        if let Some(v) = self.before_first(time, alpha, blend, current, setup) {
            return v;
        }
        self.absolute_value_with(time, alpha, blend, current, setup, self.value(time))
    }

    /// [`absolute_value`](Self::absolute_value) for an already sampled `value`.
    pub fn absolute_value_with(
        &self,
        time: f32,
        alpha: f32,
        blend: MixBlend,
        current: f32,
        setup: f32,
        value: f32,
    ) -> f32 {
        if let Some(v) = self.before_first(time, alpha, blend, current, setup) {
            return v;
        }
        if blend == MixBlend::Setup {
            setup + (value - setup) * alpha
        } else {
            current + (value - current) * alpha
        }
    }

    /// Keys store a factor of the setup scale. While mixing out, the sign comes from the
    /// setup or current pose so the scale never flips mid-mix.
    pub fn scale_value(
        &self,
        time: f32,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
        current: f32,
        setup: f32,
    ) -> f32 {
        if let Some(v) = self.before_first(time, alpha, blend, current, setup) {
            return v;
        }
        let value = self.value(time) * setup;
        blend_scale(value, alpha, blend, direction, current, setup)
    }
}

/// Sign-aware scale blend shared by the one and two value scale timelines.
pub(crate) fn blend_scale(
    value: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
    current: f32,
    setup: f32,
) -> f32 {
    if alpha == 1.0 {
        return if blend == MixBlend::Add {
            current + value - setup
        } else {
            value
        };
    }
    match (direction, blend) {
        (MixDirection::Out, MixBlend::Setup) => {
            setup + (value.abs() * signum(setup) - setup) * alpha
        }
        (MixDirection::Out, MixBlend::First | MixBlend::Replace) => {
            current + (value.abs() * signum(current) - current) * alpha
        }
        (MixDirection::In, MixBlend::Setup) => {
            let s = setup.abs() * signum(value);
            s + (value - s) * alpha
        }
        (MixDirection::In, MixBlend::First | MixBlend::Replace) => {
            let s = current.abs() * signum(value);
            s + (value - s) * alpha
        }
        (_, MixBlend::Add) => current + (value - setup) * alpha,
    }
}

/// Sign with `signum(0) == 0`, unlike [`f32::signum`].
pub(crate) fn signum(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn last_frame_is_stepped_and_others_linear() {
        let curves = CurveFrames::new(3, 0, 2);
        assert_eq!(curves.curves(), &[LINEAR, LINEAR, STEPPED]);
    }

    #[test]
    fn bezier_table_has_nine_samples_ending_near_the_next_key() {
        let mut curves = CurveFrames::new(2, 1, 2);
        curves.set_frame(0, 0.0, &[0.0]);
        curves.set_frame(1, 1.0, &[10.0]);
        curves.set_bezier(0, 0, 0, 0.0, 0.0, 0.25, 0.0, 0.75, 10.0, 1.0, 10.0);

        assert_eq!(curves.curves().len(), 2 + BEZIER_SIZE);
        assert_eq!(curves.curves()[0], BEZIER + 2.0);
        let table = &curves.curves()[2..];
        let times: Vec<f32> = table.iter().step_by(2).copied().collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]), "{times:?}");
        assert!(times[0] > 0.0 && times[8] < 1.0);

        // Symmetric ease: the midpoint stays on the linear midpoint.
        assert_near(curves.value(0.5), 5.0);
        assert!(curves.value(0.1) < 1.0);
        assert!(curves.value(0.9) > 9.0);
        assert_near(curves.value(0.0), 0.0);
    }

    #[test]
    fn linear_bezier_matches_linear_interpolation() {
        let mut curves = CurveFrames::new(2, 1, 2);
        curves.set_frame(0, 0.0, &[0.0]);
        curves.set_frame(1, 2.0, &[4.0]);
        curves.set_bezier(0, 0, 0, 0.0, 0.0, 2.0 / 3.0, 4.0 / 3.0, 4.0 / 3.0, 8.0 / 3.0, 2.0, 4.0);
        for step in 0..=20 {
            let t = step as f32 * 0.1;
            assert_near(curves.value(t), t * 2.0);
        }
    }

    #[test]
    fn stepped_holds_and_search_clamps_past_the_end() {
        let mut curves = CurveFrames::new(3, 0, 2);
        curves.set_frame(0, 0.0, &[1.0]);
        curves.set_frame(1, 1.0, &[2.0]);
        curves.set_frame(2, 2.0, &[3.0]);
        curves.set_stepped(0);
        assert_near(curves.value(0.9), 1.0);
        assert_near(curves.value(1.5), 2.5);
        assert_near(curves.value(5.0), 3.0);
        assert_eq!(curves.duration(), 2.0);
    }

    #[test]
    fn search_helpers() {
        let frames = [0.0, 1.0, 1.0, 2.0];
        assert_eq!(search1(&frames, -1.0), 0);
        assert_eq!(search1(&frames, 0.5), 0);
        assert_eq!(search1(&frames, 1.0), 2);
        assert_eq!(search1(&frames, 9.0), 3);

        let frames = [0.0, 5.0, 1.0, 6.0, 2.0, 7.0];
        assert_eq!(search(&frames, 1.5, 2), 2);
        assert_eq!(search(&frames, 3.0, 2), 4);
    }

    #[test]
    fn relative_and_absolute_blends() {
        let mut curves = CurveFrames::new(2, 0, 2);
        curves.set_frame(0, 1.0, &[10.0]);
        curves.set_frame(1, 2.0, &[20.0]);

        // Before the first key only setup and first blends act.
        assert_eq!(curves.relative_value(0.0, 0.5, MixBlend::Setup, 3.0, 1.0), 1.0);
        assert_eq!(curves.relative_value(0.0, 0.5, MixBlend::First, 3.0, 1.0), 2.0);
        assert_eq!(curves.relative_value(0.0, 0.5, MixBlend::Replace, 3.0, 1.0), 3.0);

        assert_near(curves.relative_value(1.0, 0.5, MixBlend::Setup, 3.0, 1.0), 6.0);
        assert_near(curves.relative_value(1.0, 0.5, MixBlend::Replace, 3.0, 1.0), 7.0);
        assert_near(curves.relative_value(1.0, 0.5, MixBlend::Add, 3.0, 1.0), 8.0);

        assert_near(curves.absolute_value(1.0, 0.5, MixBlend::Setup, 3.0, 1.0), 5.5);
        assert_near(curves.absolute_value(1.0, 0.5, MixBlend::Replace, 3.0, 1.0), 6.5);
    }

    #[test]
    fn scale_mixing_out_keeps_current_sign() {
        let mut curves = CurveFrames::new(1, 0, 2);
        curves.set_frame(0, 0.0, &[1.0]);
        for step in 1..10 {
            let alpha = step as f32 / 10.0;
            let v = curves.scale_value(0.0, alpha, MixBlend::Replace, MixDirection::Out, -1.0, 1.0);
            assert_eq!(signum(v), -1.0, "alpha {alpha} gave {v}");
        }
        // Mixing in takes the key's sign.
        let v = curves.scale_value(0.0, 0.5, MixBlend::Replace, MixDirection::In, -1.0, 1.0);
        assert_eq!(signum(v), 1.0);
    }
}
