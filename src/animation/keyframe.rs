use crate::assets::{KeyParams, KeyTransform, Keyframe};
use crate::easing::EasingService;

/// Keyframe values resolved for one frame index.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSample<P> {
    /// Index of the keyframe whose window contains the frame.
    pub keyframe: usize,
    pub transform: KeyTransform,
    pub params: P,
}

/// Finds the keyframe whose `[start, end)` window contains `index`.
pub fn find_window<P: KeyParams>(keyframes: &[Keyframe<P>], index: f32) -> Option<usize> {
    // Keyframes are sorted and non-overlapping: the candidate is the last one starting at or before `index`.
    let candidate = keyframes.partition_point(|key| key.start <= index).checked_sub(1)?;
    keyframes[candidate].contains(index).then_some(candidate)
}

/// Samples `keyframes` at `index`, blending toward the next keyframe when the current one names an
/// easing curve.
pub fn sample<P: KeyParams>(
    keyframes: &[Keyframe<P>],
    index: f32,
    easing: &dyn EasingService,
) -> Option<FrameSample<P>> {
    let current_index = find_window(keyframes, index)?;
    let current = &keyframes[current_index];
    let next = keyframes.get(current_index + 1);
    if let (Some(easing_id), Some(next)) = (current.easing.as_deref(), next) {
        if let Some(curve) = easing.get(easing_id) {
            let span = next.start - current.start;
            let progress = if span > 0.0 { ((index - current.start) / span).clamp(0.0, 1.0) } else { 0.0 };
            let t = curve.map(progress);
            return Some(FrameSample {
                keyframe: current_index,
                transform: current.transform().blend(&next.transform(), t),
                params: current.params.blend(&next.params, t),
            });
        }
        log::debug!("[motion] unknown easing '{easing_id}', holding keyframe values");
    }
    Some(FrameSample { keyframe: current_index, transform: current.transform(), params: current.params.clone() })
}
