//! Sample format conversion

/// Converts an f32 sample to i16.
///
/// Input is clamped to [-1.0, 1.0] and scaled by 32767, so -1.0 maps to
/// -32767 rather than -32768.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Converts f32 samples into `out`, replacing its contents
pub fn f32_slice_into_i16(samples: &[f32], out: &mut Vec<i16>) {
    out.clear();
    out.extend(samples.iter().map(|&s| f32_to_i16(s)));
}
