//! Channel-agnostic arithmetic on sample buffers.
//!
//! Buffers are flat slices of interleaved integer samples; a frame is
//! `channels` consecutive samples. Mixing happens in `i64` so that summing
//! many 32-bit sounds cannot overflow before the mix-down.

use crate::error::{DrumrollError, Result};
use crate::model::STEPS_PER_BEAT;

/// Sums buffers sample by sample.
///
/// The result is as long as the longest input. Shorter buffers contribute
/// silence past their end, so the order of `buffers` does not matter.
///
/// # Errors
///
/// Returns `InvalidArgument` if `channels` is zero.
///
/// # Examples
///
/// ```
/// use drumroll::audio::utils::composite;
///
/// let mixed = composite(&[vec![1, 2, 3], vec![10, 20]], 1).unwrap();
/// assert_eq!(mixed, vec![11, 22, 3]);
/// ```
pub fn composite<B: AsRef<[i64]>>(buffers: &[B], channels: usize) -> Result<Vec<i64>> {
    check_channels(channels)?;
    let len = buffers
        .iter()
        .map(|buffer| buffer.as_ref().len())
        .max()
        .unwrap_or(0);

    let mut mixed = vec![0i64; len];
    for buffer in buffers {
        mix_into(&mut mixed, buffer.as_ref());
    }
    Ok(mixed)
}

/// Adds `source` onto the start of `target`, growing `target` if needed.
pub(crate) fn mix_into(target: &mut Vec<i64>, source: &[i64]) {
    if source.len() > target.len() {
        target.resize(source.len(), 0);
    }
    for (out, sample) in target.iter_mut().zip(source) {
        *out += sample;
    }
}

/// Divides every sample by `divisor`, truncating toward zero.
///
/// # Errors
///
/// Returns `InvalidArgument` if `channels` or `divisor` is zero.
pub fn scale(buffer: &[i64], channels: usize, divisor: usize) -> Result<Vec<i64>> {
    check_channels(channels)?;
    if divisor == 0 {
        return Err(DrumrollError::InvalidArgument(
            "cannot scale by a divisor of 0".to_string(),
        ));
    }
    if divisor == 1 {
        return Ok(buffer.to_vec());
    }
    let divisor = divisor as i64;
    Ok(buffer.iter().map(|sample| sample / divisor).collect())
}

/// Returns the number of samples in one step (a sixteenth note).
///
/// The value is deliberately left unrounded; see [`step_start_sample`].
pub fn step_sample_length(sample_rate: u32, tempo: f64) -> f64 {
    sample_rate as f64 * 60.0 / tempo / STEPS_PER_BEAT as f64
}

/// Distance from a whole number below which a step position counts as whole.
const WHOLE_SAMPLE_TOLERANCE: f64 = 1e-6;

/// Returns the frame at which step `step_index` starts.
///
/// Always computed from the step index rather than by adding up rounded step
/// lengths, which would drift out of time over a long song. Positions within
/// floating point noise of a whole frame snap to it, so `52 * L` at 130 BPM
/// is exactly 264600 and not 264599.
#[inline]
pub fn step_start_sample(step_index: usize, step_sample_length: f64) -> usize {
    let position = step_index as f64 * step_sample_length;
    let nearest = position.round();
    if (position - nearest).abs() < WHOLE_SAMPLE_TOLERANCE {
        nearest as usize
    } else {
        position.floor() as usize
    }
}

/// Returns true if `steps` steps last a whole number of samples.
///
/// Steps after such a span start at the same offsets they would from zero.
pub fn spans_whole_samples(steps: usize, step_sample_length: f64) -> bool {
    let position = steps as f64 * step_sample_length;
    (position - position.round()).abs() < WHOLE_SAMPLE_TOLERANCE
}

/// Returns the number of whole frames in an interleaved buffer.
#[inline]
pub fn frame_count<T>(buffer: &[T], channels: usize) -> usize {
    buffer.len() / channels.max(1)
}

fn check_channels(channels: usize) -> Result<()> {
    if channels < 1 {
        return Err(DrumrollError::InvalidArgument(format!(
            "channel count must be at least 1, got {}",
            channels
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_empty() {
        let none: [Vec<i64>; 0] = [];
        assert!(composite(&none, 1).unwrap().is_empty());
        assert!(composite(&none, 2).unwrap().is_empty());
    }

    #[test]
    fn test_composite_uses_longest() {
        let mono = composite(&[vec![1, 2], vec![3, 4, 5, 6], vec![-1]], 1).unwrap();
        assert_eq!(mono, vec![3, 6, 5, 6]);

        // Stereo frames are just interleaved samples
        let stereo = composite(&[vec![1, -1, 2, -2], vec![10, -10]], 2).unwrap();
        assert_eq!(stereo, vec![11, -11, 2, -2]);
    }

    #[test]
    fn test_composite_is_order_independent() {
        let a = vec![5, -3, 8, 1];
        let b = vec![100, 200];
        let c = vec![-7, 0, 0, 0, 9, 9];

        let abc = composite(&[&a[..], &b[..], &c[..]], 1).unwrap();
        let cab = composite(&[&c[..], &a[..], &b[..]], 1).unwrap();
        assert_eq!(abc, cab);

        let ab = composite(&[&a[..], &b[..]], 1).unwrap();
        let nested = composite(&[&ab[..], &c[..]], 1).unwrap();
        assert_eq!(abc, nested);
    }

    #[test]
    fn test_composite_rejects_zero_channels() {
        assert!(matches!(
            composite(&[vec![1]], 0),
            Err(DrumrollError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_scale() {
        let buffer = vec![10, -10, 7, -7, 0];
        assert_eq!(scale(&buffer, 1, 1).unwrap(), buffer);
        assert_eq!(scale(&buffer, 1, 2).unwrap(), vec![5, -5, 3, -3, 0]);
        assert_eq!(scale(&buffer, 1, 3).unwrap(), vec![3, -3, 2, -2, 0]);
        assert!(scale(&buffer, 0, 2).is_err());
        assert!(scale(&buffer, 1, 0).is_err());
    }

    #[test]
    fn test_step_sample_length() {
        assert_eq!(step_sample_length(44100, 120.0), 5512.5);
        assert_eq!(step_sample_length(44100, 105.0), 6300.0);
    }

    #[test]
    fn test_step_start_sample_does_not_drift() {
        let length = 5.83;
        let expected = [0, 5, 11, 17, 23, 29, 34, 40, 46, 52, 58, 64, 69, 75, 81, 87];
        let starts: Vec<usize> = (0..16).map(|i| step_start_sample(i, length)).collect();
        assert_eq!(starts, expected);

        // Accumulating a rounded step length would land somewhere else
        let rounded = (length.round() as usize) * 15;
        assert_ne!(rounded, step_start_sample(15, length));
    }

    #[test]
    fn test_whole_sample_spans() {
        // 130 BPM: 66150/13 samples per step, so every 13 steps are whole
        let length = step_sample_length(44100, 130.0);
        assert!(!spans_whole_samples(4, length));
        assert!(spans_whole_samples(13, length));
        assert!(spans_whole_samples(52, length));
        assert_eq!(step_start_sample(52, length), 264600);
        assert_eq!(
            step_start_sample(104, length),
            2 * step_start_sample(52, length)
        );
        assert_eq!(
            step_start_sample(13 + 5, length),
            step_start_sample(13, length) + step_start_sample(5, length)
        );

        assert!(spans_whole_samples(2, step_sample_length(44100, 120.0)));
        assert!(!spans_whole_samples(3, step_sample_length(44100, 120.0)));
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(&[0; 10], 2), 5);
        assert_eq!(frame_count(&[0; 10], 1), 10);
    }
}
