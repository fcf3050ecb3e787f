//! # Pitch Extraction Module
//!
//! Post-processing of a magnitude spectrum down to a single fundamental
//! frequency: harmonic product spectrum to collapse overtones onto the
//! fundamental, low-frequency suppression to discard rumble and DC, and a
//! peak search over the surviving bins.

/// Downsample factors folded into the harmonic product spectrum.
///
/// The factors are applied in order against the same working spectrum, so
/// the accumulation is sequential: factor 3 multiplies into the spectrum
/// already scaled by factor 2.
pub const HPS_FACTORS: [usize; 2] = [2, 3];

/// Bins at or below this frequency are zeroed before the peak search.
pub const LOW_FREQ_CUTOFF_HZ: f32 = 60.0;

/// Collapses harmonics onto the fundamental by multiplying the spectrum with
/// decimated copies of itself.
///
/// Each decimated copy is taken from a pristine snapshot of the input, then
/// multiplied elementwise into the working spectrum's prefix. Energy at
/// integer multiples of the fundamental reinforces the fundamental's bin but
/// not its own, which pushes the loudest bin toward the true pitch.
///
/// # Arguments
/// * `magnitude` - Magnitude half-spectrum, modified in place
pub fn harmonic_product_spectrum(magnitude: &mut [f32]) {
    let original = magnitude.to_vec();

    for factor in HPS_FACTORS {
        let hps_len = magnitude.len().div_ceil(factor);
        let mut downsampled: Vec<f32> = original.iter().step_by(factor).copied().collect();
        if downsampled.len() < hps_len {
            // Pad with zeros up to the ceiling length.
            downsampled.resize(hps_len, 0.0);
        }
        for (bin, decimated) in magnitude[..hps_len].iter_mut().zip(&downsampled) {
            *bin *= decimated;
        }
    }
}

/// Zeroes the spectrum below the first bin whose frequency exceeds `cutoff_hz`.
///
/// Removes DC offset and sub-audible rumble that would otherwise dominate the
/// peak search. Scanning stops at the first bin above the cutoff; the bins
/// before its predecessor are cleared, matching the analyzer's established
/// behavior of leaving that predecessor bin intact.
///
/// # Arguments
/// * `magnitude` - Magnitude half-spectrum, modified in place
/// * `bin_hz` - Frequency step between adjacent bins
/// * `cutoff_hz` - Threshold below which bins are discarded
pub fn suppress_low_frequencies(magnitude: &mut [f32], bin_hz: f32, cutoff_hz: f32) {
    for i in 0..magnitude.len() {
        if i as f32 * bin_hz > cutoff_hz {
            magnitude[..i.saturating_sub(1)].fill(0.0);
            break;
        }
    }
}

/// Index of the loudest bin.
///
/// The first bin wins on exact magnitude ties, which pins an all-zero
/// spectrum (silence) to bin zero.
pub fn peak_bin(magnitude: &[f32]) -> usize {
    let mut best = 0;
    for (i, &value) in magnitude.iter().enumerate() {
        if value > magnitude[best] {
            best = i;
        }
    }
    best
}

/// Runs the full spectral post-processing chain and returns the loudest
/// frequency, rounded to two decimal places.
///
/// # Arguments
/// * `magnitude` - Magnitude half-spectrum, consumed as scratch space
/// * `sample_rate` - Sample rate of the signal the spectrum was taken from
pub fn loudest_frequency(magnitude: &mut [f32], sample_rate: f32) -> f32 {
    if magnitude.is_empty() {
        return 0.0;
    }

    harmonic_product_spectrum(magnitude);

    // The half-spectrum has half the bins of the padded transform, so the
    // per-bin step is sample_rate over twice its length.
    let bin_hz = sample_rate / (magnitude.len() * 2) as f32;
    suppress_low_frequencies(magnitude, bin_hz, LOW_FREQ_CUTOFF_HZ);

    let freq = peak_bin(magnitude) as f32 * bin_hz;
    (freq * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hps_reinforces_the_fundamental_over_its_harmonics() {
        // A fundamental at bin 10 with strong harmonics at bins 20 and 30.
        let mut magnitude = vec![0.0_f32; 64];
        magnitude[10] = 4.0;
        magnitude[20] = 5.0;
        magnitude[30] = 3.0;

        harmonic_product_spectrum(&mut magnitude);

        // Bin 10 accumulates its own magnitude times the decimated copies
        // (bins 20 and 30 of the original); the bare harmonics collapse.
        assert_eq!(magnitude[10], 4.0 * 5.0 * 3.0);
        assert_eq!(peak_bin(&magnitude), 10);
    }

    #[test]
    fn hps_factors_accumulate_sequentially() {
        let mut magnitude = vec![2.0_f32; 12];
        harmonic_product_spectrum(&mut magnitude);
        // Prefix covered by both factors: 2 * 2 * 2; middle only by factor 2.
        assert_eq!(magnitude[0], 8.0);
        assert_eq!(magnitude[3], 8.0);
        assert_eq!(magnitude[4], 4.0);
        assert_eq!(magnitude[5], 4.0);
        // Tail beyond ceil(12 / 2) is untouched.
        assert_eq!(magnitude[6], 2.0);
        assert_eq!(magnitude[11], 2.0);
    }

    #[test]
    fn low_frequency_bins_are_zeroed_up_to_the_cutoff() {
        let mut magnitude = vec![1.0_f32; 100];
        // 10 Hz per bin: first bin above 60 Hz is index 7.
        suppress_low_frequencies(&mut magnitude, 10.0, 60.0);
        for (i, &value) in magnitude.iter().enumerate() {
            if i < 6 {
                assert_eq!(value, 0.0, "bin {i} should be cleared");
            } else {
                assert_eq!(value, 1.0, "bin {i} should survive");
            }
        }
    }

    #[test]
    fn peak_bin_prefers_the_first_of_equal_maxima() {
        assert_eq!(peak_bin(&[0.0, 3.0, 3.0, 1.0]), 1);
        assert_eq!(peak_bin(&[0.0; 16]), 0);
    }

    #[test]
    fn loudest_frequency_rounds_to_two_decimals() {
        let mut magnitude = vec![0.0_f32; 512];
        magnitude[300] = 10.0;
        // 48 kHz over 1024 points: bin 300 sits at 14062.5 Hz.
        let freq = loudest_frequency(&mut magnitude, 48_000.0);
        assert_eq!(freq, 14_062.5);
    }

    #[test]
    fn silence_maps_to_zero_hertz() {
        let mut magnitude = vec![0.0_f32; 512];
        assert_eq!(loudest_frequency(&mut magnitude, 48_000.0), 0.0);
    }
}
