//! Fixed-point symmetric FIR filter.
//!
//! The AIS channelizer runs entirely in 32-bit fixed-point arithmetic:
//! coefficients are scaled by 2²⁰, and a single-sample evaluator exploits
//! the symmetry of a linear-phase low-pass kernel to halve the number of
//! multiplies.

/// Number of one-sided coefficients in a kernel (`h[0]` is the true center
/// tap; `h[1..L)` are shared between the two mirrored halves).
pub const L: usize = 31;

/// Fixed-point scale: coefficients (and the `>> SHIFT` evaluator) are
/// scaled by `2^20`.
pub const SCALE_BITS: u32 = 20;

/// Right shift applied to the raw dot product. One bit less than
/// `SCALE_BITS`, which intentionally leaves one extra bit of gain.
pub const SHIFT: u32 = 19;

/// Evaluate the symmetric FIR kernel `h` (one-sided, length [`L`]) around
/// the center of `x`.
///
/// `x` must contain at least `2*L - 1` samples; the center tap lines up
/// with `x[L-1]`. This mirrors the "pointer into mid-buffer" access
/// pattern of the original evaluator, but as a bounds-checked slice
/// instead of raw pointer arithmetic.
pub fn filter(h: &[i32; L], x: &[i32]) -> i32 {
    assert!(
        x.len() >= 2 * L - 1,
        "FIR window too short: need {}, got {}",
        2 * L - 1,
        x.len()
    );
    let center = L - 1;
    let mut acc: i64 = i64::from(h[0]) * i64::from(x[center]);
    for (i, &hi) in h.iter().enumerate().skip(1) {
        let left = x[center - i];
        let right = x[center + i];
        acc += i64::from(hi) * i64::from(left + right);
    }
    (acc >> SHIFT) as i32
}

/// Design a one-sided, fixed-point Hamming-windowed-sinc low-pass kernel.
///
/// `samp_rate` and `cutoff` are in the same units (Hz). The returned
/// coefficients are normalized so that the DC gain (`h[0] + 2*sum(h[1..])`)
/// is as close as possible to `2^SCALE_BITS`, matching the fixed-point
/// convention the evaluator above expects.
///
/// This is the same Hamming-window design used throughout the rest of the
/// DSP stack, just emitted as one-sided fixed-point integers instead of a
/// full `Complex` tap vector.
#[must_use]
pub fn design_lowpass(samp_rate: f64, cutoff: f64) -> [i32; L] {
    let pi = std::f64::consts::PI;
    let n_max = (L - 1) as f64;
    let mut taps = [0f64; L];
    for (i, tap) in taps.iter_mut().enumerate() {
        let n = i as f64;
        let sinc = if i == 0 {
            2.0 * cutoff / samp_rate
        } else {
            (2.0 * pi * cutoff / samp_rate * n).sin() / (pi * n)
        };
        // Half a Hamming window: full window has length 2L-1 and is
        // symmetric around the center, so the one-sided samples are its
        // right half, evaluated at n = 0, 1, ..., L-1.
        let window = 0.54 + 0.46 * (pi * n / n_max).cos();
        *tap = sinc * window;
    }
    let gain: f64 = taps[0] + 2.0 * taps[1..].iter().sum::<f64>();
    let scale = (1i64 << SCALE_BITS) as f64 / gain;
    let mut out = [0i32; L];
    for (o, t) in out.iter_mut().zip(taps.iter()) {
        *o = (t * scale).round() as i32;
    }
    out
}

/// One-third band anti-alias filter, used when decimating by 3 (300kHz ->
/// 100kHz). Cutoff is set at the post-decimation Nyquist, `samp_rate/6`.
#[must_use]
pub fn h3(samp_rate: f64) -> [i32; L] {
    design_lowpass(samp_rate, samp_rate / 6.0)
}

/// One-eighth band (~6.25kHz) low-pass, applied after channel splitting
/// when decimating by 2 (100kHz -> 50kHz).
#[must_use]
pub fn h8(samp_rate: f64) -> [i32; L] {
    design_lowpass(samp_rate, samp_rate / 16.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_gain_symmetry() {
        // Testable property: a symmetric kernel applied to a DC input
        // x[.] = C returns C * (sum h) >> SHIFT.
        let h = h3(300_000.0);
        let sum: i64 = i64::from(h[0]) + 2 * h[1..].iter().map(|&v| i64::from(v)).sum::<i64>();
        let c = 1000i32;
        let x = [c; 2 * L - 1];
        let got = filter(&h, &x);
        let want = ((i64::from(c) * sum) >> SHIFT) as i32;
        assert_eq!(got, want);
    }

    #[test]
    fn normalized_near_unity_gain() {
        // Designed for gain ~= 2^SCALE_BITS, so >>19 should give ~= 2x.
        let h = h8(100_000.0);
        let sum: i64 = i64::from(h[0]) + 2 * h[1..].iter().map(|&v| i64::from(v)).sum::<i64>();
        let want = 1i64 << SCALE_BITS;
        let diff = (sum - want).abs();
        assert!(diff < (want / 100), "gain {sum} too far from {want}");
    }

    #[test]
    fn symmetric_by_construction() {
        // h is stored one-sided; verify the evaluator treats x[center-i]
        // and x[center+i] identically (a pure delta at each side gives
        // the same magnitude contribution).
        let h = h3(300_000.0);
        let mut left = [0i32; 2 * L - 1];
        left[0] = 1000;
        let mut right = [0i32; 2 * L - 1];
        right[2 * L - 2] = 1000;
        assert_eq!(filter(&h, &left), filter(&h, &right));
    }

    #[test]
    #[should_panic]
    fn too_short_panics() {
        let h = h3(300_000.0);
        let x = [0i32; 10];
        let _ = filter(&h, &x);
    }
}
