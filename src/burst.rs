//! HDLC burst detection: carrier gating and preamble/flag correlation.
//!
//! Pure functions over `fm`/`am` slices, so the scanning logic can be unit
//! tested without standing up a whole block graph. [`crate::ais::AisDecoder`]
//! owns the cursor and drives these in a loop.

/// Amplitude threshold a carrier must clear.
const CARRIER_THRESHOLD: i32 = 16;
/// Number of consecutive samples the carrier must clear the threshold for.
const CARRIER_RUN: usize = 100;
/// How far from the end of the buffer we require before starting a scan.
pub const END_MARGIN: usize = 500;
/// Samples to skip forward after a failed sync search.
const SKIP_SYMBOLS: f64 = 220.0;

/// Polarity of a GMSK sync match: whether the bit decision needs to be
/// read normally or inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Preamble correlated positively against `fm` as-is.
    Normal,
    /// Preamble correlated positively only after negating `fm`.
    Inverted,
}

impl Polarity {
    /// Sign multiplier to apply to a raw `fm` sample before making a bit
    /// decision.
    #[must_use]
    pub fn sign(self) -> i64 {
        match self {
            Polarity::Normal => 1,
            Polarity::Inverted => -1,
        }
    }
}

/// 24-bit preamble `0x55 0x55 0x55` followed by the 8-bit HDLC flag
/// `0x7E`, as +1/-1 symbols (`1` -> `+1`, `0` -> `-1`), MSB-first.
#[must_use]
pub fn sync_pattern() -> [i8; 32] {
    let bytes = [0x55u8, 0x55, 0x55, 0x7E];
    let mut out = [0i8; 32];
    for (byte_idx, &b) in bytes.iter().enumerate() {
        for bit in 0..8 {
            let v = (b >> (7 - bit)) & 1;
            out[byte_idx * 8 + bit] = if v == 1 { 1 } else { -1 };
        }
    }
    out
}

/// Scan `am` forward from `start` for a carrier: `CARRIER_RUN` consecutive
/// samples at or above `CARRIER_THRESHOLD`. Returns the index of the first
/// such sample.
///
/// Returns `None` if the carrier condition isn't found within
/// `END_MARGIN` samples of the end of the buffer (the caller should wait
/// for more data rather than treat this as "no burst here").
#[must_use]
pub fn find_carrier(am: &[i32], start: usize) -> Option<usize> {
    let mut run = 0usize;
    let mut i = start;
    while i < am.len() {
        if i + END_MARGIN >= am.len() {
            return None;
        }
        if am[i] >= CARRIER_THRESHOLD {
            run += 1;
            if run == CARRIER_RUN {
                return Some(i + 1 - CARRIER_RUN);
            }
        } else {
            run = 0;
        }
        i += 1;
    }
    None
}

/// Correlate `pattern` against `fm` starting at `base + k`, sampling every
/// `t` samples per symbol. Returns `None` as soon as a term would be
/// negative (early exit on a non-matching run), or if the window runs
/// past the end of `fm`.
fn correlate(fm: &[i32], base: usize, k: usize, t: f64, pattern: &[i8; 32]) -> Option<i64> {
    let mut s: i64 = 0;
    for (j, &p) in pattern.iter().enumerate() {
        let offset = (j as f64 * t).round() as usize;
        let idx = base + k + offset;
        let sample = *fm.get(idx)?;
        let term = i64::from(p) * i64::from(sample);
        if term < 0 {
            return None;
        }
        s += term;
    }
    Some(s)
}

/// Search `[0, 20T)` candidate offsets for the best-correlating start of
/// `pattern`, keeping the first offset that beats the running maximum
/// (strict greater-than, so an all-zero scan reports `s_max == 0`).
fn scan_offsets(fm: &[i32], base: usize, t: f64, pattern: &[i8; 32]) -> (usize, i64) {
    let window = (20.0 * t).round() as usize;
    let mut k_max = 0usize;
    let mut s_max: i64 = 0;
    for k in 0..window {
        if let Some(s) = correlate(fm, base, k, t, pattern) {
            if s > s_max {
                s_max = s;
                k_max = k;
            }
        }
    }
    (k_max, s_max)
}

/// Outcome of one burst-detection attempt starting from a carrier-gated
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncResult {
    /// Sync found at `fm`/`am` index `payload_start`, with the given
    /// polarity. The first payload symbol is sampled starting here.
    Found {
        /// Absolute index of the first payload bit.
        payload_start: usize,
        /// Polarity the preamble correlated under.
        polarity: Polarity,
    },
    /// No match at either polarity; caller should resume scanning for a
    /// carrier at `resume_at`.
    NoMatch {
        /// Absolute index to resume the carrier scan from. Always `<=
        /// fm.len()` (clamped), so callers can safely treat it as "consumed
        /// up to here" even when the unclamped jump would overrun the
        /// buffer.
        resume_at: usize,
    },
}

/// Run one full burst-detection attempt: correlate the sync pattern (both
/// polarities) against `fm` starting at `carrier_at` (the index returned
/// by [`find_carrier`]).
#[must_use]
pub fn find_sync(fm: &[i32], carrier_at: usize, t: f64) -> SyncResult {
    let pattern = sync_pattern();
    let (k1, s1) = scan_offsets(fm, carrier_at, t, &pattern);
    if s1 != 0 {
        let payload_start = carrier_at + k1 + (32.0 * t).round() as usize;
        return SyncResult::Found {
            payload_start,
            polarity: Polarity::Normal,
        };
    }
    let inverted: [i8; 32] = pattern.map(|p| -p);
    let (k2, s2) = scan_offsets(fm, carrier_at, t, &inverted);
    if s2 != 0 {
        let payload_start = carrier_at + k2 + (32.0 * t).round() as usize;
        return SyncResult::Found {
            payload_start,
            polarity: Polarity::Inverted,
        };
    }
    SyncResult::NoMatch {
        // Clamp to the buffer length: a false carrier near the end of the
        // window can put the unclamped jump past `fm.len()`, which would
        // otherwise hand the caller a cursor it can't safely consume up to.
        resume_at: (carrier_at + (SKIP_SYMBOLS * t).round() as usize).min(fm.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modulate(pattern: &[i8], polarity: Polarity, t: f64, amplitude: i32) -> Vec<i32> {
        let n = (pattern.len() as f64 * t).ceil() as usize + 1;
        let mut fm = vec![0i32; n];
        for (j, &p) in pattern.iter().enumerate() {
            let idx = (j as f64 * t).round() as usize;
            fm[idx] = i32::from(p) * amplitude * polarity.sign() as i32;
        }
        fm
    }

    #[test]
    fn finds_carrier_run() {
        let mut am = vec![0i32; 2000];
        for a in am.iter_mut().skip(300).take(150) {
            *a = 50;
        }
        let found = find_carrier(&am, 0).unwrap();
        assert_eq!(found, 300);
    }

    #[test]
    fn carrier_none_near_end() {
        let am = vec![50i32; 200];
        assert_eq!(find_carrier(&am, 0), None);
    }

    #[test]
    fn finds_normal_polarity_sync() {
        let t = 50_000.0 / 9600.0;
        let pattern = sync_pattern();
        let mut fm = modulate(&pattern, Polarity::Normal, t, 1000);
        fm.extend(std::iter::repeat_n(0i32, 600));
        match find_sync(&fm, 0, t) {
            SyncResult::Found { polarity, .. } => assert_eq!(polarity, Polarity::Normal),
            SyncResult::NoMatch { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn finds_inverted_polarity_sync() {
        let t = 50_000.0 / 9600.0;
        let pattern = sync_pattern();
        let mut fm = modulate(&pattern, Polarity::Inverted, t, 1000);
        fm.extend(std::iter::repeat_n(0i32, 600));
        match find_sync(&fm, 0, t) {
            SyncResult::Found { polarity, .. } => assert_eq!(polarity, Polarity::Inverted),
            SyncResult::NoMatch { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn no_match_skips_forward() {
        let t = 50_000.0 / 9600.0;
        let fm = vec![0i32; 1000];
        match find_sync(&fm, 0, t) {
            SyncResult::NoMatch { resume_at } => assert!(resume_at > 0),
            SyncResult::Found { .. } => panic!("expected no match on silence"),
        }
    }

    #[test]
    fn no_match_resume_at_never_exceeds_buffer_len() {
        // A carrier found near the end of the buffer would, unclamped, push
        // resume_at = carrier_at + round(220*t) past fm.len() (t ~= 5.21 at
        // 50kHz, so the jump is >1100 samples).
        let t = 50_000.0 / 9600.0;
        let fm = vec![0i32; 1000];
        let carrier_at = fm.len() - 501;
        match find_sync(&fm, carrier_at, t) {
            SyncResult::NoMatch { resume_at } => assert!(resume_at <= fm.len()),
            SyncResult::Found { .. } => panic!("expected no match on silence"),
        }
    }
}
