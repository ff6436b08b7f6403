//! Interleaved 8-bit IQ bytes -> two decimated, channel-separated complex
//! baseband streams.
//!
//! This is the DSP core of the receiver: re-center, decimate by 3 with an
//! anti-alias filter, split into the two 25kHz-spaced AIS channels with a
//! `pi/2` rotation, then decimate by 2 with a narrower low-pass. Every stage
//! is pure and stateless across calls -- the FIR transient at each stage's
//! edges (up to [`fir::L`]`- 1` samples) is accepted as lost, matching the
//! "no overlap-save" behavior called out in the design this receiver is
//! based on.

use crate::block::{Block, BlockName, BlockRet};
use crate::fir::{self, L};
use crate::stream::{ReadStream, WriteStream};
use crate::{IQ, Result};

/// Re-center an interleaved `(I, Q)` byte stream: each unsigned byte is
/// centered at 128, so subtracting 128 yields a signed sample. Returns
/// parallel `I`/`Q` sequences; an odd trailing byte (no matching pair) is
/// dropped.
#[must_use]
pub fn recenter(bytes: &[u8]) -> (Vec<i32>, Vec<i32>) {
    let pairs = bytes.len() / 2;
    let mut i = Vec::with_capacity(pairs);
    let mut q = Vec::with_capacity(pairs);
    for p in 0..pairs {
        i.push(i32::from(bytes[2 * p]) - 128);
        q.push(i32::from(bytes[2 * p + 1]) - 128);
    }
    (i, q)
}

/// Decimate `i`/`q` by 3 with anti-alias filter `h`. Output index `k` reads
/// the window centered at input index `3*k`; the first and last `(L-1)/3`-ish
/// output samples that would need out-of-range input are simply not
/// produced.
#[must_use]
pub fn decimate_by_3(i: &[i32], q: &[i32], h: &[i32; L]) -> (Vec<i32>, Vec<i32>) {
    decimate(i, q, h, 3)
}

/// Decimate `i`/`q` by 2 with low-pass filter `h`.
#[must_use]
pub fn decimate_by_2(i: &[i32], q: &[i32], h: &[i32; L]) -> (Vec<i32>, Vec<i32>) {
    decimate(i, q, h, 2)
}

fn decimate(i: &[i32], q: &[i32], h: &[i32; L], factor: usize) -> (Vec<i32>, Vec<i32>) {
    assert_eq!(i.len(), q.len());
    let n = i.len();
    let margin = L - 1;
    if n <= 2 * margin {
        return (Vec::new(), Vec::new());
    }
    // Largest k such that the window [factor*k - margin, factor*k + margin]
    // is entirely within [0, n).
    let k_min = margin.div_ceil(factor);
    let k_max = (n - 1 - margin) / factor;
    if k_max < k_min {
        return (Vec::new(), Vec::new());
    }
    let count = k_max - k_min + 1;
    let mut oi = Vec::with_capacity(count);
    let mut oq = Vec::with_capacity(count);
    for k in k_min..=k_max {
        let center = factor * k;
        let window = (center - margin)..=(center + margin);
        oi.push(fir::filter(h, &i[*window.start()..=*window.end()]));
        oq.push(fir::filter(h, &q[*window.start()..=*window.end()]));
    }
    (oi, oq)
}

/// Per-sample `pi/2` rotation step of the channel-splitting algorithm:
/// given the decimated-by-3 sample `(i1, q1)` at a stream index whose
/// residue mod 4 is `phase`, return `(new_channel1_sample,
/// channel2_sample)`.
///
/// Each output depends only on the single input sample at that index and on
/// `phase` -- there is no dependency between the channel-1 output at index
/// `k` and the input at any other index, which sidesteps the aliasing
/// footgun of computing this in place over a shared array (see DESIGN.md).
#[must_use]
fn rotate_step(phase: u8, i1: i32, q1: i32) -> ((i32, i32), (i32, i32)) {
    match phase {
        0 => ((i1, q1), (i1, q1)),
        1 => ((-q1, i1), (q1, -i1)),
        2 => ((-i1, -q1), (-i1, -q1)),
        3 => ((q1, -i1), (-q1, i1)),
        _ => unreachable!("phase is always taken mod 4"),
    }
}

/// Split a decimated-by-3 stream into (counter-rotated) channel 1 and
/// (rotated) channel 2, starting the 4-sample rotation pattern at index 0 of
/// this call (the channelizer has no state carried across calls).
#[must_use]
pub fn split_channels(i1: &[i32], q1: &[i32]) -> (Vec<i32>, Vec<i32>, Vec<i32>, Vec<i32>) {
    assert_eq!(i1.len(), q1.len());
    let n = i1.len();
    let mut oi1 = Vec::with_capacity(n);
    let mut oq1 = Vec::with_capacity(n);
    let mut oi2 = Vec::with_capacity(n);
    let mut oq2 = Vec::with_capacity(n);
    for (k, (&i, &q)) in i1.iter().zip(q1.iter()).enumerate() {
        let ((ni1, nq1), (ni2, nq2)) = rotate_step((k % 4) as u8, i, q);
        oi1.push(ni1);
        oq1.push(nq1);
        oi2.push(ni2);
        oq2.push(nq2);
    }
    (oi1, oq1, oi2, oq2)
}

/// Run the full channelizer over one buffer of interleaved IQ bytes,
/// producing the final-rate `(I, Q)` streams for AIS channel 1 and channel 2.
#[must_use]
pub fn process(bytes: &[u8], h3: &[i32; L], h8: &[i32; L]) -> (Vec<IQ>, Vec<IQ>) {
    let (i, q) = recenter(bytes);
    let (i1, q1) = decimate_by_3(&i, &q, h3);
    let (si1, sq1, si2, sq2) = split_channels(&i1, &q1);
    let (fi1, fq1) = decimate_by_2(&si1, &sq1, h8);
    let (fi2, fq2) = decimate_by_2(&si2, &sq2, h8);
    let ch1 = fi1.into_iter().zip(fq1).map(|(i, q)| IQ::new(i, q)).collect();
    let ch2 = fi2.into_iter().zip(fq2).map(|(i, q)| IQ::new(i, q)).collect();
    (ch1, ch2)
}

/// Channelizer block: consumes raw interleaved IQ bytes and produces
/// decimated complex baseband streams for both AIS channels.
///
/// Unlike the `sync`/`sync_tag` blocks generated by
/// [`esar_macros::Block`], a channelizer's output rate is not a fixed
/// integer multiple of its input rate sample-for-sample (decimation loses a
/// few samples of transient at each stage), so its `work()` is written by
/// hand rather than derived.
pub struct Channelizer {
    src: ReadStream<u8>,
    ch1: WriteStream<IQ>,
    ch2: WriteStream<IQ>,
    h3: [i32; L],
    h8: [i32; L],
}

impl Channelizer {
    /// Create a new channelizer for a given input sample rate (Hz, before
    /// any decimation -- nominally 300kHz for AIS).
    #[must_use]
    pub fn new(src: ReadStream<u8>, samp_rate: f64) -> (Self, ReadStream<IQ>, ReadStream<IQ>) {
        let (ch1, ch1_rx) = crate::stream::new_stream();
        let (ch2, ch2_rx) = crate::stream::new_stream();
        (
            Self {
                src,
                ch1,
                ch2,
                h3: fir::h3(samp_rate),
                h8: fir::h8(samp_rate / 3.0),
            },
            ch1_rx,
            ch2_rx,
        )
    }
}

impl BlockName for Channelizer {
    fn block_name(&self) -> &str {
        "Channelizer"
    }
}

impl Block for Channelizer {
    fn work(&mut self) -> Result<BlockRet<'_>> {
        let (input, _tags) = self.src.read_buf()?;
        let bytes = input.slice();
        if bytes.is_empty() {
            return Ok(BlockRet::WaitForStream(&self.src, 2));
        }
        let mut o1 = self.ch1.write_buf()?;
        let mut o2 = self.ch2.write_buf()?;
        if o1.is_empty() {
            return Ok(BlockRet::WaitForStream(&self.ch1, 1));
        }
        if o2.is_empty() {
            return Ok(BlockRet::WaitForStream(&self.ch2, 1));
        }

        let (ch1, ch2) = process(bytes, &self.h3, &self.h8);
        let n = ch1.len().min(ch2.len()).min(o1.len()).min(o2.len());
        if n == 0 {
            // Not enough samples in this window to produce a single
            // decimated output; wait for more bytes rather than spin.
            return Ok(BlockRet::WaitForStream(&self.src, 6 * (2 * L - 1)));
        }
        o1.fill_from_iter(ch1.into_iter().take(n));
        o2.fill_from_iter(ch2.into_iter().take(n));
        o1.produce(n, &[]);
        o2.produce(n, &[]);
        let consumed = bytes.len() - bytes.len() % 2;
        input.consume(consumed);
        Ok(BlockRet::Again)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recenter_maps_128_to_zero() {
        let (i, q) = recenter(&[128, 128, 255, 0, 0, 255]);
        assert_eq!(i, vec![0, 127, -128]);
        assert_eq!(q, vec![0, -128, 127]);
    }

    #[test]
    fn decimate_shortens_by_factor_and_loses_margin() {
        let h = fir::h3(300_000.0);
        let n = 300;
        let i: Vec<i32> = (0..n).collect();
        let q = vec![0i32; n as usize];
        let (oi, oq) = decimate_by_3(&i, &q, &h);
        assert_eq!(oi.len(), oq.len());
        // Roughly n/3 minus the FIR margin on each side.
        assert!(oi.len() > 0 && oi.len() < (n as usize) / 3);
    }

    #[test]
    fn dc_input_decimates_to_dc() {
        // A constant input should decimate (after gain normalization) to
        // approximately the same constant, since h3/h8 are unity-DC-gain
        // low-pass filters.
        let h = fir::h3(300_000.0);
        let n = 300;
        let c = 1000i32;
        let i = vec![c; n];
        let q = vec![0i32; n];
        let (oi, oq) = decimate_by_3(&i, &q, &h);
        for &v in &oi {
            assert!((v - c).abs() < 5, "got {v}, want ~{c}");
        }
        for &v in &oq {
            assert_eq!(v, 0);
        }
    }

    #[test]
    fn split_channels_identity_at_phase_zero() {
        let (oi1, oq1, oi2, oq2) = split_channels(&[5, 9, 3, 7], &[1, 2, 3, 4]);
        // phase 0: both channels equal the input sample unchanged.
        assert_eq!((oi1[0], oq1[0]), (5, 1));
        assert_eq!((oi2[0], oq2[0]), (5, 1));
    }

    #[test]
    fn split_channels_matches_spec_table() {
        let i1 = [10, 10, 10, 10];
        let q1 = [20, 20, 20, 20];
        let (oi1, oq1, oi2, oq2) = split_channels(&i1, &q1);
        assert_eq!((oi1[1], oq1[1]), (-20, 10));
        assert_eq!((oi2[1], oq2[1]), (20, -10));
        assert_eq!((oi1[2], oq1[2]), (-10, -20));
        assert_eq!((oi2[2], oq2[2]), (-10, -20));
        assert_eq!((oi1[3], oq1[3]), (20, -10));
        assert_eq!((oi2[3], oq2[3]), (-20, 10));
    }

    #[test]
    fn process_produces_both_channels() {
        let h3 = fir::h3(300_000.0);
        let h8 = fir::h8(100_000.0);
        let bytes: Vec<u8> = (0..2000u32).map(|i| (128 + (i % 7) as i32 - 3) as u8).collect();
        let (ch1, ch2) = process(&bytes, &h3, &h8);
        assert!(!ch1.is_empty());
        assert_eq!(ch1.len(), ch2.len());
    }
}
