//! FM/AM demodulation of a channelized complex baseband stream.
//!
//! Two discriminators run over the same input: an FM (phase-difference)
//! discriminator that drives HDLC bit decisions, and an AM (magnitude
//! squared) discriminator that drives the burst-amplitude gate. Both are
//! computed from the same pair of adjacent complex samples, so they're
//! produced by a single block rather than two.

use crate::block::{Block, BlockName, BlockRet};
use crate::stream::{ReadStream, WriteStream};
use crate::{IQ, Result};

/// FM discriminator: `fm[i] = Q[i+1]*I[i] - Q[i]*I[i+1]`, a cross-product
/// approximation of the instantaneous phase difference, valid for one pair
/// of adjacent complex samples.
#[must_use]
pub fn fm_discriminate(a: IQ, b: IQ) -> i32 {
    b.im.wrapping_mul(a.re) - a.im.wrapping_mul(b.re)
}

/// AM envelope at sample `b`: `am = I[i+1]^2 + Q[i+1]^2`.
#[must_use]
pub fn am_envelope(b: IQ) -> i64 {
    i64::from(b.re) * i64::from(b.re) + i64::from(b.im) * i64::from(b.im)
}

/// Run the discriminators over one buffer of complex samples, producing one
/// `fm`/`am` pair per adjacent input pair (so output is one sample shorter
/// than input).
#[must_use]
pub fn process(iq: &[IQ]) -> (Vec<i32>, Vec<i32>) {
    if iq.len() < 2 {
        return (Vec::new(), Vec::new());
    }
    let mut fm = Vec::with_capacity(iq.len() - 1);
    let mut am = Vec::with_capacity(iq.len() - 1);
    for w in iq.windows(2) {
        fm.push(fm_discriminate(w[0], w[1]));
        let env = am_envelope(w[1]);
        am.push(i32::try_from(env.min(i64::from(i32::MAX))).unwrap_or(i32::MAX));
    }
    (fm, am)
}

/// Demodulator block: complex baseband in, `(fm, am)` discriminator outputs.
pub struct Demodulator {
    src: ReadStream<IQ>,
    fm: WriteStream<i32>,
    am: WriteStream<i32>,
}

impl Demodulator {
    /// Create a new demodulator.
    #[must_use]
    pub fn new(src: ReadStream<IQ>) -> (Self, ReadStream<i32>, ReadStream<i32>) {
        let (fm, fm_rx) = crate::stream::new_stream();
        let (am, am_rx) = crate::stream::new_stream();
        (Self { src, fm, am }, fm_rx, am_rx)
    }
}

impl BlockName for Demodulator {
    fn block_name(&self) -> &str {
        "Demodulator"
    }
}

impl Block for Demodulator {
    fn work(&mut self) -> Result<BlockRet<'_>> {
        let (input, _tags) = self.src.read_buf()?;
        let iq = input.slice();
        if iq.len() < 2 {
            return Ok(BlockRet::WaitForStream(&self.src, 2));
        }
        let mut ofm = self.fm.write_buf()?;
        let mut oam = self.am.write_buf()?;
        if ofm.is_empty() {
            return Ok(BlockRet::WaitForStream(&self.fm, 1));
        }
        if oam.is_empty() {
            return Ok(BlockRet::WaitForStream(&self.am, 1));
        }

        let n = (iq.len() - 1).min(ofm.len()).min(oam.len());
        let (fm, am) = process(&iq[..=n]);
        ofm.fill_from_iter(fm);
        oam.fill_from_iter(am);
        ofm.produce(n, &[]);
        oam.produce(n, &[]);
        input.consume(n);
        Ok(BlockRet::Again)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_phase_gives_zero_fm() {
        let a = IQ::new(1000, 0);
        let b = IQ::new(1000, 0);
        assert_eq!(fm_discriminate(a, b), 0);
    }

    #[test]
    fn quarter_turn_gives_nonzero_fm() {
        let a = IQ::new(1000, 0);
        let b = IQ::new(0, 1000);
        assert_ne!(fm_discriminate(a, b), 0);
    }

    #[test]
    fn am_envelope_is_magnitude_squared() {
        let b = IQ::new(3, 4);
        assert_eq!(am_envelope(b), 25);
    }

    #[test]
    fn process_output_is_one_shorter() {
        let iq = vec![IQ::new(1, 0), IQ::new(0, 1), IQ::new(-1, 0)];
        let (fm, am) = process(&iq);
        assert_eq!(fm.len(), 2);
        assert_eq!(am.len(), 2);
    }

    #[test]
    fn process_empty_on_short_input() {
        let iq = vec![IQ::new(1, 0)];
        let (fm, am) = process(&iq);
        assert!(fm.is_empty());
        assert!(am.is_empty());
    }
}
