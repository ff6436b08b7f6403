#![warn(missing_docs)]
/*! This crate provides a framework for running SDR (software defined
radio) applications.

It's heavily inspired by [GNURadio][gnuradio], except of course written in
Rust.

`esar` uses that framework to build one specific application: a receiver for
AIS (Automatic Identification System), the VHF broadcast protocol ships use
to announce their position, course, and identity.

# Architecture overview

An esar application consists of blocks that are connected by unidirectional
streams. Each block has zero or more input streams, and zero or more output
streams.

The signal flows through the blocks from "sources" (blocks without any
input streams) to "sinks" (blocks without any output streams).

These blocks and streams are called a "graph", like the mathematical
concept of graphs that have nodes and edges.

A block does something to its input(s), and passes the result to its
output(s).

The AIS receiver graph looks like this:

```text
     [ TcpSource ]              (raw rtl_tcp IQ bytes, 300kSa/s)
           ↓
     [ Channelizer ]            (decimate + split into channel A / B)
         ↙     ↘
 [ Demodulator ] [ Demodulator ]   (FM discriminator, AM envelope)
        ↓               ↓
 [ AisDecoder ]    [ AisDecoder ]  (burst sync, NRZI, HDLC, CRC, decode)
        ↓               ↓
 [ RecordSink ]    [ RecordSink ]  (prints decoded reports)
```

Unlike a general-purpose SDR toolkit, the DSP stages here are fixed-point
integer arithmetic and hard-coded to the AIS channel plan (162.0MHz center,
300kHz sample rate, 9600 baud GMSK on two 25kHz channels), rather than
generic reconfigurable blocks. See [`fir`], [`channelizer`] and [`demod`]
for the details.

[gnuradio]: https://www.gnuradio.org/
*/
// Framework.
pub mod block;
pub mod blocks;
pub mod circular_buffer;
pub mod graph;
pub mod stream;

// AIS-specific DSP and protocol stages.
pub mod ais;
pub mod bits;
pub mod burst;
pub mod channelizer;
pub mod crc;
pub mod demod;
pub mod fir;
pub mod hdlc;
pub mod message;

// Sources and sinks.
pub mod file_source;
pub mod null_sink;
pub mod record_sink;
pub mod tcp_source;
pub mod vector_source;

/// Float type, for the few places (tests, CLI parsing) that want one. The
/// DSP core itself is fixed-point; see [`fir`] and [`demod`].
pub type Float = f32;

/// Complex (I/Q) sample. Scaling differs by pipeline stage; see
/// [`channelizer`] for exactly what an `IQ` value means at each point.
pub type IQ = num_complex::Complex<i32>;

/// esar's error type.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// Wraps an arbitrary error message from a dependency or I/O operation.
    #[error("{0}")]
    Msg(String),

    /// A stream operation found an unexpected refcount, meaning a block is
    /// holding on to more buffer views than the framework allows.
    #[error("stream refcount error: {0}")]
    Refcount(String),
}

impl Error {
    /// Create a new error with a message.
    pub fn new(msg: &str) -> Self {
        Error::Msg(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::new(&format!("IO error: {e}"))
    }
}

impl From<std::array::TryFromSliceError> for Error {
    fn from(e: std::array::TryFromSliceError) -> Self {
        Error::new(&format!("slice conversion error: {e}"))
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::new(&format!("poisoned lock: {e}"))
    }
}

/// esar's result type.
pub type Result<T> = std::result::Result<T, Error>;

/// A trait all stream-carried sample types must implement, so that sources
/// (like [`tcp_source::TcpSource`]) can parse a raw byte stream into
/// samples.
pub trait Sample {
    /// The type of the parsed sample.
    type Type;

    /// The serialized size of one sample, in bytes.
    fn size() -> usize;

    /// Parse one sample from exactly `size()` bytes.
    fn parse(data: &[u8]) -> Result<Self::Type>;

    /// Serialize one sample.
    fn serialize(&self) -> Vec<u8>;
}

impl Sample for u8 {
    type Type = u8;
    fn size() -> usize {
        1
    }
    fn parse(data: &[u8]) -> Result<Self::Type> {
        if data.len() != Self::size() {
            panic!("TODO: u8 is wrong size");
        }
        Ok(data[0])
    }
    fn serialize(&self) -> Vec<u8> {
        vec![*self]
    }
}

impl Sample for i32 {
    type Type = i32;
    fn size() -> usize {
        4
    }
    fn parse(data: &[u8]) -> Result<Self::Type> {
        if data.len() != Self::size() {
            panic!("TODO: i32 is wrong size");
        }
        Ok(i32::from_le_bytes(data.try_into()?))
    }
    fn serialize(&self) -> Vec<u8> {
        i32::to_le_bytes(*self).to_vec()
    }
}

/// Trivial trait for types that have `.len()`, used by
/// [`stream::NCReadStream`] to report the size of the next queued item
/// without popping it.
#[allow(clippy::len_without_is_empty)]
pub trait Len {
    /// Get the length.
    fn len(&self) -> usize;
}

impl<T> Len for Vec<T> {
    fn len(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
pub mod tests {
    //! Test helper functions.
    use super::*;

    /// For testing, assert that two IQ slices are exactly equal. Since our
    /// samples are fixed-point integers there's no need for a tolerance.
    pub fn assert_iq_eq(left: &[IQ], right: &[IQ]) {
        assert_eq!(left, right);
    }
}
