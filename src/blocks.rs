//! Convenient mod collecting all blocks for import.
pub use crate::ais::AisDecoder;
pub use crate::channelizer::Channelizer;
pub use crate::demod::Demodulator;
pub use crate::file_source::FileSource;
pub use crate::null_sink::NullSink;
pub use crate::record_sink::RecordSink;
pub use crate::tcp_source::TcpSource;
pub use crate::vector_source::{VectorSource, VectorSourceBuilder};
