//! Line-oriented text output for decoded AIS messages.
//!
//! A header is written once, then one line per accepted frame, with
//! message-type-specific suffixes. Writing is abstracted behind
//! [`std::io::Write`] so tests can capture output without touching stdout.

use std::io::Write;

use crate::block::{Block, BlockName, BlockRet};
use crate::message::{AisMessage, Body};
use crate::stream::NCReadStream;
use crate::Result;

const HEADER: &str = " MID    MMSI      longitude   latitude     speed    course";
const RULE: &str = "-------------------------------------------------------------";

/// Format one decoded message as a line of output, matching the column
/// layout implied by [`HEADER`].
#[must_use]
pub fn format_record(msg: &AisMessage) -> String {
    let prefix = format!("{:>4} {:>9}", msg.msg_id, msg.mmsi);
    match &msg.body {
        Body::Position(p) => {
            format!(
                "{prefix}  {:>11.6} {:>11.6}  {:>3} km/h   {:>5.1}",
                p.longitude,
                p.latitude,
                p.speed_kmh.round() as i64,
                p.course_deg,
            )
        }
        Body::BaseStation(b) => {
            format!(
                "{prefix}  {:>11.6} {:>11.6}  {}/{}/{}  {:02}:{:02}:{:02}",
                b.longitude, b.latitude, b.year, b.month, b.day, b.hour, b.minute, b.second,
            )
        }
        Body::StaticVoyage(s) => {
            format!(
                "{prefix}  {} << {} >> {}",
                s.call_sign.trim_end_matches('@'),
                s.name.trim_end_matches('@'),
                s.destination.trim_end_matches('@'),
            )
        }
        Body::Unknown => format!("{prefix}  (unknown message type)"),
    }
}

/// Writes decoded messages to an injected [`Write`] sink, printing the
/// header once on the first message.
pub struct RecordSink<W: Write> {
    src: NCReadStream<AisMessage>,
    sink: W,
    header_written: bool,
}

impl<W: Write> RecordSink<W> {
    /// Create a new record sink writing to `sink`.
    #[must_use]
    pub fn new(src: NCReadStream<AisMessage>, sink: W) -> Self {
        Self {
            src,
            sink,
            header_written: false,
        }
    }

    fn write_header(&mut self) -> Result<()> {
        if !self.header_written {
            writeln!(self.sink, "{HEADER}")?;
            writeln!(self.sink, "{RULE}")?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl<W: Write> BlockName for RecordSink<W> {
    fn block_name(&self) -> &str {
        "RecordSink"
    }
}

impl<W: Write> Block for RecordSink<W> {
    fn work(&mut self) -> Result<BlockRet<'_>> {
        match self.src.pop() {
            None => {
                if self.src.eof() {
                    Ok(BlockRet::EOF)
                } else {
                    Ok(BlockRet::WaitForStream(&self.src, 1))
                }
            }
            Some((msg, _tags)) => {
                self.write_header()?;
                writeln!(self.sink, "{}", format_record(&msg))?;
                Ok(BlockRet::Again)
            }
        }
    }
}
