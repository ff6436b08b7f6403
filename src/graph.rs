/*! Graphs contain blocks connected by streams, and run them.

Unlike some stream-processing frameworks, a block here doesn't get handed
its input/output streams by the graph on every call: each block owns its
[`crate::stream::ReadStream`]/[`crate::stream::WriteStream`] fields directly,
wired up when the block is constructed (`FileSource::new()` returns the
stream that feeds the next block's constructor, and so on). The graph's only
job is to poll every block's [`crate::block::Block::work`] in a round-robin
loop until they've all reported [`BlockRet::EOF`].

A block reaching EOF (or an unsatisfiable `WaitForStream`) is dropped from
the graph outright, not just flagged done: since every stream's EOF/closed
detection (see [`crate::stream::ReadStream::eof`],
[`crate::stream::StreamWait::wait`]) is driven purely off `Arc` refcounts on
its backing buffer, a finished block that stayed alive would keep holding
its `ReadStream`/`WriteStream` fields open forever, and EOF would never
cascade to its neighbors.
*/
use std::time::{Duration, Instant};

use log::debug;

use crate::Result;
use crate::block::{Block, BlockRet};

/// A graph is a set of blocks, wired together by the streams they were
/// constructed with, that can be run to completion.
pub struct Graph {
    /// `None` once a block is done: dropping it releases the
    /// `ReadStream`/`WriteStream` fields it owned, so neighboring blocks'
    /// refcount-based EOF checks can fire.
    blocks: Vec<Option<Box<dyn Block>>>,
    /// Per-block flag: true once a block has reported EOF, or has reported
    /// that its wait condition can never be satisfied. Such blocks are
    /// skipped on later passes.
    done: Vec<bool>,
}

impl Graph {
    /// Create a new, empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            done: Vec::new(),
        }
    }

    /// Add a block to the graph. Its streams must already be connected to
    /// other blocks (or left to dangle, for a block driven manually).
    pub fn add(&mut self, b: Box<dyn Block>) {
        self.blocks.push(Some(b));
        self.done.push(false);
    }

    /// Run every block in a round-robin loop until all of them are done.
    ///
    /// "Done" means either [`BlockRet::EOF`], or a [`BlockRet::WaitForStream`]
    /// whose wait condition [`crate::stream::StreamWait::wait`] reports can
    /// never be satisfied (the upstream/downstream side of that stream has
    /// closed). A pass that makes no progress on any block sleeps briefly,
    /// mirroring a blocking read without needing an actual OS-level wait per
    /// block.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if self.run_one()? {
                return Ok(());
            }
        }
    }

    /// Run one pass over all not-yet-done blocks. Returns `true` once every
    /// block is done.
    fn run_one(&mut self) -> Result<bool> {
        let st_loop = Instant::now();
        let mut progressed = false;
        let mut all_done = true;
        for (slot, done) in self.blocks.iter_mut().zip(self.done.iter_mut()) {
            if *done {
                continue;
            }
            all_done = false;
            let st = Instant::now();
            let b = slot
                .as_mut()
                .expect("a not-done block's slot is never emptied");
            let name = b.block_name().to_string();
            match b.work()? {
                BlockRet::Again => progressed = true,
                BlockRet::Noop => {}
                BlockRet::WaitForStream(w, need) => {
                    if w.wait(need) {
                        debug!("{name}: wait condition can never be satisfied, marking done");
                        *done = true;
                    }
                }
                BlockRet::EOF => {
                    debug!("{name}: EOF");
                    *done = true;
                }
            }
            debug!("work() done for {name}. Took {:?}", st.elapsed());
            if *done {
                // Drop the block now, not just flag it: this releases the
                // stream endpoints it owns, so neighbors blocked on this
                // stream's refcount see it close instead of waiting forever.
                *slot = None;
            }
        }
        debug!(
            "Graph loop end. all_done={all_done} progressed={progressed}. Took {:?}",
            st_loop.elapsed()
        );
        if all_done {
            return Ok(true);
        }
        if !progressed {
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(false)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::null_sink::NullSink;
    use crate::vector_source::VectorSource;

    #[test]
    fn runs_source_to_sink() -> Result<()> {
        let (src, src_out) = VectorSource::new(vec![1u8, 2, 3]);
        let sink = NullSink::new(src_out);
        let mut g = Graph::new();
        g.add(Box::new(src));
        g.add(Box::new(sink));
        g.run()?;
        Ok(())
    }
}
