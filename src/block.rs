/*! esar Block implementation.

Blocks are the main building blocks of esar. They each do one thing, and
you connect them together with streams to process the data.
*/
use crate::stream::StreamWait;
use crate::Result;

/// Return type for all blocks.
///
/// Lets the scheduler know whether more data could come out of this block
/// right now, and if not, what it should wait on before trying again.
#[derive(Clone)]
pub enum BlockRet<'a> {
    /// At least one sample was produced. The block should be polled again
    /// immediately; more output may already be available.
    Again,

    /// Produced nothing this pass, and won't produce anything until at
    /// least `usize` more samples (or EOF) show up on the given stream.
    WaitForStream(&'a dyn StreamWait, usize),

    /// Produced nothing, and has no stream to wait on (e.g. no input
    /// streams at all, for a source that's temporarily idle).
    Noop,

    /// Block indicates that it will never produce more output.
    ///
    /// Examples: reading from a file without repeating, reaching EOF; a
    /// TCP source whose connection closed.
    EOF,
}

/// Give a block's name, for logging and stats.
pub trait BlockName {
    /// Name of block.
    ///
    /// Not the name of the *instance*, but the type, possibly parameterized
    /// (e.g. `TcpSource<u8>`).
    fn block_name(&self) -> &str;
}

/// Report and propagate end-of-stream status.
pub trait BlockEOF {
    /// Return EOF status.
    ///
    /// Mutable because when EOF is reached, a block typically also needs
    /// to mark its output streams closed.
    fn eof(&mut self) -> bool {
        false
    }
}

/// Block trait, that must be implemented for all blocks.
///
/// Simpler ("sync", one-sample-in-one-sample-out) blocks get this generated
/// for them by `#[derive(esar_macros::Block)]`; others implement it by
/// hand.
pub trait Block: BlockName {
    /// Block work function.
    ///
    /// A block implementation keeps track of its own inputs and outputs,
    /// and is called repeatedly by the graph scheduler until it returns
    /// [`BlockRet::EOF`].
    fn work(&mut self) -> Result<BlockRet<'_>>;
}
