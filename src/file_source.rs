//! Read a stream of samples from a raw file.
use std::io::BufReader;
use std::io::Read;

use anyhow::Result;
use log::{debug, trace, warn};

use crate::block::{Block, BlockRet};
use crate::stream::{WriteStream, new_stream};
use crate::{Error, Sample};

/// Read a stream of raw samples from a file.
///
/// Useful mostly for tests and offline replay; the live pipeline uses
/// [`crate::tcp_source::TcpSource`] instead.
#[derive(esar_macros::Block)]
#[esar(crate)]
pub struct FileSource<T: Copy> {
    filename: String,
    f: BufReader<std::fs::File>,
    repeat: bool,
    buf: Vec<u8>,
    #[esar(out)]
    dst: WriteStream<T>,
}

impl<T: Default + Copy> FileSource<T> {
    /// Create new FileSource block and its output stream.
    pub fn new(filename: &str, repeat: bool) -> Result<(Self, crate::stream::ReadStream<T>)> {
        let f = BufReader::new(std::fs::File::open(filename)?);
        debug!("Opening source {filename}");
        let (dst, rx) = new_stream();
        Ok((
            Self {
                filename: filename.to_string(),
                f,
                repeat,
                buf: Vec::new(),
                dst,
            },
            rx,
        ))
    }
}

impl<T> Block for FileSource<T>
where
    T: Sample<Type = T> + Copy + Default + std::fmt::Debug,
{
    fn work(&mut self) -> crate::Result<BlockRet<'_>> {
        let mut o = self.dst.write_buf()?;
        let sample_size = T::size();
        let have = self.buf.len() / sample_size;
        let want = o.len();
        if want == 0 {
            trace!("FileSource: no space left in output stream");
            return Ok(BlockRet::Noop);
        }

        if have < want {
            let get = want - have;
            let get_bytes = get * sample_size;
            let mut buffer = vec![0u8; get_bytes];
            let n = self
                .f
                .read(&mut buffer[..])
                .map_err(|e| Error::new(&format!("reading {}: {e}", self.filename)))?;
            if n == 0 {
                if self.repeat {
                    use std::io::Seek;
                    self.f.seek(std::io::SeekFrom::Start(0))?;
                    return Ok(BlockRet::Again);
                }
                warn!("EOF on {}", self.filename);
                return Ok(BlockRet::EOF);
            }
            self.buf.extend(&buffer[..n]);
        }

        let have = self.buf.len() / sample_size;
        if have == 0 {
            return Ok(BlockRet::WaitForStream(&self.dst, sample_size));
        }
        let n = have.min(want);
        let v = self.buf[..n * sample_size]
            .chunks_exact(sample_size)
            .map(T::parse)
            .collect::<crate::Result<Vec<_>>>()?;
        self.buf.drain(0..(n * sample_size));
        o.fill_from_iter(v);
        trace!("FileSource: produced {n}");
        o.produce(n, &[]);
        Ok(BlockRet::Again)
    }
}
