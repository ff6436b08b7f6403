/*! TCP source.

Currently only implements TCP client mode.
*/
use std::io::Read;

use anyhow::Result;
use log::warn;

use crate::block::{Block, BlockRet};
use crate::stream::{ReadStream, WriteStream};
use crate::{Error, Sample};

/// TCP Source, connecting to a server and streaming the data.
#[derive(esar_macros::Block)]
#[esar(crate)]
pub struct TcpSource<T: Copy> {
    stream: std::net::TcpStream,
    buf: Vec<u8>,
    #[esar(out)]
    dst: WriteStream<T>,
}

/// Size, in bytes, of the dongle-info packet an `rtl_tcp` server sends
/// before the raw sample stream starts: 4-byte magic (`"RTL0"`), 4-byte
/// tuner type, 4-byte tuner gain count.
pub const RTL_TCP_HEADER_LEN: usize = 12;

impl<T: Copy + Default> TcpSource<T> {
    /// Create new TCP source block.
    pub fn new(addr: &str, port: u16) -> Result<(Self, ReadStream<T>)> {
        let (dst, dr) = crate::stream::new_stream();
        Ok((
            Self {
                stream: std::net::TcpStream::connect(format!("{addr}:{port}"))?,
                buf: Vec::new(),
                dst,
            },
            dr,
        ))
    }

    /// Create a new TCP source connected to an `rtl_tcp`-compatible server,
    /// discarding the dongle-info packet it sends immediately after connect
    /// so the first sample this block produces is real IQ data rather than
    /// header bytes.
    pub fn new_rtl_tcp(addr: &str, port: u16) -> Result<(Self, ReadStream<T>)> {
        let (mut src, dr) = Self::new(addr, port)?;
        let mut header = [0u8; RTL_TCP_HEADER_LEN];
        src.stream.read_exact(&mut header)?;
        Ok((src, dr))
    }
}

impl<T> Block for TcpSource<T>
where
    T: Sample<Type = T> + Copy + std::fmt::Debug,
{
    fn work(&mut self) -> Result<BlockRet<'_>, Error> {
        let mut o = self.dst.write_buf()?;
        let size = T::size();
        let mut buffer = vec![0; o.len()];
        // TODO: this read blocks.
        let n = self
            .stream
            .read(&mut buffer[..])
            .map_err(|e| -> anyhow::Error { e.into() })?;
        if n == 0 {
            warn!("TCP connection closed?");
            return Ok(BlockRet::EOF);
        }
        let mut v = Vec::with_capacity(n / size + 1);

        let mut steal = 0;
        if !self.buf.is_empty() {
            steal = size - self.buf.len();
            self.buf.extend(&buffer[0..steal]);
            v.push(T::parse(&self.buf)?);
            self.buf.clear();
        }
        let remaining = (n - steal) % size;
        for pos in (steal..(n - remaining)).step_by(size) {
            v.push(T::parse(&buffer[pos..pos + size])?);
        }
        self.buf.extend(&buffer[n - remaining..n]);
        let n = v.len();
        o.fill_from_iter(v);
        o.produce(n, &[]);
        Ok(BlockRet::Again)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use crate::Float;

    #[test]
    fn rtl_tcp_skips_dongle_info_header() -> Result<()> {
        let listener = std::net::TcpListener::bind("[::1]:0")?;
        let addr = listener.local_addr()?;
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut header = b"RTL0".to_vec();
            header.extend_from_slice(&1u32.to_be_bytes()); // tuner type
            header.extend_from_slice(&1u32.to_be_bytes()); // gain count
            stream.write_all(&header).unwrap();
            stream.write_all(&[1, 2, 3, 4]).unwrap();
        });
        let port = match addr {
            std::net::SocketAddr::V6(a) => a.port(),
            _ => panic!("expected IPv6"),
        };
        let (mut src, src_out): (TcpSource<u8>, _) = TcpSource::new_rtl_tcp("[::1]", port)?;
        src.work()?;
        let (res, _) = src_out.read_buf()?;
        assert_eq!(res.slice(), &[1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn partials() -> Result<()> {
        let listener = std::net::TcpListener::bind("[::1]:0")?;
        let addr = listener.local_addr()?;
        std::thread::spawn(move || {
            eprintln!("waiting for connection");
            let (mut stream, _) = listener.accept().unwrap();
            eprintln!("connected");

            let data = [
                79u8, 97, 60, 75, 144, 84, 179, 71, 229, 154, 231, 74, 124, 211, 143, 74,
            ];

            let pos = 0;
            let n = 6;
            stream.write_all(&data[pos..n]).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));

            let pos = pos + n;
            let n = 3;
            stream.write_all(&data[pos..(pos + n)]).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));

            stream.write_all(&data[pos + n..]).unwrap();
        });
        let (mut src, src_out): (TcpSource<Float>, _) = match addr {
            std::net::SocketAddr::V4(_) => panic!("Where did IPv4 come from?"),
            std::net::SocketAddr::V6(a) => {
                println!("Connecting to port {}", a.port());
                TcpSource::new("[::1]", a.port())?
            }
        };
        src.work()?;
        {
            let (res, _) = src_out.read_buf()?;
            let want: Vec<Float> = [12345678.91817].into();
            assert_eq!(res.slice(), want, "first failed");
        }

        src.work()?;
        {
            let (res, _) = src_out.read_buf()?;
            assert_eq!(
                res.slice(),
                vec![12345678.91817, 91_817.125],
                "second failed"
            );
        }

        src.work()?;
        {
            let (res, _) = src_out.read_buf()?;
            assert_eq!(
                res.slice(),
                vec![12345678.91817, 91_817.125, 7_589_234.5, 4712893.7589234],
                "third failed"
            );
        }

        Ok(())
    }
}
