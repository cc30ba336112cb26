//! Input and output byte streams.
//!
//! Every backend hands out boxed [`InStream`]s and [`OutStream`]s. Backends
//! implement only the `Read`/`Write`/`Seek` plumbing plus a couple of required
//! methods; the typed encoders (fixed-width big-endian integers, VInts, strings)
//! are provided on top.

use std::fmt::Debug;
use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{GlaiveError, Result};
use crate::util::varint;

/// A random-access input stream.
///
/// Clones are independent cursors over the same underlying content.
pub trait InStream: Read + Seek + Send + Debug {
    /// Total length of the stream in bytes.
    fn length(&self) -> u64;

    /// Clone the stream. The clone starts at the current position.
    fn clone_stream(&self) -> Result<Box<dyn InStream>>;

    fn position(&mut self) -> Result<u64> {
        Ok(self.stream_position()?)
    }

    /// Bytes left between the current position and the end.
    fn remaining(&mut self) -> Result<u64> {
        Ok(self.length().saturating_sub(self.position()?))
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        if pos > self.length() {
            return Err(GlaiveError::eof(format!(
                "seek to {} past end of stream ({} bytes)",
                pos,
                self.length()
            )));
        }
        self.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8> {
        ReadBytesExt::read_u8(self).map_err(|e| GlaiveError::from_read(e, "read_byte"))
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.read_exact(buf)
            .map_err(|e| GlaiveError::from_read(e, "read_bytes"))
    }

    fn read_u32(&mut self) -> Result<u32> {
        ReadBytesExt::read_u32::<BigEndian>(self).map_err(|e| GlaiveError::from_read(e, "read_u32"))
    }

    fn read_u64(&mut self) -> Result<u64> {
        ReadBytesExt::read_u64::<BigEndian>(self).map_err(|e| GlaiveError::from_read(e, "read_u64"))
    }

    fn read_vint(&mut self) -> Result<u32> {
        varint::read_vint(self)
    }

    fn read_vlong(&mut self) -> Result<u64> {
        varint::read_vlong(self)
    }

    /// Read a VInt-length-prefixed string.
    fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as u64;
        if len > self.remaining()? {
            return Err(GlaiveError::eof(format!(
                "string of {len} bytes runs past end of stream"
            )));
        }
        let mut buf = vec![0u8; len as usize];
        self.read_bytes(&mut buf)?;
        String::from_utf8(buf).map_err(|e| GlaiveError::invalid_argument(e.to_string()))
    }
}

/// An append-only output stream with a single writer.
///
/// Content becomes visible to readers once the stream is closed.
pub trait OutStream: Write + Seek + Send + Debug {
    /// Flush and publish the content. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    fn position(&mut self) -> Result<u64> {
        Ok(self.stream_position()?)
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        WriteBytesExt::write_u8(self, byte)?;
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.write_all(buf)?;
        Ok(())
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        WriteBytesExt::write_u32::<BigEndian>(self, value)?;
        Ok(())
    }

    fn write_u64(&mut self, value: u64) -> Result<()> {
        WriteBytesExt::write_u64::<BigEndian>(self, value)?;
        Ok(())
    }

    fn write_vint(&mut self, value: u32) -> Result<()> {
        varint::write_vint(self, value)?;
        Ok(())
    }

    fn write_vlong(&mut self, value: u64) -> Result<()> {
        varint::write_vlong(self, value)?;
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| GlaiveError::invalid_argument("string too long"))?;
        self.write_vint(len)?;
        self.write_bytes(value.as_bytes())
    }

    /// Copy `len` bytes from `input` at its current position.
    fn copy_bytes(&mut self, input: &mut dyn InStream, len: u64) -> Result<()> {
        let mut buf = [0u8; 1024];
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(buf.len() as u64) as usize;
            input.read_bytes(&mut buf[..chunk])?;
            self.write_all(&buf[..chunk])?;
            remaining -= chunk as u64;
        }
        Ok(())
    }

    fn flush_stream(&mut self) -> Result<()> {
        self.flush()?;
        Ok(())
    }
}
