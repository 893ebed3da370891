use crate::error::Context as _;
use crate::error::Result;
use anyhow::bail;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

/// A position-tracked sequential sink. The format is position-dependent, so every region is
/// written in layout order and cross-checked against the offset the layout pass computed.
pub(crate) struct OutputStream<W> {
    sink: W,
    position: u64,
}

const PADDING: [u8; 64] = [0; 64];

impl<W: Write> OutputStream<W> {
    pub(crate) fn new(sink: W) -> OutputStream<W> {
        OutputStream { sink, position: 0 }
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) -> Result {
        self.sink
            .write_all(bytes)
            .context("Failed to write to output sink")?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Zero-pads up to `offset`, which must not be behind the current position. Being behind
    /// means the layout pass and the writer disagree about the file shape.
    pub(crate) fn pad_to(&mut self, offset: u64, region: &str) -> Result {
        let Some(mut padding) = offset.checked_sub(self.position) else {
            bail!(
                "Internal error: {region} starts at 0x{offset:x} but 0x{:x} bytes are already written",
                self.position
            );
        };
        while padding > 0 {
            let chunk = (padding as usize).min(PADDING.len());
            self.write(&PADDING[..chunk])?;
            padding -= chunk as u64;
        }
        Ok(())
    }

    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn finish(mut self) -> Result {
        self.sink.flush().context("Failed to flush output sink")
    }
}

/// Creates the output file for [`crate::ObjectWriter::emit_to_file`].
pub(crate) fn create(path: &Path) -> Result<BufWriter<std::fs::File>> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to open `{}`", path.display()))?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_to_writes_zeros() {
        let mut buffer = Vec::new();
        let mut out = OutputStream::new(&mut buffer);
        out.write(b"ab").unwrap();
        out.pad_to(8, ".text").unwrap();
        out.write(b"c").unwrap();
        assert_eq!(out.position(), 9);
        out.finish().unwrap();
        assert_eq!(buffer, b"ab\0\0\0\0\0\0c");
    }

    #[test]
    fn pad_to_rejects_going_backwards() {
        let mut buffer = Vec::new();
        let mut out = OutputStream::new(&mut buffer);
        out.write(b"abcd").unwrap();
        assert!(out.pad_to(2, ".text").is_err());
    }
}
