use std::io::{self, Read};

#[cfg(feature = "lzma-rs")]
use std::io::{BufReader, Cursor};

#[cfg(feature = "flate2")]
use flate2::read::GzDecoder;

#[cfg(feature = "lzma-rs")]
use lzma_rs::xz_decompress;

#[cfg(feature = "ruzstd")]
use ruzstd::decoding::{FrameDecoder, StreamingDecoder};

use super::payload::Codec;

/// The decompressed payload as a forward-only reader, wrapping whichever decoder the payload
/// codec calls for. The whole payload is one compressed stream, so unlike block-oriented
/// formats there is no length bound here; decompression runs to the end of the inner data.
pub enum CodecReader<R>
where
    R: Read,
{
    Plain(R),
    #[cfg(feature = "flate2")]
    Gzip(GzDecoder<R>),
    #[cfg(feature = "lzma-rs")]
    Xz(Cursor<Vec<u8>>),
    #[cfg(feature = "ruzstd")]
    Zstd(StreamingDecoder<R, FrameDecoder>),
}

impl<R: Read> CodecReader<R> {
    /// Wrap `r` in the decoder for `codec`. Callers are expected to have checked
    /// [`Codec::is_available`]; a codec compiled out of this build reports
    /// `io::ErrorKind::Unsupported`.
    pub fn new(r: R, codec: Codec) -> io::Result<Self> {
        Ok(match codec {
            Codec::None => CodecReader::Plain(r),
            #[cfg(feature = "flate2")]
            Codec::Gzip => CodecReader::Gzip(GzDecoder::new(r)),
            #[cfg(feature = "lzma-rs")]
            Codec::Xz => {
                // The xz decompressor doesn't support incremental reading, so uncompress the
                // whole payload into a buffer and use a Cursor as the reader.
                let mut buf_reader = BufReader::new(r);
                let mut buf_writer = Cursor::new(Vec::new());
                xz_decompress(&mut buf_reader, &mut buf_writer)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                buf_writer.set_position(0);
                CodecReader::Xz(buf_writer)
            }
            #[cfg(feature = "ruzstd")]
            Codec::Zstd => {
                let dec = StreamingDecoder::new(r)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                CodecReader::Zstd(dec)
            }
            #[allow(unreachable_patterns)]
            _ => return Err(io::Error::from(io::ErrorKind::Unsupported)),
        })
    }
}

impl<R: Read> Read for CodecReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            CodecReader::Plain(r) => r.read(buf),
            #[cfg(feature = "flate2")]
            CodecReader::Gzip(r) => r.read(buf),
            #[cfg(feature = "lzma-rs")]
            CodecReader::Xz(r) => r.read(buf),
            #[cfg(feature = "ruzstd")]
            CodecReader::Zstd(r) => r.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_plain_passthrough() -> io::Result<()> {
        let data = b"member table bytes".to_vec();
        let mut r = CodecReader::new(Cursor::new(data.clone()), Codec::None)?;
        let mut out = Vec::new();
        r.read_to_end(&mut out)?;
        assert_eq!(out, data);
        Ok(())
    }

    #[cfg(feature = "flate2")]
    #[test]
    fn test_gzip_roundtrip() -> io::Result<()> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let data: Vec<u8> = (0..=255).cycle().take(4096).collect();
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&data)?;
        let compressed = enc.finish()?;

        let mut r = CodecReader::new(Cursor::new(compressed), Codec::Gzip)?;
        let mut out = Vec::new();
        r.read_to_end(&mut out)?;
        assert_eq!(out, data);
        Ok(())
    }
}
