//! Single-file fetch

use std::io::{ErrorKind, Read, Write};

use svnlocal_fs::{PropMap, Revnum};

use crate::error::{RaError, Result};

/// Bytes moved per read/write round
pub const CHUNK_SIZE: usize = 102400;

/// What `get_file` resolved and, when asked, the file's properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub revision: Revnum,
    /// Node properties plus entry properties
    pub props: Option<PropMap>,
}

/// Read up to a full chunk; a short result means end of stream
fn read_chunk(source: &mut dyn Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Copy `source` to `sink` in `CHUNK_SIZE` pieces. A sink that accepts
/// fewer bytes than offered without reporting an error breaks its
/// contract and fails the copy with `UnexpectedEof`.
pub fn copy_chunked(source: &mut dyn Read, sink: &mut dyn Write) -> Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = read_chunk(source, &mut buf)?;
        if read > 0 {
            let written = sink.write(&buf[..read])?;
            if written != read {
                return Err(RaError::UnexpectedEof);
            }
            total += read as u64;
        }
        if read != CHUNK_SIZE {
            break;
        }
    }
    sink.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Accepts at most `limit` bytes per write
    struct Stingy {
        limit: usize,
        data: Vec<u8>,
    }

    impl Write for Stingy {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn content(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_copy_across_chunk_boundaries() {
        for len in [0, 1, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 3 * CHUNK_SIZE + 17] {
            let data = content(len);
            let mut sink = Vec::new();
            let copied = copy_chunked(&mut Cursor::new(data.clone()), &mut sink).unwrap();
            assert_eq!(copied, len as u64);
            assert_eq!(sink, data);
        }
    }

    #[test]
    fn test_short_write_is_unexpected_eof() {
        let mut sink = Stingy {
            limit: 10,
            data: Vec::new(),
        };
        let result = copy_chunked(&mut Cursor::new(content(100)), &mut sink);
        assert!(matches!(result, Err(RaError::UnexpectedEof)));
    }

    #[test]
    fn test_sink_error_is_propagated() {
        let result = copy_chunked(&mut Cursor::new(content(5)), &mut Broken);
        assert!(matches!(result, Err(RaError::Io(_))));
    }
}
