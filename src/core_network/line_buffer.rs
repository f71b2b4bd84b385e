use std::io;

use tokio::net::TcpStream;

use crate::constants::LINE_BUFFER_SIZE;

/// A byte source that can be polled without blocking.
///
/// `pull` reads into `buf` and returns the number of bytes read. Zero
/// means the source reached end-of-stream. A read that would block must
/// fail with `io::ErrorKind::WouldBlock`; the buffer treats that as "no
/// data right now", never as an error.
pub trait LineSource {
    fn pull(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl LineSource for TcpStream {
    fn pull(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.try_read(buf)
    }
}

/// Ring buffer reassembling a TCP byte stream into protocol lines.
///
/// The protocol is line-based but a single socket read may return part
/// of a line, or several lines. Incoming bytes accumulate in a
/// fixed-size ring; `next_line` hands them back one `\n`-terminated
/// line at a time. The ring holds at most `LINE_BUFFER_SIZE - 1` bytes
/// so that `read_idx == write_idx` always means empty.
pub struct LineBuffer {
    buf: [u8; LINE_BUFFER_SIZE],
    read_idx: usize,
    write_idx: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        LineBuffer {
            buf: [0; LINE_BUFFER_SIZE],
            read_idx: 0,
            write_idx: 0,
        }
    }

    /// Fetches the next line from the buffer, pulling from `source` if no
    /// complete line is buffered yet.
    ///
    /// Returns `(Some(line), _)` with the terminating `\n` stripped
    /// (carriage returns are preserved), or `(None, closed)` where
    /// `closed` reports whether the source reached end-of-stream. Fails
    /// when the source fails with anything other than `WouldBlock`, or
    /// when the buffer fills up without containing a newline: the peer
    /// is sending an oversized line and can never make progress again.
    pub fn next_line<S: LineSource>(
        &mut self,
        source: &mut S,
    ) -> io::Result<(Option<String>, bool)> {
        if let Some(end) = self.find_newline() {
            return Ok((Some(self.consume(end)), false));
        }

        let closed = self.fill_from(source)?;

        if let Some(end) = self.find_newline() {
            return Ok((Some(self.consume(end)), false));
        }

        if self.full() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "line exceeds buffer capacity",
            ));
        }

        Ok((None, closed))
    }

    /// Pulls as much data as is immediately available into the free
    /// region of the ring. When the free region wraps past the end of
    /// the array the pull happens in two segments; the second is
    /// attempted only if the first filled completely (meaning more bytes
    /// may be pending). Returns true if the source reported EOF.
    fn fill_from<S: LineSource>(&mut self, source: &mut S) -> io::Result<bool> {
        loop {
            if self.full() {
                return Ok(false);
            }

            let (start, len) = if self.write_idx < self.read_idx {
                // Straight read into the gap, leaving one byte free.
                (self.write_idx, self.read_idx - self.write_idx - 1)
            } else if self.read_idx == 0 {
                // The free region ends at the last array slot; it cannot
                // wrap because slot SIZE-1 is the one byte kept free.
                (self.write_idx, LINE_BUFFER_SIZE - self.write_idx - 1)
            } else {
                // First of up to two segments: fill to end-of-array.
                (self.write_idx, LINE_BUFFER_SIZE - self.write_idx)
            };

            let received = match source.pull(&mut self.buf[start..start + len]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) => return Err(e),
            };

            if received == 0 {
                return Ok(true);
            }

            self.write_idx = (self.write_idx + received) % LINE_BUFFER_SIZE;

            // A short read means the socket is drained for now.
            if received < len {
                return Ok(false);
            }
        }
    }

    fn find_newline(&self) -> Option<usize> {
        let mut i = self.read_idx;
        while i != self.write_idx {
            if self.buf[i] == b'\n' {
                return Some(i);
            }
            i = (i + 1) % LINE_BUFFER_SIZE;
        }
        None
    }

    /// Removes the bytes from `read_idx` up to (not including) the
    /// newline at `end` and returns them as a string; the read cursor
    /// advances past the newline.
    fn consume(&mut self, end: usize) -> String {
        let mut bytes = Vec::new();
        let mut i = self.read_idx;
        while i != end {
            bytes.push(self.buf[i]);
            i = (i + 1) % LINE_BUFFER_SIZE;
        }
        self.read_idx = (end + 1) % LINE_BUFFER_SIZE;
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn full(&self) -> bool {
        self.read_idx == (self.write_idx + 1) % LINE_BUFFER_SIZE
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Test source yielding scripted chunks, then would-block or EOF.
    struct ChunkSource {
        chunks: VecDeque<Vec<u8>>,
        closed: bool,
    }

    impl ChunkSource {
        fn new(chunks: &[&[u8]], closed: bool) -> Self {
            ChunkSource {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
                closed,
            }
        }
    }

    impl LineSource for ChunkSource {
        fn pull(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(mut chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.chunks.push_front(chunk.split_off(n));
                    }
                    Ok(n)
                }
                None if self.closed => Ok(0),
                None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
            }
        }
    }

    fn line<S: LineSource>(buffer: &mut LineBuffer, source: &mut S) -> Option<String> {
        buffer.next_line(source).unwrap().0
    }

    #[test]
    fn splits_a_single_pull_into_lines() {
        let mut source = ChunkSource::new(&[b"login alice\npass secret\n"], false);
        let mut buffer = LineBuffer::new();

        assert_eq!(line(&mut buffer, &mut source).unwrap(), "login alice");
        assert_eq!(line(&mut buffer, &mut source).unwrap(), "pass secret");
        assert_eq!(buffer.next_line(&mut source).unwrap(), (None, false));
    }

    #[test]
    fn reassembles_a_line_split_across_pulls() {
        let mut source = ChunkSource::new(&[b"who", b"ami", b"\n"], false);
        let mut buffer = LineBuffer::new();

        assert_eq!(line(&mut buffer, &mut source).unwrap(), "whoami");
    }

    #[test]
    fn preserves_carriage_returns() {
        let mut source = ChunkSource::new(&[b"exit\r\n"], false);
        let mut buffer = LineBuffer::new();

        assert_eq!(line(&mut buffer, &mut source).unwrap(), "exit\r");
    }

    #[test]
    fn reports_end_of_stream() {
        let mut source = ChunkSource::new(&[b"ls\n"], true);
        let mut buffer = LineBuffer::new();

        assert_eq!(line(&mut buffer, &mut source).unwrap(), "ls");
        assert_eq!(buffer.next_line(&mut source).unwrap(), (None, true));
    }

    #[test]
    fn would_block_is_not_end_of_stream() {
        let mut source = ChunkSource::new(&[], false);
        let mut buffer = LineBuffer::new();

        assert_eq!(buffer.next_line(&mut source).unwrap(), (None, false));
    }

    #[test]
    fn drops_an_unterminated_trailing_line_at_eof() {
        let mut source = ChunkSource::new(&[b"ls\nincomplete"], true);
        let mut buffer = LineBuffer::new();

        assert_eq!(line(&mut buffer, &mut source).unwrap(), "ls");
        assert_eq!(buffer.next_line(&mut source).unwrap(), (None, true));
    }

    #[test]
    fn wraps_around_the_ring() {
        // Drive the cursors close to the end of the array, then feed a
        // line that wraps past it.
        let first = vec![b'a'; 3000];
        let mut opening = first.clone();
        opening.push(b'\n');

        let mut source = ChunkSource::new(&[&opening], false);
        let mut buffer = LineBuffer::new();
        assert_eq!(line(&mut buffer, &mut source).unwrap().len(), 3000);

        let second = vec![b'b'; 2000];
        let mut wrapped = second.clone();
        wrapped.push(b'\n');
        let mut source = ChunkSource::new(&[&wrapped], false);
        assert_eq!(
            line(&mut buffer, &mut source).unwrap(),
            String::from_utf8(second).unwrap()
        );
    }

    #[test]
    fn accepts_the_longest_representable_line() {
        // One slot is kept free and one byte is the newline, so the
        // longest line the ring can hold is SIZE - 2 bytes.
        let mut payload = vec![b'x'; LINE_BUFFER_SIZE - 2];
        payload.push(b'\n');
        let mut source = ChunkSource::new(&[&payload], false);
        let mut buffer = LineBuffer::new();

        assert_eq!(
            line(&mut buffer, &mut source).unwrap().len(),
            LINE_BUFFER_SIZE - 2
        );
    }

    #[test]
    fn rejects_a_line_that_overflows_the_ring() {
        let payload = vec![b'x'; LINE_BUFFER_SIZE];
        let mut source = ChunkSource::new(&[&payload], false);
        let mut buffer = LineBuffer::new();

        let err = buffer.next_line(&mut source).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn propagates_fatal_source_errors() {
        struct BrokenSource;
        impl LineSource for BrokenSource {
            fn pull(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::ConnectionReset))
            }
        }

        let mut buffer = LineBuffer::new();
        let err = buffer.next_line(&mut BrokenSource).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
