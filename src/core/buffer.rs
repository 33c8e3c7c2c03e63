//! Purpose: Fixed-capacity scratch buffers handed to the native engine.
//! Exports: `ScratchBuf`, `BufferArena`, `write_c_text`, default capacities.
//! Role: Error-message and text-output storage reused by every call on one handle.
//! Invariants: Capacities never grow after construction; the engine writes at most
//! Invariants: `capacity` bytes and anything longer is truncated by the engine itself.
//! Invariants: Text is read up to the first NUL, or the whole buffer if none is present.
use bstr::ByteSlice;

pub const DEFAULT_ERROR_CAPACITY: usize = 255;
pub const DEFAULT_OUTPUT_CAPACITY: usize = 10000;

#[derive(Clone, Debug)]
pub struct ScratchBuf {
    bytes: Vec<u8>,
}

impl ScratchBuf {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity.max(1)],
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Terminate at byte zero so text from a previous call is never re-read.
    pub fn clear(&mut self) {
        self.bytes[0] = 0;
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn text(&self) -> String {
        let end = self.bytes.find_byte(0).unwrap_or(self.bytes.len());
        self.bytes[..end].to_str_lossy().into_owned()
    }

    /// True when the engine left no terminator, or filled every byte before it.
    pub fn is_saturated(&self) -> bool {
        match self.bytes.find_byte(0) {
            Some(end) => end + 1 >= self.bytes.len(),
            None => true,
        }
    }
}

/// Copy `text` into a C char buffer, truncating to leave room for the terminator.
/// Returns the number of text bytes written.
pub fn write_c_text(buf: &mut [u8], text: &str) -> usize {
    let Some(room) = buf.len().checked_sub(1) else {
        return 0;
    };
    let n = text.len().min(room);
    buf[..n].copy_from_slice(&text.as_bytes()[..n]);
    buf[n] = 0;
    n
}

/// The two buffers owned by one engine handle.
#[derive(Clone, Debug)]
pub struct BufferArena {
    error: ScratchBuf,
    output: ScratchBuf,
}

impl BufferArena {
    pub fn new(error_capacity: usize, output_capacity: usize) -> Self {
        Self {
            error: ScratchBuf::with_capacity(error_capacity),
            output: ScratchBuf::with_capacity(output_capacity),
        }
    }

    pub fn reset(&mut self) {
        self.error.clear();
        self.output.clear();
    }

    pub fn error(&self) -> &ScratchBuf {
        &self.error
    }

    pub fn output(&self) -> &ScratchBuf {
        &self.output
    }

    pub fn error_mut(&mut self) -> &mut [u8] {
        self.error.as_mut_slice()
    }

    /// Disjoint borrows for calls that take both buffers: `(output, error)`.
    pub fn split_mut(&mut self) -> (&mut [u8], &mut [u8]) {
        (self.output.as_mut_slice(), self.error.as_mut_slice())
    }
}

impl Default for BufferArena {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_CAPACITY, DEFAULT_OUTPUT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferArena, ScratchBuf, write_c_text};

    fn write(buf: &mut ScratchBuf, text: &[u8]) {
        let slice = buf.as_mut_slice();
        let n = text.len().min(slice.len());
        slice[..n].copy_from_slice(&text[..n]);
        if n < slice.len() {
            slice[n] = 0;
        }
    }

    #[test]
    fn text_stops_at_nul() {
        let mut buf = ScratchBuf::with_capacity(16);
        write(&mut buf, b"bad option\0junk");
        assert_eq!(buf.text(), "bad option");
        assert!(!buf.is_saturated());
    }

    #[test]
    fn unterminated_buffer_reads_whole_capacity() {
        let mut buf = ScratchBuf::with_capacity(8);
        write(&mut buf, b"0123456789");
        assert_eq!(buf.text(), "01234567");
        assert!(buf.is_saturated());
    }

    #[test]
    fn text_one_short_of_capacity_is_saturated() {
        let mut buf = ScratchBuf::with_capacity(8);
        write(&mut buf, b"0123456");
        assert_eq!(buf.text(), "0123456");
        assert!(buf.is_saturated());

        write(&mut buf, b"012345");
        assert!(!buf.is_saturated());
    }

    #[test]
    fn clear_hides_previous_text() {
        let mut arena = BufferArena::new(32, 32);
        write(&mut arena.error, b"stale");
        arena.reset();
        assert_eq!(arena.error().text(), "");
        assert_eq!(arena.output().text(), "");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut buf = ScratchBuf::with_capacity(8);
        write(&mut buf, &[b'o', 0xff, b'k', 0]);
        assert_eq!(buf.text(), "o\u{fffd}k");
    }

    #[test]
    fn write_c_text_truncates_and_terminates() {
        let mut raw = [0xaau8; 6];
        assert_eq!(write_c_text(&mut raw, "engine failed"), 5);
        assert_eq!(&raw, b"engin\0");
        assert_eq!(write_c_text(&mut [], "x"), 0);
    }

    #[test]
    fn default_capacities_match_engine_convention() {
        let arena = BufferArena::default();
        assert_eq!(arena.error().capacity(), 255);
        assert_eq!(arena.output().capacity(), 10000);
    }
}
