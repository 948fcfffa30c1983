use std::collections::VecDeque;

use parking_lot::Mutex;

/// Maximum number of output chunks kept per surface
const MAX_OUTPUT_HISTORY: usize = 1000;

/// Bounded scrollback of raw output chunks.
pub struct OutputBuffer {
    chunks: Mutex<VecDeque<Vec<u8>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(VecDeque::with_capacity(64)),
        }
    }

    pub fn append(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut chunks = self.chunks.lock();
        if chunks.len() >= MAX_OUTPUT_HISTORY {
            chunks.pop_front();
        }
        chunks.push_back(data.to_vec());
    }

    /// Everything retained, concatenated.
    pub fn contents(&self) -> Vec<u8> {
        self.chunks.lock().iter().flatten().copied().collect()
    }

    pub fn clear(&self) {
        self.chunks.lock().clear();
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_most_recent_chunks() {
        let buffer = OutputBuffer::new();
        for i in 0..(MAX_OUTPUT_HISTORY + 5) {
            buffer.append(format!("{};", i).as_bytes());
        }
        let contents = String::from_utf8(buffer.contents()).unwrap();
        assert!(contents.starts_with("5;6;"));
        assert!(contents.ends_with(&format!("{};", MAX_OUTPUT_HISTORY + 4)));
    }

    #[test]
    fn bytes_are_kept_verbatim() {
        let buffer = OutputBuffer::new();
        buffer.append(&[0x1b, b'[', b'm', 0xff]);
        buffer.append(b"");
        assert_eq!(buffer.contents(), vec![0x1b, b'[', b'm', 0xff]);
        buffer.clear();
        assert!(buffer.contents().is_empty());
    }
}
