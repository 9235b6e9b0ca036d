//! Splits raw stdin bytes into complete key sequences.
//!
//! A lone `Esc` is ambiguous until either more bytes arrive or the escape timeout passes, so
//! incomplete tails stay buffered and are flushed verbatim once the deadline is reached.

use std::time::{Duration, Instant};

const ESC: char = '\x1b';

#[derive(Debug, PartialEq, Eq)]
enum SequenceStatus {
    Complete,
    Incomplete,
}

#[derive(Debug)]
pub struct KeyDecoder {
    buffer: String,
    /// Trailing bytes of a UTF-8 character split across reads.
    partial_utf8: Vec<u8>,
    timeout: Duration,
    flush_deadline: Option<Instant>,
}

impl KeyDecoder {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            buffer: String::new(),
            partial_utf8: Vec::new(),
            timeout: Duration::from_millis(timeout_ms),
            flush_deadline: None,
        }
    }

    /// Feeds bytes read from stdin and returns every sequence they complete, in order.
    pub fn process(&mut self, data: &[u8]) -> Vec<String> {
        self.flush_deadline = None;

        let mut bytes = std::mem::take(&mut self.partial_utf8);
        bytes.extend_from_slice(data);
        let text = match std::str::from_utf8(&bytes) {
            Ok(text) => text.to_string(),
            Err(err) if err.error_len().is_none() => {
                let valid = err.valid_up_to();
                self.partial_utf8 = bytes[valid..].to_vec();
                String::from_utf8_lossy(&bytes[..valid]).into_owned()
            }
            Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
        };

        self.buffer.push_str(&text);
        let (sequences, consumed) = split_sequences(&self.buffer);
        self.buffer.drain(..consumed);

        if !self.buffer.is_empty() {
            self.flush_deadline = Some(Instant::now() + self.timeout);
        }
        sequences
    }

    /// Emits the buffered tail once its deadline has passed.
    pub fn flush_due(&mut self, now: Instant) -> Vec<String> {
        if self.buffer.is_empty() {
            self.flush_deadline = None;
            return Vec::new();
        }
        match self.flush_deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => Vec::new(),
        }
    }

    /// Milliseconds a poll may block before [`KeyDecoder::flush_due`] needs to run.
    pub fn next_timeout_ms(&self, now: Instant, default_ms: i32) -> i32 {
        match self.flush_deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(now);
                let ms = i32::try_from(remaining.as_millis()).unwrap_or(i32::MAX);
                ms.min(default_ms).max(0)
            }
            None => default_ms,
        }
    }

    pub fn flush(&mut self) -> Vec<String> {
        self.flush_deadline = None;
        if self.buffer.is_empty() {
            return Vec::new();
        }
        vec![std::mem::take(&mut self.buffer)]
    }
}

/// Returns the complete sequences at the front of `buffer` and how many bytes they span.
fn split_sequences(buffer: &str) -> (Vec<String>, usize) {
    let mut sequences = Vec::new();
    let mut pos = 0;

    while let Some(ch) = buffer[pos..].chars().next() {
        if ch != ESC {
            sequences.push(ch.to_string());
            pos += ch.len_utf8();
            continue;
        }

        let rest = &buffer[pos..];
        let Some(end) = (1..=rest.len())
            .filter(|end| rest.is_char_boundary(*end))
            .find(|end| sequence_status(&rest[..*end]) == SequenceStatus::Complete)
        else {
            break;
        };
        sequences.push(rest[..end].to_string());
        pos += end;
    }

    (sequences, pos)
}

fn sequence_status(data: &str) -> SequenceStatus {
    let Some(after) = data.strip_prefix(ESC) else {
        return SequenceStatus::Complete;
    };

    if after.is_empty() {
        return SequenceStatus::Incomplete;
    }
    if let Some(body) = after.strip_prefix('[') {
        return csi_status(body);
    }
    if let Some(body) = after.strip_prefix('O') {
        return if body.is_empty() {
            SequenceStatus::Incomplete
        } else {
            SequenceStatus::Complete
        };
    }
    // Alt+<char>, or a doubled Esc.
    SequenceStatus::Complete
}

fn csi_status(body: &str) -> SequenceStatus {
    match body.as_bytes().last() {
        Some(last) if (0x40..=0x7e).contains(last) => SequenceStatus::Complete,
        _ => SequenceStatus::Incomplete,
    }
}
