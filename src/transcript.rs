//! Rolling transcript of the child's output.
//!
//! Two bounded views over one byte stream: the last K raw bytes, and the last L
//! complete lines plus the trailing partial line with control sequences removed.

use std::collections::VecDeque;
use vte::{Parser as VteParser, Perform};

/// Partial lines longer than this are trimmed from the front.
const MAX_PARTIAL_CHARS: usize = 4096;

pub struct TranscriptBuffer {
    bytes: VecDeque<u8>,
    byte_cap: usize,
    parser: VteParser,
    lines: LineAssembler,
    /// Leading bytes of a UTF-8 sequence the last chunk cut short. The parser
    /// only ever sees whole characters.
    held_utf8: Vec<u8>,
}

impl TranscriptBuffer {
    pub fn new(byte_cap: usize, line_cap: usize) -> Self {
        Self {
            bytes: VecDeque::with_capacity(byte_cap),
            byte_cap,
            parser: VteParser::new(),
            lines: LineAssembler::new(line_cap),
            held_utf8: Vec::with_capacity(3),
        }
    }

    /// Append a chunk as read from the PTY. Chunks may split lines, escape
    /// sequences, or multi-byte characters anywhere.
    pub fn append(&mut self, chunk: &[u8]) {
        if self.byte_cap > 0 {
            let keep = &chunk[chunk.len().saturating_sub(self.byte_cap)..];
            let overflow = (self.bytes.len() + keep.len()).saturating_sub(self.byte_cap);
            self.bytes.drain(..overflow);
            self.bytes.extend(keep);
        }
        let joined;
        let input = if self.held_utf8.is_empty() {
            chunk
        } else {
            let mut buf = std::mem::take(&mut self.held_utf8);
            buf.extend_from_slice(chunk);
            joined = buf;
            joined.as_slice()
        };
        let (ready, held) = input.split_at(input.len() - incomplete_utf8_tail(input));
        self.parser.advance(&mut self.lines, ready);
        self.held_utf8.extend_from_slice(held);
    }

    /// The most recent `k` raw bytes (fewer if less has been seen).
    pub fn tail_bytes(&self, k: usize) -> Vec<u8> {
        let skip = self.bytes.len().saturating_sub(k);
        self.bytes.iter().skip(skip).copied().collect()
    }

    /// The most recent `n` complete lines followed by the partial line, joined with `\n`.
    pub fn tail_lines(&self, n: usize) -> String {
        let skip = self.lines.complete.len().saturating_sub(n);
        let mut out: Vec<&str> = self
            .lines
            .complete
            .iter()
            .skip(skip)
            .map(String::as_str)
            .collect();
        if !self.lines.partial.is_empty() {
            out.push(&self.lines.partial);
        }
        out.join("\n")
    }

    /// Byte-capped view decoded for matching: escape sequences removed, invalid UTF-8 replaced.
    pub fn byte_window_text(&self) -> String {
        let raw = self.tail_bytes(self.byte_cap);
        let stripped = strip_ansi_escapes::strip(raw);
        String::from_utf8_lossy(&stripped).into_owned()
    }

    /// Line-capped view, oldest first; the partial line (if any) comes last.
    pub fn line_window(&self) -> impl Iterator<Item = &str> + Clone {
        let partial = (!self.lines.partial.is_empty()).then_some(self.lines.partial.as_str());
        self.lines
            .complete
            .iter()
            .map(String::as_str)
            .chain(partial)
    }

    /// Last non-blank line of the line view, for log lines.
    pub fn last_visible_line(&self) -> Option<&str> {
        self.line_window()
            .filter(|line| !line.trim().is_empty())
            .last()
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn complete_line_count(&self) -> usize {
        self.lines.complete.len()
    }

    pub fn partial_line(&self) -> &str {
        &self.lines.partial
    }
}

/// Builds lines from parser callbacks. Cursor movement is not emulated.
struct LineAssembler {
    complete: VecDeque<String>,
    line_cap: usize,
    partial: String,
    partial_chars: usize,
    /// A CR was seen and no LF followed yet; the next printable restarts the line.
    pending_cr: bool,
}

impl LineAssembler {
    fn new(line_cap: usize) -> Self {
        Self {
            complete: VecDeque::with_capacity(line_cap),
            line_cap,
            partial: String::new(),
            partial_chars: 0,
            pending_cr: false,
        }
    }

    fn push_char(&mut self, c: char) {
        if self.pending_cr {
            self.clear_partial();
            self.pending_cr = false;
        }
        self.partial.push(c);
        self.partial_chars += 1;
        if self.partial_chars > MAX_PARTIAL_CHARS {
            let cut = self
                .partial
                .char_indices()
                .nth(MAX_PARTIAL_CHARS / 2)
                .map_or(self.partial.len(), |(idx, _)| idx);
            self.partial.drain(..cut);
            self.partial_chars -= MAX_PARTIAL_CHARS / 2;
        }
    }

    fn finish_line(&mut self) {
        self.pending_cr = false;
        let line = std::mem::take(&mut self.partial);
        self.partial_chars = 0;
        if self.line_cap == 0 {
            return;
        }
        if self.complete.len() == self.line_cap {
            self.complete.pop_front();
        }
        self.complete.push_back(line);
    }

    fn backspace(&mut self) {
        if self.pending_cr {
            return;
        }
        if self.partial.pop().is_some() {
            self.partial_chars -= 1;
        }
    }

    fn clear_partial(&mut self) {
        self.partial.clear();
        self.partial_chars = 0;
    }
}

impl Perform for LineAssembler {
    fn print(&mut self, c: char) {
        self.push_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.finish_line(),
            b'\r' => self.pending_cr = true,
            b'\t' => self.push_char(' '),
            0x08 => self.backspace(),
            _ => {}
        }
    }
}

/// Length of a trailing UTF-8 sequence that is started but not finished, if any.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let needed = match bytes[bytes.len() - back] {
            0x80..=0xBF => continue,
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return 0,
        };
        return if needed > back { back } else { 0 };
    }
    0
}
