//! Splitting long replies into messages that fit the transport limit.
//!
//! Cuts prefer, in order: right after a newline, right after a `". "` sentence
//! end, right before a space, and finally the raw position (possibly mid-word).
//! Lengths are counted in chars, never bytes, so multi-byte text is never split
//! inside a code point.

use std::str::CharIndices;

/// Lazily split `text` into chunks of at most `max_len` chars.
///
/// Concatenating the chunks reproduces `text` exactly. `max_len` of 0 is
/// treated as 1.
pub fn chunk_text(text: &str, max_len: usize) -> TextChunks<'_> {
    TextChunks::new(text, max_len)
}

#[derive(Clone, Copy, Debug, Default)]
struct Mark {
    ch: usize,
    byte: usize,
}

pub struct TextChunks<'a> {
    text: &'a str,
    max_len: usize,
    total_chars: usize,
    chars: CharIndices<'a>,
    pos: usize,
    prev: Option<char>,
    last_cut: Mark,
    newline: Mark,
    sentence: Mark,
    space: Mark,
    tail_only: bool,
    finished: bool,
}

impl<'a> TextChunks<'a> {
    fn new(text: &'a str, max_len: usize) -> Self {
        let max_len = max_len.max(1);
        let total_chars = text.chars().count();
        Self {
            text,
            max_len,
            total_chars,
            chars: text.char_indices(),
            pos: 0,
            prev: None,
            last_cut: Mark::default(),
            newline: Mark::default(),
            sentence: Mark::default(),
            space: Mark::default(),
            // Short input is emitted whole, without scanning.
            tail_only: total_chars < max_len,
            finished: false,
        }
    }

    fn best_anchor(&self, here: Mark) -> Mark {
        [self.newline, self.sentence, self.space]
            .into_iter()
            .find(|a| a.ch > self.last_cut.ch)
            .unwrap_or(here)
    }

    fn record_anchors(&mut self, here: Mark, ch: char) {
        match ch {
            '\n' => {
                self.newline = Mark {
                    ch: here.ch + 1,
                    byte: here.byte + ch.len_utf8(),
                }
            }
            ' ' => {
                if self.prev == Some('.') {
                    self.sentence = Mark {
                        ch: here.ch + 1,
                        byte: here.byte + 1,
                    };
                }
                self.space = here;
            }
            _ => {}
        }
    }

    fn tail(&mut self) -> &'a str {
        self.finished = true;
        &self.text[self.last_cut.byte..]
    }
}

impl<'a> Iterator for TextChunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.finished {
            return None;
        }
        if self.tail_only {
            return Some(self.tail());
        }

        while let Some((byte, ch)) = self.chars.next() {
            let here = Mark { ch: self.pos, byte };

            let mut emitted = None;
            if here.ch - self.last_cut.ch >= self.max_len {
                let cut = self.best_anchor(here);
                emitted = Some(&self.text[self.last_cut.byte..cut.byte]);
                self.last_cut = cut;
            }

            self.record_anchors(here, ch);
            self.prev = Some(ch);
            self.pos += 1;

            if let Some(chunk) = emitted {
                if self.total_chars - self.last_cut.ch < self.max_len {
                    self.tail_only = true;
                }
                return Some(chunk);
            }
        }

        Some(self.tail())
    }
}
