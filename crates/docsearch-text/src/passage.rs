//! Passage selection for context summaries.
//!
//! Text is cut into sentence-bounded chunks around a target length, every
//! chunk is scored and highlighted on its own, the best chunks are kept and
//! then put back into document order.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use docsearch_core::error::Result;
use docsearch_core::types::{Context, ContextOptions, Passage};

use crate::highlight::{Formatter, Highlighter};

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]").expect("static regex"));

/// Splits text into contiguous chunks of roughly `max_size` bytes, ending on
/// sentence terminators where possible. Chunks may run up to 20% over.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    max_size: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self { max_size: 500 }
    }
}

impl TextSplitter {
    pub fn new(max_size: usize) -> Self {
        Self { max_size: max_size.max(1) }
    }

    /// Byte ranges covering `text` front to back.
    pub fn split(&self, text: &str) -> Vec<Range<usize>> {
        let tolerance = self.max_size / 5;
        let max_length = self.max_size + tolerance;
        let min_length = self.max_size - tolerance;

        let mut chunks: Vec<Range<usize>> = Vec::new();
        let mut last: Option<Range<usize>> = None;
        let mut start = 0;
        for m in SENTENCE_END.find_iter(text) {
            let sentence = start..m.end();
            last = match last {
                None => Some(sentence),
                Some(prev) if prev.len() >= self.max_size => {
                    chunks.push(prev);
                    Some(sentence)
                }
                Some(prev) if prev.len() + sentence.len() >= self.max_size => {
                    chunks.push(prev.start..sentence.end);
                    None
                }
                Some(prev) => Some(prev.start..sentence.end),
            };
            start = m.end();
        }

        if start < text.len() {
            last = Some(last.map_or(start, |prev| prev.start)..text.len());
        }
        if let Some(tail) = last {
            match chunks.last_mut() {
                Some(prev) if tail.len() < min_length && tail.end - prev.start <= max_length => prev.end = tail.end,
                _ => chunks.push(tail),
            }
        }
        chunks
    }
}

/// Best `max_passages` chunks of `text`, in document order.
///
/// Selection is by score; chunks without a match only make it in when there
/// are not enough matching ones.
pub fn best_passages(
    highlighter: &dyn Highlighter,
    formatter: &Formatter,
    text: &str,
    max_passages: usize,
    passage_length: usize,
) -> Result<Vec<Passage>> {
    if max_passages == 0 || text.is_empty() {
        return Ok(Vec::new());
    }
    let mut scored = Vec::new();
    for range in TextSplitter::new(passage_length).split(text) {
        let original = &text[range.clone()];
        let (score, highlighted) = highlighter.highlight(original, formatter)?;
        scored.push(Passage { original: original.to_string(), highlighted, start: range.start, end: range.end, score });
    }
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(max_passages);
    scored.sort_by_key(|p| p.start);
    Ok(scored)
}

/// Joins highlighted passages with `delimiter`, stopping once `bytes` is
/// reached, then cuts at `bytes` on a char boundary without splitting a tag.
pub fn render(passages: &[Passage], delimiter: &str, bytes: usize) -> String {
    let mut out = String::new();
    for (i, passage) in passages.iter().enumerate() {
        if i > 0 {
            out.push_str(delimiter);
        }
        out.push_str(&passage.highlighted);
        if out.len() >= bytes {
            break;
        }
    }
    truncate(out, bytes)
}

fn truncate(mut text: String, bytes: usize) -> String {
    if text.len() <= bytes {
        return text;
    }
    let mut cut = bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    if let Some(open) = text.rfind('<') {
        if text.rfind('>').is_none_or(|close| close < open) {
            text.truncate(open);
        }
    }
    text
}

/// Selects, highlights and renders the context summary of one hit.
pub fn build_context(highlighter: &dyn Highlighter, text: &str, options: &ContextOptions) -> Result<Context> {
    let formatter = Formatter::new(&options.highlight_begin, &options.highlight_end);
    let passages = best_passages(highlighter, &formatter, text, options.passages, options.passage_length)?;
    let rendered = render(&passages, &options.delimiter, options.bytes);
    Ok(Context::new(passages, rendered))
}
