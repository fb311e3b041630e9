//! Paragraph-boundary page chunker.
//!
//! Splits the text of one page into [`Fragment`]s that respect a
//! `max_tokens` limit. Splitting happens on paragraph boundaries (`\n\n`)
//! first; a paragraph longer than the limit is hard-split at the last
//! newline or space before the boundary. A fragment never spans pages.

use sha2::{Digest, Sha256};

use crate::models::Fragment;

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split one page into fragments with contiguous chunk indices from 0.
/// A blank page yields no fragments.
pub fn chunk_page(source: &str, page: usize, text: &str, max_tokens: usize) -> Vec<Fragment> {
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let mut pieces: Vec<String> = Vec::new();
    let mut current_buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            pieces.push(std::mem::take(&mut current_buf));
        }

        if trimmed.len() > max_chars {
            hard_split(trimmed, max_chars, &mut pieces);
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        pieces.push(current_buf);
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| make_fragment(source, page, index, text))
        .collect()
}

fn hard_split(paragraph: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut remaining = paragraph;
    while !remaining.is_empty() {
        let mut split_at = remaining.len().min(max_chars);
        while !remaining.is_char_boundary(split_at) {
            split_at -= 1;
        }
        let actual_split = if split_at < remaining.len() {
            remaining[..split_at]
                .rfind('\n')
                .or_else(|| remaining[..split_at].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(split_at)
        } else {
            split_at
        };
        // a single multi-byte char wider than max_chars
        let actual_split = if actual_split == 0 {
            remaining.chars().next().map_or(remaining.len(), char::len_utf8)
        } else {
            actual_split
        };
        let piece = remaining[..actual_split].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[actual_split..];
    }
}

fn make_fragment(source: &str, page: usize, index: usize, text: String) -> Fragment {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Fragment {
        id: format!("p{}-c{}", page, index),
        source: source.to_string(),
        page,
        chunk_index: index,
        text,
        hash,
    }
}
