//! The fixed-window chunking algorithm (`spec.md` §4.2).
//!
//! Splits a large text into overlapping windows, preferring to break at a
//! word boundary near the end of a window rather than mid-word, while
//! guaranteeing termination and a bounded number of chunks regardless of
//! input shape.

/// Hard ceiling on the number of chunks a single call can produce, matching
/// the reference implementation's runaway-memory guard.
pub const MAX_CHUNKS: usize = 10_000;

/// Split `text` into overlapping chunks of at most `chunk_size` characters,
/// each trimmed of leading/trailing whitespace.
///
/// Returns `[text]` unchanged (just trimmed) when `text` already fits in one
/// chunk. `chunk_overlap` must be less than `chunk_size`; callers that pass
/// an overlap `>= chunk_size` get forward-progress-guaranteed behavior
/// identical to `chunk_overlap = 0`, since the overlap is clamped before use.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len <= chunk_size {
        return vec![text.trim().to_string()];
    }

    let chunk_size = chunk_size.max(1);
    let overlap = chunk_overlap.min(chunk_size.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        if chunks.len() >= MAX_CHUNKS {
            break;
        }

        let mut end = (start + chunk_size).min(len);

        if end < len {
            if let Some(break_at) = last_space_past_midpoint(&chars[start..end], chunk_size) {
                end = start + break_at;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end >= len {
            break;
        }

        let mut next_start = end.saturating_sub(overlap);
        if next_start <= start {
            next_start = end;
        }
        if next_start == start {
            break;
        }
        start = next_start;
    }

    chunks
}

/// Finds the last space character in `window` whose index lies strictly
/// past the midpoint of `chunk_size`, i.e. more than `chunk_size / 2`
/// characters into the window. Returns `None` if no such space exists,
/// leaving the caller to break exactly at the window's end.
fn last_space_past_midpoint(window: &[char], chunk_size: usize) -> Option<usize> {
    let midpoint = chunk_size / 2;
    window
        .iter()
        .rposition(|c| *c == ' ')
        .filter(|idx| *idx > midpoint)
}
