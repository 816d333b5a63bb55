//! Line-preserving message splitting for size-limited channels.
//!
//! Lengths are counted in Unicode scalar values (`char`s), which is what both
//! Telegram and Mastodon count against their limits.

/// Split `text` into ordered segments of at most `max_len` characters.
///
/// Whole lines (newline included) are packed greedily; a line that would
/// overflow the current segment starts the next one. A single line longer
/// than `max_len` is hard-split at `max_len` character boundaries. The
/// concatenation of the returned segments is exactly `text`.
///
/// A `max_len` of zero is treated as one.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    if text.is_empty() {
        return Vec::new();
    }
    if char_len(text) <= max_len {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = char_len(line);

        if line_len > max_len {
            if !cur.is_empty() {
                out.push(std::mem::take(&mut cur));
            }
            let mut pieces = hard_split(line, max_len);
            // The tail may still share a segment with the following lines.
            let tail = pieces.pop().unwrap_or_default();
            out.extend(pieces);
            cur_len = char_len(&tail);
            cur = tail;
            continue;
        }

        if cur_len + line_len > max_len {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        cur.push_str(line);
        cur_len += line_len;
    }

    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut `line` into pieces of exactly `max_len` chars (the last one may be shorter).
fn hard_split(line: &str, max_len: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut cur = String::new();
    let mut n = 0usize;
    for ch in line.chars() {
        if n == max_len {
            pieces.push(std::mem::take(&mut cur));
            n = 0;
        }
        cur.push(ch);
        n += 1;
    }
    if !cur.is_empty() {
        pieces.push(cur);
    }
    pieces
}
