//! Greedy line wrapping for rendered answers.

/// Wraps every line of `text` to at most `width` columns.
///
/// Lines are filled greedily word by word; runs of whitespace collapse to a
/// single space and words longer than `width` are broken. Blank lines stay
/// blank. A `width` of zero returns the text unchanged.
pub fn wrap_text(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }
    text.split('\n')
        .map(|line| fill(line, width))
        .collect::<Vec<_>>()
        .join("\n")
}

fn fill(line: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        if current_len > 0 && current_len + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }

        while current_len == 0 && word.len() > width {
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        if word.is_empty() {
            continue;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}
