use unicode_normalization::UnicodeNormalization;

/// Column width used when rendering answers.
pub const ANSWER_WIDTH: usize = 80;

/// Greedy word wrap into a single string of lines no wider than `width`.
///
/// Whitespace runs (newlines included) collapse to one space, and words
/// longer than `width` are split across lines.
pub fn wrap_text(text: &str, width: usize) -> String {
    let width = width.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();

        // Fill the remainder of the current line with a long word's head
        // before spilling onto fresh lines.
        while chars.len() > width {
            let room = if current.is_empty() {
                width
            } else {
                width.saturating_sub(current_len + 1)
            };
            if room == 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.extend(chars.drain(..room));
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }

        let word_len = chars.len();
        if word_len == 0 {
            continue;
        }
        if !current.is_empty() && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.extend(chars);
        current_len += word_len;
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

/// Escapes text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// NFC-normalizes and trims user input.
pub fn normalize_input(text: &str) -> String {
    text.nfc().collect::<String>().trim().to_string()
}

/// Loggable stand-in for an API key.
pub fn key_fingerprint(key: &str) -> String {
    let head: String = key.chars().take(4).collect();
    format!("{}…({} chars)", head, key.chars().count())
}
