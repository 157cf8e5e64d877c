pub const SEPARATOR_CHARS: [char; 5] = [',', ';', '/', '+', '&'];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Separators {
    chars: Vec<char>,
}

impl Separators {
    pub fn from_chars(chars: &str) -> Self {
        let mut accepted = Vec::new();
        for ch in chars.chars() {
            if SEPARATOR_CHARS.contains(&ch) && !accepted.contains(&ch) {
                accepted.push(ch);
            }
        }
        Self { chars: accepted }
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn split(&self, value: &str) -> Vec<String> {
        let segments = split_escaped(value, |ch| self.chars.contains(&ch));
        segments
            .iter()
            .filter_map(|segment| correct_whitespace(segment))
            .collect()
    }
}

// A backslash before a separator escapes it. Interior empty segments are
// kept; a trailing empty segment is not.
pub fn split_escaped(value: &str, selector: impl Fn(char) -> bool) -> Vec<String> {
    let mut split = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if selector(ch) {
            split.push(std::mem::take(&mut current));
            continue;
        }
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if selector(next) {
                    // Escaped separator, emit it without splitting.
                    current.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        current.push(ch);
    }

    if !current.is_empty() {
        split.push(current);
    }
    split
}

// Escapes embedded separators so split_escaped recovers the originals.
pub fn join_escaped(values: &[String], separator: char) -> String {
    let mut joined = String::new();
    for (position, value) in values.iter().enumerate() {
        if position > 0 {
            joined.push(separator);
        }
        for ch in value.chars() {
            if ch == separator {
                joined.push('\\');
            }
            joined.push(ch);
        }
    }
    joined
}

pub fn correct_whitespace(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
