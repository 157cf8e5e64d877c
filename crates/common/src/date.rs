use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date {
    // Lexicographic Vec ordering is exactly the comparison contract.
    tokens: Vec<i32>,
}

// Ranges per token position, year first. Validation stops at the first
// token that falls outside its range, truncating precision.
const TOKEN_RANGES: [(i32, i32); 6] = [
    (1, i32::MAX),
    (1, 12),
    (1, 31),
    (0, 23),
    (0, 59),
    (0, 59),
];

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(\d{4})([-.](\d{2})([-.](\d{2})([T ](\d{2})([:.](\d{2})([:.](\d{2})(Z)?)?)?)?)?)?$",
        )
        .unwrap()
    })
}

impl Date {
    pub fn parse(timestamp: &str) -> Option<Self> {
        let caps = match timestamp_regex().captures(timestamp) {
            Some(caps) => caps,
            None => return timestamp.parse::<i32>().ok().and_then(Self::from_year),
        };
        let mut tokens = Vec::new();
        for group in [1, 3, 5, 7, 9, 11] {
            match caps.get(group).and_then(|m| m.as_str().parse::<i32>().ok()) {
                Some(token) => tokens.push(token),
                None => break,
            }
        }
        Self::from_tokens(&tokens)
    }

    // Eight-digit years are packed YYYYMMDD timestamps, which some taggers
    // write into plain year fields.
    pub fn from_year(year: i32) -> Option<Self> {
        if (10_000_000..=100_000_000).contains(&year) {
            let digits = year.to_string();
            let y = digits[0..4].parse().ok()?;
            let m = digits[4..6].parse().ok()?;
            let d = digits[6..8].parse().ok()?;
            Self::from_tokens(&[y, m, d])
        } else {
            Self::from_tokens(&[year])
        }
    }

    pub fn from_ymd(year: i32, month: i32, day: i32) -> Option<Self> {
        Self::from_tokens(&[year, month, day])
    }

    pub fn from_ymd_hm(year: i32, month: i32, day: i32, hour: i32, minute: i32) -> Option<Self> {
        Self::from_tokens(&[year, month, day, hour, minute])
    }

    fn from_tokens(src: &[i32]) -> Option<Self> {
        let mut tokens = Vec::new();
        for (token, (lo, hi)) in src.iter().zip(TOKEN_RANGES) {
            if *token < lo || *token > hi {
                break;
            }
            tokens.push(*token);
        }
        if tokens.is_empty() {
            return None;
        }
        Some(Self { tokens })
    }

    pub fn year(&self) -> i32 {
        self.tokens[0]
    }

    pub fn month(&self) -> Option<i32> {
        self.tokens.get(1).copied()
    }

    pub fn day(&self) -> Option<i32> {
        self.tokens.get(2).copied()
    }

    fn token(&self, index: usize) -> Option<i32> {
        self.tokens.get(index).copied()
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", fixed_width(self.tokens[0], 4))?;
        let month = match self.token(1) {
            Some(month) => month,
            None => return Ok(()),
        };
        write!(f, "-{}", fixed_width(month, 2))?;
        let day = match self.token(2) {
            Some(day) => day,
            None => return Ok(()),
        };
        write!(f, "-{}", fixed_width(day, 2))?;
        let hour = match self.token(3) {
            Some(hour) => hour,
            None => return Ok(()),
        };
        write!(f, "T{}", fixed_width(hour, 2))?;
        let minute = match self.token(4) {
            Some(minute) => minute,
            None => return f.write_str("Z"),
        };
        write!(f, ":{}", fixed_width(minute, 2))?;
        let second = match self.token(5) {
            Some(second) => second,
            None => return f.write_str("Z"),
        };
        write!(f, ":{}Z", fixed_width(second, 2))
    }
}

fn fixed_width(value: i32, width: usize) -> String {
    let mut digits = format!("{:0>width$}", value, width = width);
    digits.truncate(width);
    digits
}

#[cfg(test)]
mod tests {
    use super::Date;

    fn parsed(timestamp: &str) -> Date {
        Date::parse(timestamp).unwrap()
    }

    #[test]
    fn parses_at_every_precision() {
        assert_eq!(parsed("2020").to_string(), "2020");
        assert_eq!(parsed("2020-03").to_string(), "2020-03");
        assert_eq!(parsed("2020-03-15").to_string(), "2020-03-15");
        assert_eq!(parsed("2020-03-15T10").to_string(), "2020-03-15T10Z");
        assert_eq!(parsed("2020-03-15T10:23").to_string(), "2020-03-15T10:23Z");
        assert_eq!(
            parsed("2020-03-15T10:23:50Z").to_string(),
            "2020-03-15T10:23:50Z"
        );
    }

    #[test]
    fn truncates_at_first_invalid_token() {
        // Month 13 is invalid, so precision stops at the year.
        assert_eq!(parsed("2020-13-15").to_string(), "2020");
        // Day 40 is invalid, so the hour cannot survive either.
        assert_eq!(parsed("2020-06-40T10").to_string(), "2020-06");
    }

    #[test]
    fn rejects_fully_invalid_input() {
        assert_eq!(Date::parse("not a date"), None);
        assert_eq!(Date::parse("0000"), None);
        assert_eq!(Date::from_year(0), None);
    }

    #[test]
    fn falls_back_to_integer_years() {
        assert_eq!(parsed("65").to_string(), "0065");
        // Packed YYYYMMDD in a year field.
        assert_eq!(Date::from_year(20200315).unwrap().to_string(), "2020-03-15");
    }

    #[test]
    fn ordering_is_lexicographic_with_precision() {
        assert!(parsed("2020") < parsed("2020-01"));
        assert!(parsed("2020-01") < parsed("2020-01-02"));
        assert!(parsed("2019-12-31") < parsed("2020"));
        assert!(parsed("2020-03-15") < parsed("2020-03-16"));
        assert_eq!(parsed("2020-03-15"), parsed("2020.03.15"));
    }
}
