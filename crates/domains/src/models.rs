//! # Domain Models
//!
//! These structs represent the core entities of the roaming library.
//! Documents are sharded into 28 fixed buckets by the first character of
//! their file name; forum records carry time-derived string ids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fixed buckets: digits, symbols and the 26 letters.
pub const BUCKET_COUNT: usize = 28;

/// One of the fixed first-character subdirectories of the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// `0-9`
    Digits,
    /// `#@`, everything that is neither an ASCII digit nor an ASCII letter
    Symbols,
    /// Always an uppercase ASCII letter.
    Letter(char),
}

impl Bucket {
    /// Resolves the bucket a file belongs to from its first character.
    pub fn for_file_name(name: &str) -> Bucket {
        match name.chars().next() {
            Some(c) if c.is_ascii_digit() => Bucket::Digits,
            Some(c) if c.is_ascii_alphabetic() => Bucket::Letter(c.to_ascii_uppercase()),
            _ => Bucket::Symbols,
        }
    }

    /// Parses the `section` query value used by the listing pages
    /// (`num`, `sym` or a single letter).
    pub fn from_section(section: &str) -> Option<Bucket> {
        match section {
            "num" => Some(Bucket::Digits),
            "sym" => Some(Bucket::Symbols),
            s => single_letter(s),
        }
    }

    /// Parses an on-medium directory name (`0-9`, `#@`, `A`..`Z`).
    pub fn from_dir_name(name: &str) -> Option<Bucket> {
        match name {
            "0-9" => Some(Bucket::Digits),
            "#@" => Some(Bucket::Symbols),
            s => single_letter(s),
        }
    }

    /// Accepts either a directory name or a section alias.
    pub fn parse(value: &str) -> Option<Bucket> {
        Bucket::from_dir_name(value).or_else(|| Bucket::from_section(value))
    }

    /// All buckets in menu order.
    pub fn all() -> impl Iterator<Item = Bucket> {
        [Bucket::Digits, Bucket::Symbols]
            .into_iter()
            .chain(('A'..='Z').map(Bucket::Letter))
    }

    pub fn dir_name(&self) -> String {
        match self {
            Bucket::Digits => "0-9".to_string(),
            Bucket::Symbols => "#@".to_string(),
            Bucket::Letter(c) => c.to_string(),
        }
    }

    /// The value of the `section` query parameter that selects this bucket.
    pub fn section(&self) -> String {
        match self {
            Bucket::Digits => "num".to_string(),
            Bucket::Symbols => "sym".to_string(),
            Bucket::Letter(c) => c.to_string(),
        }
    }
}

fn single_letter(s: &str) -> Option<Bucket> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(Bucket::Letter(c.to_ascii_uppercase())),
        _ => None,
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

/// One user file in the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub bucket: Bucket,
    /// Base file name, never contains a `/`.
    pub name: String,
    pub size: u64,
}

impl StoredDocument {
    /// Bucket-relative path, as used by the `/download?file=` links.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.bucket.dir_name(), self.name)
    }
}

/// A discussion topic listed in the forum index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumThread {
    pub id: String,
    pub title: String,
    pub author: String,
    /// Unix milliseconds at creation.
    #[serde(deserialize_with = "millis::deserialize")]
    pub timestamp: u64,
}

/// A single message inside a thread's post file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumPost {
    pub id: String,
    pub author: String,
    pub content: String,
    /// Unix milliseconds at submission.
    #[serde(deserialize_with = "millis::deserialize")]
    pub timestamp: u64,
}

/// Older stores wrote timestamps as quoted decimal strings.
mod millis {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_from_first_character() {
        assert_eq!(Bucket::for_file_name("3x.pdf"), Bucket::Digits);
        assert_eq!(Bucket::for_file_name("Ω.pdf"), Bucket::Symbols);
        assert_eq!(Bucket::for_file_name("Report.pdf"), Bucket::Letter('R'));
        assert_eq!(Bucket::for_file_name("report.pdf"), Bucket::Letter('R'));
        assert_eq!(Bucket::for_file_name("_notes.txt"), Bucket::Symbols);
        assert_eq!(Bucket::for_file_name(""), Bucket::Symbols);
    }

    #[test]
    fn there_are_exactly_28_distinct_buckets() {
        let all: Vec<Bucket> = Bucket::all().collect();
        assert_eq!(all.len(), BUCKET_COUNT);
        let dirs: std::collections::HashSet<String> = all.iter().map(Bucket::dir_name).collect();
        assert_eq!(dirs.len(), BUCKET_COUNT);
        assert_eq!(all[0], Bucket::Digits);
        assert_eq!(all[1], Bucket::Symbols);
        assert_eq!(all[27], Bucket::Letter('Z'));
    }

    #[test]
    fn section_and_dir_names_round_trip() {
        for bucket in Bucket::all() {
            assert_eq!(Bucket::from_section(&bucket.section()), Some(bucket));
            assert_eq!(Bucket::from_dir_name(&bucket.dir_name()), Some(bucket));
        }
        assert_eq!(Bucket::from_section("b"), Some(Bucket::Letter('B')));
        assert_eq!(Bucket::from_section("AB"), None);
        assert_eq!(Bucket::from_section(""), None);
        assert_eq!(Bucket::parse("num"), Some(Bucket::Digits));
        assert_eq!(Bucket::parse("#@"), Some(Bucket::Symbols));
        assert_eq!(Bucket::parse(".."), None);
    }

    #[test]
    fn legacy_string_timestamps_are_accepted() {
        let thread: ForumThread = serde_json::from_str(
            r#"{"id":"12345","title":"Hi","author":"anon","timestamp":"12399"}"#,
        )
        .unwrap();
        assert_eq!(thread.timestamp, 12399);

        let post: ForumPost =
            serde_json::from_str(r#"{"id":"1","author":"a","content":"c","timestamp":42}"#).unwrap();
        assert_eq!(post.timestamp, 42);
    }

    #[test]
    fn relative_path_uses_bucket_directory() {
        let doc = StoredDocument { bucket: Bucket::Digits, name: "3x.pdf".into(), size: 3 };
        assert_eq!(doc.relative_path(), "0-9/3x.pdf");
    }
}
