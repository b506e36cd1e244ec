//! Line-oriented m3u handling. A playlist is processed as raw lines; the
//! only structure recognized is the `#EXTINF:<seconds>,<display>` line and
//! the path line that immediately follows it.

use std::fs;
use std::path::Path;

use crate::{Error, Result};

/// The metadata half of an EXTINF unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extinf {
    pub duration: i64,
    pub display: String,
}

/// Parse an `#EXTINF:<signed-int>,<display>` line. Returns `None` for
/// anything else, including malformed EXTINF lines (those are still
/// consumed as units by the repair pass, but carry no usable metadata).
pub fn parse_extinf(line: &str) -> Option<Extinf> {
    let rest = line.trim().strip_prefix("#EXTINF:")?;

    let digits_end = rest
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    let duration: i64 = rest[..digits_end].parse().ok()?;

    let after = rest[digits_end..].trim_start();
    let display = after.strip_prefix(',')?.trim().to_string();

    Some(Extinf { duration, display })
}

pub fn is_extinf_line(line: &str) -> bool {
    line.starts_with("#EXTINF")
}

/// Read a playlist as lines. Invalid UTF-8 is replaced, not fatal;
/// playlists in the wild carry whatever encoding their exporter liked.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}

/// Write a playlist as lines with a trailing newline. Whole-document
/// snapshot: the target is replaced, never appended to.
pub fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut text = lines.join("\n");
    text.push('\n');
    fs::write(path, text).map_err(|e| Error::io(path, e))
}

/// Render the EXTINF line for a reconstructed export entry.
pub fn format_extinf(duration: i64, display: &str) -> String {
    format!("#EXTINF:{duration},{display}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_extinf() {
        let e = parse_extinf("#EXTINF:213,6lack - Loaded Gun").unwrap();
        assert_eq!(e.duration, 213);
        assert_eq!(e.display, "6lack - Loaded Gun");
    }

    #[test]
    fn parses_negative_duration_and_spacing() {
        let e = parse_extinf("#EXTINF:-1 , Unknown Stream").unwrap();
        assert_eq!(e.duration, -1);
        assert_eq!(e.display, "Unknown Stream");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_extinf("#EXTINF:abc,x").is_none());
        assert!(parse_extinf("#EXTVLCOPT:network-caching=1000").is_none());
        assert!(parse_extinf("/music/song.mp3").is_none());
        assert!(parse_extinf("#EXTINF:120").is_none());
    }

    #[test]
    fn empty_display_is_allowed_by_the_parser() {
        // The repair pass decides what an empty display means, not the parser.
        let e = parse_extinf("#EXTINF:120,").unwrap();
        assert_eq!(e.display, "");
    }
}
