//! The plain-text prompt/response transcript.
//!
//! Wire format, one block per pair:
//!
//! ```text
//! PROMPT:
//! <prompt text>
//!
//! RESPONSE:
//! <response text>
//!
//! ========================================
//! ```
//!
//! The reader is a single forward line scan. A line starting `PROMPT:` opens
//! an entry; lines accumulate until a line equal to `RESPONSE:`, then until
//! the separator. If the separator is missing, a `PROMPT:` line terminates
//! the response and re-enters the scan, so the following entry is never
//! skipped.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines, Write};
use std::path::Path;

/// Separator line between transcript entries (40 `=` characters).
pub const SEPARATOR: &str = "========================================";

const PROMPT_MARKER: &str = "PROMPT:";
const RESPONSE_MARKER: &str = "RESPONSE:";

/// One prompt/response pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub prompt: String,
    pub response: String,
}

impl TranscriptEntry {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
        }
    }
}

/// Format a single entry block.
pub fn format_entry(prompt: &str, response: &str) -> String {
    format!("PROMPT:\n{prompt}\n\nRESPONSE:\n{response}\n\n{SEPARATOR}\n")
}

/// Write all entries to `path`, one block per pair.
pub fn write_transcript(path: impl AsRef<Path>, entries: &[TranscriptEntry]) -> io::Result<()> {
    let mut file = File::create(path)?;
    for entry in entries {
        file.write_all(format_entry(&entry.prompt, &entry.response).as_bytes())?;
    }
    Ok(())
}

/// Lazy forward scan over a transcript. Finite, not restartable.
pub struct TranscriptReader<R: BufRead> {
    lines: Lines<R>,
    /// A `PROMPT:` line consumed while scanning an unterminated response,
    /// fed back into the next scan iteration.
    carry: Option<String>,
}

impl TranscriptReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> TranscriptReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            carry: None,
        }
    }

    fn next_line(&mut self) -> Option<String> {
        if let Some(line) = self.carry.take() {
            return Some(line);
        }
        match self.lines.next() {
            Some(Ok(line)) => Some(line),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "transcript read error, ending scan");
                None
            }
            None => None,
        }
    }
}

impl<R: BufRead> Iterator for TranscriptReader<R> {
    type Item = TranscriptEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.next_line()?;
            if !line.starts_with(PROMPT_MARKER) {
                continue;
            }

            let mut prompt = String::new();
            loop {
                match self.next_line() {
                    Some(l) if l.trim() == RESPONSE_MARKER => break,
                    Some(l) => {
                        prompt.push_str(&l);
                        prompt.push('\n');
                    }
                    None => {
                        // Truncated entry at EOF: prompt without a response.
                        let prompt = prompt.trim().to_string();
                        if prompt.is_empty() {
                            return None;
                        }
                        return Some(TranscriptEntry::new(prompt, ""));
                    }
                }
            }

            let mut response = String::new();
            loop {
                match self.next_line() {
                    Some(l) if l.trim() == SEPARATOR => break,
                    Some(l) if l.starts_with(PROMPT_MARKER) => {
                        // Missing separator: resync on the next entry.
                        self.carry = Some(l);
                        break;
                    }
                    Some(l) => {
                        response.push_str(&l);
                        response.push('\n');
                    }
                    None => break,
                }
            }

            let prompt = prompt.trim().to_string();
            let response = response.trim().to_string();
            if prompt.is_empty() && response.is_empty() {
                continue;
            }
            return Some(TranscriptEntry::new(prompt, response));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Vec<TranscriptEntry> {
        TranscriptReader::new(Cursor::new(text.to_string())).collect()
    }

    #[test]
    fn round_trip_preserves_all_pairs() {
        let entries = vec![
            TranscriptEntry::new("EMS data", "See measure OD-2 at https://example.org/od-2."),
            TranscriptEntry::new(
                "What measure covers non-fatal heroin hospitalizations?",
                "Measure OD-7 tracks non-fatal hospitalizations.\nDashboard: https://example.org/od-7",
            ),
            TranscriptEntry::new("overdose deaths", "No response found"),
        ];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");
        write_transcript(&path, &entries).unwrap();

        let parsed: Vec<_> = TranscriptReader::open(&path).unwrap().collect();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn skips_leading_junk_lines() {
        let text = format!(
            "run started\nnoise\n{}",
            format_entry("EMS data", "measure OD-2")
        );
        let parsed = parse(&text);
        assert_eq!(parsed, vec![TranscriptEntry::new("EMS data", "measure OD-2")]);
    }

    #[test]
    fn entry_without_separator_at_eof_is_still_yielded() {
        let text = "PROMPT:\nEMS data\n\nRESPONSE:\nmeasure OD-2\n";
        let parsed = parse(text);
        assert_eq!(parsed, vec![TranscriptEntry::new("EMS data", "measure OD-2")]);
    }

    #[test]
    fn missing_separator_does_not_skip_the_next_entry() {
        // First block lost its separator line; the second must survive.
        let text = "PROMPT:\nfirst\n\nRESPONSE:\nanswer one\n\nPROMPT:\nsecond\n\nRESPONSE:\nanswer two\n\n".to_string()
            + SEPARATOR
            + "\n";
        let parsed = parse(&text);
        assert_eq!(
            parsed,
            vec![
                TranscriptEntry::new("first", "answer one"),
                TranscriptEntry::new("second", "answer two"),
            ]
        );
    }

    #[test]
    fn prompt_truncated_at_eof_yields_prompt_only() {
        let text = "PROMPT:\ndangling question\n";
        let parsed = parse(text);
        assert_eq!(parsed, vec![TranscriptEntry::new("dangling question", "")]);
    }

    #[test]
    fn multiline_bodies_are_trimmed_but_internal_newlines_kept() {
        let entry = TranscriptEntry::new("q", "line one\nline two");
        let parsed = parse(&format_entry(&entry.prompt, &entry.response));
        assert_eq!(parsed, vec![entry]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn separator_is_forty_equals() {
        assert_eq!(SEPARATOR.len(), 40);
        assert!(SEPARATOR.chars().all(|c| c == '='));
    }
}
