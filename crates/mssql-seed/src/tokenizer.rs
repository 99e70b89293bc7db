//! Line tokenizer for the CSV dialect produced by SSMS-style exports.
//!
//! The dialect is deliberately narrow:
//!
//! - fields are separated by `,`
//! - a field whose *first* character is `"` runs verbatim up to the next `"`,
//!   and that closing quote must be followed by `,` or the end of the line
//! - there is no way to escape a `"` inside a quoted field
//! - a `"` anywhere else is an ordinary character
//!
//! Files in the wild that use `""` escaping are not accepted; they fail with
//! [`TokenizeError::TrailingCharacters`] rather than being guessed at.

use thiserror::Error;

/// A line that does not follow the dialect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    /// Quoted field with no closing quote before end of line.
    #[error("unterminated quoted field starting at byte {0}")]
    UnterminatedQuote(usize),

    /// Closing quote followed by something other than `,` or end of line.
    #[error("unexpected character after closing quote at byte {0}")]
    TrailingCharacters(usize),
}

/// Split one line (without its line terminator) into raw field strings.
pub fn tokenize(line: &str) -> Result<Vec<String>, TokenizeError> {
    let mut fields = Vec::new();
    let mut rest = line;
    let mut offset = 0;

    loop {
        if let Some(quoted) = rest.strip_prefix('"') {
            let close = quoted
                .find('"')
                .ok_or(TokenizeError::UnterminatedQuote(offset))?;
            fields.push(quoted[..close].to_string());

            // opening quote + body + closing quote
            let consumed = close + 2;
            let tail = &quoted[close + 1..];
            if tail.is_empty() {
                return Ok(fields);
            }
            match tail.strip_prefix(',') {
                Some(next) => {
                    rest = next;
                    offset += consumed + 1;
                }
                None => return Err(TokenizeError::TrailingCharacters(offset + consumed)),
            }
            continue;
        }

        match rest.find(',') {
            Some(comma) => {
                fields.push(rest[..comma].to_string());
                rest = &rest[comma + 1..];
                offset += comma + 1;
            }
            None => {
                fields.push(rest.to_string());
                return Ok(fields);
            }
        }
    }
}
