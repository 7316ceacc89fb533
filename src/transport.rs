//! Framed-transport reader/writer over stdin/stdout.
//!
//! Wire format: one or more `Name: Value\r\n` header lines, a blank line,
//! then exactly `Content-Length` raw bytes of UTF-8 JSON body. Grounded on
//! `lsp_client.rs`'s `reader_loop`, generalized from "read a child's
//! stdout" to "read any byte source", and on
//! `examples/original_source/src/lsp/lsp_message_stream.cpp` for the state
//! names used in documentation (`PARSING_HEADER_NAME`,
//! `PARSING_HEADER_VALUE`, `PARSING_NEWLINE`, `PARSING_BODY`).

use std::io::{self, BufRead, BufReader, Read};

use anyhow::{bail, Context, Result};

const CONTENT_LENGTH_HEADER: &str = "content-length";

/// Parser states for the header/body automaton. The line-oriented implementation below
/// folds `PARSING_HEADER_NAME`/`PARSING_HEADER_VALUE`/`PARSING_NEWLINE` into
/// a single "read a header line" step (a header line is fully buffered
/// before it is inspected); `PARSING_BODY` is the raw byte read that
/// follows. The explicit four-state automaton is kept in
/// [`InteractiveStream`], which must decode backslash escapes character by
/// character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    ParsingHeaderName,
    ParsingHeaderValue,
    ParsingNewline,
    ParsingBody,
}

/// Reads one framed JSON-RPC message body at a time from a byte source.
pub struct MessageStream<R> {
    reader: BufReader<R>,
}

impl<R: Read> MessageStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next message body. Returns `Ok(None)` at a clean EOF before
    /// any header bytes have been read; fails if the stream closes
    /// mid-message.
    pub fn next(&mut self) -> Result<Option<String>> {
        let mut content_length: Option<usize> = None;
        let mut read_any_header_byte = false;

        loop {
            let mut line = String::new();
            let n = self
                .reader
                .read_line(&mut line)
                .context("failed to read message header line")?;
            if n == 0 {
                if read_any_header_byte {
                    bail!("stream closed mid-message while reading headers");
                }
                return Ok(None);
            }
            read_any_header_byte = true;

            let trimmed = trim_line_terminator(&line);
            if trimmed.is_empty() {
                if !line.ends_with("\r\n") {
                    tracing::warn!("accepted lone LF as header terminator");
                }
                break;
            }

            if let Some((name, value)) = trimmed.split_once(':') {
                if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH_HEADER) {
                    let value = value.trim();
                    content_length = Some(
                        value
                            .parse()
                            .with_context(|| format!("invalid Content-Length: {value}"))?,
                    );
                }
            }
        }

        let length = content_length.context("missing Content-Length header")?;
        let mut body = vec![0u8; length];
        self.reader
            .read_exact(&mut body)
            .context("stream closed mid-message while reading body")?;

        String::from_utf8(body)
            .context("message body was not valid UTF-8")
            .map(Some)
    }
}

fn trim_line_terminator(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Testing-convenience parser for an interactive stdin REPL: headers may
/// contain backslash-escape sequences (`\n`, `\r`, `\t`, `\\`, `\"`), and if
/// no `Content-Length` header is present the body is terminated by a single
/// literal newline instead of being length-prefixed.
///
/// This is gated at the type level to stdin: the only way to construct one
/// is [`InteractiveStream::for_stdin`], so a non-stdin transport can never
/// select it.
pub struct InteractiveStream {
    reader: BufReader<io::Stdin>,
}

impl InteractiveStream {
    #[must_use]
    pub fn for_stdin(stdin: io::Stdin) -> Self {
        Self {
            reader: BufReader::new(stdin),
        }
    }

    /// Read the next message, decoding escape sequences inside headers and
    /// falling back to newline-terminated bodies when `Content-Length` is
    /// absent. Driven by [`ParserState`]: `ParsingHeaderName`/
    /// `ParsingHeaderValue` read one header line at a time, `ParsingNewline`
    /// is the blank-line transition into `ParsingBody`.
    pub fn next(&mut self) -> Result<Option<String>> {
        let mut content_length: Option<usize> = None;
        let mut state = ParserState::ParsingHeaderName;

        loop {
            match state {
                ParserState::ParsingHeaderName | ParserState::ParsingHeaderValue => {
                    let mut raw = String::new();
                    let n = self
                        .reader
                        .read_line(&mut raw)
                        .context("failed to read interactive header line")?;
                    if n == 0 {
                        return Ok(None);
                    }
                    let decoded = unescape(trim_line_terminator(&raw));
                    if decoded.is_empty() {
                        state = ParserState::ParsingNewline;
                        continue;
                    }
                    if let Some((name, value)) = decoded.split_once(':') {
                        if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH_HEADER) {
                            let value = value.trim();
                            content_length = Some(
                                value
                                    .parse()
                                    .with_context(|| format!("invalid Content-Length: {value}"))?,
                            );
                        }
                        state = ParserState::ParsingHeaderName;
                    } else if content_length.is_none() {
                        // No colon and no Content-Length seen yet: treat this
                        // whole line as the body, terminated by the newline
                        // we just read.
                        return Ok(Some(decoded));
                    } else {
                        state = ParserState::ParsingHeaderName;
                    }
                }
                ParserState::ParsingNewline => {
                    state = ParserState::ParsingBody;
                }
                ParserState::ParsingBody => {
                    if let Some(length) = content_length {
                        let mut body = vec![0u8; length];
                        self.reader
                            .read_exact(&mut body)
                            .context("interactive stream closed mid-message")?;
                        return String::from_utf8(body)
                            .context("interactive message body was not valid UTF-8")
                            .map(Some);
                    }
                    let mut body = String::new();
                    self.reader
                        .read_line(&mut body)
                        .context("failed to read interactive message body")?;
                    return Ok(Some(unescape(trim_line_terminator(&body))));
                }
            }
        }
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Serialize `value` into `Content-Length`-framed bytes ready to write to
/// the transport.
#[must_use]
pub fn frame_message(body: &str) -> Vec<u8> {
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut framed = Vec::with_capacity(header.len() + body.len());
    framed.extend_from_slice(header.as_bytes());
    framed.extend_from_slice(body.as_bytes());
    framed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_for(bytes: &[u8]) -> MessageStream<&[u8]> {
        MessageStream::new(bytes)
    }

    #[test]
    fn reads_single_framed_message() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
        let bytes = frame_message(body);
        let mut stream = stream_for(&bytes);
        assert_eq!(stream.next().unwrap(), Some(body.to_string()));
        assert_eq!(stream.next().unwrap(), None);
    }

    #[test]
    fn reads_k_messages_in_order_then_eof() {
        let bodies = ["{\"a\":1}", "{\"b\":2}", "{\"c\":3}"];
        let mut bytes = Vec::new();
        for b in bodies {
            bytes.extend(frame_message(b));
        }
        let mut stream = stream_for(&bytes);
        for b in bodies {
            assert_eq!(stream.next().unwrap(), Some(b.to_string()));
        }
        assert_eq!(stream.next().unwrap(), None);
    }

    #[test]
    fn body_with_internal_newlines_is_read_exactly() {
        let body = "{\n  \"a\": 1\n}";
        let bytes = frame_message(body);
        let mut stream = stream_for(&bytes);
        assert_eq!(stream.next().unwrap(), Some(body.to_string()));
    }

    #[test]
    fn header_name_matched_case_insensitively() {
        let body = "{}";
        let bytes = format!("content-LENGTH: {}\r\n\r\n{}", body.len(), body);
        let mut stream = stream_for(bytes.as_bytes());
        assert_eq!(stream.next().unwrap(), Some(body.to_string()));
    }

    #[test]
    fn lone_lf_header_terminator_is_accepted() {
        let body = "{}";
        let bytes = format!("Content-Length: {}\n\n{}", body.len(), body);
        let mut stream = stream_for(bytes.as_bytes());
        assert_eq!(stream.next().unwrap(), Some(body.to_string()));
    }

    #[test]
    fn missing_content_length_is_an_error() {
        let bytes = b"X-Other: 1\r\n\r\n{}".to_vec();
        let mut stream = stream_for(&bytes);
        assert!(stream.next().is_err());
    }

    #[test]
    fn eof_mid_message_is_an_error() {
        let bytes = b"Content-Length: 10\r\n\r\n{\"a\":1}".to_vec();
        let mut stream = stream_for(&bytes);
        assert!(stream.next().is_err());
    }

    #[test]
    fn clean_eof_before_any_message_returns_none() {
        let mut stream = stream_for(b"");
        assert_eq!(stream.next().unwrap(), None);
    }

    #[test]
    fn unescape_handles_known_sequences() {
        assert_eq!(unescape(r"line\ntab\there"), "line\ntab\there");
        assert_eq!(unescape(r#"quote\"here"#), "quote\"here");
        assert_eq!(unescape(r"back\\slash"), r"back\slash");
    }
}
