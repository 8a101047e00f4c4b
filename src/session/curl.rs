//! "Copy as cURL" command parsing.
//!
//! Browsers emit bash-quoted commands (`curl 'url' -H 'k: v' --data-raw '...'`),
//! sometimes with `$'...'` strings when the body contains control characters,
//! and Windows builds emit `^` line continuations.

use super::{CapturedRequest, ParseError};

/// Fold line continuations into plain whitespace.
fn fold_continuations(raw: &str) -> String {
    raw.replace("\\\r\n", " ")
        .replace("\\\n", " ")
        .replace("^\r\n", " ")
        .replace("^\n", " ")
}

/// Split a shell command line into words, honouring bash quoting rules.
pub(crate) fn tokenize(input: &str) -> Result<Vec<String>, ParseError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(ParseError::UnbalancedQuote('\'')),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(esc @ ('"' | '\\' | '$' | '`')) => current.push(esc),
                            Some('\n') => {}
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => return Err(ParseError::UnbalancedQuote('"')),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(ParseError::UnbalancedQuote('"')),
                    }
                }
            }
            '$' if chars.peek() == Some(&'\'') => {
                chars.next();
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => current.push('\n'),
                            Some('t') => current.push('\t'),
                            Some('r') => current.push('\r'),
                            Some('\\') => current.push('\\'),
                            Some('\'') => current.push('\''),
                            Some('"') => current.push('"'),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => return Err(ParseError::UnbalancedQuote('\'')),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(ParseError::UnbalancedQuote('\'')),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }

    if in_word {
        words.push(current);
    }

    Ok(words)
}

/// Flags whose next word is their value.
fn flag_kind(flag: &str) -> Option<CurlFlag> {
    let kind = match flag {
        "-H" | "--header" => CurlFlag::Header,
        "-b" | "--cookie" => CurlFlag::Cookie,
        "-X" | "--request" => CurlFlag::Method,
        "-d" | "--data" | "--data-raw" | "--data-binary" | "--data-ascii" => CurlFlag::Data,
        "-A" | "--user-agent" => CurlFlag::UserAgent,
        "-e" | "--referer" => CurlFlag::Referer,
        "--url" => CurlFlag::Url,
        "-x" | "--proxy" | "-u" | "--user" | "-o" | "--output" | "-m" | "--max-time" => {
            CurlFlag::Ignored
        }
        _ => return None,
    };
    Some(kind)
}

#[derive(Debug, Clone, Copy)]
enum CurlFlag {
    Header,
    Cookie,
    Method,
    Data,
    UserAgent,
    Referer,
    Url,
    Ignored,
}

/// Parse a cURL command line into a captured request.
pub(crate) fn parse_curl(raw: &str) -> Result<CapturedRequest, ParseError> {
    let words = tokenize(&fold_continuations(raw))?;
    let mut words = words.into_iter();

    match words.next() {
        Some(first) if first.eq_ignore_ascii_case("curl") => {}
        _ => return Err(ParseError::NotCurl),
    }

    let mut captured = CapturedRequest::default();
    let mut data_parts: Vec<String> = Vec::new();

    while let Some(word) = words.next() {
        if !word.starts_with('-') || word == "-" {
            if captured.url.is_empty() {
                captured.url = word;
            }
            continue;
        }

        // --flag=value form
        let (flag, inline_value) = match word.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (word.clone(), None),
        };

        let Some(kind) = flag_kind(&flag) else {
            continue;
        };

        let value = match inline_value {
            Some(v) => v,
            None => words
                .next()
                .ok_or_else(|| ParseError::MissingFlagValue(flag.clone()))?,
        };

        match kind {
            CurlFlag::Header => {
                if let Some((name, val)) = value.split_once(':') {
                    let name = name.trim().to_ascii_lowercase();
                    let val = val.trim().to_string();
                    if name == "cookie" {
                        captured.header_cookie.get_or_insert(val);
                    } else {
                        captured.headers.push((name, val));
                    }
                }
            }
            CurlFlag::Cookie => {
                captured.cookie.get_or_insert(value);
            }
            CurlFlag::Method => captured.method = Some(value.to_ascii_uppercase()),
            CurlFlag::Data => data_parts.push(value),
            CurlFlag::UserAgent => captured.headers.push(("user-agent".to_string(), value)),
            CurlFlag::Referer => captured.headers.push(("referer".to_string(), value)),
            CurlFlag::Url => captured.url = value,
            CurlFlag::Ignored => {}
        }
    }

    if !data_parts.is_empty() {
        captured.body = Some(data_parts.join("&"));
    }

    if captured.url.is_empty() {
        return Err(ParseError::MissingUrl);
    }

    Ok(captured)
}
