use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::core::error::{Error, ErrorKind, Result};

pub const DEFAULT_BASE_IRI: &str = "https://example.com/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    NTriples,
    /// N-Quads; the graph term is parsed and discarded.
    NQuads,
}

impl TextFormat {
    pub fn from_extension(path: &Path) -> Result<TextFormat> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("nt") => Ok(TextFormat::NTriples),
            Some("nq") => Ok(TextFormat::NQuads),
            _ => Err(Error::new(
                ErrorKind::Unsupported,
                format!("unsupported triple format: {}", path.display()),
            )),
        }
    }
}

/// Stream a text triple dump line by line, invoking `on_triple` with the
/// rendered term strings. IRIs come out bare, literals keep their quoted
/// lexical form, blank nodes keep the `_:` prefix.
pub fn parse_file<F>(path: &Path, format: TextFormat, base_iri: &str, mut on_triple: F) -> Result<()>
where
    F: FnMut(&str, &str, &str) -> Result<()>,
{
    let file = File::open(path).map_err(|e| {
        Error::new(ErrorKind::Io, format!("cannot open {}: {}", path.display(), e))
    })?;
    let reader = BufReader::new(file);
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (s, p, o) = parse_line(trimmed, format, base_iri).map_err(|e| {
            Error::new(e.kind, format!("{}:{}: {}", path.display(), line_no + 1, e.context))
        })?;
        on_triple(&s, &p, &o)?;
    }
    Ok(())
}

fn parse_line(line: &str, format: TextFormat, base_iri: &str) -> Result<(String, String, String)> {
    let mut scan = Scanner::new(line);
    let subject = scan.term(base_iri)?;
    scan.skip_ws();
    let predicate = scan.term(base_iri)?;
    scan.skip_ws();
    let object = scan.term(base_iri)?;
    scan.skip_ws();
    if format == TextFormat::NQuads && scan.peek() != Some(b'.') {
        scan.term(base_iri)?; // graph term, ignored
        scan.skip_ws();
    }
    scan.expect(b'.')?;
    scan.skip_ws();
    match scan.peek() {
        None | Some(b'#') => Ok((subject, predicate, object)),
        Some(_) => Err(scan.fail("trailing content after '.'")),
    }
}

struct Scanner<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Scanner<'a> {
    fn new(line: &'a str) -> Self {
        Scanner { bytes: line.as_bytes(), at: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.at).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.at += 1;
        Some(byte)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.at += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.at += 1;
            Ok(())
        } else {
            Err(self.fail(&format!("expected '{}'", byte as char)))
        }
    }

    fn fail(&self, message: &str) -> Error {
        Error::new(
            ErrorKind::Parse,
            format!("{} at column {}", message, self.at + 1),
        )
    }

    fn term(&mut self, base_iri: &str) -> Result<String> {
        match self.peek() {
            Some(b'<') => self.iri(base_iri),
            Some(b'_') => self.blank_node(),
            Some(b'"') => self.literal(base_iri),
            Some(c) => Err(self.fail(&format!("unexpected character '{}'", c as char))),
            None => Err(self.fail("unexpected end of line")),
        }
    }

    fn iri(&mut self, base_iri: &str) -> Result<String> {
        self.expect(b'<')?;
        let start = self.at;
        loop {
            match self.bump() {
                None => return Err(self.fail("unterminated IRI")),
                Some(b'>') => break,
                Some(b'\\') => self.escape()?,
                Some(b' ') | Some(b'<') | Some(b'"') => {
                    return Err(self.fail("illegal character in IRI"));
                }
                Some(_) => {}
            }
        }
        let text = &self.bytes[start..self.at - 1];
        let iri = match std::str::from_utf8(text) {
            Ok(s) => s,
            Err(_) => return Err(self.fail("IRI is not valid UTF-8")),
        };
        Ok(resolve(iri, base_iri))
    }

    fn blank_node(&mut self) -> Result<String> {
        self.expect(b'_')?;
        self.expect(b':')?;
        let start = self.at;
        while let Some(c) = self.peek() {
            if c == b' ' || c == b'\t' {
                break;
            }
            self.at += 1;
        }
        if self.at == start {
            return Err(self.fail("empty blank node label"));
        }
        let label = match std::str::from_utf8(&self.bytes[start..self.at]) {
            Ok(s) => s,
            Err(_) => return Err(self.fail("blank node label is not valid UTF-8")),
        };
        Ok(format!("_:{}", label))
    }

    /// Quoted literal with optional language tag or datatype. The lexical
    /// form between the quotes is kept verbatim; escapes are validated
    /// but not decoded, so term identity stays byte-exact.
    fn literal(&mut self, base_iri: &str) -> Result<String> {
        self.expect(b'"')?;
        let start = self.at;
        loop {
            match self.bump() {
                None => return Err(self.fail("unterminated literal")),
                Some(b'"') => break,
                Some(b'\\') => self.escape()?,
                Some(_) => {}
            }
        }
        let value = match std::str::from_utf8(&self.bytes[start..self.at - 1]) {
            Ok(s) => s.to_owned(),
            Err(_) => return Err(self.fail("literal is not valid UTF-8")),
        };
        match self.peek() {
            Some(b'@') => {
                self.at += 1;
                let tag_start = self.at;
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == b'-' {
                        self.at += 1;
                    } else {
                        break;
                    }
                }
                if self.at == tag_start {
                    return Err(self.fail("empty language tag"));
                }
                let tag = match std::str::from_utf8(&self.bytes[tag_start..self.at]) {
                    Ok(s) => s,
                    Err(_) => return Err(self.fail("bad language tag")),
                };
                Ok(format!("\"{}\"@{}", value, tag))
            }
            Some(b'^') => {
                self.expect(b'^')?;
                self.expect(b'^')?;
                let datatype = self.iri(base_iri)?;
                Ok(format!("\"{}\"^^<{}>", value, datatype))
            }
            _ => Ok(format!("\"{}\"", value)),
        }
    }

    fn escape(&mut self) -> Result<()> {
        match self.bump() {
            Some(b't') | Some(b'b') | Some(b'n') | Some(b'r') | Some(b'f') | Some(b'"')
            | Some(b'\'') | Some(b'\\') => Ok(()),
            Some(b'u') => self.hex_digits(4),
            Some(b'U') => self.hex_digits(8),
            _ => Err(self.fail("bad escape sequence")),
        }
    }

    fn hex_digits(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => {}
                _ => return Err(self.fail("bad unicode escape")),
            }
        }
        Ok(())
    }
}

/// Render an interned term back to its line surface form: literals and
/// blank nodes come out as stored, IRIs regain their angle brackets.
/// Applies to every position; blank nodes are legal subjects and objects.
pub fn render_term(term: &str) -> String {
    if term.starts_with('"') || term.starts_with("_:") {
        term.to_owned()
    } else {
        format!("<{}>", term)
    }
}

/// Resolve a relative IRI against the base. IRIs carrying a scheme pass
/// through unchanged.
fn resolve(iri: &str, base_iri: &str) -> String {
    let absolute = iri
        .find(':')
        .map_or(false, |at| iri[..at].chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') && at > 0);
    if absolute {
        return iri.to_owned();
    }
    if iri.starts_with('#') || base_iri.ends_with('/') || iri.starts_with('/') {
        format!("{}{}", base_iri, iri.trim_start_matches('/'))
    } else {
        format!("{}/{}", base_iri, iri)
    }
}
