//! Structural PHP syntax check that never executes the template
//!
//! Walks literal markup and embedded `<?php ... ?>` / `<?= ... ?>` blocks,
//! tracking strings, comments, heredocs, bracket balance and the
//! alternative control syntax (`if (...):` ... `endif;`). Only definite
//! parse errors are reported; anything the scanner does not understand is
//! let through.

use std::path::Path;

use super::{SyntaxCheck, Validation};

/// Pure, in-process fallback strategy
#[derive(Debug, Default, Clone)]
pub struct StructuralCheck;

impl StructuralCheck {
    pub fn new() -> Self {
        Self
    }
}

impl SyntaxCheck for StructuralCheck {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn try_validate(&self, path: &Path, source: &str) -> Validation {
        match scan(source) {
            Ok(()) => Validation::Available(Ok(())),
            Err(err) => Validation::Available(Err(format!(
                "PHP Parse error:  {} in {} on line {}",
                err.message,
                path.display(),
                err.line
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub message: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AltBlock {
    If,
    Foreach,
    For,
    While,
    Switch,
}

impl AltBlock {
    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "if" | "elseif" => Some(AltBlock::If),
            "foreach" => Some(AltBlock::Foreach),
            "for" => Some(AltBlock::For),
            "while" => Some(AltBlock::While),
            "switch" => Some(AltBlock::Switch),
            _ => None,
        }
    }

    fn from_terminator(word: &str) -> Option<Self> {
        match word {
            "endif" => Some(AltBlock::If),
            "endforeach" => Some(AltBlock::Foreach),
            "endfor" => Some(AltBlock::For),
            "endwhile" => Some(AltBlock::While),
            "endswitch" => Some(AltBlock::Switch),
            _ => None,
        }
    }

    fn terminator(self) -> &'static str {
        match self {
            AltBlock::If => "endif",
            AltBlock::Foreach => "endforeach",
            AltBlock::For => "endfor",
            AltBlock::While => "endwhile",
            AltBlock::Switch => "endswitch",
        }
    }
}

/// Control keyword waiting for its condition to close and a `:` to follow
#[derive(Debug, Clone, Copy)]
struct PendingAlt {
    block: AltBlock,
    opens_block: bool,
    depth: usize,
    condition_closed: bool,
}

struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    brackets: Vec<(u8, usize)>,
    alt_blocks: Vec<(AltBlock, usize)>,
    pending: Option<PendingAlt>,
    last_significant: u8,
}

/// Scan a mixed markup/PHP document for definite parse errors
pub fn scan(source: &str) -> Result<(), ScanError> {
    Scanner {
        src: source.as_bytes(),
        pos: 0,
        line: 1,
        brackets: Vec::new(),
        alt_blocks: Vec::new(),
        pending: None,
        last_significant: b';',
    }
    .run()
}

impl<'a> Scanner<'a> {
    fn run(mut self) -> Result<(), ScanError> {
        while self.pos < self.src.len() {
            self.scan_markup();
            if self.pos < self.src.len() {
                self.scan_php()?;
            }
        }

        if let Some(&(open, _)) = self.brackets.last() {
            return Err(self.error(format!(
                "syntax error, unexpected end of file, expecting \"{}\"",
                closer_for(open) as char
            )));
        }
        if let Some(&(block, _)) = self.alt_blocks.last() {
            return Err(self.error(format!(
                "syntax error, unexpected end of file, expecting \"{}\"",
                block.terminator()
            )));
        }
        Ok(())
    }

    fn error(&self, message: String) -> ScanError {
        ScanError { message, line: self.line }
    }

    fn error_at(&self, message: String, line: usize) -> ScanError {
        ScanError { message, line }
    }

    fn peek(&self, offset: usize) -> u8 {
        self.src.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn starts_with_ci(&self, needle: &[u8]) -> bool {
        self.src.len() >= self.pos + needle.len()
            && self.src[self.pos..self.pos + needle.len()].eq_ignore_ascii_case(needle)
    }

    fn advance(&mut self) {
        if self.peek(0) == b'\n' {
            self.line += 1;
        }
        self.pos += 1;
    }

    fn advance_by(&mut self, count: usize) {
        for _ in 0..count {
            self.advance();
        }
    }

    /// Skip literal markup up to the next PHP open tag, leaving `pos` just past it
    fn scan_markup(&mut self) {
        while self.pos < self.src.len() {
            if self.peek(0) == b'<' && self.peek(1) == b'?' {
                if self.peek(2) == b'=' {
                    self.advance_by(3);
                    return;
                }
                if self.starts_with_ci(b"<?php") {
                    let after = self.peek(5);
                    if after == 0 || after.is_ascii_whitespace() {
                        self.advance_by(5);
                        return;
                    }
                }
            }
            self.advance();
        }
    }

    /// Scan PHP code until `?>` or end of input
    fn scan_php(&mut self) -> Result<(), ScanError> {
        while self.pos < self.src.len() {
            let c = self.peek(0);
            match c {
                b'?' if self.peek(1) == b'>' => {
                    self.advance_by(2);
                    self.last_significant = b';';
                    return Ok(());
                }
                b'/' if self.peek(1) == b'/' => self.skip_line_comment(),
                b'#' if self.peek(1) != b'[' => self.skip_line_comment(),
                b'#' => self.advance(),
                b'/' if self.peek(1) == b'*' => self.skip_block_comment()?,
                b'\'' | b'"' | b'`' => {
                    self.skip_quoted(c)?;
                    self.note_significant(c);
                }
                b'<' if self.peek(1) == b'<' && self.peek(2) == b'<' => self.skip_heredoc()?,
                b'(' | b'[' | b'{' => {
                    self.brackets.push((c, self.line));
                    self.advance();
                    self.note_significant(c);
                }
                b')' | b']' | b'}' => {
                    self.close_bracket(c)?;
                    self.advance();
                    self.note_significant(c);
                }
                b':' => {
                    self.handle_colon();
                    self.advance();
                }
                c if c.is_ascii_alphabetic() || c == b'_' => self.scan_word()?,
                c if c.is_ascii_whitespace() => self.advance(),
                _ => {
                    self.advance();
                    self.note_significant(c);
                }
            }
        }
        Ok(())
    }

    fn note_significant(&mut self, c: u8) {
        if let Some(pending) = self.pending {
            if pending.condition_closed && c != b')' {
                self.pending = None;
            }
        }
        self.last_significant = c;
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.src.len() {
            if self.peek(0) == b'\n' {
                return;
            }
            if self.peek(0) == b'?' && self.peek(1) == b'>' {
                return;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ScanError> {
        let start_line = self.line;
        self.advance_by(2);
        while self.pos < self.src.len() {
            if self.peek(0) == b'*' && self.peek(1) == b'/' {
                self.advance_by(2);
                return Ok(());
            }
            self.advance();
        }
        Err(self.error_at("Unterminated comment starting line".to_string(), start_line))
    }

    fn skip_quoted(&mut self, quote: u8) -> Result<(), ScanError> {
        let start_line = self.line;
        self.advance();
        while self.pos < self.src.len() {
            match self.peek(0) {
                b'\\' => self.advance_by(2),
                c if c == quote => {
                    self.advance();
                    return Ok(());
                }
                _ => self.advance(),
            }
        }
        Err(self.error_at(
            format!(
                "syntax error, unterminated string starting with {}",
                quote as char
            ),
            start_line,
        ))
    }

    fn skip_heredoc(&mut self) -> Result<(), ScanError> {
        let start_line = self.line;
        self.advance_by(3);
        while matches!(self.peek(0), b' ' | b'\t') {
            self.advance();
        }
        let quoted = matches!(self.peek(0), b'\'' | b'"');
        if quoted {
            self.advance();
        }
        let ident_start = self.pos;
        while self.peek(0).is_ascii_alphanumeric() || self.peek(0) == b'_' {
            self.advance();
        }
        if self.pos == ident_start {
            // `<<<` that is not a heredoc; let PHP decide
            return Ok(());
        }
        let ident = self.src[ident_start..self.pos].to_vec();
        if quoted {
            self.advance();
        }

        while self.pos < self.src.len() {
            if self.peek(0) == b'\n' {
                self.advance();
                while matches!(self.peek(0), b' ' | b'\t') {
                    self.advance();
                }
                if self.src[self.pos..].starts_with(&ident) {
                    let after = self.src.get(self.pos + ident.len()).copied().unwrap_or(0);
                    if !(after.is_ascii_alphanumeric() || after == b'_') {
                        self.advance_by(ident.len());
                        self.last_significant = b'"';
                        return Ok(());
                    }
                }
                continue;
            }
            self.advance();
        }
        Err(self.error_at(
            format!(
                "syntax error, unterminated heredoc {}",
                String::from_utf8_lossy(&ident)
            ),
            start_line,
        ))
    }

    fn close_bracket(&mut self, close: u8) -> Result<(), ScanError> {
        match self.brackets.pop() {
            Some((open, _)) if closer_for(open) == close => {
                if let Some(pending) = self.pending.as_mut() {
                    if close == b')' && self.brackets.len() == pending.depth {
                        pending.condition_closed = true;
                    }
                }
                Ok(())
            }
            Some((open, _)) => Err(self.error(format!(
                "syntax error, unexpected token \"{}\", expecting \"{}\"",
                close as char,
                closer_for(open) as char
            ))),
            None => Err(self.error(format!(
                "syntax error, unexpected token \"{}\"",
                close as char
            ))),
        }
    }

    fn handle_colon(&mut self) {
        // `::` scope resolution
        if self.peek(1) == b':' || self.last_significant == b':' {
            self.last_significant = b':';
            return;
        }
        if let Some(pending) = self.pending {
            if pending.condition_closed {
                self.pending = None;
                if pending.opens_block {
                    self.alt_blocks.push((pending.block, self.line));
                }
            }
        }
        self.last_significant = b':';
    }

    fn scan_word(&mut self) -> Result<(), ScanError> {
        let start = self.pos;
        while self.peek(0).is_ascii_alphanumeric() || self.peek(0) == b'_' {
            self.advance();
        }
        let word = String::from_utf8_lossy(&self.src[start..self.pos]).to_ascii_lowercase();

        // `$if`, `->for`, `::while` are names, not keywords
        let member_or_variable = self.last_significant == b'$'
            || (start >= 2 && &self.src[start - 2..start] == b"->")
            || (start >= 2 && &self.src[start - 2..start] == b"::")
            || (start >= 1 && self.src[start - 1] == b'$');

        if !member_or_variable {
            if let Some(block) = AltBlock::from_keyword(&word) {
                self.pending = Some(PendingAlt {
                    block,
                    opens_block: word != "elseif",
                    depth: self.brackets.len(),
                    condition_closed: false,
                });
                self.last_significant = b'k';
                return Ok(());
            }
            if let Some(block) = AltBlock::from_terminator(&word) {
                match self.alt_blocks.pop() {
                    Some((open, _)) if open == block => {}
                    _ => {
                        return Err(self.error(format!(
                            "syntax error, unexpected token \"{}\"",
                            word
                        )))
                    }
                }
            }
        }

        self.note_significant(b'w');
        Ok(())
    }
}

fn closer_for(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}
