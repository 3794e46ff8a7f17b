use crate::error::{ErrorKind, ParseError};

/// Position in source code (byte offset plus human-facing line/column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Byte offset in source
    pub byte: usize,
    /// Line number (0-indexed)
    pub line: usize,
    /// Column number (0-indexed, in characters)
    pub col: usize,
}

impl Position {
    pub fn new() -> Self {
        Self { byte: 0, line: 0, col: 0 }
    }
}

/// Span in source code (a range from start position to end position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

/// Tokens produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal template text, including the content of raw blocks
    Text { text: String, span: Span },
    /// Variable reference: `{{ code }}`
    Expression { code: String, span: Span },
    /// Block tag: `{% keyword rest %}`
    Block { keyword: String, rest: String, span: Span },
    /// End of file
    Eof { position: Position },
}

impl Token {
    pub fn span(&self) -> Span {
        match self {
            Token::Text { span, .. } => *span,
            Token::Expression { span, .. } => *span,
            Token::Block { span, .. } => *span,
            Token::Eof { position } => Span { start: *position, end: *position },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Expression,
    Block,
    Comment,
}

impl TagKind {
    fn close(&self) -> &'static str {
        match self {
            TagKind::Expression => "}}",
            TagKind::Block => "%}",
            TagKind::Comment => "#}",
        }
    }
}

/// Tokenizer for template text.
///
/// Block and comment tags that sit alone on their line are "standalone": the
/// indentation before them and the line break after them are dropped, so
/// control flow leaves no blank lines in the output. Expression tags are never
/// standalone.
pub struct Tokenizer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    position: Position,
    /// Start of the text not yet emitted as a token
    text_start: Position,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            position: Position::new(),
            text_start: Position::new(),
        }
    }

    /// Tokenize the entire source
    pub fn tokenize(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        while !self.at_eof() {
            match self.tag_at_cursor() {
                Some(kind) => self.tokenize_tag(kind, &mut tokens)?,
                None => self.advance(),
            }
        }

        self.flush_text(self.position, &mut tokens);
        tokens.push(Token::Eof { position: self.position });
        Ok(tokens)
    }

    fn tag_at_cursor(&self) -> Option<TagKind> {
        if self.peek_char() != Some('{') {
            return None;
        }
        match self.peek_next_char() {
            Some('{') => Some(TagKind::Expression),
            Some('%') => Some(TagKind::Block),
            Some('#') => Some(TagKind::Comment),
            _ => None,
        }
    }

    fn tokenize_tag(&mut self, kind: TagKind, tokens: &mut Vec<Token>) -> Result<(), ParseError> {
        let tag_start = self.position;
        let (inner, tag_end) = self.scan_tag(kind)?;
        let span = Span { start: tag_start, end: tag_end };

        if kind == TagKind::Expression {
            self.flush_text(tag_start, tokens);
            self.advance_to(tag_end.byte);
            tokens.push(Token::Expression { code: inner.trim().to_string(), span });
            self.text_start = self.position;
            return Ok(());
        }

        self.finish_tag(tag_start, tag_end, tokens);

        if kind == TagKind::Comment {
            return Ok(());
        }

        let inner = inner.trim();
        let (keyword, rest) = match inner.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (inner, ""),
        };

        if keyword == "raw" {
            return self.tokenize_raw(span, tokens);
        }

        tokens.push(Token::Block {
            keyword: keyword.to_string(),
            rest: rest.to_string(),
            span,
        });
        Ok(())
    }

    /// Emit pending text up to a block/comment tag, apply standalone trimming,
    /// and move the cursor past the tag.
    fn finish_tag(&mut self, tag_start: Position, tag_end: Position, tokens: &mut Vec<Token>) {
        let line_start = self.source[..tag_start.byte].rfind('\n').map_or(0, |i| i + 1);
        let indentation = &self.source[line_start..tag_start.byte];
        let alone_before = line_start >= self.text_start.byte
            && indentation.bytes().all(|b| b == b' ' || b == b'\t');

        let mut after = tag_end.byte;
        while after < self.bytes.len() && (self.bytes[after] == b' ' || self.bytes[after] == b'\t') {
            after += 1;
        }
        let rest_of_line_blank = after >= self.bytes.len()
            || self.bytes[after] == b'\n'
            || (self.bytes[after] == b'\r' && self.bytes.get(after + 1) == Some(&b'\n'));

        if alone_before && rest_of_line_blank {
            let text_end = Position { byte: line_start, line: tag_start.line, col: 0 };
            self.flush_text(text_end, tokens);
            self.advance_to(after);
            self.consume_newline();
        } else {
            self.flush_text(tag_start, tokens);
            self.advance_to(tag_end.byte);
        }
        self.text_start = self.position;
    }

    /// Everything up to the matching `{% endraw %}` is literal text.
    fn tokenize_raw(&mut self, open_span: Span, tokens: &mut Vec<Token>) -> Result<(), ParseError> {
        let mut search = self.position.byte;
        loop {
            let Some(offset) = self.source[search..].find("{%") else {
                return Err(ParseError::new(
                    ErrorKind::UnclosedBlock,
                    "This 'raw' block is never closed.",
                    open_span,
                )
                .with_help("Close with '{% endraw %}'"));
            };
            let candidate = search + offset;
            let close = self.source[candidate + 2..].find("%}").map(|i| candidate + 2 + i);
            if let Some(close) = close {
                if self.source[candidate + 2..close].trim() == "endraw" {
                    self.advance_to(candidate);
                    let tag_start = self.position;
                    self.advance_to(close + 2);
                    let tag_end = self.position;
                    // Rewind so the end tag gets standalone handling like any block tag
                    self.position = tag_start;
                    self.finish_tag(tag_start, tag_end, tokens);
                    return Ok(());
                }
            }
            search = candidate + 2;
        }
    }

    /// Find the closing delimiter of the tag at the cursor without consuming it.
    fn scan_tag(&self, kind: TagKind) -> Result<(String, Position), ParseError> {
        let open_end = self.position.byte + 2;
        let Some(offset) = self.source[open_end..].find(kind.close()) else {
            let mut end = self.position;
            end.col += 2;
            end.byte += 2;
            return Err(ParseError::new(
                ErrorKind::UnterminatedTag,
                format!("This tag is never closed with '{}'.", kind.close()),
                Span { start: self.position, end },
            ));
        };
        let inner = self.source[open_end..open_end + offset].to_string();
        let end = self.position_after(open_end + offset + 2);
        Ok((inner, end))
    }

    /// Position reached by advancing from the cursor to `byte` (same line or later).
    fn position_after(&self, byte: usize) -> Position {
        let mut position = self.position;
        for ch in self.source[self.position.byte..byte].chars() {
            position.byte += ch.len_utf8();
            if ch == '\n' {
                position.line += 1;
                position.col = 0;
            } else {
                position.col += 1;
            }
        }
        position
    }

    fn flush_text(&mut self, end: Position, tokens: &mut Vec<Token>) {
        if end.byte > self.text_start.byte {
            tokens.push(Token::Text {
                text: self.source[self.text_start.byte..end.byte].to_string(),
                span: Span { start: self.text_start, end },
            });
        }
        self.text_start = end;
    }

    fn at_eof(&self) -> bool {
        self.position.byte >= self.bytes.len()
    }

    fn peek_char(&self) -> Option<char> {
        if self.at_eof() { return None; }
        let b = self.bytes[self.position.byte];
        if b < 128 {
            Some(b as char)
        } else {
            self.source[self.position.byte..].chars().next()
        }
    }

    fn peek_next_char(&self) -> Option<char> {
        if self.position.byte + 1 >= self.bytes.len() { return None; }
        let b = self.bytes[self.position.byte + 1];
        if b < 128 {
            Some(b as char)
        } else {
            self.source[self.position.byte..].chars().nth(1)
        }
    }

    fn advance(&mut self) {
        let Some(ch) = self.peek_char() else { return };
        self.position.byte += ch.len_utf8();

        if ch == '\n' {
            self.position.line += 1;
            self.position.col = 0;
        } else {
            self.position.col += 1;
        }
    }

    fn advance_to(&mut self, byte: usize) {
        while self.position.byte < byte && !self.at_eof() {
            self.advance();
        }
    }

    fn consume_newline(&mut self) {
        if self.peek_char() == Some('\r') {
            self.advance();
        }
        if self.peek_char() == Some('\n') {
            self.advance();
        }
    }
}

/// Tokenize template source
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Tokenizer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> String {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_plain_text() {
        let tokens = tokenize("print('hello')\n").unwrap();
        assert!(matches!(&tokens[0], Token::Text { text, .. } if text == "print('hello')\n"));
        assert!(matches!(&tokens[1], Token::Eof { .. }));
    }

    #[test]
    fn test_expression() {
        let tokens = tokenize("x = {{ parameters.start | str }}\n").unwrap();
        assert!(matches!(&tokens[0], Token::Text { text, .. } if text == "x = "));
        assert!(matches!(&tokens[1], Token::Expression { code, .. } if code == "parameters.start | str"));
        assert!(matches!(&tokens[2], Token::Text { text, .. } if text == "\n"));
    }

    #[test]
    fn test_single_braces_are_text() {
        let tokens = tokenize("d = {'a': 1}\n\"{filename}\"\n").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(texts(&tokens), "d = {'a': 1}\n\"{filename}\"\n");
    }

    #[test]
    fn test_block_keyword_and_rest() {
        let tokens = tokenize("{% for item in parameters %}").unwrap();
        assert!(matches!(&tokens[0], Token::Block { keyword, rest, .. }
            if keyword == "for" && rest == "item in parameters"));
    }

    #[test]
    fn test_standalone_block_lines_vanish() {
        let source = "a\n    {% if x %}\nb\n{% endif %}  \nc\n";
        let tokens = tokenize(source).unwrap();
        assert_eq!(texts(&tokens), "a\nb\nc\n");
    }

    #[test]
    fn test_inline_block_keeps_surroundings() {
        let tokens = tokenize("    {{ v }}{% if not loop.last %},{% endif %}\n").unwrap();
        assert_eq!(texts(&tokens), "    ,\n");
    }

    #[test]
    fn test_comment_is_dropped() {
        let tokens = tokenize("a{# note #}b\n{# own line #}\nc").unwrap();
        assert_eq!(texts(&tokens), "ab\nc");
        assert!(!tokens.iter().any(|t| matches!(t, Token::Block { .. })));
    }

    #[test]
    fn test_raw_block_is_verbatim() {
        let source = "x\n{% raw %}\n'{{\"query\":{{}}}}' {% if %}\n{% endraw %}\ny\n";
        let tokens = tokenize(source).unwrap();
        assert_eq!(texts(&tokens), "x\n'{{\"query\":{{}}}}' {% if %}\ny\n");
        assert!(!tokens.iter().any(|t| matches!(t, Token::Expression { .. } | Token::Block { .. })));
    }

    #[test]
    fn test_unclosed_raw_block() {
        let err = tokenize("{% raw %}\nnever closed").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnclosedBlock);
    }

    #[test]
    fn test_unterminated_tag() {
        let err = tokenize("line\nvalue = {{ info.provider\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnterminatedTag);
        assert_eq!(err.span.start.line, 1);
        assert_eq!(err.span.start.col, 8);
    }

    #[test]
    fn test_positions_track_lines() {
        let tokens = tokenize("first\nsecond {{ name }}").unwrap();
        let span = tokens[1].span();
        assert_eq!(span.start.line, 1);
        assert_eq!(span.start.col, 7);
        assert_eq!(span.end.col, 17);
    }

    #[test]
    fn test_crlf_standalone() {
        let tokens = tokenize("a\r\n{% if x %}\r\nb\r\n{% endif %}\r\n").unwrap();
        assert_eq!(texts(&tokens), "a\r\nb\r\n");
    }
}
