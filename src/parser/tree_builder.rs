use super::tokenizer::{Position, Span, Token};
use crate::ast::*;
use crate::error::{ErrorKind, ParseError};
use crate::generate::LiteralForm;
use std::sync::Arc;

/// Builds a node tree from a token stream
pub struct TreeBuilder {
    tokens: Vec<Token>,
    pos: usize,
    source: Arc<str>,
    /// Open blocks (closing keyword, opening span) for mismatch diagnostics
    block_stack: Vec<(&'static str, Span)>,
}

impl TreeBuilder {
    pub fn new(tokens: Vec<Token>, source: Arc<str>) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            block_stack: Vec::new(),
        }
    }

    pub fn build(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();

        while !self.is_at_end() {
            if let Some(node) = self.parse_node()? {
                nodes.push(node);
            }
        }

        Ok(nodes)
    }

    fn parse_node(&mut self) -> Result<Option<Node>, ParseError> {
        let Some(token) = self.peek() else {
            return Ok(None);
        };

        match token {
            Token::Text { text, span } => {
                let node = Node::Text(TextNode { content: text.clone(), span: *span });
                self.advance();
                Ok(Some(node))
            }

            Token::Expression { code, span } => {
                let code = code.clone();
                let span = *span;
                let node = self.parse_variable(&code, span)?;
                self.advance();
                Ok(Some(Node::Variable(node)))
            }

            Token::Block { keyword, rest, span } => {
                let keyword = keyword.clone();
                let rest = rest.clone();
                let span = *span;
                match keyword.as_str() {
                    "if" => self.parse_if(&rest, span).map(Some),
                    "for" => self.parse_for(&rest, span).map(Some),
                    "elif" | "else" | "endif" | "endfor" => Err(self.stray_tag(&keyword, span)),
                    _ => Err(ParseError::new(
                        ErrorKind::UnknownTag,
                        format!("'{}' is not a recognized block tag.", keyword),
                        span,
                    )
                    .with_help("Supported tags: if, elif, else, endif, for, endfor, raw, endraw")),
                }
            }

            Token::Eof { .. } => {
                self.advance();
                Ok(None)
            }
        }
    }

    /// `path` or `path | filter`
    fn parse_variable(&self, code: &str, span: Span) -> Result<VariableNode, ParseError> {
        let (path_text, filter) = match code.split_once('|') {
            Some((path, filter)) => (path, Some(filter.trim())),
            None => (code, None),
        };

        let path = Path::parse(path_text).ok_or_else(|| {
            ParseError::new(
                ErrorKind::InvalidExpression,
                format!("'{}' is not a variable path.", path_text.trim()),
                span,
            )
            .with_help("Reference context values with dotted names, e.g. {{ info.provider }}")
        })?;

        let form = match filter {
            None => LiteralForm::Text,
            Some(filter) => parse_filter(filter).ok_or_else(|| {
                ParseError::new(ErrorKind::UnknownFilter, format!("Unknown filter '{}'.", filter), span)
                    .with_help("Supported filters: str, tojson, tojson(indent=N)")
            })?,
        };

        Ok(VariableNode { path, form, span })
    }

    fn parse_condition(&self, text: &str, span: Span) -> Result<Condition, ParseError> {
        let (negated, path_text) = match text.strip_prefix("not ") {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        // `not` is an operator, never a name
        let path = Path::parse(path_text).filter(|path| path.root() != "not").ok_or_else(|| {
            ParseError::new(
                ErrorKind::InvalidExpression,
                format!("'{}' is not a supported condition.", text),
                span,
            )
            .with_help("Conditions test a single value: {% if name %} or {% if not name %}")
        })?;
        Ok(Condition { path, negated })
    }

    fn parse_if(&mut self, condition: &str, span: Span) -> Result<Node, ParseError> {
        let condition = self.parse_condition(condition, span)?;
        self.advance();
        self.block_stack.push(("endif", span));

        let then_branch = self.parse_until(&["elif", "else", "endif"])?;
        let mut elif_branches = Vec::new();
        let mut else_branch = None;

        loop {
            let Some(Token::Block { keyword, rest, span: tag_span }) = self.peek() else {
                return Err(self.unclosed("if", "endif", span));
            };
            let keyword = keyword.clone();
            let rest = rest.clone();
            let tag_span = *tag_span;
            self.advance();

            match keyword.as_str() {
                "elif" if else_branch.is_none() => {
                    let elif_condition = self.parse_condition(&rest, tag_span)?;
                    let body = self.parse_until(&["elif", "else", "endif"])?;
                    elif_branches.push((elif_condition, tag_span, body));
                }
                "else" if else_branch.is_none() => {
                    else_branch = Some(self.parse_until(&["elif", "else", "endif"])?);
                }
                "endif" => break,
                _ => {
                    return Err(ParseError::new(
                        ErrorKind::UnexpectedTag,
                        format!("'{}' cannot follow 'else'.", keyword),
                        tag_span,
                    )
                    .with_related(span)
                    .with_related_label("if opened here"));
                }
            }
        }

        self.block_stack.pop();
        Ok(Node::If(IfNode {
            condition,
            then_branch,
            elif_branches,
            else_branch,
            span,
        }))
    }

    fn parse_for(&mut self, header: &str, span: Span) -> Result<Node, ParseError> {
        let parts: Vec<&str> = header.split_whitespace().collect();
        let (binding, iterable) = match parts.as_slice() {
            [binding, "in", iterable] if is_identifier(binding) && *binding != "loop" => {
                match Path::parse(iterable) {
                    Some(path) => (binding.to_string(), path),
                    None => return Err(self.invalid_for(header, span)),
                }
            }
            _ => return Err(self.invalid_for(header, span)),
        };

        self.advance();
        self.block_stack.push(("endfor", span));
        let body = self.parse_until(&["endfor"])?;

        match self.peek() {
            Some(Token::Block { keyword, .. }) if keyword == "endfor" => self.advance(),
            _ => return Err(self.unclosed("for", "endfor", span)),
        }
        self.block_stack.pop();

        Ok(Node::For(ForNode {
            binding,
            iterable,
            iterable_span: span,
            body,
            span,
        }))
    }

    /// Parse nodes until one of `terminators` (left unconsumed) or end of input.
    fn parse_until(&mut self, terminators: &[&str]) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            match self.peek() {
                None | Some(Token::Eof { .. }) => return Ok(nodes),
                Some(Token::Block { keyword, .. }) if terminators.contains(&keyword.as_str()) => {
                    return Ok(nodes);
                }
                _ => {
                    if let Some(node) = self.parse_node()? {
                        nodes.push(node);
                    }
                }
            }
        }
    }

    fn stray_tag(&self, keyword: &str, span: Span) -> ParseError {
        match self.block_stack.last() {
            Some((expected, open_span)) => ParseError::new(
                ErrorKind::MismatchedCloseTag,
                format!("Found '{}' but the innermost open block expects '{}'.", keyword, expected),
                span,
            )
            .with_related(*open_span)
            .with_help(format!("Close the inner block with '{{% {} %}}' first", expected)),
            None => ParseError::new(
                ErrorKind::UnexpectedTag,
                format!("'{}' has no matching opening block.", keyword),
                span,
            ),
        }
    }

    fn unclosed(&self, keyword: &str, closer: &str, open_span: Span) -> ParseError {
        ParseError::new(
            ErrorKind::UnclosedBlock,
            format!("This '{}' block is never closed.", keyword),
            self.current_span(),
        )
        .with_related(open_span)
        .with_help(format!("Close with '{{% {} %}}'", closer))
    }

    fn invalid_for(&self, header: &str, span: Span) -> ParseError {
        ParseError::new(
            ErrorKind::InvalidExpression,
            format!("'for {}' is not a supported loop.", header),
            span,
        )
        .with_help("Loops have the form {% for item in sequence %}")
    }

    /// Span at the current token, or the end of source
    fn current_span(&self) -> Span {
        match self.peek() {
            Some(token) => token.span(),
            None => {
                let byte = self.source.len();
                let line = self.source.lines().count().saturating_sub(1);
                let col = self.source.lines().last().map(|l| l.chars().count()).unwrap_or(0);
                let end = Position { byte, line, col };
                Span { start: end, end }
            }
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

/// `str`, `tojson`, `tojson(4)` or `tojson(indent=4)`
fn parse_filter(filter: &str) -> Option<LiteralForm> {
    match filter {
        "str" => return Some(LiteralForm::String),
        "tojson" => return Some(LiteralForm::Json { indent: None }),
        _ => {}
    }
    let args = filter.strip_prefix("tojson")?.trim().strip_prefix('(')?.strip_suffix(')')?;
    let args = args.trim();
    let value = args.strip_prefix("indent").map_or(args, |rest| rest.trim_start().trim_start_matches('='));
    let indent = value.trim().parse::<usize>().ok()?;
    Some(LiteralForm::Json { indent: Some(indent) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenize;

    fn build(source: &str) -> Result<Vec<Node>, ParseError> {
        let tokens = tokenize(source)?;
        TreeBuilder::new(tokens, Arc::from(source)).build()
    }

    #[test]
    fn test_variable_forms() {
        let nodes = build("{{ a }}{{ b | str }}{{ c | tojson }}{{ d | tojson(indent=2) }}{{ e|tojson(4) }}").unwrap();
        let forms: Vec<LiteralForm> = nodes
            .iter()
            .map(|n| match n {
                Node::Variable(v) => v.form,
                other => panic!("unexpected node {:?}", other),
            })
            .collect();
        assert_eq!(
            forms,
            vec![
                LiteralForm::Text,
                LiteralForm::String,
                LiteralForm::Json { indent: None },
                LiteralForm::Json { indent: Some(2) },
                LiteralForm::Json { indent: Some(4) },
            ]
        );
    }

    #[test]
    fn test_if_elif_else() {
        let nodes = build("{% if a %}A{% elif not b %}B{% else %}C{% endif %}").unwrap();
        let Node::If(if_node) = &nodes[0] else { panic!("expected if") };
        assert_eq!(if_node.condition.path.to_string(), "a");
        assert_eq!(if_node.then_branch.len(), 1);
        assert_eq!(if_node.elif_branches.len(), 1);
        assert!(if_node.elif_branches[0].0.negated);
        assert!(if_node.else_branch.is_some());
    }

    #[test]
    fn test_nested_for_and_if() {
        let source = "{% for c in parameters %}{{ c | tojson }}{% if not loop.last %},{% endif %}{% endfor %}";
        let nodes = build(source).unwrap();
        let Node::For(for_node) = &nodes[0] else { panic!("expected for") };
        assert_eq!(for_node.binding, "c");
        assert_eq!(for_node.iterable.to_string(), "parameters");
        assert_eq!(for_node.body.len(), 2);
        assert!(matches!(&for_node.body[1], Node::If(i) if i.condition.negated));
    }

    #[test]
    fn test_unclosed_if() {
        let err = build("a\n{% if x %}\nb\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnclosedBlock);
        assert_eq!(err.related_span.map(|s| s.start.line), Some(1));
    }

    #[test]
    fn test_mismatched_close() {
        let err = build("{% for x in xs %}{% if x %}{% endfor %}{% endif %}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MismatchedCloseTag);
        assert!(err.message.contains("endif"));
    }

    #[test]
    fn test_stray_close() {
        let err = build("text{% endfor %}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedTag);
    }

    #[test]
    fn test_else_after_else() {
        let err = build("{% if a %}{% else %}{% else %}{% endif %}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedTag);
    }

    #[test]
    fn test_unknown_tag_and_filter() {
        assert_eq!(build("{% include 'x' %}").unwrap_err().kind, ErrorKind::UnknownTag);
        assert_eq!(build("{{ a | upper }}").unwrap_err().kind, ErrorKind::UnknownFilter);
        assert_eq!(build("{{ a + b }}").unwrap_err().kind, ErrorKind::InvalidExpression);
    }

    #[test]
    fn test_invalid_loop_header() {
        assert_eq!(build("{% for in xs %}{% endfor %}").unwrap_err().kind, ErrorKind::InvalidExpression);
        assert_eq!(build("{% for loop in xs %}{% endfor %}").unwrap_err().kind, ErrorKind::InvalidExpression);
    }

    #[test]
    fn test_bare_not_is_not_a_name() {
        assert_eq!(build("{% if not %}x{% endif %}").unwrap_err().kind, ErrorKind::InvalidExpression);
        assert_eq!(build("{% if a %}{% elif not %}{% endif %}").unwrap_err().kind, ErrorKind::InvalidExpression);
        assert!(build("{% if not nothing %}x{% endif %}").is_ok());
    }
}
