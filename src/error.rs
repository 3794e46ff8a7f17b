use crate::generate::UnsupportedValue;
use crate::parser::tokenizer::Span;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Kind of template parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnterminatedTag,
    UnclosedBlock,
    MismatchedCloseTag,
    UnexpectedTag,
    UnknownTag,
    InvalidExpression,
    UnknownFilter,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnterminatedTag => "Unterminated tag",
            ErrorKind::UnclosedBlock => "Unclosed block",
            ErrorKind::MismatchedCloseTag => "Mismatched close tag",
            ErrorKind::UnexpectedTag => "Unexpected tag",
            ErrorKind::UnknownTag => "Unknown tag",
            ErrorKind::InvalidExpression => "Invalid expression",
            ErrorKind::UnknownFilter => "Unknown filter",
        }
    }
}

/// Error while parsing template text
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    pub related_span: Option<Span>,
    pub related_label: Option<String>,
    pub help: Option<String>,
}

impl ParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            related_span: None,
            related_label: None,
            help: None,
        }
    }

    /// Add a related span (e.g., where a block was opened)
    pub fn with_related(mut self, span: Span) -> Self {
        self.related_span = Some(span);
        self
    }

    pub fn with_related_label(mut self, label: impl Into<String>) -> Self {
        self.related_label = Some(label.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render the error with source context
    pub fn render(&self, source: &str, filename: &str) -> String {
        self.render_inner(source, filename, false)
    }

    /// Render the error with ANSI color codes
    pub fn render_color(&self, source: &str, filename: &str) -> String {
        self.render_inner(source, filename, true)
    }

    fn render_inner(&self, source: &str, filename: &str, color: bool) -> String {
        let red = if color { "\x1b[1;31m" } else { "" };
        let dim = if color { "\x1b[2m" } else { "" };
        let cyan = if color { "\x1b[1;38;5;73m" } else { "" };
        let reset = if color { "\x1b[0m" } else { "" };

        let mut output = String::new();
        output.push('\n');

        let line = self.span.start.line + 1;
        let col = self.span.start.col + 1;
        output.push_str(&format!(" {}file:{} {}:{}:{}\n", dim, reset, filename, line, col));
        output.push_str(&format!("{}error:{} {}\n", red, reset, self.message));

        let mut excerpt = |span: &Span, marker_color: &str, label: Option<&str>| {
            let Some(source_line) = source.lines().nth(span.start.line) else {
                return;
            };
            let line_num = span.start.line + 1;
            let width = format!("{}", line_num).len().max(2);
            output.push_str(&format!("{}{:>width$} |{}\n", dim, "", reset, width = width));
            output.push_str(&format!(
                "{}{:>width$} |{} {}\n",
                dim, line_num, reset, source_line,
                width = width
            ));

            let underline_len = if span.end.line == span.start.line {
                span.end.col.saturating_sub(span.start.col).max(1)
            } else {
                source_line.chars().count().saturating_sub(span.start.col).max(1)
            };
            let label = label.map(|l| format!(" {}", l)).unwrap_or_default();
            output.push_str(&format!(
                "{}{:>width$} |{} {}{}{}{}{}\n",
                dim, "", reset,
                " ".repeat(span.start.col),
                marker_color, "^".repeat(underline_len), label, reset,
                width = width
            ));
        };

        excerpt(&self.span, red, None);
        if let Some(related) = &self.related_span {
            let label = self.related_label.as_deref().unwrap_or("opened here");
            excerpt(related, dim, Some(label));
        }

        if let Some(help) = &self.help {
            output.push('\n');
            for (i, help_line) in help.lines().enumerate() {
                if i == 0 {
                    output.push_str(&format!(" {}help:{} {}\n", cyan, reset, help_line));
                } else {
                    output.push_str(&format!("       {}\n", help_line));
                }
            }
        }

        output.push('\n');
        output
    }
}

/// Template name plus 1-based line and column of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub template: String,
    pub line: usize,
    pub col: usize,
}

impl Location {
    pub fn new(template: &str, span: &Span) -> Self {
        Self {
            template: template.to_string(),
            line: span.start.line + 1,
            col: span.start.col + 1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.template, self.line, self.col)
    }
}

/// Errors raised while loading templates or generating a script
#[derive(Debug, Error)]
pub enum Error {
    #[error("template '{template}' is malformed: {source}")]
    MalformedTemplate {
        template: String,
        text: Arc<str>,
        #[source]
        source: ParseError,
    },

    #[error("cannot embed '{variable}' at {location}: {detail}")]
    UnsupportedValueType {
        variable: String,
        location: Location,
        detail: UnsupportedValue,
    },

    #[error("undefined variable '{variable}' at {location}")]
    UndefinedVariable { variable: String, location: Location },

    #[error("'{variable}' at {location} is a {found}, expected a sequence")]
    NotIterable {
        variable: String,
        location: Location,
        found: &'static str,
    },

    #[error("unknown template kind '{0}'")]
    UnknownTemplateKind(String),

    #[error("missing required metadata field '{0}'")]
    MissingMetadataField(&'static str),

    #[error("generated script is not valid Python at line {line}, column {col}: {excerpt}")]
    InvalidScript {
        line: usize,
        col: usize,
        excerpt: String,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid request: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Human-oriented report; malformed templates get their source excerpt.
    pub fn report(&self, color: bool) -> String {
        match self {
            Error::MalformedTemplate { template, text, source } if color => {
                source.render_color(text, template)
            }
            Error::MalformedTemplate { template, text, source } => source.render(text, template),
            other if color => format!("\x1b[1;31merror\x1b[0m: {}\n", other),
            other => format!("error: {}\n", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenizer::Position;

    fn span(line: usize, start: usize, end: usize) -> Span {
        Span {
            start: Position { byte: 0, line, col: start },
            end: Position { byte: 0, line, col: end },
        }
    }

    #[test]
    fn test_render_points_at_span() {
        let source = "first line\n{% if x %}\nbody";
        let err = ParseError::new(ErrorKind::UnclosedBlock, "This 'if' block is never closed.", span(1, 0, 10))
            .with_help("Close with '{% endif %}'");

        let rendered = err.render(source, "single.py.tmpl");
        assert!(rendered.contains("single.py.tmpl:2:1"));
        assert!(rendered.contains("{% if x %}"));
        assert!(rendered.contains("^^^^^^^^^^"));
        assert!(rendered.contains("help: Close with"));
    }

    #[test]
    fn test_render_related_span_label() {
        let source = "{% for x in xs %}\n{% endif %}";
        let err = ParseError::new(ErrorKind::MismatchedCloseTag, "Expected 'endfor'.", span(1, 0, 11))
            .with_related(span(0, 0, 17))
            .with_related_label("loop opened here");

        let rendered = err.render(source, "t");
        assert!(rendered.contains("loop opened here"));
        assert!(!rendered.contains("\x1b["));
    }

    #[test]
    fn test_location_display_is_one_based() {
        let location = Location::new("multi", &span(0, 4, 8));
        assert_eq!(location.to_string(), "multi:1:5");
    }
}
