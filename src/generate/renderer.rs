use super::{serialize, Generator, LiteralForm, RenderOptions};
use crate::ast::*;
use crate::context::Context;
use crate::error::{Error, Location, Result};
use crate::value::{Mapping, Value};
use tracing::debug;

/// Walks a template's node tree against a context.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    options: RenderOptions,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl Generator for Renderer {
    fn generate(&self, template: &Template, context: &Context) -> Result<String> {
        debug!(template = %template.name, nodes = template.nodes.len(), "rendering template");

        let mut state = RenderState {
            template,
            context,
            options: self.options,
            scopes: Vec::new(),
            output: String::with_capacity(template.source.len()),
        };
        state.emit_nodes(&template.nodes)?;
        Ok(state.output)
    }
}

/// Per-call rendering state. Dropped on error, so failures never leak partial text.
struct RenderState<'a> {
    template: &'a Template,
    context: &'a Context,
    options: RenderOptions,
    /// Loop bindings, innermost last
    scopes: Vec<Mapping>,
    output: String,
}

impl RenderState<'_> {
    fn emit_nodes(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            self.emit_node(node)?;
        }
        Ok(())
    }

    fn emit_node(&mut self, node: &Node) -> Result<()> {
        match node {
            Node::Text(text) => {
                self.output.push_str(&text.content);
                Ok(())
            }
            Node::Variable(variable) => self.emit_variable(variable),
            Node::If(if_node) => self.emit_if(if_node),
            Node::For(for_node) => self.emit_for(for_node),
        }
    }

    fn emit_variable(&mut self, variable: &VariableNode) -> Result<()> {
        let Some(value) = self.resolve(&variable.path) else {
            return Err(Error::UndefinedVariable {
                variable: variable.path.to_string(),
                location: self.location(&variable.span),
            });
        };

        let form = match variable.form {
            LiteralForm::Json { indent: None } => LiteralForm::Json { indent: self.options.json_indent },
            form => form,
        };

        let literal = serialize(value, form).map_err(|detail| Error::UnsupportedValueType {
            variable: variable.path.to_string(),
            location: self.location(&variable.span),
            detail,
        })?;
        self.output.push_str(&literal);
        Ok(())
    }

    fn emit_if(&mut self, if_node: &IfNode) -> Result<()> {
        if self.test(&if_node.condition) {
            return self.emit_nodes(&if_node.then_branch);
        }
        for (condition, _, body) in &if_node.elif_branches {
            if self.test(condition) {
                return self.emit_nodes(body);
            }
        }
        if let Some(else_branch) = &if_node.else_branch {
            self.emit_nodes(else_branch)?;
        }
        Ok(())
    }

    fn emit_for(&mut self, for_node: &ForNode) -> Result<()> {
        // Items are cloned so the body can push scopes while iterating
        let items: Vec<Value> = match self.resolve(&for_node.iterable) {
            Some(Value::List(items)) => items.clone(),
            Some(other) => {
                return Err(Error::NotIterable {
                    variable: for_node.iterable.to_string(),
                    location: self.location(&for_node.iterable_span),
                    found: other.type_name(),
                });
            }
            None => {
                return Err(Error::UndefinedVariable {
                    variable: for_node.iterable.to_string(),
                    location: self.location(&for_node.iterable_span),
                });
            }
        };

        let length = items.len();
        for (index0, item) in items.into_iter().enumerate() {
            let mut scope = Mapping::new();
            scope.insert(for_node.binding.as_str(), item);
            scope.insert("loop", loop_info(index0, length));

            self.scopes.push(scope);
            let result = self.emit_nodes(&for_node.body);
            self.scopes.pop();
            result?;
        }
        Ok(())
    }

    /// Truthiness of a condition; absent names are false.
    fn test(&self, condition: &Condition) -> bool {
        let truthy = self.resolve(&condition.path).is_some_and(Value::is_truthy);
        truthy != condition.negated
    }

    /// Look up a dotted path, innermost loop scope first, then the context.
    fn resolve(&self, path: &Path) -> Option<&Value> {
        let root = path.root();
        let mut value = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(root))
            .or_else(|| self.context.get(root))?;

        for segment in &path.segments[1..] {
            value = value.as_map()?.get(segment)?;
        }
        Some(value)
    }

    fn location(&self, span: &Span) -> Location {
        Location::new(&self.template.name, span)
    }
}

fn loop_info(index0: usize, length: usize) -> Mapping {
    let mut info = Mapping::new();
    info.insert("index", index0 + 1);
    info.insert("index0", index0);
    info.insert("first", index0 == 0);
    info.insert("last", index0 + 1 == length);
    info.insert("length", length);
    info
}
