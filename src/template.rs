//! Prompt templates.
//!
//! A [`PromptTemplate`] is a Jinja-style template rendered with tera. It is
//! parsed and checked once when loaded. Every variable the parsed template
//! reads, in any branch, must be one of [`BINDING_NAMES`] or a name the
//! template binds itself (`for`, `set`, macro arguments). A trial render then
//! catches the remaining runtime failures. Both turn into a
//! [`GatewayError::Template`] at startup instead of on a request.
//!
//! Rendering is pure. The caller supplies every value (including the date)
//! through [`Bindings`].

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tera::ast::{Expr, ExprVal, Node};
use tera::{Context, Tera};

use crate::types::{ChatRequest, Message};
use crate::{GatewayError, Result};

/// Variables a template may reference.
pub const BINDING_NAMES: [&str; 3] = ["current_date", "user_question", "conversation"];

/// Name of the template that ships with the crate.
pub const BUILTIN_TEMPLATE_NAME: &str = "assistant_v1";

const BUILTIN_TEMPLATE: &str = include_str!("../templates/assistant_v1.jinja2");

/// Values available to a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Bindings {
    /// ISO date, e.g. `2025-03-01`.
    pub current_date: String,
    /// Content of the request's last turn.
    pub user_question: String,
    /// The whole transcript as `role: content` lines.
    pub conversation: String,
}

impl Bindings {
    pub fn for_request(request: &ChatRequest, today: NaiveDate) -> Self {
        Self {
            current_date: today.format("%Y-%m-%d").to_string(),
            user_question: request
                .last_message()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            conversation: transcript(&request.messages),
        }
    }
}

fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A validated prompt template.
#[derive(Clone)]
pub struct PromptTemplate {
    name: String,
    tera: Tera,
}

impl PromptTemplate {
    /// Parse and validate `source`.
    pub fn new(name: impl Into<String>, source: &str) -> Result<Self> {
        let name = name.into();
        let mut tera = Tera::default();
        // Output goes to a model, not a browser.
        tera.autoescape_on(vec![]);
        tera.add_raw_template(&name, source)?;
        check_variables(&name, &tera.get_template(&name)?.ast)?;

        let template = Self { name, tera };
        template.render(&Bindings::default())?;
        Ok(template)
    }

    /// Load a template file. The file stem becomes the template name.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Template(format!("{}: {e}", path.display())))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(BUILTIN_TEMPLATE_NAME);
        Self::new(name, &source)
    }

    /// The template shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::new(BUILTIN_TEMPLATE_NAME, BUILTIN_TEMPLATE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render with `bindings`.
    pub fn render(&self, bindings: &Bindings) -> Result<String> {
        let context = Context::from_serialize(bindings)?;
        Ok(self.tera.render(&self.name, &context)?)
    }
}

impl fmt::Debug for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptTemplate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Reject variables that are neither bindings nor bound by the template.
fn check_variables(name: &str, ast: &[Node]) -> Result<()> {
    let mut unknown = Vec::new();
    let mut locals = Vec::new();
    walk_nodes(ast, &mut locals, &mut unknown);
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort();
    unknown.dedup();
    Err(GatewayError::Template(format!(
        "template '{name}' uses unknown variable(s) {}; available: {}",
        unknown.join(", "),
        BINDING_NAMES.join(", ")
    )))
}

fn walk_nodes(nodes: &[Node], locals: &mut Vec<String>, unknown: &mut Vec<String>) {
    for node in nodes {
        match node {
            Node::VariableBlock(_, expr) => walk_expr(expr, locals, unknown),
            Node::Set(_, set) => {
                walk_expr(&set.value, locals, unknown);
                locals.push(set.key.clone());
            }
            Node::If(branches, _) => {
                for (_, condition, body) in &branches.conditions {
                    walk_expr(condition, locals, unknown);
                    walk_scoped(body, locals, unknown);
                }
                if let Some((_, body)) = &branches.otherwise {
                    walk_scoped(body, locals, unknown);
                }
            }
            Node::Forloop(_, forloop, _) => {
                walk_expr(&forloop.container, locals, unknown);
                let outer = locals.len();
                locals.push("loop".to_string());
                locals.push(forloop.value.clone());
                locals.extend(forloop.key.clone());
                walk_nodes(&forloop.body, locals, unknown);
                locals.truncate(outer);
                if let Some(body) = &forloop.empty_body {
                    walk_scoped(body, locals, unknown);
                }
            }
            Node::MacroDefinition(_, definition, _) => {
                let outer = locals.len();
                for (arg, default) in &definition.args {
                    if let Some(default) = default {
                        walk_expr(default, locals, unknown);
                    }
                    locals.push(arg.clone());
                }
                walk_nodes(&definition.body, locals, unknown);
                locals.truncate(outer);
            }
            Node::FilterSection(_, section, _) => {
                for arg in section.filter.args.values() {
                    walk_expr(arg, locals, unknown);
                }
                walk_scoped(&section.body, locals, unknown);
            }
            Node::Block(_, block, _) => walk_scoped(&block.body, locals, unknown),
            Node::Include(_, names, _) => {
                unknown.push(format!("(include {})", names.join(", ")));
            }
            Node::ImportMacro(_, file, _) => unknown.push(format!("(import {file})")),
            _ => {}
        }
    }
}

fn walk_scoped(nodes: &[Node], locals: &mut Vec<String>, unknown: &mut Vec<String>) {
    let outer = locals.len();
    walk_nodes(nodes, locals, unknown);
    locals.truncate(outer);
}

fn walk_expr(expr: &Expr, locals: &[String], unknown: &mut Vec<String>) {
    for filter in &expr.filters {
        for arg in filter.args.values() {
            walk_expr(arg, locals, unknown);
        }
    }
    match &expr.val {
        // `x | default(..)` renders when `x` is missing.
        ExprVal::Ident(_) if expr.has_default_filter() => {}
        ExprVal::Ident(ident) => check_ident(ident, locals, unknown),
        ExprVal::Math(math) => {
            walk_expr(&math.lhs, locals, unknown);
            walk_expr(&math.rhs, locals, unknown);
        }
        ExprVal::Logic(logic) => {
            walk_expr(&logic.lhs, locals, unknown);
            walk_expr(&logic.rhs, locals, unknown);
        }
        ExprVal::In(contains) => {
            walk_expr(&contains.lhs, locals, unknown);
            walk_expr(&contains.rhs, locals, unknown);
        }
        ExprVal::Test(test) => {
            if !matches!(test.name.as_str(), "defined" | "undefined") {
                check_ident(&test.ident, locals, unknown);
            }
            for arg in &test.args {
                walk_expr(arg, locals, unknown);
            }
        }
        ExprVal::FunctionCall(call) => {
            for arg in call.args.values() {
                walk_expr(arg, locals, unknown);
            }
        }
        ExprVal::MacroCall(call) => {
            for arg in call.args.values() {
                walk_expr(arg, locals, unknown);
            }
        }
        ExprVal::Array(items) => {
            for item in items {
                walk_expr(item, locals, unknown);
            }
        }
        ExprVal::StringConcat(concat) => {
            for value in &concat.values {
                if let ExprVal::Ident(ident) = value {
                    check_ident(ident, locals, unknown);
                }
            }
        }
        ExprVal::String(_) | ExprVal::Int(_) | ExprVal::Float(_) | ExprVal::Bool(_) => {}
    }
}

fn check_ident(ident: &str, locals: &[String], unknown: &mut Vec<String>) {
    let root = ident
        .split(['.', '['])
        .next()
        .unwrap_or(ident)
        .trim();
    let known = BINDING_NAMES.contains(&root)
        || locals.iter().any(|local| local == root)
        || root == "__tera_context";
    if !known {
        unknown.push(root.to_string());
    }
}
