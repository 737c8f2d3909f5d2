use crate::HashMap;
use crate::ir::{Binding, Dfg};
use log::{debug, info, warn};
use thiserror::Error;

mod declaration;
mod expression;
mod scanner;

pub use declaration::parse_int_literal;
pub use expression::{ExpressionError, MAX_NESTING_DEPTH, parse_expression};
use scanner::Scanner;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
    #[error(
        "No binding could be parsed: {failed} of {entries} bind entries failed{}",
        first_failure(.first_error)
    )]
    NoBindings {
        entries: usize,
        failed: usize,
        first_error: Option<ExpressionError>,
    },
}

fn first_failure(err: &Option<ExpressionError>) -> String {
    match err {
        Some(err) => format!(" (first: {err})"),
        None => String::new(),
    }
}

/// A top-level entry that contributes neither a declaration nor a binding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("Malformed declaration at byte {offset}: {reason}")]
    MalformedDeclaration { offset: usize, reason: String },

    #[error("Malformed binding at byte {offset}: {reason}")]
    MalformedBinding { offset: usize, reason: String },

    #[error("Unterminated entry at byte {offset}")]
    UnterminatedEntry { offset: usize },

    #[error("Unknown entry `{tag}` at byte {offset}")]
    UnknownEntry { tag: String, offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Instance,
    Term,
    Bind,
    Other,
}

impl Section {
    fn from_header(header: &str) -> Self {
        match header {
            "Instance" => Section::Instance,
            "Term" => Section::Term,
            "Bind" => Section::Bind,
            _ => Section::Other,
        }
    }
}

struct DfgBuilder {
    dfg: Dfg,
    bind_index: HashMap<String, usize>,
}

impl DfgBuilder {
    fn new() -> Self {
        Self {
            dfg: Dfg::default(),
            bind_index: HashMap::default(),
        }
    }

    fn push_binding(&mut self, binding: Binding) {
        match self.bind_index.get(&binding.dest) {
            Some(&idx) => {
                warn!(
                    "Duplicate binding for `{}`; the later entry replaces the earlier one",
                    binding.dest
                );
                self.dfg.bindings[idx] = binding;
            }
            None => {
                self.bind_index
                    .insert(binding.dest.clone(), self.dfg.bindings.len());
                self.dfg.bindings.push(binding);
            }
        }
    }

    fn reject(&mut self, err: EntryError) {
        warn!("{err}");
        self.dfg.rejected.push(err);
    }
}

/// Parses a complete DFG dump.
///
/// Declarations and bindings are recognised by their entry tag, so the
/// section headers (`Term:`, `Bind:`, ...) are optional. Entries may span
/// several lines. A binding whose tree fails to parse is kept with its error;
/// the dump as a whole only fails when it is non-blank and no binding parsed.
pub fn parse(text: &str) -> Result<Dfg, ParserError> {
    let scanner = Scanner::new(text);
    let bytes = text.as_bytes();
    let mut builder = DfgBuilder::new();
    let mut section = Section::Other;
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos].is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if bytes[pos] != b'(' {
            let line_end = text[pos..].find('\n').map_or(text.len(), |n| pos + n);
            let line = text[pos..line_end].trim();
            match line.strip_suffix(':') {
                Some(header) if !header.contains(char::is_whitespace) => {
                    debug!("Entering section `{header}`");
                    section = Section::from_header(header);
                }
                _ => debug!("Skipping stray line at byte {pos}: {line}"),
            }
            pos = line_end;
            continue;
        }

        let (tag, body) = scanner.word(pos + 1..bytes.len());
        let tag_text = scanner.slice(tag.clone());
        match scanner.entry_span(pos) {
            Ok(close) => {
                let body = body.start..close;
                match tag_text {
                    "Term" => match declaration::parse_term(&scanner, pos, body) {
                        Ok(desc) => {
                            if builder.dfg.descriptors.contains_key(&desc.name) {
                                warn!(
                                    "Duplicate declaration for `{}`; keeping the later one",
                                    desc.name
                                );
                            }
                            builder.dfg.descriptors.insert(desc.name.clone(), desc);
                        }
                        Err(err) => builder.reject(err),
                    },
                    "Bind" => match declaration::parse_bind(&scanner, pos, body) {
                        Ok(binding) => {
                            if let Err(err) = &binding.tree {
                                warn!("Binding for `{}` failed to parse: {err}", binding.dest);
                            }
                            builder.push_binding(binding);
                        }
                        Err(err) => builder.reject(err),
                    },
                    _ if section == Section::Instance => {
                        match declaration::parse_instance(&scanner, pos + 1..close) {
                            Some(instance) => builder.dfg.instances.push(instance),
                            None => builder.reject(EntryError::UnknownEntry {
                                tag: tag_text.to_string(),
                                offset: pos,
                            }),
                        }
                    }
                    _ => builder.reject(EntryError::UnknownEntry {
                        tag: tag_text.to_string(),
                        offset: pos,
                    }),
                }
                pos = close + 1;
            }
            Err(stop) => {
                let body = body.start.min(stop)..stop;
                match tag_text {
                    "Bind" => match declaration::salvage_dest(&scanner, body) {
                        Some(dest) => {
                            warn!("Binding for `{dest}` is truncated");
                            builder.push_binding(Binding {
                                dest: dest.to_string(),
                                tree: Err(ExpressionError::MalformedExpression {
                                    span: text[pos..stop].to_string(),
                                    offset: pos,
                                    reason: "unbalanced parentheses".to_string(),
                                }),
                            });
                        }
                        None => builder.reject(EntryError::UnterminatedEntry { offset: pos }),
                    },
                    "Term" => builder.reject(EntryError::MalformedDeclaration {
                        offset: pos,
                        reason: "unbalanced parentheses".to_string(),
                    }),
                    _ => builder.reject(EntryError::UnterminatedEntry { offset: pos }),
                }
                pos = stop;
            }
        }
    }

    let dfg = builder.dfg;
    info!(
        "Parsed {} declarations, {} bindings ({} failed), {} instances, {} rejected entries",
        dfg.descriptors.len(),
        dfg.bindings.len(),
        dfg.failed_bindings().count(),
        dfg.instances.len(),
        dfg.rejected.len()
    );

    if !text.trim().is_empty() && dfg.parsed_bindings().next().is_none() {
        return Err(ParserError::NoBindings {
            entries: dfg.bindings.len(),
            failed: dfg.failed_bindings().count(),
            first_error: dfg.failed_bindings().next().map(|(_, err)| err.clone()),
        });
    }
    Ok(dfg)
}
