use super::EntryError;
use super::expression::{ExpressionError, ExpressionParser};
use super::scanner::Scanner;
use crate::ir::{Binding, ConstantKind, Instance, Node, RoleFlag, SignalDescriptor};
use log::debug;
use std::collections::BTreeSet;
use std::ops::Range;

const TERM_KEYS: [&str; 4] = ["name:", "type:", "msb:", "lsb:"];
const BIND_KEYS: [&str; 5] = ["dest:", "tree:", "msb:", "lsb:", "ptr:"];

/// Parses the body of a `(Term ...)` entry. `body` excludes the tag.
pub(crate) fn parse_term(
    scanner: &Scanner<'_>,
    entry: usize,
    body: Range<usize>,
) -> Result<SignalDescriptor, EntryError> {
    let malformed = |reason: &str| EntryError::MalformedDeclaration {
        offset: entry,
        reason: reason.to_string(),
    };

    let fields = scanner
        .keyed_fields(body, &TERM_KEYS)
        .map_err(|e| malformed(e.reason))?;

    let name = fields
        .get("name:")
        .map(|value| scanner.slice(scanner.word(value).0))
        .unwrap_or_default();
    if name.is_empty() {
        return Err(malformed("missing `name:` field"));
    }

    let roles = match fields.get("type:") {
        Some(value) => parse_roles(scanner.slice(value)),
        None => BTreeSet::new(),
    };

    let mut bounds = [0i64; 2];
    for (slot, key) in bounds.iter_mut().zip(["msb:", "lsb:"]) {
        if let Some(value) = fields.get(key) {
            *slot = parse_bound(scanner, value)
                .ok_or_else(|| malformed(&format!("`{key}` is not an integer constant")))?;
        }
    }
    let [msb, lsb] = bounds;
    if msb < lsb {
        return Err(malformed("msb is below lsb"));
    }

    Ok(SignalDescriptor {
        name: name.to_string(),
        roles,
        msb,
        lsb,
    })
}

/// `['Input', 'Reg']` style list; unknown flags are dropped.
fn parse_roles(text: &str) -> BTreeSet<RoleFlag> {
    let inner = text
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    inner
        .split(',')
        .map(|token| token.trim().trim_matches(['\'', '"']))
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            let role = RoleFlag::from_token(token);
            if role.is_none() {
                debug!("Ignoring unknown signal role `{token}`");
            }
            role
        })
        .collect()
}

fn parse_bound(scanner: &Scanner<'_>, value: Range<usize>) -> Option<i64> {
    match ExpressionParser::new(scanner).parse(value).ok()? {
        Node::Constant {
            kind: ConstantKind::Int,
            raw,
        } => parse_int_literal(&raw),
        _ => None,
    }
}

/// Plain decimal or a Verilog literal such as `32'd7`, `'hff`, `4'b1_010`.
pub fn parse_int_literal(raw: &str) -> Option<i64> {
    let cleaned = raw.trim().replace('_', "");
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    let Some((_size, based)) = digits.split_once('\'') else {
        return cleaned.parse().ok();
    };
    let based = based.trim_start_matches(['s', 'S']);
    let mut chars = based.chars();
    let radix = match chars.next()?.to_ascii_lowercase() {
        'b' => 2,
        'o' => 8,
        'd' => 10,
        'h' => 16,
        _ => return None,
    };
    let value = i64::from_str_radix(chars.as_str(), radix).ok()?;
    if negative { value.checked_neg() } else { Some(value) }
}

/// Parses the body of a `(Bind ...)` entry. A tree that fails to parse still
/// yields a [`Binding`] carrying the error; only a missing destination rejects
/// the whole entry.
pub(crate) fn parse_bind(
    scanner: &Scanner<'_>,
    entry: usize,
    body: Range<usize>,
) -> Result<Binding, EntryError> {
    let fields = scanner
        .keyed_fields(body, &BIND_KEYS)
        .map_err(|e| EntryError::MalformedBinding {
            offset: e.offset,
            reason: e.reason.to_string(),
        })?;

    let dest = fields
        .get("dest:")
        .map(|value| scanner.slice(scanner.word(value).0))
        .unwrap_or_default();
    if dest.is_empty() {
        return Err(EntryError::MalformedBinding {
            offset: entry,
            reason: "missing `dest:` field".to_string(),
        });
    }

    let tree = match fields.get("tree:") {
        Some(value) => ExpressionParser::new(scanner).parse(value),
        None => Err(ExpressionError::MalformedExpression {
            span: String::new(),
            offset: entry,
            reason: "missing `tree:` field".to_string(),
        }),
    };
    Ok(Binding {
        dest: dest.to_string(),
        tree,
    })
}

/// Recovers the destination of a bind entry whose parentheses never close.
pub(crate) fn salvage_dest<'a>(scanner: &Scanner<'a>, body: Range<usize>) -> Option<&'a str> {
    let body = scanner.trim(body);
    let text = scanner.slice(body).strip_prefix("dest:")?;
    let dest = text.split_whitespace().next()?;
    (!dest.contains(['(', ')'])).then_some(dest)
}

/// `(alu, 'alu')` line of the `Instance:` section.
pub(crate) fn parse_instance(scanner: &Scanner<'_>, inner: Range<usize>) -> Option<Instance> {
    let parts = scanner.split_top_level(inner, b',').ok()?;
    let [module, name] = parts.as_slice() else {
        return None;
    };
    let unquote = |r: &Range<usize>| scanner.slice(r.clone()).trim_matches(['\'', '"']).to_string();
    Some(Instance {
        module: unquote(module),
        name: unquote(name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(text: &str) -> Result<SignalDescriptor, EntryError> {
        let scanner = Scanner::new(text);
        parse_term(&scanner, 0, 0..text.len())
    }

    #[test]
    fn test_term_with_roles_and_width() {
        let desc =
            term("name:alu.acc type:['Output', 'Reg'] msb:(IntConst 7) lsb:(IntConst 0)").unwrap();
        assert_eq!(desc.name, "alu.acc");
        assert!(desc.has_role(RoleFlag::Output));
        assert!(desc.has_role(RoleFlag::Register));
        assert_eq!(desc.width(), 8);
    }

    #[test]
    fn test_term_drops_unknown_roles_and_defaults_width() {
        let desc = term("name:t type:['Input','Genvar']").unwrap();
        assert_eq!(desc.roles, BTreeSet::from([RoleFlag::Input]));
        assert_eq!((desc.msb, desc.lsb), (0, 0));
    }

    #[test]
    fn test_term_rejects_bad_width() {
        assert!(matches!(
            term("name:t type:['Wire'] msb:(IntConst 0) lsb:(IntConst 3)"),
            Err(EntryError::MalformedDeclaration { .. })
        ));
        assert!(matches!(
            term("name:t msb:(Terminal w) lsb:(IntConst 0)"),
            Err(EntryError::MalformedDeclaration { .. })
        ));
        assert!(matches!(
            term("type:['Wire']"),
            Err(EntryError::MalformedDeclaration { .. })
        ));
    }

    #[test]
    fn test_int_literals() {
        assert_eq!(parse_int_literal("15"), Some(15));
        assert_eq!(parse_int_literal("-2"), Some(-2));
        assert_eq!(parse_int_literal("32'd7"), Some(7));
        assert_eq!(parse_int_literal("'hff"), Some(255));
        assert_eq!(parse_int_literal("4'b1_010"), Some(10));
        assert_eq!(parse_int_literal("8'sh7f"), Some(127));
        assert_eq!(parse_int_literal("4'bx"), None);
    }

    #[test]
    fn test_int_literal_out_of_range() {
        assert_eq!(parse_int_literal("--9223372036854775808"), None);
        assert_eq!(parse_int_literal("64'hffffffffffffffff"), None);
        assert_eq!(parse_int_literal("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_int_literal("-8'd5"), Some(-5));
    }

    #[test]
    fn test_extreme_bounds_width() {
        let desc = term(
            "name:wide msb:(IntConst 9223372036854775807) lsb:(IntConst -1)",
        )
        .unwrap();
        assert_eq!(desc.width(), (1 << 63) + 1);
        let desc = term(
            "name:full msb:(IntConst 9223372036854775807) lsb:(IntConst -9223372036854775808)",
        )
        .unwrap();
        assert_eq!(desc.width(), u64::MAX);
    }

    #[test]
    fn test_bind_keeps_failed_tree() {
        let text = "dest:alu.y tree:(Operator Bogus Next:(Terminal a))";
        let scanner = Scanner::new(text);
        let binding = parse_bind(&scanner, 0, 0..text.len()).unwrap();
        assert_eq!(binding.dest, "alu.y");
        assert!(matches!(
            binding.tree,
            Err(ExpressionError::UnknownOperatorKind { .. })
        ));
    }

    #[test]
    fn test_bind_skips_width_fields() {
        let text = "dest:alu.y msb:(IntConst 3) lsb:(IntConst 0) tree:(Terminal alu.a)";
        let scanner = Scanner::new(text);
        let binding = parse_bind(&scanner, 0, 0..text.len()).unwrap();
        assert_eq!(binding.tree, Ok(Node::terminal("alu.a")));
    }

    #[test]
    fn test_instance_line() {
        let text = "alu, 'alu'";
        let scanner = Scanner::new(text);
        assert_eq!(
            parse_instance(&scanner, 0..text.len()),
            Some(Instance {
                module: "alu".to_string(),
                name: "alu".to_string(),
            })
        );
    }
}
