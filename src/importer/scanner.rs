//! Recorded-script scanner.
//!
//! Lifts a recorder-generated Python script into a stream of
//! [`RawAction`]s. This is a statement-wise recognizer over a small
//! vocabulary of call shapes, not a general interpreter: each recognized
//! top-level statement (a `page.…` driver call or an `expect(…)` assertion)
//! becomes one action with its locator chain preserved exactly; everything
//! else is reported as unknown and passed through.

use std::fmt;

/// One argument in a recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// String literal
    Str(String),
    /// Integer literal
    Int(i64),
    /// Boolean literal
    Bool(bool),
    /// Anything else, verbatim
    Raw(String),
}

impl Arg {
    /// The string value, if this is a string literal.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Raw(r) => write!(f, "{r}"),
        }
    }
}

/// One link in a call chain: a method name plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CallLink {
    /// Method name
    pub method: String,
    /// Positional arguments
    pub args: Vec<Arg>,
    /// Keyword arguments
    pub kwargs: Vec<(String, Arg)>,
}

impl CallLink {
    /// First positional argument as a string, if any.
    #[must_use]
    pub fn first_str(&self) -> Option<&str> {
        self.args.first().and_then(Arg::as_str)
    }

    /// Keyword argument value as a string, if present.
    #[must_use]
    pub fn kwarg_str(&self, name: &str) -> Option<&str> {
        self.kwargs
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.as_str())
    }
}

/// A synthesized record for one detected driver call.
#[derive(Debug, Clone)]
pub struct RawAction {
    /// Final method name: `goto`, `click`, `fill`, `press`,
    /// `to_be_visible`, `to_have_url`, …
    pub kind: String,
    /// Locator chain preceding the final call, in order
    pub chain: Vec<CallLink>,
    /// Final call positional arguments
    pub args: Vec<Arg>,
    /// Final call keyword arguments
    pub kwargs: Vec<(String, Arg)>,
    /// Whether this came from an `expect(page)` (page-level assertion)
    pub page_assertion: bool,
    /// 1-based source line
    pub line: usize,
}

/// One scanned statement: recognized or passed through.
#[derive(Debug, Clone)]
pub enum ScanItem {
    /// A recognized driver call or assertion
    Action(RawAction),
    /// A statement the recognizer does not understand
    Unknown {
        /// 1-based source line
        line: usize,
        /// Statement text, trimmed
        text: String,
    },
}

/// Statements that are recorder scaffolding, not actions.
fn is_scaffolding(line: &str) -> bool {
    line.is_empty()
        || line.starts_with('#')
        || line.starts_with("import ")
        || line.starts_with("from ")
        || line.starts_with("def ")
        || line.starts_with("with ")
        || line.starts_with("browser")
        || line.starts_with("context")
        || line.starts_with("page = ")
        || line.starts_with("page.close")
        || line.starts_with("run(")
        || line == ")"
}

/// Scans a recorded script into actions and unknowns.
#[must_use]
pub fn scan(source: &str) -> Vec<ScanItem> {
    let mut items = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        let line_no = i + 1;
        let stmt = raw.trim();
        if is_scaffolding(stmt) {
            continue;
        }
        match scan_statement(stmt, line_no) {
            Some(action) => items.push(ScanItem::Action(action)),
            None => items.push(ScanItem::Unknown {
                line: line_no,
                text: stmt.to_string(),
            }),
        }
    }
    items
}

fn scan_statement(stmt: &str, line: usize) -> Option<RawAction> {
    if let Some(rest) = stmt.strip_prefix("page.") {
        let mut chain = parse_chain(rest)?;
        let last = chain.pop()?;
        return Some(RawAction {
            kind: last.method,
            chain,
            args: last.args,
            kwargs: last.kwargs,
            page_assertion: false,
            line,
        });
    }
    if let Some(rest) = stmt.strip_prefix("expect(") {
        let close = matching_paren(rest)?;
        let inner = &rest[..close];
        let after = rest.get(close + 1..)?.strip_prefix('.')?;
        let mut assertion_chain = parse_chain(after)?;
        if assertion_chain.len() != 1 {
            return None;
        }
        let assertion = assertion_chain.remove(0);

        if inner == "page" {
            return Some(RawAction {
                kind: assertion.method,
                chain: Vec::new(),
                args: assertion.args,
                kwargs: assertion.kwargs,
                page_assertion: true,
                line,
            });
        }
        let chain = parse_chain(inner.strip_prefix("page.")?)?;
        return Some(RawAction {
            kind: assertion.method,
            chain,
            args: assertion.args,
            kwargs: assertion.kwargs,
            page_assertion: false,
            line,
        });
    }
    None
}

/// Parses `ident(args).ident(args)…` into links. Returns `None` when the
/// text deviates from that shape (the statement is then passed through).
fn parse_chain(input: &str) -> Option<Vec<CallLink>> {
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;
    let mut links = Vec::new();

    loop {
        let start = pos;
        while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
            pos += 1;
        }
        if pos == start || pos >= chars.len() || chars[pos] != '(' {
            return None;
        }
        let method: String = chars[start..pos].iter().collect();
        pos += 1;

        let args_start = pos;
        let mut depth = 1;
        let mut in_str: Option<char> = None;
        while pos < chars.len() {
            let c = chars[pos];
            match in_str {
                Some(quote) => {
                    if c == '\\' {
                        pos += 1;
                    } else if c == quote {
                        in_str = None;
                    }
                }
                None => match c {
                    '\'' | '"' => in_str = Some(c),
                    '(' | '[' | '{' => depth += 1,
                    ')' | ']' | '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                },
            }
            pos += 1;
        }
        if pos >= chars.len() {
            return None;
        }
        let args_text: String = chars[args_start..pos].iter().collect();
        let (args, kwargs) = parse_args(&args_text)?;
        links.push(CallLink {
            method,
            args,
            kwargs,
        });
        pos += 1;

        if pos >= chars.len() {
            return Some(links);
        }
        if chars[pos] != '.' {
            return None;
        }
        pos += 1;
    }
}

/// Byte offset of the parenthesis closing an already-opened group.
fn matching_paren(input: &str) -> Option<usize> {
    let mut depth = 1;
    let mut in_str: Option<char> = None;
    let mut iter = input.char_indices();
    while let Some((i, c)) = iter.next() {
        match in_str {
            Some(quote) => {
                if c == '\\' {
                    let _ = iter.next();
                } else if c == quote {
                    in_str = None;
                }
            }
            None => match c {
                '\'' | '"' => in_str = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// Splits an argument list on top-level commas and classifies each item.
fn parse_args(input: &str) -> Option<(Vec<Arg>, Vec<(String, Arg)>)> {
    let mut args = Vec::new();
    let mut kwargs = Vec::new();
    for item in split_top_level(input) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if let Some((name, value)) = split_kwarg(item) {
            kwargs.push((name.to_string(), parse_value(value)?));
        } else {
            args.push(parse_value(item)?);
        }
    }
    Some((args, kwargs))
}

/// `name=value` where `name` is an identifier and `=` is not `==`.
fn split_kwarg(item: &str) -> Option<(&str, &str)> {
    let eq = item.find('=')?;
    if item.get(eq + 1..eq + 2) == Some("=") {
        return None;
    }
    let name = &item[..eq];
    if !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Some((name, item[eq + 1..].trim()))
    } else {
        None
    }
}

fn split_top_level(input: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    let mut in_str: Option<char> = None;
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match in_str {
            Some(quote) => {
                current.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                } else if c == quote {
                    in_str = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    in_str = Some(c);
                    current.push(c);
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' | '}' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => {
                    items.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        items.push(current);
    }
    items
}

fn parse_value(item: &str) -> Option<Arg> {
    let item = item.trim();
    if let Some(quote) = item.chars().next().filter(|c| *c == '\'' || *c == '"') {
        if item.len() >= 2 && item.ends_with(quote) {
            return Some(Arg::Str(unescape(&item[1..item.len() - 1])));
        }
        return None;
    }
    if item == "True" {
        return Some(Arg::Bool(true));
    }
    if item == "False" {
        return Some(Arg::Bool(false));
    }
    if let Ok(n) = item.parse::<i64>() {
        return Some(Arg::Int(n));
    }
    Some(Arg::Raw(item.to_string()))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
