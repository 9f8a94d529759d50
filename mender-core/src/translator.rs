//! Translation between native locator expressions and selector-engine strings.
//!
//! A native expression is what a test author writes
//! (`getByRole('button', { name: 'Submit' })`, `page.getByTestId("login")`,
//! `locator('#main')`). The engine form is a single string such as
//! `role=button[name="Submit"]` or `data-testid=login`, used as the cache
//! key component and in AI prompts. Anything that is not one of the known
//! accessors is treated as a raw CSS/XPath selector and passes through
//! untouched in both directions.
//!
//! Only the accessible `name` option survives [`to_engine_format`]; flags
//! such as `exact: true` or regex names are dropped.

use regex::Regex;
use std::sync::LazyLock;

static NATIVE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)^\s*(?:page\.)?(getByTestId|getByRole|getByText|getByPlaceholder|getByLabel|getByAltText|getByTitle|locator)\(\s*(.*?)\s*\)\s*;?\s*$",
    )
    .expect("native call pattern")
});

static LOOKS_NATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:page\.)?(?:getBy[A-Z]\w*|locator)\(").expect("native prefix pattern")
});

// First argument: a quoted literal, optionally followed by an options object.
static ARGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)^(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)"|`([^`]*)`)\s*(?:,\s*\{(.*)\})?\s*$"#,
    )
    .expect("argument pattern")
});

static NAME_OPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[\s,{])name\s*:\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)"|`([^`]*)`)"#)
        .expect("name option pattern")
});

static ENGINE_ROLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^role=([A-Za-z][\w-]*)(?:\[name="((?:[^"\\]|\\.)*)"\])?$"#)
        .expect("engine role pattern")
});

/// One of the closed set of accessors the translator understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessor {
    TestId(String),
    Role { role: String, name: Option<String> },
    Text(String),
    Placeholder(String),
    Label(String),
    AltText(String),
    Title(String),
    /// `locator('...')` wrapping a raw CSS/XPath selector.
    Raw(String),
}

impl Accessor {
    /// Parse a native expression. `None` means it is not a known accessor.
    pub fn parse_native(expr: &str) -> Option<Self> {
        let call = NATIVE_CALL.captures(expr)?;
        let method = call.get(1)?.as_str();
        let args = ARGS.captures(call.get(2)?.as_str())?;
        let first = first_literal(&args)?;
        let options = args.get(4).map(|m| m.as_str()).unwrap_or("");

        let accessor = match method {
            "getByTestId" => Self::TestId(first),
            "getByRole" => Self::Role {
                role: first,
                name: NAME_OPTION
                    .captures(options)
                    .and_then(|c| first_literal(&c)),
            },
            "getByText" => Self::Text(first),
            "getByPlaceholder" => Self::Placeholder(first),
            "getByLabel" => Self::Label(first),
            "getByAltText" => Self::AltText(first),
            "getByTitle" => Self::Title(first),
            "locator" => Self::Raw(first),
            _ => return None,
        };
        Some(accessor)
    }

    /// Parse an engine string. Bare CSS/XPath yields `None`.
    pub fn parse_engine(selector: &str) -> Option<Self> {
        if let Some(caps) = ENGINE_ROLE.captures(selector) {
            return Some(Self::Role {
                role: caps.get(1)?.as_str().to_string(),
                name: caps.get(2).map(|m| unescape(m.as_str())),
            });
        }
        let (engine, value) = selector.split_once('=')?;
        let value = value.to_string();
        match engine {
            "data-testid" => Some(Self::TestId(value)),
            "text" => Some(Self::Text(value)),
            "placeholder" => Some(Self::Placeholder(value)),
            "label" => Some(Self::Label(value)),
            "alt" => Some(Self::AltText(value)),
            "title" => Some(Self::Title(value)),
            _ => None,
        }
    }

    pub fn to_engine(&self) -> String {
        match self {
            Self::TestId(v) => format!("data-testid={v}"),
            Self::Role { role, name: None } => format!("role={role}"),
            Self::Role {
                role,
                name: Some(name),
            } => format!("role={role}[name=\"{}\"]", escape(name, '"')),
            Self::Text(v) => format!("text={v}"),
            Self::Placeholder(v) => format!("placeholder={v}"),
            Self::Label(v) => format!("label={v}"),
            Self::AltText(v) => format!("alt={v}"),
            Self::Title(v) => format!("title={v}"),
            Self::Raw(v) => v.clone(),
        }
    }

    pub fn to_native(&self) -> String {
        let q = |v: &str| format!("'{}'", escape(v, '\''));
        match self {
            Self::TestId(v) => format!("getByTestId({})", q(v)),
            Self::Role { role, name: None } => format!("getByRole({})", q(role)),
            Self::Role {
                role,
                name: Some(name),
            } => format!("getByRole({}, {{ name: {} }})", q(role), q(name)),
            Self::Text(v) => format!("getByText({})", q(v)),
            Self::Placeholder(v) => format!("getByPlaceholder({})", q(v)),
            Self::Label(v) => format!("getByLabel({})", q(v)),
            Self::AltText(v) => format!("getByAltText({})", q(v)),
            Self::Title(v) => format!("getByTitle({})", q(v)),
            Self::Raw(v) => format!("locator({})", q(v)),
        }
    }
}

/// Convert a native expression to the selector-engine form.
///
/// ```
/// use mender_core::translator::to_engine_format;
///
/// assert_eq!(to_engine_format("getByTestId('login')"), "data-testid=login");
/// assert_eq!(
///     to_engine_format(r#"page.getByRole("button", { name: "Submit", exact: true })"#),
///     r#"role=button[name="Submit"]"#
/// );
/// assert_eq!(to_engine_format("#username-field"), "#username-field");
/// ```
pub fn to_engine_format(expr: &str) -> String {
    match Accessor::parse_native(expr) {
        Some(accessor) => accessor.to_engine(),
        None => expr.to_string(),
    }
}

/// Convert an engine string back to a native expression, for display only.
///
/// Input that already looks native, or is a bare CSS/XPath selector, is
/// returned unchanged.
pub fn to_native_format(selector: &str) -> String {
    if is_native(selector) {
        return selector.to_string();
    }
    match Accessor::parse_engine(selector) {
        Some(accessor) => accessor.to_native(),
        None => selector.to_string(),
    }
}

/// True when the text starts like a native accessor call.
pub fn is_native(expr: &str) -> bool {
    LOOKS_NATIVE.is_match(expr)
}

fn first_literal(caps: &regex::Captures<'_>) -> Option<String> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| unescape(m.as_str()))
        .or_else(|| caps.get(3).map(|m| m.as_str().to_string()))
}

fn escape(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '\\' || ch == quote {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(ch);
    }
    out
}
