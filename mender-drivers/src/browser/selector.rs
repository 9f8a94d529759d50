//! Selector-engine strings to WebDriver locators.
//!
//! WebDriver only speaks CSS and XPath, so the accessor forms
//! (`data-testid=`, `role=`, `text=`, ...) are rewritten into one of the
//! two. Role matching covers explicit `role` attributes and the common
//! implicit roles; accessible names are matched on visible text,
//! `aria-label` and `value`.
use fantoccini::Locator;
use mender_core::Accessor;

/// An owned CSS or XPath expression ready for `find_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLocator {
    Css(String),
    XPath(String),
}

impl EngineLocator {
    pub fn parse(selector: &str) -> Self {
        let selector = selector.trim();
        match Accessor::parse_engine(selector) {
            Some(Accessor::TestId(v)) => Self::Css(css_attr("data-testid", &v)),
            Some(Accessor::Placeholder(v)) => Self::Css(css_attr("placeholder", &v)),
            Some(Accessor::AltText(v)) => Self::Css(css_attr("alt", &v)),
            Some(Accessor::Title(v)) => Self::Css(css_attr("title", &v)),
            Some(Accessor::Text(v)) => Self::XPath(text_xpath(&v)),
            Some(Accessor::Label(v)) => Self::XPath(label_xpath(&v)),
            Some(Accessor::Role { role, name }) => Self::XPath(role_xpath(&role, name.as_deref())),
            Some(Accessor::Raw(raw)) => Self::raw(&raw),
            None => Self::raw(selector),
        }
    }

    fn raw(selector: &str) -> Self {
        if let Some(xpath) = selector.strip_prefix("xpath=") {
            Self::XPath(xpath.to_string())
        } else if let Some(css) = selector.strip_prefix("css=") {
            Self::Css(css.to_string())
        } else if selector.starts_with('/') || selector.starts_with("./") || selector.starts_with('(') {
            Self::XPath(selector.to_string())
        } else {
            Self::Css(selector.to_string())
        }
    }

    pub fn as_locator(&self) -> Locator<'_> {
        match self {
            Self::Css(css) => Locator::Css(css),
            Self::XPath(xpath) => Locator::XPath(xpath),
        }
    }
}

fn css_attr(name: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{name}=\"{escaped}\"]")
}

/// Quote a string as an XPath 1.0 literal; mixed quotes need `concat`.
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value
            .split('\'')
            .map(|part| format!("'{part}'"))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

// Innermost elements whose visible text contains the value.
fn text_xpath(value: &str) -> String {
    let lit = xpath_literal(value);
    format!(
        "//*[not(self::script or self::style)][contains(normalize-space(.), {lit})][not(*[contains(normalize-space(.), {lit})])]"
    )
}

fn label_xpath(value: &str) -> String {
    let lit = xpath_literal(value);
    let label = format!("//label[contains(normalize-space(.), {lit})]");
    format!(
        "//*[@id={label}/@for] | {label}//*[self::input or self::select or self::textarea] | //*[@aria-label={lit}]"
    )
}

fn implicit_role(role: &str) -> Option<&'static str> {
    Some(match role {
        "button" => "self::button or (self::input and (@type='button' or @type='submit' or @type='reset'))",
        "link" => "(self::a and @href)",
        "textbox" => "self::textarea or (self::input and (not(@type) or @type='text' or @type='email' or @type='password' or @type='search' or @type='tel' or @type='url'))",
        "checkbox" => "(self::input and @type='checkbox')",
        "radio" => "(self::input and @type='radio')",
        "combobox" => "self::select",
        "heading" => "self::h1 or self::h2 or self::h3 or self::h4 or self::h5 or self::h6",
        "img" => "(self::img and @alt)",
        "list" => "self::ul or self::ol",
        "listitem" => "self::li",
        "navigation" => "self::nav",
        "table" => "self::table",
        "row" => "self::tr",
        "cell" => "self::td",
        "form" => "self::form",
        _ => return None,
    })
}

fn role_xpath(role: &str, name: Option<&str>) -> String {
    let role_lit = xpath_literal(role);
    let mut xpath = match implicit_role(role) {
        Some(implicit) => format!("//*[@role={role_lit} or {implicit}]"),
        None => format!("//*[@role={role_lit}]"),
    };
    if let Some(name) = name {
        let lit = xpath_literal(name);
        xpath.push_str(&format!(
            "[contains(normalize-space(.), {lit}) or @aria-label={lit} or @value={lit} or @title={lit}]"
        ));
    }
    xpath
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_accessors_become_css() {
        assert_eq!(
            EngineLocator::parse("data-testid=login"),
            EngineLocator::Css("[data-testid=\"login\"]".into())
        );
        assert_eq!(
            EngineLocator::parse("placeholder=Your \"name\""),
            EngineLocator::Css("[placeholder=\"Your \\\"name\\\"\"]".into())
        );
        assert_eq!(
            EngineLocator::parse("alt=Logo"),
            EngineLocator::Css("[alt=\"Logo\"]".into())
        );
    }

    #[test]
    fn raw_selectors_pick_css_or_xpath() {
        assert_eq!(
            EngineLocator::parse("#main > button.primary"),
            EngineLocator::Css("#main > button.primary".into())
        );
        assert_eq!(
            EngineLocator::parse("//form//input[@name='q']"),
            EngineLocator::XPath("//form//input[@name='q']".into())
        );
        assert_eq!(
            EngineLocator::parse("(//a)[2]"),
            EngineLocator::XPath("(//a)[2]".into())
        );
        assert_eq!(
            EngineLocator::parse("xpath=//div"),
            EngineLocator::XPath("//div".into())
        );
        assert_eq!(
            EngineLocator::parse("css=div > p"),
            EngineLocator::Css("div > p".into())
        );
    }

    #[test]
    fn role_with_name_matches_explicit_and_implicit_roles() {
        let EngineLocator::XPath(xpath) = EngineLocator::parse("role=button[name=\"Submit\"]") else {
            panic!("role should map to xpath");
        };
        assert!(xpath.starts_with("//*[@role='button' or self::button"));
        assert!(xpath.contains("@aria-label='Submit'"));
    }

    #[test]
    fn unknown_roles_use_the_attribute_only() {
        assert_eq!(
            EngineLocator::parse("role=tabpanel"),
            EngineLocator::XPath("//*[@role='tabpanel']".into())
        );
    }

    #[test]
    fn text_and_label_become_xpath() {
        let EngineLocator::XPath(text) = EngineLocator::parse("text=Sign in") else {
            panic!("text should map to xpath");
        };
        assert!(text.contains("contains(normalize-space(.), 'Sign in')"));

        let EngineLocator::XPath(label) = EngineLocator::parse("label=Email") else {
            panic!("label should map to xpath");
        };
        assert!(label.contains("//label[contains(normalize-space(.), 'Email')]"));
        assert!(label.contains("@aria-label='Email'"));
    }

    #[test]
    fn xpath_literals_handle_both_quote_kinds() {
        assert_eq!(xpath_literal("plain"), "'plain'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(
            xpath_literal("it's \"x\""),
            "concat('it', \"'\", 's \"x\"')"
        );
    }
}
