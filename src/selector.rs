use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag restriction of a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tag {
    Any,
    /// Any form control: `input`, `select` or `textarea`.
    Control,
    Input,
    TextArea,
    Select,
    Button,
}

impl Tag {
    /// CSS prefix for this tag. `Any` renders as the empty string.
    pub fn css(&self) -> &'static str {
        match self {
            Tag::Any => "",
            Tag::Control => ":is(input, select, textarea)",
            Tag::Input => "input",
            Tag::TextArea => "textarea",
            Tag::Select => "select",
            Tag::Button => "button",
        }
    }

    /// Whether a live element with the given lowercase tag name satisfies this restriction.
    pub fn accepts(&self, tag_name: &str) -> bool {
        match self {
            Tag::Any => true,
            Tag::Control => matches!(tag_name, "input" | "select" | "textarea"),
            Tag::Input => tag_name == "input",
            Tag::TextArea => tag_name == "textarea",
            Tag::Select => tag_name == "select",
            Tag::Button => tag_name == "button",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrMatch {
    Exact,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    Attr {
        name: String,
        value: String,
        op: AttrMatch,
    },
    Id(String),
    Class(String),
    /// Substring of the element's rendered text.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub tag: Tag,
    pub predicate: Predicate,
}

impl Selector {
    pub fn attr(tag: Tag, name: &str, value: &str) -> Self {
        Self {
            tag,
            predicate: Predicate::Attr {
                name: name.to_string(),
                value: value.to_string(),
                op: AttrMatch::Exact,
            },
        }
    }

    pub fn attr_contains(tag: Tag, name: &str, value: &str) -> Self {
        Self {
            tag,
            predicate: Predicate::Attr {
                name: name.to_string(),
                value: value.to_string(),
                op: AttrMatch::Contains,
            },
        }
    }

    pub fn id(tag: Tag, id: &str) -> Self {
        Self {
            tag,
            predicate: Predicate::Id(id.to_string()),
        }
    }

    pub fn class(tag: Tag, class: &str) -> Self {
        Self {
            tag,
            predicate: Predicate::Class(class.to_string()),
        }
    }

    pub fn text(tag: Tag, text: &str) -> Self {
        Self {
            tag,
            predicate: Predicate::Text(text.to_string()),
        }
    }

    /// CSS selector covering everything except a text predicate.
    pub fn to_css(&self) -> String {
        let tag = self.tag.css();
        match &self.predicate {
            Predicate::Attr { name, value, op } => {
                let op = match op {
                    AttrMatch::Exact => "=",
                    AttrMatch::Contains => "*=",
                };
                format!("{tag}[{name}{op}{}]", quote_css(value))
            }
            // Attribute form keeps ids with leading digits or dashes valid.
            Predicate::Id(id) => format!("{tag}[id={}]", quote_css(id)),
            Predicate::Class(class) => format!("{tag}.{class}"),
            Predicate::Text(_) if tag.is_empty() => "*".to_string(),
            Predicate::Text(_) => tag.to_string(),
        }
    }

    /// Text the element's rendered content must contain, if any.
    pub fn text_filter(&self) -> Option<&str> {
        match &self.predicate {
            Predicate::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Collapse whitespace runs, trim and lowercase, the form text predicates
/// compare in.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether `rendered` contains `needle`, ignoring case and whitespace layout.
pub fn text_matches(rendered: &str, needle: &str) -> bool {
    normalize_text(rendered).contains(&normalize_text(needle))
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.predicate {
            Predicate::Text(text) => {
                let tag = match self.tag {
                    Tag::Any => "*",
                    other => other.css(),
                };
                write!(f, "{tag}:has-text({text:?})")
            }
            _ => f.write_str(&self.to_css()),
        }
    }
}

fn quote_css(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
