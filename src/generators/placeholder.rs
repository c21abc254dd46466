//! Placeholder expressions embedded in templates.
//!
//! A placeholder is written `{{ name }}` or `{{ name | filter | filter('arg') }}`.
//! Names may be dotted (`cliente.nome`) to reach into nested request fields.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::common::{format_cep, format_cpf, title_case};

lazy_static! {
    /// Any `{{ ... }}` print token.
    pub static ref TOKEN_RE: Regex = Regex::new(r"\{\{(.*?)\}\}").unwrap();
    /// Legacy `<< name >>` markers that are no longer rendered.
    pub static ref LEGACY_MARKER_RE: Regex = Regex::new(r"<<\s*([^<>]+?)\s*>>").unwrap();
    /// `{% ... %}` control blocks, which the engine does not execute.
    pub static ref CONTROL_BLOCK_RE: Regex = Regex::new(r"\{%.*?%\}").unwrap();
    static ref EXPRESSION_RE: Regex = Regex::new(
        r"^([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)((?:\s*\|\s*[A-Za-z_][A-Za-z0-9_]*(?:\([^)]*\))?)*)$"
    )
    .unwrap();
    static ref FILTER_RE: Regex =
        Regex::new(r"\|\s*([A-Za-z_][A-Za-z0-9_]*)(?:\(([^)]*)\))?").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
    #[error("invalid placeholder expression '{0}'")]
    InvalidExpression(String),
    #[error("unknown filter '{filter}' on placeholder '{name}'")]
    UnknownFilter { name: String, filter: String },
    #[error("filter '{filter}' on placeholder '{name}' needs a quoted argument")]
    BadArgument { name: String, filter: String },
}

/// A transformation applied to a value at substitution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Upper,
    Lower,
    Title,
    Trim,
    CpfFormat,
    CepFormat,
    /// Value used when the request does not supply the field.
    Default(String),
}

impl Filter {
    fn parse(name: &str, filter: &str, arg: Option<&str>) -> Result<Self, PlaceholderError> {
        let no_arg = |f: Filter| match arg {
            None => Ok(f),
            Some(_) => Err(PlaceholderError::BadArgument {
                name: name.to_string(),
                filter: filter.to_string(),
            }),
        };

        match filter {
            "upper" => no_arg(Filter::Upper),
            "lower" => no_arg(Filter::Lower),
            "title" => no_arg(Filter::Title),
            "trim" => no_arg(Filter::Trim),
            "cpf_format" => no_arg(Filter::CpfFormat),
            "cep_format" => no_arg(Filter::CepFormat),
            "default" => arg
                .and_then(unquote)
                .map(|text| Filter::Default(text.to_string()))
                .ok_or_else(|| PlaceholderError::BadArgument {
                    name: name.to_string(),
                    filter: filter.to_string(),
                }),
            _ => Err(PlaceholderError::UnknownFilter {
                name: name.to_string(),
                filter: filter.to_string(),
            }),
        }
    }

    pub fn apply(&self, value: &str) -> String {
        match self {
            Filter::Upper => value.to_uppercase(),
            Filter::Lower => value.to_lowercase(),
            Filter::Title => title_case(value),
            Filter::Trim => value.trim().to_string(),
            Filter::CpfFormat => format_cpf(value),
            Filter::CepFormat => format_cep(value),
            Filter::Default(_) => value.to_string(),
        }
    }
}

fn unquote(arg: &str) -> Option<&str> {
    let arg = arg.trim();
    if arg.len() >= 2
        && ((arg.starts_with('\'') && arg.ends_with('\''))
            || (arg.starts_with('"') && arg.ends_with('"')))
    {
        Some(&arg[1..arg.len() - 1])
    } else {
        None
    }
}

/// One parsed `{{ ... }}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub filters: Vec<Filter>,
}

impl Placeholder {
    /// Parse the text between `{{` and `}}`.
    pub fn parse(expression: &str) -> Result<Self, PlaceholderError> {
        let expression = expression.trim();
        let captures = EXPRESSION_RE
            .captures(expression)
            .ok_or_else(|| PlaceholderError::InvalidExpression(expression.to_string()))?;

        let name = captures[1].to_string();
        let mut filters = Vec::new();
        if let Some(pipeline) = captures.get(2) {
            for filter in FILTER_RE.captures_iter(pipeline.as_str()) {
                let arg = filter.get(2).map(|m| m.as_str());
                filters.push(Filter::parse(&name, &filter[1], arg)?);
            }
        }

        Ok(Self { name, filters })
    }

    pub fn default_value(&self) -> Option<&str> {
        self.filters.iter().find_map(|f| match f {
            Filter::Default(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Apply the filter pipeline, left to right.
    pub fn apply_filters(&self, value: &str) -> String {
        self.filters
            .iter()
            .fold(value.to_string(), |acc, filter| filter.apply(&acc))
    }
}

/// Semantic type guessed from a placeholder name; drives value formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Currency,
    Date,
    Cpf,
    Cnpj,
    Cep,
    Phone,
    Bool,
    Email,
    Int,
    String,
}

impl FieldKind {
    /// Keywords must match a whole `_`/`.` segment of the name, so
    /// `receptor` is not a CEP and `excepcional` is not a CPF.
    pub fn guess(name: &str) -> Self {
        let n = name.to_lowercase();
        let segments: Vec<&str> = n.split(['_', '.']).filter(|s| !s.is_empty()).collect();
        let has = |keys: &[&str]| segments.iter().any(|s| keys.contains(s));

        if has(&["valor", "quantia", "preco", "preço", "montante"]) {
            FieldKind::Currency
        } else if has(&["data", "competencia"]) {
            FieldKind::Date
        } else if has(&["cpf"]) {
            FieldKind::Cpf
        } else if has(&["cnpj"]) {
            FieldKind::Cnpj
        } else if has(&["cep"]) {
            FieldKind::Cep
        } else if has(&["telefone", "celular", "fone"]) {
            FieldKind::Phone
        } else if segments.first() == Some(&"is") || segments.last() == Some(&"bool") {
            FieldKind::Bool
        } else if has(&["email"]) {
            FieldKind::Email
        } else if has(&["qtd", "quantidade", "parcelas"]) {
            FieldKind::Int
        } else {
            FieldKind::String
        }
    }
}

/// A placeholder as declared by a template, cached on the template record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeclaredPlaceholder {
    #[schema(example = "client_name")]
    pub name: String,
    pub kind: FieldKind,
    /// Present when some occurrence carries a `default('...')` filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// The distinct placeholders of a template, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderSet {
    entries: BTreeMap<String, DeclaredPlaceholder>,
}

impl PlaceholderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an occurrence. The first default seen for a name wins.
    pub fn insert(&mut self, placeholder: &Placeholder) {
        let entry = self
            .entries
            .entry(placeholder.name.clone())
            .or_insert_with(|| DeclaredPlaceholder {
                name: placeholder.name.clone(),
                kind: FieldKind::guess(&placeholder.name),
                default: None,
            });
        if entry.default.is_none() {
            entry.default = placeholder.default_value().map(str::to_string);
        }
    }

    pub fn get(&self, name: &str) -> Option<&DeclaredPlaceholder> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeclaredPlaceholder> {
        self.entries.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn into_declared(self) -> Vec<DeclaredPlaceholder> {
        self.entries.into_values().collect()
    }
}

impl FromIterator<DeclaredPlaceholder> for PlaceholderSet {
    fn from_iter<I: IntoIterator<Item = DeclaredPlaceholder>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }
}
