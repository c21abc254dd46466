//! Variable resolution: request fields -> placeholder values.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use super::common::{
    format_cep, format_cnpj, format_cpf, format_currency, format_date, format_phone, parse_amount,
};
use super::placeholder::{DeclaredPlaceholder, FieldKind, PlaceholderSet};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Every placeholder that could not be satisfied, sorted by name.
    #[error("missing fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("field '{name}' has an unsupported {kind} value")]
    UnsupportedValue { name: String, kind: &'static str },
}

/// Flat placeholder-name -> rendered text mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedVariables {
    values: BTreeMap<String, String>,
}

impl ResolvedVariables {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResolvedVariables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Stateless resolver.
pub struct VariableResolver;

impl VariableResolver {
    /// Resolve every placeholder in `placeholders` from `fields`.
    ///
    /// All missing names are collected before failing so the caller can fix
    /// the whole request at once.
    pub fn resolve(
        placeholders: &PlaceholderSet,
        fields: &Map<String, Value>,
    ) -> Result<ResolvedVariables, ResolveError> {
        let mut resolved = ResolvedVariables::default();
        let mut missing = Vec::new();
        let mut unsupported = None;

        for declared in placeholders.iter() {
            match lookup(fields, &declared.name) {
                Some(value) => match format_value(declared, value) {
                    Ok(Some(text)) => resolved.insert(declared.name.clone(), text),
                    Ok(None) => match &declared.default {
                        Some(default) => resolved.insert(declared.name.clone(), default.clone()),
                        None => missing.push(declared.name.clone()),
                    },
                    Err(e) => {
                        unsupported.get_or_insert(e);
                    }
                },
                None => match &declared.default {
                    Some(default) => resolved.insert(declared.name.clone(), default.clone()),
                    None => missing.push(declared.name.clone()),
                },
            }
        }

        if !missing.is_empty() {
            missing.sort();
            return Err(ResolveError::MissingFields(missing));
        }
        if let Some(e) = unsupported {
            return Err(e);
        }

        log::debug!("Resolved {} placeholder values", resolved.len());
        Ok(resolved)
    }
}

/// Find a field by name; a dotted name walks nested objects.
///
/// A literal key containing dots takes precedence over the nested path.
fn lookup<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    if let Some(value) = fields.get(name) {
        return Some(value);
    }
    let mut parts = name.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Turn a raw JSON value into display text. `Ok(None)` means "treat as missing".
fn format_value(declared: &DeclaredPlaceholder, value: &Value) -> Result<Option<String>, ResolveError> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::Bool(b) => return Ok(Some(yes_no(*b).to_string())),
        Value::String(s) => s.clone(),
        Value::Number(n) => match declared.kind {
            FieldKind::Currency => {
                return Ok(n.as_f64().map(format_currency));
            }
            FieldKind::Int => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => return Ok(Some(format!("{}", f as i64))),
                _ => n.to_string(),
            },
            _ => n.to_string(),
        },
        Value::Array(_) => {
            return Err(ResolveError::UnsupportedValue {
                name: declared.name.clone(),
                kind: "array",
            })
        }
        Value::Object(_) => {
            return Err(ResolveError::UnsupportedValue {
                name: declared.name.clone(),
                kind: "object",
            })
        }
    };

    Ok(Some(format_text(declared.kind, &text)))
}

fn format_text(kind: FieldKind, text: &str) -> String {
    match kind {
        FieldKind::Currency => parse_amount(text)
            .map(format_currency)
            .unwrap_or_else(|| text.to_string()),
        FieldKind::Date => format_date(text).unwrap_or_else(|| text.to_string()),
        FieldKind::Cpf => format_cpf(text),
        FieldKind::Cnpj => format_cnpj(text),
        FieldKind::Cep => format_cep(text),
        FieldKind::Phone => format_phone(text),
        FieldKind::Bool => match text.trim().to_lowercase().as_str() {
            "true" | "sim" | "1" => yes_no(true).to_string(),
            "false" | "nao" | "não" | "0" => yes_no(false).to_string(),
            _ => text.to_string(),
        },
        FieldKind::Email => text.trim().to_string(),
        FieldKind::Int | FieldKind::String => text.to_string(),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Sim"
    } else {
        "Não"
    }
}
