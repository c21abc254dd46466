//! Common utilities for document generation.
//!
//! Shared helpers for value formatting (Brazilian conventions) and filenames.

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Dots used purely as thousands separators, e.g. `15.000` or `1.234.567`.
    static ref THOUSANDS_RE: Regex = Regex::new(r"^-?\d{1,3}(\.\d{3})+$").unwrap();
}

/// Keep only the ASCII digits of a value.
pub fn digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Format a CPF as `000.000.000-00`; anything that is not 11 digits is returned unchanged.
pub fn format_cpf(value: &str) -> String {
    let d = digits(value);
    if d.len() != 11 {
        return value.to_string();
    }
    format!("{}.{}.{}-{}", &d[..3], &d[3..6], &d[6..9], &d[9..])
}

/// Format a CNPJ as `00.000.000/0000-00`.
pub fn format_cnpj(value: &str) -> String {
    let d = digits(value);
    if d.len() != 14 {
        return value.to_string();
    }
    format!(
        "{}.{}.{}/{}-{}",
        &d[..2],
        &d[2..5],
        &d[5..8],
        &d[8..12],
        &d[12..]
    )
}

/// Format a CEP (postal code) as `00000-000`.
pub fn format_cep(value: &str) -> String {
    let d = digits(value);
    if d.len() != 8 {
        return value.to_string();
    }
    format!("{}-{}", &d[..5], &d[5..])
}

/// Format a phone number with area code: `(11) 91234-5678` or `(11) 1234-5678`.
pub fn format_phone(value: &str) -> String {
    let d = digits(value);
    match d.len() {
        11 => format!("({}) {}-{}", &d[..2], &d[2..7], &d[7..]),
        10 => format!("({}) {}-{}", &d[..2], &d[2..6], &d[6..]),
        _ => value.to_string(),
    }
}

/// Parse a monetary amount written either as `1234.56` or in Brazilian
/// notation (`1.234,56`, optionally prefixed with `R$`).
///
/// Without a comma, groups of exactly three digits after each dot are read as
/// thousands (`15.000` is fifteen thousand), anything else as a decimal point.
pub fn parse_amount(value: &str) -> Option<f64> {
    let cleaned = value.trim().trim_start_matches("R$").trim().replace(' ', "");
    if cleaned.is_empty() {
        return None;
    }
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if THOUSANDS_RE.is_match(&cleaned) {
        cleaned.replace('.', "")
    } else {
        cleaned
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Format an amount as Brazilian currency, e.g. `R$ 1.234,56`.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}R$ {grouped},{fraction:02}")
}

/// Format an ISO date (`2024-03-15`) or RFC 3339 timestamp as `15/03/2024`.
///
/// Returns `None` when the value is not in one of those shapes.
pub fn format_date(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.format("%d/%m/%Y").to_string());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.date_naive().format("%d/%m/%Y").to_string())
}

/// Capitalize the first letter of every word.
pub fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            if at_word_start {
                result.extend(ch.to_uppercase());
            } else {
                result.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            result.push(ch);
            at_word_start = true;
        }
    }
    result
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
        'ç' | 'Ç' => 'c',
        'ñ' | 'Ñ' => 'n',
        other => other,
    }
}

/// Sanitize a string for use in filenames.
pub fn sanitize_filename(name: &str, fallback: &str) -> String {
    let mut result = String::new();
    let mut last_dash = false;

    for ch in name.trim().chars().map(fold_accent) {
        if ch.is_ascii_alphanumeric() {
            result.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || ch == '-' || ch == '_' || ch == '.' || ch == '/')
            && !last_dash
            && !result.is_empty()
        {
            result.push('-');
            last_dash = true;
        }
    }

    let trimmed = result.trim_matches('-');
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    trimmed.to_string()
}

/// Filename stem for a generated petition: `<template>-<YYYYMMDD-HHMMSS>`.
pub fn timestamped_stem(template_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        sanitize_filename(template_name, "peticao"),
        now.format("%Y%m%d-%H%M%S")
    )
}
