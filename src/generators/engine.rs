//! `.docx` rendering engine.
//!
//! Handles discovering placeholders in a template and substituting resolved
//! values into its text parts.

use super::docx::DocxPackage;
use super::markup::{paragraph_texts, rewrite_part, Replacement};
use super::placeholder::{
    Placeholder, PlaceholderSet, CONTROL_BLOCK_RE, LEGACY_MARKER_RE, TOKEN_RE,
};
use super::resolver::ResolvedVariables;
use super::RenderError;

/// What a template declares, as found by [`DocxRenderEngine::scan`].
#[derive(Debug, Default)]
pub struct TemplateScan {
    pub placeholders: PlaceholderSet,
    /// `{{ ... }}` tokens whose contents do not parse, with the reason.
    pub invalid_expressions: Vec<String>,
    /// Legacy `<< ... >>` markers.
    pub legacy_markers: Vec<String>,
    /// `{% ... %}` blocks.
    pub control_blocks: Vec<String>,
}

impl TemplateScan {
    pub fn is_renderable(&self) -> bool {
        self.invalid_expressions.is_empty()
            && self.legacy_markers.is_empty()
            && self.control_blocks.is_empty()
    }
}

/// Stateless engine for rendering `.docx` templates.
pub struct DocxRenderEngine;

impl DocxRenderEngine {
    /// Parse a template and list everything it declares.
    pub fn scan(template: &[u8]) -> Result<TemplateScan, RenderError> {
        let package = DocxPackage::open(template)?;
        let mut scan = TemplateScan::default();

        for (part, xml) in package.text_parts() {
            let paragraphs = paragraph_texts(xml).map_err(|source| RenderError::Markup {
                part: part.to_string(),
                source,
            })?;

            for text in &paragraphs {
                for token in TOKEN_RE.captures_iter(text) {
                    match Placeholder::parse(&token[1]) {
                        Ok(placeholder) => scan.placeholders.insert(&placeholder),
                        Err(e) => scan.invalid_expressions.push(e.to_string()),
                    }
                }
                scan.legacy_markers.extend(
                    LEGACY_MARKER_RE
                        .find_iter(text)
                        .map(|m| m.as_str().to_string()),
                );
                scan.control_blocks.extend(
                    CONTROL_BLOCK_RE
                        .find_iter(text)
                        .map(|m| m.as_str().to_string()),
                );
            }
        }

        Ok(scan)
    }

    /// Substitute `variables` into every placeholder of `template`.
    ///
    /// Either the complete document is returned or an error; nothing is
    /// produced for a failed render.
    pub fn render(template: &[u8], variables: &ResolvedVariables) -> Result<Vec<u8>, RenderError> {
        let package = DocxPackage::open(template)?;

        let rendered = package.rewrite_text_parts(|part, xml| {
            rewrite_part(xml, |text| substitute(text, variables)).map_err(|e| match e {
                RenderError::Markup { source, .. } => RenderError::Markup {
                    part: part.to_string(),
                    source,
                },
                other => other,
            })
        })?;

        Ok(rendered.to_bytes()?)
    }
}

fn substitute(text: &str, variables: &ResolvedVariables) -> Result<Vec<Replacement>, RenderError> {
    let mut replacements = Vec::new();

    for token in TOKEN_RE.captures_iter(text) {
        let Some(whole) = token.get(0) else {
            continue;
        };
        let placeholder = Placeholder::parse(&token[1])?;
        let value = variables
            .get(&placeholder.name)
            .or_else(|| placeholder.default_value())
            .ok_or_else(|| RenderError::MissingValue(placeholder.name.clone()))?;

        replacements.push(Replacement {
            range: whole.range(),
            text: sanitize_xml_text(&placeholder.apply_filters(value)),
        });
    }

    Ok(replacements)
}

/// Drop characters that XML 1.0 does not allow in text content.
pub fn sanitize_xml_text(value: &str) -> String {
    value
        .chars()
        .filter(|&c| {
            matches!(c, '\u{9}' | '\u{A}' | '\u{D}')
                || ('\u{20}'..='\u{D7FF}').contains(&c)
                || ('\u{E000}'..='\u{FFFD}').contains(&c)
                || c >= '\u{10000}'
        })
        .collect()
}
