//! Compile a batch of corrections into one XSLT 3.0 stylesheet.
//!
//! Unmatched nodes are shallow-copied. Each correction becomes one template
//! whose priority grows with its position, so when two corrections match
//! the same node the later one wins.

use crate::protocol::Correction;

use super::{EngineError, EngineResult};

const BASE_PRIORITY: usize = 10;

impl Correction {
    pub fn action(&self) -> &'static str {
        match self {
            Self::SetText { .. } => "set_text",
            Self::SetAttribute { .. } => "set_attribute",
            Self::RemoveAttribute { .. } => "remove_attribute",
            Self::Rename { .. } => "rename",
            Self::Delete { .. } => "delete",
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            Self::SetText { xpath, .. }
            | Self::SetAttribute { xpath, .. }
            | Self::RemoveAttribute { xpath, .. }
            | Self::Rename { xpath, .. }
            | Self::Delete { xpath } => xpath,
        }
    }
}

/// Build the stylesheet. Fails on an empty batch, an empty pattern or a
/// name that is not an XML name.
pub fn compile(corrections: &[Correction]) -> EngineResult<String> {
    if corrections.is_empty() {
        return Err(EngineError::Correction {
            index: 0,
            message: "no corrections supplied".into(),
        });
    }

    let mut out = String::from(
        "<xsl:stylesheet version=\"3.0\" xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\">\n  <xsl:mode on-no-match=\"shallow-copy\"/>\n",
    );

    for (index, correction) in corrections.iter().enumerate() {
        let number = index + 1;
        let pattern = correction.pattern().trim();
        if pattern.is_empty() {
            return Err(EngineError::Correction {
                index: number,
                message: "empty xpath pattern".into(),
            });
        }

        let body = template_body(correction).map_err(|message| EngineError::Correction {
            index: number,
            message,
        })?;
        out.push_str(&format!(
            "  <!-- correction {number}: {} -->\n",
            correction.action()
        ));
        out.push_str(&format!(
            "  <xsl:template match=\"{}\" priority=\"{}\">{body}</xsl:template>\n",
            escape_attribute(pattern),
            BASE_PRIORITY + index,
        ));
    }

    out.push_str("</xsl:stylesheet>\n");
    Ok(out)
}

fn template_body(correction: &Correction) -> Result<String, String> {
    let body = match correction {
        Correction::SetText { value, .. } => format!(
            "<xsl:copy><xsl:apply-templates select=\"@*\"/><xsl:text>{}</xsl:text></xsl:copy>",
            escape_text(value)
        ),
        Correction::SetAttribute { name, value, .. } => {
            check_name(name)?;
            format!(
                "<xsl:copy><xsl:apply-templates select=\"@*\"/><xsl:attribute name=\"{name}\">{}</xsl:attribute><xsl:apply-templates select=\"node()\"/></xsl:copy>",
                escape_text(value)
            )
        }
        Correction::RemoveAttribute { name, .. } => {
            check_name(name)?;
            format!(
                "<xsl:copy><xsl:apply-templates select=\"@*[name() ne '{name}']\"/><xsl:apply-templates select=\"node()\"/></xsl:copy>"
            )
        }
        Correction::Rename { name, .. } => {
            check_name(name)?;
            format!(
                "<xsl:element name=\"{name}\"><xsl:apply-templates select=\"@*|node()\"/></xsl:element>"
            )
        }
        Correction::Delete { .. } => String::new(),
    };
    Ok(body)
}

/// Accept XML names only (prefix allowed), so names can be spliced into
/// attribute value templates and string literals unescaped.
fn check_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
    if valid_start && valid_rest && !name.ends_with(':') && name.matches(':').count() <= 1 {
        Ok(())
    } else {
        Err(format!("'{name}' is not a valid XML name"))
    }
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
