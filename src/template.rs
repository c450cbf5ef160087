//! Validated placeholder substitution for generated scripts.
//!
//! Values are substituted into `{{placeholder}}` markers. Fields that end up
//! inside shell words (package name, identity, interpreter) are restricted to
//! a safe character set so an unexpected application name can never change the
//! meaning of the generated script.

use crate::error::{Result, SkilletError};

/// Characters allowed in values substituted into shell words
fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+')
}

/// Reject values that could alter the generated shell script
pub fn validate_field(field: &str, value: &str) -> Result<()> {
    if value.is_empty() || !value.chars().all(is_safe_char) {
        return Err(SkilletError::TemplateValueInvalid {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Substitute every `{{key}}` marker; all markers must resolve
pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    if let Some(pos) = out.find("{{") {
        let rest = &out[pos..];
        let marker: String = rest.chars().take(24).collect();
        return Err(SkilletError::TemplateValueInvalid {
            field: "template".to_string(),
            value: format!("unresolved placeholder near '{marker}'"),
        });
    }
    Ok(out)
}
