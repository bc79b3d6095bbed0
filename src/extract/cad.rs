//! Drawings-tab CAD manifest decoding and download URL construction.
//!
//! The container's `ng-init` attribute looks like
//! `init('...', '...', '...', '[{"name": ..., "value": ..., "url": ...}]')`.
//! Decoding happens in two stages: [`unwrap_initializer`] strips whitespace
//! and the call name, then [`decode_manifest`] parses the argument tuple and
//! the descriptor list held as a string in its fourth slot.

use std::fmt::Write;

use serde_json::Value;
use thiserror::Error;

use super::literal::{self, LiteralError};
use crate::models::CadDescriptor;

/// Zero-based slot of the descriptor list inside the init call's arguments.
const MANIFEST_SLOT: usize = 3;

#[derive(Debug, Error)]
pub enum CadError {
    #[error("cad container has no `{0}` attribute")]
    MissingInitializer(String),

    #[error("malformed cad initializer: {0}")]
    Literal(#[from] LiteralError),

    #[error("unexpected cad initializer shape: {0}")]
    Shape(String),

    #[error("invalid cad descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
}

/// Removes all whitespace and the leading call-name token.
pub fn unwrap_initializer(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let args_start = compact
        .char_indices()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
        .map_or(compact.len(), |(i, _)| i);
    compact[args_start..].to_string()
}

/// Decodes the initializer attribute into the descriptor list.
pub fn decode_manifest(raw: &str) -> Result<Vec<CadDescriptor>, CadError> {
    let args = literal::parse(&unwrap_initializer(raw))?;
    let Value::Array(args) = args else {
        return Err(CadError::Shape("arguments are not a sequence".to_string()));
    };

    let manifest = match args.get(MANIFEST_SLOT) {
        Some(Value::String(manifest)) => manifest,
        Some(other) => {
            return Err(CadError::Shape(format!(
                "argument {} is not a string: {other}",
                MANIFEST_SLOT + 1
            )));
        }
        None => {
            return Err(CadError::Shape(format!(
                "expected at least {} arguments, found {}",
                MANIFEST_SLOT + 1,
                args.len()
            )));
        }
    };

    Ok(serde_json::from_value(literal::parse(manifest)?)?)
}

/// Replaces every character outside `[A-Za-z0-9_]` (Unicode letters and
/// digits included) with `%` and its uppercase hex code point.
pub fn escape_url(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len());
    for c in url.chars() {
        if c.is_alphanumeric() || c == '_' {
            escaped.push(c);
        } else {
            let _ = write!(escaped, "%{:02X}", u32::from(c));
        }
    }
    escaped
}

/// `<download-base><value>&url=<escaped url>`
pub fn download_url(download_base: &str, descriptor: &CadDescriptor) -> String {
    format!(
        "{download_base}{}&url={}",
        descriptor.value,
        escape_url(&descriptor.url)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const INIT: &str = r#"init( 'M3211T', 'en-US', 'motor',
        '[{"name": "STEP", "value": "M3211T.stp", "url": "https://cad.example.com/get?part=M3211T&fmt=step"},
          {"name": "DXF", "value": "M3211T.dxf", "url": "https://cad.example.com/get?part=M3211T&fmt=dxf"}]' )"#;

    #[test]
    fn unwrap_drops_whitespace_and_call_name() {
        assert_eq!(unwrap_initializer(" init ( 'a' , 'b' ) "), "('a','b')");
    }

    #[test]
    fn unwrap_keeps_the_word_init_inside_arguments() {
        assert_eq!(unwrap_initializer("init('initial')"), "('initial')");
    }

    #[test]
    fn decodes_descriptor_list() {
        let cads = decode_manifest(INIT).unwrap();
        assert_eq!(cads.len(), 2);
        assert_eq!(
            cads[0],
            CadDescriptor {
                name: "STEP".to_string(),
                value: "M3211T.stp".to_string(),
                url: "https://cad.example.com/get?part=M3211T&fmt=step".to_string(),
            }
        );
        assert_eq!(cads[1].value, "M3211T.dxf");
    }

    #[test]
    fn empty_manifest_decodes_to_empty_list() {
        assert!(decode_manifest("init('a','b','c','[]')").unwrap().is_empty());
    }

    #[test]
    fn too_few_arguments_is_a_shape_error() {
        assert!(matches!(
            decode_manifest("init('a','b')"),
            Err(CadError::Shape(_))
        ));
    }

    #[test]
    fn non_string_manifest_slot_is_a_shape_error() {
        assert!(matches!(
            decode_manifest("init('a','b','c',[])"),
            Err(CadError::Shape(_))
        ));
    }

    #[test]
    fn broken_literal_is_reported() {
        assert!(matches!(
            decode_manifest("init('a','b','c','[{\"name\": }]')"),
            Err(CadError::Literal(_))
        ));
    }

    #[test]
    fn descriptor_missing_fields_is_reported() {
        assert!(matches!(
            decode_manifest(r#"init('a','b','c','[{"name": "STEP"}]')"#),
            Err(CadError::Descriptor(_))
        ));
    }

    #[test]
    fn escapes_every_occurrence_of_non_word_characters() {
        let escaped = escape_url("a b#c d#e_9");
        assert_eq!(escaped, "a%20b%23c%20d%23e_9");
    }

    #[test]
    fn escapes_url_punctuation() {
        assert_eq!(
            escape_url("https://x.com/a?b=1"),
            "https%3A%2F%2Fx%2Ecom%2Fa%3Fb%3D1"
        );
    }

    #[test]
    fn percent_signs_are_escaped_once() {
        assert_eq!(escape_url("a%20b"), "a%2520b");
    }

    #[test]
    fn builds_download_url() {
        let cad = CadDescriptor {
            name: "STEP".to_string(),
            value: "M3211T.stp".to_string(),
            url: "http://h/x y".to_string(),
        };
        assert_eq!(
            download_url("https://dl.example.com/?value=", &cad),
            "https://dl.example.com/?value=M3211T.stp&url=http%3A%2F%2Fh%2Fx%20y"
        );
    }
}
