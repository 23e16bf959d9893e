use std::fmt;

use miette::Diagnostic;
use miette::NamedSource;
use miette::SourceSpan;
use thiserror::Error;

use crate::parser::EndpointEntry;
use crate::parser::FieldEntry;
use crate::parser::FieldValue;

/// Anything shorter than `http://` with a host cannot be a usable URL.
pub const MIN_URL_LEN: usize = 5;

const URL_TOO_SHORT: &str = "The URL of an endpoint can't be empty and needs at least 5 characters";
const UNSUPPORTED_METHOD: &str = "Only `get` and `post` are supported, case does not matter";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// One configured URL together with the rules its response has to satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSpec {
    pub url: String,
    pub method: Method,
    /// `true` passes when any field matches, `false` needs all of them.
    pub match_any: bool,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub key: String,
    /// Canonical strings. Empty means the key only has to be present.
    pub expected_values: Vec<String>,
}

impl FieldSpec {
    pub fn accepts(&self, value: &str) -> bool {
        self.expected_values.is_empty() || self.expected_values.iter().any(|v| v == value)
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.expected_values.is_empty() {
            write!(f, "{} present", self.key)
        } else {
            write!(f, "{} in [{}]", self.key, self.expected_values.join(", "))
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("Invalid field `{field}`: {message}")]
pub struct ValidationError {
    field: String,
    message: String,
    #[source_code]
    src: Option<NamedSource<String>>,
    #[label("invalid value here")]
    span: Option<SourceSpan>,
}

macro_rules! validation_err {
    ($field:expr, $msg:expr, $self:expr, $snippet:expr) => {
        ValidationError {
            field: $field.to_string(),
            message: $msg.to_string(),
            src: Some(NamedSource::new(
                $self.file_name.clone(),
                $self.config_src.clone(),
            )),
            span: find_span($snippet, &$self.config_src),
        }
    };
}

pub struct Validator {
    entries: Vec<EndpointEntry>,
    config_src: String,
    file_name: String,
}

impl Validator {
    pub fn new(entries: Vec<EndpointEntry>, config_src: &str, file_name: &str) -> Self {
        Self {
            entries,
            config_src: config_src.into(),
            file_name: file_name.into(),
        }
    }

    /// Turns the raw entries into specs, stopping at the first invalid one.
    pub fn validate(&self) -> Result<Vec<EndpointSpec>, ValidationError> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| self.create_spec(idx, entry))
            .collect()
    }

    fn create_spec(
        &self,
        idx: usize,
        entry: &EndpointEntry,
    ) -> Result<EndpointSpec, ValidationError> {
        if entry.url.trim().chars().count() < MIN_URL_LEN {
            return Err(validation_err!(
                format!("endpoints[{idx}].url"),
                URL_TOO_SHORT,
                self,
                &entry.url
            ));
        }

        let raw_method = entry.method.as_deref().unwrap_or_default();
        let method = parse_method(raw_method).map_err(|e| {
            validation_err!(
                format!("endpoints[{idx}].method"),
                format!("{e}. {UNSUPPORTED_METHOD}"),
                self,
                raw_method
            )
        })?;

        let fields = entry
            .fields
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(create_field)
            .collect();

        Ok(EndpointSpec {
            url: entry.url.clone(),
            method,
            match_any: entry.any,
            fields,
        })
    }
}

fn create_field(field: &FieldEntry) -> FieldSpec {
    let expected_values = field
        .values
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(FieldValue::canonical)
        .collect();

    FieldSpec {
        key: field.key.clone(),
        expected_values,
    }
}

fn parse_method(method: &str) -> Result<Method, String> {
    match method.trim().to_lowercase().as_str() {
        "" | "get" => Ok(Method::Get),
        "post" => Ok(Method::Post),
        other => Err(format!("Invalid HTTP method: {other}")),
    }
}

// A blank needle would match the first empty string anywhere in the file,
// so those errors carry the source without a label.
fn find_span(needle: &str, config_src: &str) -> Option<SourceSpan> {
    if needle.trim().is_empty() {
        return None;
    }

    let pattern = format!("\"{}\"", needle);
    config_src
        .find(&pattern)
        .map(|start| SourceSpan::new(start.into(), pattern.len()))
}
