use std::collections::HashMap;
use std::fmt;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::parser::stringify;
use crate::runner::CapturedResponse;
use crate::validator::EndpointSpec;
use crate::validator::FieldSpec;

/// Which step of a check gave up on the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Request,
    Status,
    Format,
    FieldMismatch,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Request => write!(f, "request failed"),
            FailureKind::Status => write!(f, "bad status"),
            FailureKind::Format => write!(f, "bad body"),
            FailureKind::FieldMismatch => write!(f, "field mismatch"),
        }
    }
}

/// Why one endpoint did not pass. Serializes as `{"url": .., "msg": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckFailure {
    pub url: String,
    pub msg: String,
    #[serde(skip)]
    pub kind: FailureKind,
}

impl CheckFailure {
    pub fn new(url: impl Into<String>, kind: FailureKind, msg: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            msg: msg.into(),
            kind,
        }
    }
}

/// The top level of a JSON object body with every value stringified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseView(HashMap<String, String>);

impl ResponseView {
    /// Fails for anything that is not a JSON object, arrays and scalars included.
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        let object: Map<String, Value> = serde_json::from_str(body)?;

        Ok(object
            .iter()
            .map(|(key, value)| (key.clone(), stringify(value)))
            .collect())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl FromIterator<(String, String)> for ResponseView {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A field is satisfied when its key exists and, if values are configured,
/// the stringified value is one of them.
pub fn check_field(field: &FieldSpec, view: &ResponseView) -> bool {
    view.get(&field.key).is_some_and(|value| field.accepts(value))
}

pub fn assert_status(status: StatusCode, ok_statuses: &[StatusCode]) -> Result<(), String> {
    if ok_statuses.contains(&status) {
        return Ok(());
    }

    let allowed: Vec<String> = ok_statuses
        .iter()
        .map(|s| s.as_u16().to_string())
        .collect();

    Err(format!(
        "response status {} is not allowed, expected one of [{}]",
        status.as_u16(),
        allowed.join(", ")
    ))
}

/// `(any && one satisfied) || (!any && all satisfied)`.
///
/// Only reachable with at least one field; an empty list never gets here
/// because the status-only path passes first.
pub fn fields_match(spec: &EndpointSpec, view: &ResponseView) -> bool {
    let mut all = true;
    let mut any = false;

    for field in &spec.fields {
        if check_field(field, view) {
            any = true;
        } else {
            all = false;
        }
    }

    (spec.match_any && any) || (!spec.match_any && all)
}

/// Validates a response that arrived: status first, then the body fields.
pub fn assert_response(
    spec: &EndpointSpec,
    response: &CapturedResponse,
    ok_statuses: &[StatusCode],
) -> Result<(), CheckFailure> {
    assert_status(response.status, ok_statuses)
        .map_err(|msg| CheckFailure::new(&spec.url, FailureKind::Status, msg))?;

    if spec.fields.is_empty() {
        return Ok(());
    }

    let body = response.body.as_deref().map_err(|e| {
        CheckFailure::new(
            &spec.url,
            FailureKind::Format,
            format!("failed to read response body: {e}"),
        )
    })?;

    let view = ResponseView::parse(body).map_err(|e| {
        CheckFailure::new(
            &spec.url,
            FailureKind::Format,
            format!("response body is not a JSON object: {e}"),
        )
    })?;

    if fields_match(spec, &view) {
        return Ok(());
    }

    Err(CheckFailure::new(
        &spec.url,
        FailureKind::FieldMismatch,
        format!(
            "response body ({body}) does not match the configured fields [{}] ({} must match)",
            render_fields(&spec.fields),
            if spec.match_any { "any" } else { "all" }
        ),
    ))
}

fn render_fields(fields: &[FieldSpec]) -> String {
    fields
        .iter()
        .map(FieldSpec::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::validator::Method;

    fn field(key: &str, values: &[&str]) -> FieldSpec {
        FieldSpec {
            key: key.into(),
            expected_values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn spec(match_any: bool, fields: Vec<FieldSpec>) -> EndpointSpec {
        EndpointSpec {
            url: "http://x/c".into(),
            method: Method::Get,
            match_any,
            fields,
        }
    }

    fn response(status: StatusCode, body: &str) -> CapturedResponse {
        CapturedResponse {
            status,
            body: Ok(body.into()),
        }
    }

    fn view(body: &str) -> ResponseView {
        ResponseView::parse(body).unwrap()
    }

    #[test]
    fn presence_only_fields() {
        let f = field("id", &[]);

        assert!(check_field(&f, &view(r#"{"id": 7}"#)));
        assert!(check_field(&f, &view(r#"{"id": ""}"#)));
        assert!(check_field(&f, &view(r#"{"id": null}"#)));
        assert!(!check_field(&f, &view(r#"{"other": 7}"#)));
    }

    #[test]
    fn fields_with_values() {
        let f = field("status", &["ok", "up"]);

        assert!(check_field(&f, &view(r#"{"status": "up"}"#)));
        assert!(!check_field(&f, &view(r#"{"status": "OK"}"#)));
        assert!(!check_field(&f, &view(r#"{"state": "ok"}"#)));
    }

    #[test]
    fn values_compare_as_canonical_strings() {
        assert!(check_field(&field("n", &["5"]), &view(r#"{"n": 5}"#)));
        assert!(check_field(&field("n", &["5"]), &view(r#"{"n": 5.0}"#)));
        assert!(!check_field(&field("n", &["5.0"]), &view(r#"{"n": 5}"#)));
        assert!(!check_field(&field("n", &["05"]), &view(r#"{"n": 5}"#)));
        assert!(check_field(&field("b", &["true"]), &view(r#"{"b": true}"#)));
        assert!(check_field(&field("z", &["null"]), &view(r#"{"z": null}"#)));
    }

    #[test]
    fn only_objects_make_a_view() {
        assert!(ResponseView::parse("[1, 2]").is_err());
        assert!(ResponseView::parse("\"ok\"").is_err());
        assert!(ResponseView::parse("<html></html>").is_err());
        assert!(ResponseView::parse("").is_err());
        assert_eq!(view(r#"{"a": {"b": 1}}"#).get("a"), Some(r#"{"b":1}"#));
    }

    #[test]
    fn all_fields_must_match_by_default() {
        let s = spec(false, vec![field("a", &["1"]), field("b", &["2"])]);

        assert!(fields_match(&s, &view(r#"{"a": "1", "b": 2}"#)));
        assert!(!fields_match(&s, &view(r#"{"a": "9", "b": "2"}"#)));
        assert!(!fields_match(&s, &view("{}")));
    }

    #[test]
    fn any_field_is_enough_with_match_any() {
        let s = spec(true, vec![field("a", &["1"]), field("b", &["2"])]);

        assert!(fields_match(&s, &view(r#"{"a": "9", "b": "2"}"#)));
        assert!(!fields_match(&s, &view(r#"{"a": "9", "b": "9"}"#)));
    }

    #[test]
    fn status_outside_the_allow_list() {
        let ok = [StatusCode::OK];

        assert!(assert_status(StatusCode::OK, &ok).is_ok());
        let msg = assert_status(StatusCode::INTERNAL_SERVER_ERROR, &ok).unwrap_err();
        assert_eq!(msg, "response status 500 is not allowed, expected one of [200]");

        let ok = [StatusCode::OK, StatusCode::NO_CONTENT];
        assert!(assert_status(StatusCode::NO_CONTENT, &ok).is_ok());
    }

    #[test]
    fn status_only_never_reads_the_body() {
        let ok = [StatusCode::OK];
        let s = spec(true, vec![]);

        assert!(assert_response(&s, &response(StatusCode::OK, "not json"), &ok).is_ok());

        let unreadable = CapturedResponse {
            status: StatusCode::OK,
            body: Err("connection reset".into()),
        };
        assert!(assert_response(&s, &unreadable, &ok).is_ok());
    }

    #[test]
    fn status_is_checked_before_fields() {
        let ok = [StatusCode::OK];
        let s = spec(false, vec![field("status", &["ok"])]);

        let failure =
            assert_response(&s, &response(StatusCode::BAD_GATEWAY, r#"{"status":"ok"}"#), &ok)
                .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Status);
        assert!(failure.msg.contains("502"));
    }

    #[test]
    fn unparsable_body_is_a_format_failure() {
        let ok = [StatusCode::OK];
        let s = spec(false, vec![field("status", &[])]);

        let failure = assert_response(&s, &response(StatusCode::OK, "<html>"), &ok).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Format);
        assert_eq!(failure.url, "http://x/c");
    }

    #[test]
    fn mismatch_message_carries_body_and_expectations() {
        let ok = [StatusCode::OK];
        let s = spec(false, vec![field("status", &["ok"])]);

        let failure =
            assert_response(&s, &response(StatusCode::OK, r#"{"status":"fail"}"#), &ok)
                .unwrap_err();
        assert_eq!(failure.kind, FailureKind::FieldMismatch);
        assert!(failure.msg.contains(r#"{"status":"fail"}"#));
        assert!(failure.msg.contains("status in [ok]"));
    }

    #[test]
    fn failure_serializes_as_url_and_msg() {
        let failure = CheckFailure::new("http://x/b", FailureKind::Status, "boom");
        assert_eq!(
            serde_json::to_string(&failure).unwrap(),
            r#"{"url":"http://x/b","msg":"boom"}"#
        );
    }
}
