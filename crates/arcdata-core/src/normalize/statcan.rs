//! Statistics Canada WDS JSON envelopes.
//!
//! Two shapes are in the wild: a two-element array `[status, {vectorData}]`
//! and a list of `{status, object: {responseStatusCode, vectorDataPoint}}`.
//! Both carry a status that must report success before any row is read.

use serde_json::Value;

use super::{
    dedupe_by_date, parse_number, resolve_date, CanonicalField, CanonicalRow, ColumnMap, RawDate,
};
use crate::domain::Observation;
use crate::CoreError;

const PROVIDER: &str = "statcan";

/// Data point fields of a WDS vector.
pub const WDS_JSON_FIELDS: ColumnMap = ColumnMap::new(&[
    ("refPer", CanonicalField::Date),
    ("value", CanonicalField::Value),
]);

/// Observations from a WDS JSON body.
///
/// # Errors
/// A non-success status is a [`CoreError::Provider`] carrying the WDS message.
pub fn parse_wds_payload(body: &str) -> Result<Vec<Observation>, CoreError> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|error| CoreError::provider(PROVIDER, format!("malformed WDS payload: {error}")))?;

    let (status_holder, data_holder) = match &payload {
        Value::Array(items) => match items.as_slice() {
            [first, second, ..] if second.get("vectorData").is_some() => (first, second),
            [first, ..] => (first, first),
            [] => return Err(CoreError::provider(PROVIDER, "empty WDS payload")),
        },
        Value::Object(_) => (&payload, &payload),
        _ => return Err(CoreError::provider(PROVIDER, "WDS payload is not an envelope")),
    };

    check_status(status_holder)?;

    let points = data_holder
        .get("vectorData")
        .or_else(|| data_holder.get("object").and_then(|object| object.get("vectorDataPoint")))
        .or_else(|| data_holder.get("vectorDataPoint"))
        .and_then(Value::as_array)
        .ok_or_else(|| CoreError::provider(PROVIDER, "WDS payload has no vector data"))?;

    let mut rows = Vec::with_capacity(points.len());
    for point in points {
        if let Some(row) = read_point(point)? {
            if let Some(observation) = row.to_observation() {
                rows.push(observation);
            }
        }
    }
    Ok(dedupe_by_date(rows, |row| row.date))
}

fn check_status(holder: &Value) -> Result<(), CoreError> {
    let object = holder.get("object");
    let status = holder
        .get("status")
        .or_else(|| holder.get("responseStatusCode"))
        .or_else(|| object.and_then(|object| object.get("responseStatusCode")));

    let Some(status) = status else {
        return Err(CoreError::provider(PROVIDER, "WDS envelope has no status"));
    };

    let inner_ok = object
        .and_then(|object| object.get("responseStatusCode"))
        .map_or(true, is_success_status);

    if is_success_status(status) && inner_ok {
        return Ok(());
    }

    let message = holder
        .get("message")
        .or_else(|| object.and_then(|object| object.get("message")))
        .and_then(Value::as_str)
        .unwrap_or("unknown WDS error");
    Err(CoreError::provider(
        PROVIDER,
        format!("WDS status {status}: {message}"),
    ))
}

fn is_success_status(status: &Value) -> bool {
    match status {
        Value::Number(number) => number.as_i64() == Some(0),
        Value::String(text) => text.eq_ignore_ascii_case("success") || text.trim() == "0",
        _ => false,
    }
}

fn read_point(point: &Value) -> Result<Option<CanonicalRow>, CoreError> {
    let Some(fields) = point.as_object() else {
        return Err(CoreError::provider(PROVIDER, "vector data point is not an object"));
    };

    let mut date = None;
    let mut values = Vec::new();
    for (name, raw) in fields {
        match WDS_JSON_FIELDS.field(name) {
            Some(CanonicalField::Date) => {
                let text = raw.as_str().ok_or_else(|| {
                    CoreError::provider(PROVIDER, format!("refPer is not a string: {raw}"))
                })?;
                date = Some(resolve_date(PROVIDER, &RawDate::Text(text.to_owned()))?);
            }
            Some(field) => {
                let value = match raw {
                    Value::Null => None,
                    Value::Number(number) => number.as_f64(),
                    Value::String(text) => parse_number(PROVIDER, field, text)?,
                    other => {
                        return Err(CoreError::provider(
                            PROVIDER,
                            format!("field '{field}' is not numeric: {other}"),
                        ))
                    }
                };
                if let Some(value) = value {
                    values.push((field, value));
                }
            }
            None => {}
        }
    }

    let Some(date) = date else {
        return Ok(None);
    };
    let mut row = CanonicalRow::new(date);
    for (field, value) in values {
        row.set(field, value);
    }
    Ok(Some(row))
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn reads_status_and_data_pair() {
        let body = r#"[{"status": 0}, {"vectorData": [{"refPer": "2024-01", "value": 100}]}]"#;

        let rows = parse_wds_payload(body).expect("rows");

        assert_eq!(rows, vec![Observation::new(date!(2024 - 01 - 01), 100.0)]);
    }

    #[test]
    fn reads_object_wrapped_vector_points() {
        let body = r#"[{
            "status": "SUCCESS",
            "object": {
                "responseStatusCode": 0,
                "vectorId": 41690973,
                "vectorDataPoint": [
                    {"refPer": "2024-01-01", "value": 158.3, "decimals": 1, "symbolCode": 0},
                    {"refPer": "2024-02-01", "value": null},
                    {"refPer": "2024-03-01", "value": "159.8"}
                ]
            }
        }]"#;

        let rows = parse_wds_payload(body).expect("rows");

        assert_eq!(
            rows,
            vec![
                Observation::new(date!(2024 - 01 - 01), 158.3),
                Observation::new(date!(2024 - 03 - 01), 159.8),
            ]
        );
    }

    #[test]
    fn non_success_status_is_a_provider_error() {
        let body = r#"[{"status": 2, "message": "Vector not valid"}, {"vectorData": []}]"#;

        let error = parse_wds_payload(body).expect_err("status 2");

        assert!(matches!(error, CoreError::Provider { .. }));
        assert!(error.to_string().contains("Vector not valid"));
    }

    #[test]
    fn failed_inner_status_is_a_provider_error() {
        let body = r#"[{"status": "SUCCESS", "object": {"responseStatusCode": 1, "message": "bad"}}]"#;

        assert!(parse_wds_payload(body).is_err());
    }
}
