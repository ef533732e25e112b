use serde::Deserialize;

use super::{dedupe_by_date, parse_number, resolve_date, CanonicalField, RawDate};
use crate::domain::Observation;
use crate::CoreError;

const PROVIDER: &str = "fred";

#[derive(Debug, Deserialize)]
struct FredEnvelope {
    #[serde(default)]
    observations: Option<Vec<FredObservation>>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

/// Rows of a FRED `series/observations` JSON body. `.` marks a missing value.
pub fn parse_fred_observations(body: &str) -> Result<Vec<Observation>, CoreError> {
    let envelope: FredEnvelope = serde_json::from_str(body).map_err(|error| {
        CoreError::provider(PROVIDER, format!("malformed observations payload: {error}"))
    })?;

    if let Some(message) = envelope.error_message {
        let code = envelope
            .error_code
            .map(|code| format!(" {code}"))
            .unwrap_or_default();
        return Err(CoreError::provider(PROVIDER, format!("error{code}: {message}")));
    }

    let observations = envelope.observations.ok_or_else(|| {
        CoreError::provider(PROVIDER, "payload has no observations array")
    })?;

    let mut rows = Vec::with_capacity(observations.len());
    for observation in observations {
        let date = resolve_date(PROVIDER, &RawDate::Text(observation.date))?;
        if let Some(value) = parse_number(PROVIDER, CanonicalField::Value, &observation.value)? {
            rows.push(Observation::new(date, value));
        }
    }
    Ok(dedupe_by_date(rows, |row| row.date))
}

/// FRED answers an unknown series id with HTTP 400 and this phrase.
pub fn is_unknown_series_message(body: &str) -> bool {
    body.contains("does not exist")
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn skips_missing_values() {
        let body = r#"{
            "realtime_start": "2024-05-01",
            "observations": [
                {"realtime_start": "2024-05-01", "date": "2024-01-01", "value": "308.417"},
                {"realtime_start": "2024-05-01", "date": "2024-02-01", "value": "."},
                {"realtime_start": "2024-05-01", "date": "2024-03-01", "value": "312.230"}
            ]
        }"#;

        let rows = parse_fred_observations(body).expect("rows");

        assert_eq!(
            rows,
            vec![
                Observation::new(date!(2024 - 01 - 01), 308.417),
                Observation::new(date!(2024 - 03 - 01), 312.23),
            ]
        );
    }

    #[test]
    fn error_envelope_is_a_provider_error() {
        let body = r#"{"error_code": 400, "error_message": "Bad Request.  The value for variable api_key is not registered."}"#;

        let error = parse_fred_observations(body).expect_err("provider error");

        assert!(matches!(error, CoreError::Provider { .. }));
        assert!(error.to_string().contains("api_key"));
    }
}
