use std::sync::Arc;

use crate::domain::DateRange;
use crate::http_client::HttpClient;
use crate::normalize::delimited::{read_rows, STATCAN_CSV_COLUMNS};
use crate::normalize::statcan::parse_wds_payload;
use crate::normalize::{observations_from, CanonicalField};
use crate::probe::{Candidate, EndpointPlan, PayloadParser, Prober, ResponseFormat};
use crate::providers::{SeriesPayload, SeriesSource};
use crate::{CoreError, SourceName};

pub const WDS_REST_HOST: &str = "https://www150.statcan.gc.ca/t1/wds/rest";
pub const WDS_LEGACY_HOST: &str = "https://www150.statcan.gc.ca/t1/wds/en/gr1";

/// Statistics Canada vectors through the WDS API.
///
/// WDS has moved its vector endpoints around over time, so every fetch probes
/// both hosts with three path variants.
pub struct StatCanSource {
    prober: Prober,
}

impl StatCanSource {
    pub fn new(http: Arc<dyn HttpClient>, timeout_ms: u64) -> Self {
        Self {
            prober: Prober::new(http).with_timeout_ms(timeout_ms),
        }
    }

    /// Candidate endpoints for `vector`, host-major.
    pub fn candidates(&self, vector: &str) -> Vec<Candidate> {
        let vector = urlencoding::encode(vector);
        EndpointPlan::new()
            .host(WDS_REST_HOST)
            .host(WDS_LEGACY_HOST)
            .suffix(
                format!("/getDataFromVectorsByVectorIds?vectorIds={vector}"),
                ResponseFormat::Json,
            )
            .suffix(
                format!("?getDataObjectsFromVectors&vectorIds={vector}"),
                ResponseFormat::Json,
            )
            .suffix(format!("/{vector}?format=CSV"), ResponseFormat::Csv)
            .candidates()
    }
}

struct WdsParser;

impl PayloadParser for WdsParser {
    type Output = SeriesPayload;

    fn provider(&self) -> &str {
        "statcan"
    }

    fn parse(&self, format: ResponseFormat, body: &str) -> Result<SeriesPayload, CoreError> {
        let observations = match format {
            ResponseFormat::Json => parse_wds_payload(body)?,
            ResponseFormat::Csv => {
                let rows = read_rows(
                    "statcan",
                    body,
                    STATCAN_CSV_COLUMNS,
                    &[CanonicalField::Value],
                )?;
                observations_from(&rows)
            }
        };
        Ok(SeriesPayload {
            title: None,
            observations,
        })
    }
}

impl SeriesSource for StatCanSource {
    fn source(&self) -> SourceName {
        SourceName::StatisticalAgency
    }

    /// WDS ignores the range and returns the whole vector.
    fn fetch_series(&self, key: &str, _range: DateRange) -> Result<SeriesPayload, CoreError> {
        let probed = self.prober.probe(key, &self.candidates(key), &WdsParser)?;
        tracing::debug!(
            vector = key,
            url = %probed.candidate.url,
            attempts = probed.attempts,
            "statcan vector resolved"
        );
        Ok(probed.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::HttpResponse;
    use crate::testing::ScriptedHttpClient;

    #[test]
    fn candidates_cover_both_hosts_in_order() {
        let source = StatCanSource::new(Arc::new(ScriptedHttpClient::new()), 1_000);

        let urls: Vec<String> = source
            .candidates("v41690973")
            .into_iter()
            .map(|candidate| candidate.url)
            .collect();

        assert_eq!(
            urls,
            vec![
                format!("{WDS_REST_HOST}/getDataFromVectorsByVectorIds?vectorIds=v41690973"),
                format!("{WDS_REST_HOST}?getDataObjectsFromVectors&vectorIds=v41690973"),
                format!("{WDS_REST_HOST}/v41690973?format=CSV"),
                format!("{WDS_LEGACY_HOST}/getDataFromVectorsByVectorIds?vectorIds=v41690973"),
                format!("{WDS_LEGACY_HOST}?getDataObjectsFromVectors&vectorIds=v41690973"),
                format!("{WDS_LEGACY_HOST}/v41690973?format=CSV"),
            ]
        );
    }

    #[test]
    fn csv_candidate_is_parsed_with_column_checks() {
        let http = Arc::new(ScriptedHttpClient::new().respond(
            format!("{WDS_REST_HOST}/v999999?format=CSV"),
            HttpResponse::ok("REF_DATE,VALUE\n2024-01,100\n2024-02,202\n"),
        ));
        let source = StatCanSource::new(http.clone(), 1_000);

        let payload = source
            .fetch_series("v999999", DateRange::unbounded())
            .expect("payload");

        assert_eq!(payload.observations.len(), 2);
        assert_eq!(http.request_count(), 3);
    }
}
