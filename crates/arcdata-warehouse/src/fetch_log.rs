use ::duckdb::ToSql;

use crate::models::{FetchLogEntry, FetchStatus};
use crate::{Warehouse, WarehouseError};

impl Warehouse {
    /// Append one remote fetch outcome to `fetch_log`.
    pub fn record_fetch(&self, entry: &FetchLogEntry) -> Result<(), WarehouseError> {
        let connection = self.writer()?;
        let row_count = entry.row_count.map(|count| count as i64);
        let latency_ms = entry.latency_ms as i64;
        let status = entry.status.as_str();
        let params: [&dyn ToSql; 6] = [
            &entry.request_id,
            &entry.source,
            &entry.natural_key,
            &status,
            &row_count,
            &latency_ms,
        ];
        connection.execute(
            "INSERT INTO fetch_log \
             (request_id, source, natural_key, status, row_count, latency_ms, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Most recent fetch log entries, newest first.
    pub fn recent_fetches(&self, limit: usize) -> Result<Vec<FetchLogEntry>, WarehouseError> {
        let connection = self.connection()?;
        let limit = limit as i64;
        let mut statement = connection.prepare(
            "SELECT request_id, source, natural_key, status, row_count, latency_ms \
             FROM fetch_log ORDER BY timestamp DESC, rowid DESC LIMIT ?",
        )?;
        let mut rows = statement.query([limit])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let status: String = row.get(3)?;
            let row_count: Option<i64> = row.get(4)?;
            let latency_ms: Option<i64> = row.get(5)?;
            out.push(FetchLogEntry {
                request_id: row.get(0)?,
                source: row.get(1)?,
                natural_key: row.get(2)?,
                status: if status == FetchStatus::Ok.as_str() {
                    FetchStatus::Ok
                } else {
                    FetchStatus::Error
                },
                row_count: row_count.map(|count| count.max(0) as u64),
                latency_ms: latency_ms.unwrap_or_default().max(0) as u64,
            });
        }
        Ok(out)
    }
}
