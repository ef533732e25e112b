//! Entity store: series/observations and instruments/bars.

use std::collections::BTreeMap;

use ::duckdb::{Connection, ToSql};
use time::Date;

use crate::models::{
    BarRecord, DateBounds, InstrumentMetadata, InstrumentRecord, ObservationRecord, SeriesRecord,
};
use crate::{date_from_sql, date_to_sql, in_transaction, Warehouse, WarehouseError};

impl Warehouse {
    /// Look up or create the series for `(source, natural_key)` and return its id.
    ///
    /// Repeated calls return the same id. A `title` fills an empty stored title
    /// and never overwrites an existing one.
    pub fn resolve_series(
        &self,
        source: &str,
        natural_key: &str,
        title: Option<&str>,
    ) -> Result<i64, WarehouseError> {
        if source.is_empty() || natural_key.is_empty() {
            return Err(WarehouseError::InvalidData(String::from(
                "series source and natural key must be non-empty",
            )));
        }

        let connection = self.writer()?;
        let id = match find_series_id(&connection, source, natural_key)? {
            Some(id) => id,
            None => {
                let params: [&dyn ToSql; 2] = [&source, &natural_key];
                connection.execute(
                    "INSERT INTO series (source, natural_key) VALUES (?, ?) \
                     ON CONFLICT (source, natural_key) DO NOTHING",
                    params.as_slice(),
                )?;
                let id = find_series_id(&connection, source, natural_key)?.ok_or_else(|| {
                    WarehouseError::InvalidData(format!(
                        "series {source}/{natural_key} missing after insert"
                    ))
                })?;
                tracing::debug!(source, natural_key, id, "created series");
                id
            }
        };

        if let Some(title) = title {
            let params: [&dyn ToSql; 2] = [&title, &id];
            connection.execute(
                "UPDATE series SET title = ? WHERE id = ? AND title IS NULL",
                params.as_slice(),
            )?;
        }

        Ok(id)
    }

    /// Id of an existing series, without creating one.
    pub fn find_series(&self, source: &str, natural_key: &str) -> Result<Option<i64>, WarehouseError> {
        let connection = self.connection()?;
        find_series_id(&connection, source, natural_key)
    }

    /// Write observations for one series in a single transaction.
    ///
    /// An existing `(series_id, date)` row is replaced. Duplicate dates in
    /// `rows` collapse to the last one. Returns the number of distinct dates written.
    pub fn upsert_observations(
        &self,
        series_id: i64,
        rows: &[ObservationRecord],
    ) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut by_date = BTreeMap::new();
        for row in rows {
            by_date.insert(row.date, row.value);
        }

        let connection = self.writer()?;
        ensure_exists(&connection, "series", series_id)?;
        let written = in_transaction(&connection, |connection| {
            for (date, value) in &by_date {
                if !value.is_finite() {
                    return Err(WarehouseError::InvalidData(format!(
                        "observation {date} for series {series_id} is not finite"
                    )));
                }
                let date = date_to_sql(*date);
                let params: [&dyn ToSql; 3] = [&series_id, &date, value];
                connection.execute(
                    "INSERT OR REPLACE INTO observations (series_id, date, value, fetched_at) \
                     VALUES (?, CAST(? AS DATE), ?, CURRENT_TIMESTAMP)",
                    params.as_slice(),
                )?;
            }
            connection.execute(
                "UPDATE series SET last_updated = CURRENT_TIMESTAMP WHERE id = ?",
                [series_id],
            )?;
            Ok(by_date.len())
        })?;

        tracing::debug!(series_id, rows = written, "upserted observations");
        Ok(written)
    }

    /// Observations of one series inside `bounds`, ascending by date.
    pub fn load_observations(
        &self,
        series_id: i64,
        bounds: DateBounds,
    ) -> Result<Vec<ObservationRecord>, WarehouseError> {
        let connection = self.connection()?;
        let filter = BoundsFilter::new(bounds);
        let mut sql = String::from(
            "SELECT CAST(date AS VARCHAR), value FROM observations WHERE series_id = ?",
        );
        let mut params: Vec<&dyn ToSql> = vec![&series_id];
        filter.apply(&mut sql, &mut params);
        sql.push_str(" ORDER BY date");

        let mut statement = connection.prepare(&sql)?;
        let mut rows = statement.query(params.as_slice())?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let date: String = row.get(0)?;
            out.push(ObservationRecord {
                date: date_from_sql(&date)?,
                value: row.get(1)?,
            });
        }
        Ok(out)
    }

    /// Cached series, optionally restricted to one source, ordered by source then key.
    pub fn list_series(&self, source: Option<&str>) -> Result<Vec<SeriesRecord>, WarehouseError> {
        let connection = self.connection()?;
        let mut sql = String::from(
            "SELECT s.id, s.source, s.natural_key, s.title, CAST(s.last_updated AS VARCHAR), \
             COUNT(o.date) \
             FROM series s LEFT JOIN observations o ON o.series_id = s.id",
        );
        let mut params: Vec<&dyn ToSql> = Vec::new();
        if let Some(source) = &source {
            sql.push_str(" WHERE s.source = ?");
            params.push(source);
        }
        sql.push_str(
            " GROUP BY s.id, s.source, s.natural_key, s.title, s.last_updated \
             ORDER BY s.source, s.natural_key",
        );

        let mut statement = connection.prepare(&sql)?;
        let mut rows = statement.query(params.as_slice())?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(SeriesRecord {
                id: row.get(0)?,
                source: row.get(1)?,
                natural_key: row.get(2)?,
                title: row.get(3)?,
                last_updated: row.get(4)?,
                observation_count: row.get(5)?,
            });
        }
        Ok(out)
    }

    /// Look up or create the instrument for an already-normalized ticker.
    pub fn resolve_instrument(&self, ticker: &str) -> Result<i64, WarehouseError> {
        if ticker.is_empty() {
            return Err(WarehouseError::InvalidData(String::from(
                "ticker must be non-empty",
            )));
        }

        let connection = self.writer()?;
        if let Some(id) = find_instrument_id(&connection, ticker)? {
            return Ok(id);
        }

        connection.execute(
            "INSERT INTO instruments (ticker) VALUES (?) ON CONFLICT (ticker) DO NOTHING",
            [ticker],
        )?;
        let id = find_instrument_id(&connection, ticker)?.ok_or_else(|| {
            WarehouseError::InvalidData(format!("instrument {ticker} missing after insert"))
        })?;
        tracing::debug!(ticker, id, "created instrument");
        Ok(id)
    }

    /// Id of an existing instrument, without creating one.
    pub fn find_instrument(&self, ticker: &str) -> Result<Option<i64>, WarehouseError> {
        let connection = self.connection()?;
        find_instrument_id(&connection, ticker)
    }

    /// Fill in descriptive fields of an instrument and stamp `metadata_fetched_at`.
    pub fn update_instrument_metadata(
        &self,
        instrument_id: i64,
        metadata: &InstrumentMetadata,
    ) -> Result<(), WarehouseError> {
        if metadata.is_empty() {
            return Ok(());
        }

        let connection = self.writer()?;
        ensure_exists(&connection, "instruments", instrument_id)?;
        let params: [&dyn ToSql; 6] = [
            &metadata.company_name,
            &metadata.exchange,
            &metadata.sector,
            &metadata.industry,
            &metadata.currency,
            &instrument_id,
        ];
        connection.execute(
            "UPDATE instruments SET \
             company_name = COALESCE(?, company_name), \
             exchange = COALESCE(?, exchange), \
             sector = COALESCE(?, sector), \
             industry = COALESCE(?, industry), \
             currency = COALESCE(?, currency), \
             metadata_fetched_at = CURRENT_TIMESTAMP \
             WHERE id = ?",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Write bars for one `(instrument, interval)` in a single transaction.
    ///
    /// Same replace and de-duplication rules as [`Warehouse::upsert_observations`].
    pub fn upsert_bars(
        &self,
        instrument_id: i64,
        interval: &str,
        rows: &[BarRecord],
    ) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut by_date: BTreeMap<Date, &BarRecord> = BTreeMap::new();
        for row in rows {
            by_date.insert(row.date, row);
        }

        let connection = self.writer()?;
        ensure_exists(&connection, "instruments", instrument_id)?;
        let written = in_transaction(&connection, |connection| {
            for (date, bar) in &by_date {
                let prices = [bar.open, bar.high, bar.low, bar.close, bar.dividends, bar.splits];
                if prices.iter().any(|value| !value.is_finite()) {
                    return Err(WarehouseError::InvalidData(format!(
                        "bar {date} for instrument {instrument_id} has a non-finite field"
                    )));
                }
                let date = date_to_sql(*date);
                let params: [&dyn ToSql; 10] = [
                    &instrument_id,
                    &interval,
                    &date,
                    &bar.open,
                    &bar.high,
                    &bar.low,
                    &bar.close,
                    &bar.volume,
                    &bar.dividends,
                    &bar.splits,
                ];
                connection.execute(
                    "INSERT OR REPLACE INTO bars \
                     (instrument_id, bar_interval, date, open, high, low, close, volume, \
                      dividends, splits, fetched_at) \
                     VALUES (?, ?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                    params.as_slice(),
                )?;
            }
            Ok(by_date.len())
        })?;

        tracing::debug!(instrument_id, interval, rows = written, "upserted bars");
        Ok(written)
    }

    /// Bars of one `(instrument, interval)` inside `bounds`, ascending by date.
    pub fn load_bars(
        &self,
        instrument_id: i64,
        interval: &str,
        bounds: DateBounds,
    ) -> Result<Vec<BarRecord>, WarehouseError> {
        let connection = self.connection()?;
        let filter = BoundsFilter::new(bounds);
        let mut sql = String::from(
            "SELECT CAST(date AS VARCHAR), open, high, low, close, volume, dividends, splits \
             FROM bars WHERE instrument_id = ? AND bar_interval = ?",
        );
        let mut params: Vec<&dyn ToSql> = vec![&instrument_id, &interval];
        filter.apply(&mut sql, &mut params);
        sql.push_str(" ORDER BY date");

        let mut statement = connection.prepare(&sql)?;
        let mut rows = statement.query(params.as_slice())?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let date: String = row.get(0)?;
            out.push(BarRecord {
                date: date_from_sql(&date)?,
                open: row.get(1)?,
                high: row.get(2)?,
                low: row.get(3)?,
                close: row.get(4)?,
                volume: row.get(5)?,
                dividends: row.get(6)?,
                splits: row.get(7)?,
            });
        }
        Ok(out)
    }

    /// Cached instruments ordered by ticker.
    pub fn list_instruments(&self) -> Result<Vec<InstrumentRecord>, WarehouseError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare(
            "SELECT i.id, i.ticker, i.company_name, i.exchange, i.sector, i.industry, i.currency, \
             CAST(i.metadata_fetched_at AS VARCHAR), COUNT(b.date) \
             FROM instruments i LEFT JOIN bars b ON b.instrument_id = i.id \
             GROUP BY i.id, i.ticker, i.company_name, i.exchange, i.sector, i.industry, \
             i.currency, i.metadata_fetched_at \
             ORDER BY i.ticker",
        )?;
        let mut rows = statement.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(InstrumentRecord {
                id: row.get(0)?,
                ticker: row.get(1)?,
                company_name: row.get(2)?,
                exchange: row.get(3)?,
                sector: row.get(4)?,
                industry: row.get(5)?,
                currency: row.get(6)?,
                metadata_fetched_at: row.get(7)?,
                bar_count: row.get(8)?,
            });
        }
        Ok(out)
    }

    /// Distinct intervals stored for one instrument.
    pub fn bar_intervals(&self, instrument_id: i64) -> Result<Vec<String>, WarehouseError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare(
            "SELECT DISTINCT bar_interval FROM bars WHERE instrument_id = ? ORDER BY bar_interval",
        )?;
        let rows = statement.query_map([instrument_id], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// Optional `date` range clauses with their bound parameters.
struct BoundsFilter {
    start: Option<String>,
    end: Option<String>,
}

impl BoundsFilter {
    fn new(bounds: DateBounds) -> Self {
        Self {
            start: bounds.start.map(date_to_sql),
            end: bounds.end.map(date_to_sql),
        }
    }

    fn apply<'a>(&'a self, sql: &mut String, params: &mut Vec<&'a dyn ToSql>) {
        if let Some(start) = &self.start {
            sql.push_str(" AND date >= CAST(? AS DATE)");
            params.push(start);
        }
        if let Some(end) = &self.end {
            sql.push_str(" AND date <= CAST(? AS DATE)");
            params.push(end);
        }
    }
}

fn find_series_id(
    connection: &Connection,
    source: &str,
    natural_key: &str,
) -> Result<Option<i64>, WarehouseError> {
    let params: [&dyn ToSql; 2] = [&source, &natural_key];
    let mut statement =
        connection.prepare("SELECT id FROM series WHERE source = ? AND natural_key = ?")?;
    let mut rows = statement.query(params.as_slice())?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

fn find_instrument_id(connection: &Connection, ticker: &str) -> Result<Option<i64>, WarehouseError> {
    let mut statement = connection.prepare("SELECT id FROM instruments WHERE ticker = ?")?;
    let mut rows = statement.query([ticker])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

fn ensure_exists(connection: &Connection, table: &str, id: i64) -> Result<(), WarehouseError> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE id = ?");
    let count: i64 = connection.query_row(&sql, [id], |row| row.get(0))?;
    if count == 0 {
        return Err(WarehouseError::InvalidData(format!(
            "no {table} row with id {id}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    fn observation(date: Date, value: f64) -> ObservationRecord {
        ObservationRecord { date, value }
    }

    fn bar(date: Date, close: f64) -> BarRecord {
        BarRecord {
            date,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: Some(1_000),
            dividends: 0.0,
            splits: 0.0,
        }
    }

    #[test]
    fn resolve_series_fills_missing_title_only() {
        let warehouse = Warehouse::open_in_memory().expect("open");

        let id = warehouse
            .resolve_series("economic", "UNRATE", None)
            .expect("create");
        warehouse
            .resolve_series("economic", "UNRATE", Some("Unemployment Rate"))
            .expect("title");
        warehouse
            .resolve_series("economic", "UNRATE", Some("Other"))
            .expect("second title");

        let listed = warehouse.list_series(Some("economic")).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].title.as_deref(), Some("Unemployment Rate"));
    }

    #[test]
    fn same_key_under_different_sources_is_distinct() {
        let warehouse = Warehouse::open_in_memory().expect("open");

        let economic = warehouse.resolve_series("economic", "X", None).expect("a");
        let agency = warehouse
            .resolve_series("statistical-agency", "X", None)
            .expect("b");

        assert_ne!(economic, agency);
    }

    #[test]
    fn duplicate_dates_in_one_batch_keep_the_last_value() {
        let warehouse = Warehouse::open_in_memory().expect("open");
        let id = warehouse.resolve_series("economic", "GDP", None).expect("id");

        let written = warehouse
            .upsert_observations(
                id,
                &[
                    observation(date!(2024 - 01 - 01), 1.0),
                    observation(date!(2024 - 01 - 01), 2.0),
                ],
            )
            .expect("upsert");

        assert_eq!(written, 1);
        let rows = warehouse
            .load_observations(id, DateBounds::UNBOUNDED)
            .expect("load");
        assert_eq!(rows, vec![observation(date!(2024 - 01 - 01), 2.0)]);
    }

    #[test]
    fn upsert_for_unknown_series_is_rejected() {
        let warehouse = Warehouse::open_in_memory().expect("open");

        let error = warehouse
            .upsert_observations(42, &[observation(date!(2024 - 01 - 01), 1.0)])
            .expect_err("unknown series");

        assert!(matches!(error, WarehouseError::InvalidData(_)));
    }

    #[test]
    fn bounds_are_inclusive_on_both_sides() {
        let warehouse = Warehouse::open_in_memory().expect("open");
        let id = warehouse.resolve_series("economic", "GDP", None).expect("id");
        warehouse
            .upsert_observations(
                id,
                &[
                    observation(date!(2024 - 01 - 01), 1.0),
                    observation(date!(2024 - 02 - 01), 2.0),
                    observation(date!(2024 - 03 - 01), 3.0),
                ],
            )
            .expect("upsert");

        let rows = warehouse
            .load_observations(
                id,
                DateBounds::new(Some(date!(2024 - 02 - 01)), Some(date!(2024 - 03 - 01))),
            )
            .expect("load");

        let dates: Vec<Date> = rows.iter().map(|row| row.date).collect();
        assert_eq!(dates, vec![date!(2024 - 02 - 01), date!(2024 - 03 - 01)]);
    }

    #[test]
    fn bars_are_partitioned_by_interval() {
        let warehouse = Warehouse::open_in_memory().expect("open");
        let id = warehouse.resolve_instrument("MSFT").expect("id");

        warehouse
            .upsert_bars(id, "1d", &[bar(date!(2024 - 01 - 02), 10.0)])
            .expect("daily");
        warehouse
            .upsert_bars(id, "1wk", &[bar(date!(2024 - 01 - 01), 11.0)])
            .expect("weekly");

        let daily = warehouse
            .load_bars(id, "1d", DateBounds::UNBOUNDED)
            .expect("load daily");
        assert_eq!(daily, vec![bar(date!(2024 - 01 - 02), 10.0)]);
        assert_eq!(
            warehouse.bar_intervals(id).expect("intervals"),
            vec![String::from("1d"), String::from("1wk")]
        );
    }

    #[test]
    fn instrument_metadata_is_merged_not_cleared() {
        let warehouse = Warehouse::open_in_memory().expect("open");
        let id = warehouse.resolve_instrument("MSFT").expect("id");

        warehouse
            .update_instrument_metadata(
                id,
                &InstrumentMetadata {
                    currency: Some(String::from("USD")),
                    exchange: Some(String::from("NMS")),
                    ..InstrumentMetadata::default()
                },
            )
            .expect("first");
        warehouse
            .update_instrument_metadata(
                id,
                &InstrumentMetadata {
                    company_name: Some(String::from("Microsoft Corporation")),
                    ..InstrumentMetadata::default()
                },
            )
            .expect("second");

        let instruments = warehouse.list_instruments().expect("list");
        assert_eq!(instruments.len(), 1);
        let msft = &instruments[0];
        assert_eq!(msft.currency.as_deref(), Some("USD"));
        assert_eq!(msft.exchange.as_deref(), Some("NMS"));
        assert_eq!(msft.company_name.as_deref(), Some("Microsoft Corporation"));
        assert!(msft.metadata_fetched_at.is_some());
    }
}
