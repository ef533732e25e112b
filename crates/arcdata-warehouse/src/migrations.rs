use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_entity_tables",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS series_id_seq START 1;
CREATE SEQUENCE IF NOT EXISTS instrument_id_seq START 1;

CREATE TABLE IF NOT EXISTS series (
    id BIGINT PRIMARY KEY DEFAULT nextval('series_id_seq'),
    source TEXT NOT NULL,
    natural_key TEXT NOT NULL,
    title TEXT,
    last_updated TIMESTAMP,
    UNIQUE(source, natural_key)
);

CREATE TABLE IF NOT EXISTS observations (
    series_id BIGINT NOT NULL,
    date DATE NOT NULL,
    value DOUBLE NOT NULL,
    fetched_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(series_id, date)
);

CREATE TABLE IF NOT EXISTS instruments (
    id BIGINT PRIMARY KEY DEFAULT nextval('instrument_id_seq'),
    ticker TEXT NOT NULL UNIQUE,
    company_name TEXT,
    exchange TEXT,
    sector TEXT,
    industry TEXT,
    currency TEXT,
    metadata_fetched_at TIMESTAMP
);

CREATE TABLE IF NOT EXISTS bars (
    instrument_id BIGINT NOT NULL,
    bar_interval TEXT NOT NULL,
    date DATE NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL,
    volume BIGINT,
    dividends DOUBLE NOT NULL DEFAULT 0,
    splits DOUBLE NOT NULL DEFAULT 0,
    fetched_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(instrument_id, bar_interval, date)
);
"#,
    },
    Migration {
        version: "0002_documents_and_fetch_log",
        sql: r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    doc_key TEXT NOT NULL,
    body TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(collection, doc_key)
);

CREATE TABLE IF NOT EXISTS fetch_log (
    request_id TEXT NOT NULL,
    source TEXT NOT NULL,
    natural_key TEXT NOT NULL,
    status TEXT NOT NULL,
    row_count BIGINT,
    latency_ms BIGINT,
    timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
];

/// Create every table that is not there yet. Safe to run on each open.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
            tracing::debug!(version = migration.version, "applied schema migration");
        }
    }

    Ok(())
}

/// Versions recorded in `schema_migrations`, oldest first.
pub fn applied_versions(connection: &Connection) -> Result<Vec<String>, ::duckdb::Error> {
    let mut statement =
        connection.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_once() {
        let connection = Connection::open_in_memory().expect("open");

        apply_migrations(&connection).expect("first run");
        apply_migrations(&connection).expect("second run");

        let versions = applied_versions(&connection).expect("versions");
        assert_eq!(
            versions,
            vec![
                String::from("0001_entity_tables"),
                String::from("0002_documents_and_fetch_log"),
            ]
        );
    }
}
