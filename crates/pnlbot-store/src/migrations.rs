use ::duckdb::{params, Connection};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_log_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS call_log (
    name_step TEXT PRIMARY KEY,
    function TEXT NOT NULL,
    request_id TEXT NOT NULL,
    status TEXT NOT NULL,
    row_count BIGINT,
    column_count BIGINT,
    elapsed_ms BIGINT NOT NULL,
    call_stack TEXT NOT NULL,
    error_message TEXT,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS error_log (
    name_step TEXT NOT NULL,
    message TEXT NOT NULL,
    kind TEXT NOT NULL,
    location TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS email_state (
    subject TEXT PRIMARY KEY,
    last_seen TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_error_log_index",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_error_log_name_step ON error_log(name_step, recorded_at);
"#,
    },
];

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
            params![migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params![migration.version],
            )?;
        }
    }

    Ok(())
}
