//! Idempotent schema creation plus column-add migrations.
//!
//! `CREATE TABLE IF NOT EXISTS` carries fresh deployments; the
//! `ensure_column` probes upgrade databases created before a column
//! existed. Statements are authored per dialect where the types differ
//! (BLOB/BYTEA, JSONB, the GIN index).

use engram_core::errors::EngramResult;
use tracing::debug;

use crate::params;
use crate::sql::{SqlDialect, SqlExecutor};

/// Create every table and index, then apply column-add migrations.
pub async fn run_migrations(exec: &dyn SqlExecutor) -> EngramResult<()> {
    let dialect = exec.dialect();
    for stmt in schema_statements(dialect) {
        exec.run(&stmt, &[]).await?;
    }

    // Columns added after the first shipped schema. Harmless on fresh
    // databases (the CREATE TABLE above already has them).
    ensure_column(exec, "memories", "user_id", "TEXT").await?;
    ensure_column(exec, "memories", "generated_summary", "TEXT").await?;
    ensure_column(exec, "memories", "encryption_key_version", "INTEGER").await?;
    ensure_column(exec, "waypoints", "coactivations", "INTEGER NOT NULL DEFAULT 0").await?;

    for stmt in index_statements(dialect) {
        exec.run(stmt, &[]).await?;
    }

    debug!(?dialect, "migrations complete");
    Ok(())
}

fn schema_statements(dialect: SqlDialect) -> Vec<String> {
    let blob = match dialect {
        SqlDialect::Sqlite => "BLOB",
        SqlDialect::Postgres => "BYTEA",
    };
    let json = match dialect {
        SqlDialect::Sqlite => "TEXT",
        SqlDialect::Postgres => "JSONB",
    };

    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS memories (
                    id TEXT PRIMARY KEY,
                    user_id TEXT,
                    content TEXT NOT NULL,
                    primary_sector TEXT NOT NULL,
                    sectors TEXT NOT NULL,
                    tags TEXT NOT NULL,
                    metadata {json} NOT NULL,
                    salience DOUBLE PRECISION NOT NULL,
                    decay_lambda DOUBLE PRECISION NOT NULL,
                    version BIGINT NOT NULL,
                    created_at BIGINT NOT NULL,
                    updated_at BIGINT NOT NULL,
                    last_seen_at BIGINT NOT NULL,
                    segment BIGINT NOT NULL DEFAULT 0,
                    simhash TEXT NOT NULL,
                    mean_vec {blob},
                    mean_dim INTEGER,
                    feedback_score DOUBLE PRECISION NOT NULL DEFAULT 0,
                    consolidated INTEGER NOT NULL DEFAULT 0,
                    generated_summary TEXT,
                    encryption_key_version INTEGER
                )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS sector_vectors (
                    memory_id TEXT NOT NULL,
                    sector TEXT NOT NULL,
                    user_id TEXT,
                    v {blob} NOT NULL,
                    dim INTEGER NOT NULL,
                    PRIMARY KEY (memory_id, sector)
                )"
        ),
        // user_id is part of the key; anonymous edges store ''.
        "CREATE TABLE IF NOT EXISTS waypoints (
            src_id TEXT NOT NULL,
            dst_id TEXT NOT NULL,
            user_id TEXT NOT NULL DEFAULT '',
            weight DOUBLE PRECISION NOT NULL,
            coactivations INTEGER NOT NULL DEFAULT 0,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL,
            PRIMARY KEY (src_id, dst_id, user_id)
        )"
        .to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS temporal_facts (
                    id TEXT PRIMARY KEY,
                    user_id TEXT,
                    subject TEXT NOT NULL,
                    predicate TEXT NOT NULL,
                    object TEXT NOT NULL,
                    valid_from BIGINT NOT NULL,
                    valid_to BIGINT,
                    confidence DOUBLE PRECISION NOT NULL,
                    metadata {json},
                    created_at BIGINT NOT NULL,
                    UNIQUE (user_id, subject, predicate, object, valid_from)
                )"
        ),
        "CREATE TABLE IF NOT EXISTS temporal_edges (
            id TEXT PRIMARY KEY,
            src_fact_id TEXT NOT NULL,
            dst_fact_id TEXT NOT NULL,
            relation TEXT NOT NULL,
            weight DOUBLE PRECISION NOT NULL,
            valid_from BIGINT NOT NULL,
            valid_to BIGINT
        )"
        .to_string(),
        "CREATE TABLE IF NOT EXISTS embed_logs (
            id TEXT PRIMARY KEY,
            memory_id TEXT,
            status TEXT NOT NULL,
            model TEXT NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL,
            error TEXT
        )"
        .to_string(),
        "CREATE TABLE IF NOT EXISTS ops_log (
            id TEXT PRIMARY KEY,
            op TEXT NOT NULL,
            started_at BIGINT NOT NULL,
            finished_at BIGINT,
            affected BIGINT NOT NULL DEFAULT 0,
            detail TEXT
        )"
        .to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS classifier_models (
                    user_id TEXT PRIMARY KEY,
                    weights {json} NOT NULL,
                    biases {json} NOT NULL,
                    dim INTEGER NOT NULL,
                    version BIGINT NOT NULL,
                    updated_at BIGINT NOT NULL
                )"
        ),
    ]
}

fn index_statements(dialect: SqlDialect) -> Vec<&'static str> {
    let mut stmts = vec![
        "CREATE INDEX IF NOT EXISTS idx_memories_user ON memories (user_id)",
        "CREATE INDEX IF NOT EXISTS idx_memories_user_sector ON memories (user_id, primary_sector)",
        "CREATE INDEX IF NOT EXISTS idx_memories_user_seen ON memories (user_id, last_seen_at)",
        "CREATE INDEX IF NOT EXISTS idx_memories_simhash ON memories (simhash)",
        "CREATE INDEX IF NOT EXISTS idx_waypoints_src_dst ON waypoints (src_id, dst_id)",
        "CREATE INDEX IF NOT EXISTS idx_vectors_sector ON sector_vectors (sector, user_id)",
        "CREATE INDEX IF NOT EXISTS idx_facts_subject ON temporal_facts (user_id, subject, predicate)",
    ];
    if dialect == SqlDialect::Postgres {
        stmts.push(
            "CREATE INDEX IF NOT EXISTS idx_memories_metadata ON memories USING GIN (metadata jsonb_path_ops)",
        );
    }
    stmts
}

/// Add a column when an existing deployment predates it.
async fn ensure_column(
    exec: &dyn SqlExecutor,
    table: &str,
    column: &str,
    ddl: &str,
) -> EngramResult<()> {
    let present = match exec.dialect() {
        SqlDialect::Sqlite => {
            let row = exec
                .get(
                    "SELECT COUNT(*) AS n FROM pragma_table_info(?) WHERE name = ?",
                    &params![table, column],
                )
                .await?;
            row.map(|r| r.i64("n").unwrap_or(0)).unwrap_or(0) > 0
        }
        SqlDialect::Postgres => {
            let row = exec
                .get(
                    "SELECT COUNT(*) AS n FROM information_schema.columns
                     WHERE table_name = ? AND column_name = ?",
                    &params![table, column],
                )
                .await?;
            row.map(|r| r.i64("n").unwrap_or(0)).unwrap_or(0) > 0
        }
    };

    if !present {
        debug!(table, column, "adding missing column");
        exec.run(&format!("ALTER TABLE {table} ADD COLUMN {column} {ddl}"), &[])
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaStore;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let store = MetaStore::open_in_memory().await.unwrap();
        // open() already ran them once; run again.
        run_migrations(&store).await.unwrap();
        run_migrations(&store).await.unwrap();
    }

    #[tokio::test]
    async fn all_tables_exist() {
        let store = MetaStore::open_in_memory().await.unwrap();
        for table in [
            "memories",
            "sector_vectors",
            "waypoints",
            "temporal_facts",
            "temporal_edges",
            "embed_logs",
            "ops_log",
            "classifier_models",
        ] {
            let row = store
                .get(
                    "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?",
                    &params![table],
                )
                .await
                .unwrap()
                .unwrap();
            assert_eq!(row.i64("n").unwrap(), 1, "table {table} missing");
        }
    }

    #[tokio::test]
    async fn ensure_column_adds_to_old_schema() {
        let store = MetaStore::open_in_memory().await.unwrap();
        store
            .run("CREATE TABLE legacy (id TEXT PRIMARY KEY)", &[])
            .await
            .unwrap();
        ensure_column(&store, "legacy", "extra", "TEXT").await.unwrap();
        // Second call is a no-op.
        ensure_column(&store, "legacy", "extra", "TEXT").await.unwrap();
        store
            .run("INSERT INTO legacy (id, extra) VALUES (?, ?)", &params!["a", "b"])
            .await
            .unwrap();
    }
}
