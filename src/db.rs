// ==========================================
// 市场主体关系引擎 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为 (外键 / busy_timeout)
// - 幂等建表,并记录 schema_version
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER NOT NULL PRIMARY KEY,
    applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id    TEXT NOT NULL,
    key         TEXT NOT NULL,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS actor (
    actor_id      TEXT NOT NULL PRIMARY KEY,
    actor_number  TEXT NOT NULL UNIQUE,
    status        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS actor_role (
    actor_id  TEXT NOT NULL REFERENCES actor(actor_id),
    role      TEXT NOT NULL,
    PRIMARY KEY (actor_id, role)
);

CREATE TABLE IF NOT EXISTS actor_grid_area (
    actor_id   TEXT NOT NULL REFERENCES actor(actor_id),
    grid_area  TEXT NOT NULL,
    PRIMARY KEY (actor_id, grid_area)
);

CREATE TABLE IF NOT EXISTS balance_responsibility_relations (
    energy_supplier_id  TEXT NOT NULL PRIMARY KEY REFERENCES actor(actor_id),
    revision            INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS balance_responsibility_period (
    period_id               TEXT NOT NULL PRIMARY KEY,
    energy_supplier_id      TEXT NOT NULL REFERENCES balance_responsibility_relations(energy_supplier_id),
    balance_responsible_id  TEXT NOT NULL REFERENCES actor(actor_id),
    grid_area               TEXT NOT NULL,
    metering_point_type     TEXT NOT NULL,
    valid_from              TEXT NOT NULL,
    valid_to                TEXT,
    closed_at               TEXT
);

CREATE INDEX IF NOT EXISTS idx_brp_period_supplier
    ON balance_responsibility_period(energy_supplier_id, valid_from);

CREATE TABLE IF NOT EXISTS process_delegation (
    delegation_id  TEXT NOT NULL PRIMARY KEY,
    delegator_id   TEXT NOT NULL REFERENCES actor(actor_id),
    message_type   TEXT NOT NULL,
    revision       INTEGER NOT NULL,
    UNIQUE (delegator_id, message_type)
);

CREATE TABLE IF NOT EXISTS delegation_period (
    period_id         TEXT NOT NULL PRIMARY KEY,
    delegation_id     TEXT NOT NULL REFERENCES process_delegation(delegation_id),
    delegated_to_id   TEXT NOT NULL REFERENCES actor(actor_id),
    grid_area         TEXT NOT NULL,
    starts_at         TEXT NOT NULL,
    stops_at          TEXT,
    closed_at         TEXT
);

CREATE TABLE IF NOT EXISTS unrecognized_actor (
    actor_number   TEXT NOT NULL PRIMARY KEY,
    first_seen_at  TEXT NOT NULL,
    last_seen_at   TEXT NOT NULL,
    occurrences    INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS domain_event (
    event_id       TEXT NOT NULL PRIMARY KEY,
    event_type     TEXT NOT NULL,
    recipient_id   TEXT NOT NULL,
    payload_json   TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    dispatched_at  TEXT
);

CREATE INDEX IF NOT EXISTS idx_domain_event_pending
    ON domain_event(dispatched_at, created_at);
"#;

/// 幂等建表并记录 schema_version
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    if let Some(version) = read_schema_version(conn)? {
        if version > CURRENT_SCHEMA_VERSION {
            tracing::warn!(
                "数据库 schema_version={} 高于程序期望的 {},可能由更新版本创建",
                version,
                CURRENT_SCHEMA_VERSION
            );
        }
    }
    Ok(())
}
