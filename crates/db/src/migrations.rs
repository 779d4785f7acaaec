//! Inline SQL migrations for the local store schema (§4.1, §3).
///
/// Tracked via a `_migrations` table so each statement runs exactly once,
/// the same way as a plain single-file migration log.
pub const MIGRATIONS: &[&str] = &[
    // Migration 1: sessions
    r#"
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    external_id TEXT NOT NULL,
    title TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    synced_at TEXT,
    content_hash TEXT NOT NULL,
    UNIQUE(source, external_id)
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_sessions_synced_at ON sessions(synced_at);"#,
    // Migration 2: messages
    r#"
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    token_count INTEGER,
    UNIQUE(session_id, role, created_at)
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);"#,
    // Migration 3: observations
    r#"
CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    observation_type TEXT NOT NULL,
    tool_name TEXT,
    file_path TEXT,
    content TEXT NOT NULL,
    token_count INTEGER,
    sequence_number INTEGER NOT NULL,
    parent_observation_id INTEGER REFERENCES observations(id),
    created_at TEXT NOT NULL,
    UNIQUE(session_id, sequence_number)
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_observations_session ON observations(session_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_observations_type ON observations(observation_type);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_observations_parent ON observations(parent_observation_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_observations_file_path ON observations(file_path);"#,
    // Migration 4: sync ledger
    r#"
CREATE TABLE IF NOT EXISTS sync_ledger (
    source TEXT NOT NULL,
    external_id TEXT NOT NULL,
    last_synced_at TEXT,
    doc_service_id TEXT,
    memory_synced INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (source, external_id)
);
"#,
    // Migration 5: full-text index over messages, kept in sync by triggers
    // rather than re-indexed from the application (§4.1).
    r#"
CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
    content,
    content='messages',
    content_rowid='id'
);
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS messages_fts_ai AFTER INSERT ON messages BEGIN
    INSERT INTO messages_fts(rowid, content) VALUES (new.id, new.content);
END;
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS messages_fts_ad AFTER DELETE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content) VALUES ('delete', old.id, old.content);
END;
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS messages_fts_au AFTER UPDATE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content) VALUES ('delete', old.id, old.content);
    INSERT INTO messages_fts(rowid, content) VALUES (new.id, new.content);
END;
"#,
    // Migration 6: full-text index over observations, same trigger scheme.
    r#"
CREATE VIRTUAL TABLE IF NOT EXISTS observations_fts USING fts5(
    content,
    content='observations',
    content_rowid='id'
);
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS observations_fts_ai AFTER INSERT ON observations BEGIN
    INSERT INTO observations_fts(rowid, content) VALUES (new.id, new.content);
END;
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS observations_fts_ad AFTER DELETE ON observations BEGIN
    INSERT INTO observations_fts(observations_fts, rowid, content) VALUES ('delete', old.id, old.content);
END;
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS observations_fts_au AFTER UPDATE ON observations BEGIN
    INSERT INTO observations_fts(observations_fts, rowid, content) VALUES ('delete', old.id, old.content);
    INSERT INTO observations_fts(rowid, content) VALUES (new.id, new.content);
END;
"#,
];
