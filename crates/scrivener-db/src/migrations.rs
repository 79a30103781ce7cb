use anyhow::Result;
use rusqlite::Connection;
use scrivener_types::models::ContentType;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                email               TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash       TEXT NOT NULL,
                salt                TEXT NOT NULL,
                iterations          INTEGER NOT NULL,
                display_name        TEXT,
                profile_picture_url TEXT,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE TABLE content_types (
                id          INTEGER PRIMARY KEY,
                slug        TEXT NOT NULL UNIQUE,
                name        TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL
            );

            CREATE TABLE chat_sessions (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content_type_id INTEGER REFERENCES content_types(id),
                title           TEXT NOT NULL,
                activity        INTEGER NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_chat_sessions_user
                ON chat_sessions(user_id, activity);

            CREATE TABLE chat_messages (
                id          TEXT PRIMARY KEY,
                session_id  TEXT NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
                seq         INTEGER NOT NULL,
                role        TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(session_id, seq)
            );

            CREATE TABLE generated_content (
                id                TEXT PRIMARY KEY,
                user_id           TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                session_id        TEXT REFERENCES chat_sessions(id) ON DELETE SET NULL,
                content_type_id   INTEGER NOT NULL REFERENCES content_types(id),
                prompt            TEXT NOT NULL,
                generated_text    TEXT NOT NULL,
                tone              TEXT NOT NULL,
                length_preference TEXT NOT NULL,
                is_favorite       INTEGER NOT NULL DEFAULT 0,
                created_at        TEXT NOT NULL
            );

            CREATE INDEX idx_generated_content_user
                ON generated_content(user_id, created_at);

            CREATE TABLE user_preferences (
                user_id        TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                default_tone   TEXT NOT NULL,
                default_length TEXT NOT NULL,
                theme          TEXT NOT NULL,
                updated_at     TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;

        seed_content_types(conn)?;
    }

    info!("Database migrations complete");
    Ok(())
}

fn seed_content_types(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO content_types (id, slug, name, description) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for ct in ContentType::ALL {
        stmt.execute(rusqlite::params![ct.id(), ct.slug(), ct.name(), ct.description()])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent_and_seed_six_types() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM content_types", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 6);

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
