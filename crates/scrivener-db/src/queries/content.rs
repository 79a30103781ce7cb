use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};
use scrivener_types::models::ArtifactSort;

use super::OptionalExt;
use crate::models::{ArtifactCounts, ArtifactRow};
use crate::{Database, now_timestamp};

/// Filter for archive listings.
#[derive(Debug, Clone, Default)]
pub struct ArtifactQuery {
    pub content_type_id: Option<i64>,
    pub favorite_only: bool,
    /// Case-insensitive substring over prompt and generated text.
    pub search: Option<String>,
    pub sort: ArtifactSort,
    pub limit: u32,
}

/// Columns of an artifact about to be stored.
#[derive(Debug, Clone, Copy)]
pub struct NewArtifact<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub session_id: Option<&'a str>,
    pub content_type_id: i64,
    pub prompt: &'a str,
    pub generated_text: &'a str,
    pub tone: &'a str,
    pub length: &'a str,
}

const ARTIFACT_COLUMNS: &str = "id, user_id, session_id, content_type_id, prompt, generated_text, \
                                tone, length_preference, is_favorite, created_at";

impl Database {
    // -- Generated content --

    #[allow(clippy::too_many_arguments)]
    pub fn insert_artifact(
        &self,
        id: &str,
        user_id: &str,
        session_id: Option<&str>,
        content_type_id: i64,
        prompt: &str,
        generated_text: &str,
        tone: &str,
        length: &str,
    ) -> Result<()> {
        let artifact = NewArtifact {
            id,
            user_id,
            session_id,
            content_type_id,
            prompt,
            generated_text,
            tone,
            length,
        };
        self.with_conn_mut(|conn| insert_artifact_row(conn, &artifact))
    }

    pub fn get_artifact(&self, id: &str) -> Result<Option<ArtifactRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {ARTIFACT_COLUMNS} FROM generated_content WHERE id = ?1"),
                [id],
                map_artifact,
            )
            .optional()
        })
    }

    pub fn list_artifacts(&self, user_id: &str, query: &ArtifactQuery) -> Result<Vec<ArtifactRow>> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {ARTIFACT_COLUMNS} FROM generated_content WHERE user_id = ?");
            let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(user_id.to_string())];

            if let Some(ct) = query.content_type_id {
                sql.push_str(" AND content_type_id = ?");
                params.push(Box::new(ct));
            }
            if query.favorite_only {
                sql.push_str(" AND is_favorite = 1");
            }
            if let Some(needle) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                sql.push_str(" AND (instr(fold_case(prompt), ?) > 0 OR instr(fold_case(generated_text), ?) > 0)");
                let needle = needle.to_lowercase();
                params.push(Box::new(needle.clone()));
                params.push(Box::new(needle));
            }

            sql.push_str(match query.sort {
                ArtifactSort::Recent => " ORDER BY created_at DESC, rowid DESC",
                ArtifactSort::Oldest => " ORDER BY created_at ASC, rowid ASC",
                ArtifactSort::Favorites => " ORDER BY is_favorite DESC, created_at DESC, rowid DESC",
            });
            sql.push_str(" LIMIT ?");
            params.push(Box::new(query.limit));

            let mut stmt = conn.prepare(&sql)?;
            let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let rows = stmt
                .query_map(refs.as_slice(), map_artifact)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip the favorite flag. Returns the new value, or `None` if no such artifact.
    pub fn toggle_favorite(&self, id: &str) -> Result<Option<bool>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "UPDATE generated_content SET is_favorite = NOT is_favorite
                 WHERE id = ?1
                 RETURNING is_favorite",
                [id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn artifact_counts(&self, user_id: &str) -> Result<ArtifactCounts> {
        self.with_conn(|conn| {
            let (total, favorites): (u32, u32) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_favorite), 0) FROM generated_content WHERE user_id = ?1",
                [user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let mut stmt = conn.prepare(
                "SELECT content_type_id, COUNT(*) FROM generated_content
                 WHERE user_id = ?1
                 GROUP BY content_type_id
                 ORDER BY content_type_id",
            )?;
            let by_content_type = stmt
                .query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare("SELECT generated_text FROM generated_content WHERE user_id = ?1")?;
            let mut rows = stmt.query([user_id])?;
            let mut total_words: u64 = 0;
            while let Some(row) = rows.next()? {
                let text: String = row.get(0)?;
                total_words += text.split_whitespace().count() as u64;
            }

            Ok(ArtifactCounts {
                total,
                favorites,
                total_words,
                by_content_type,
            })
        })
    }
}

pub(crate) fn insert_artifact_row(conn: &Connection, artifact: &NewArtifact<'_>) -> Result<()> {
    conn.execute(
        "INSERT INTO generated_content
         (id, user_id, session_id, content_type_id, prompt, generated_text, tone, length_preference, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            artifact.id,
            artifact.user_id,
            artifact.session_id,
            artifact.content_type_id,
            artifact.prompt,
            artifact.generated_text,
            artifact.tone,
            artifact.length,
            now_timestamp()
        ],
    )?;
    Ok(())
}

fn map_artifact(row: &Row<'_>) -> rusqlite::Result<ArtifactRow> {
    Ok(ArtifactRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        content_type_id: row.get(3)?,
        prompt: row.get(4)?,
        generated_text: row.get(5)?,
        tone: row.get(6)?,
        length_preference: row.get(7)?,
        is_favorite: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::db_with_user;

    fn seed(db: &Database, uid: &str) {
        db.insert_artifact("a1", uid, None, 1, "rust post", "Rust is great", "casual", "short").unwrap();
        db.insert_artifact("a2", uid, None, 5, "blog on tea", "Green TEA rocks", "informative", "long").unwrap();
        db.insert_artifact("a3", uid, None, 1, "hiring post", "We are hiring", "professional", "medium").unwrap();
    }

    fn ids(rows: Vec<ArtifactRow>) -> Vec<String> {
        rows.into_iter().map(|r| r.id).collect()
    }

    #[test]
    fn listing_filters_and_orders() {
        let (db, uid) = db_with_user("a@x.com");
        seed(&db, &uid);
        let base = ArtifactQuery { limit: 100, ..Default::default() };

        assert_eq!(ids(db.list_artifacts(&uid, &base).unwrap()), vec!["a3", "a2", "a1"]);

        let oldest = ArtifactQuery { sort: ArtifactSort::Oldest, ..base.clone() };
        assert_eq!(ids(db.list_artifacts(&uid, &oldest).unwrap()), vec!["a1", "a2", "a3"]);

        let linkedin = ArtifactQuery { content_type_id: Some(1), ..base.clone() };
        assert_eq!(ids(db.list_artifacts(&uid, &linkedin).unwrap()), vec!["a3", "a1"]);

        let search = ArtifactQuery { search: Some("tea".into()), ..base.clone() };
        assert_eq!(ids(db.list_artifacts(&uid, &search).unwrap()), vec!["a2"]);

        let limited = ArtifactQuery { limit: 1, ..base };
        assert_eq!(ids(db.list_artifacts(&uid, &limited).unwrap()), vec!["a3"]);
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let (db, uid) = db_with_user("a@x.com");
        db.insert_artifact("fr", &uid, None, 1, "annonce", "Notre Équipe grandit", "casual", "short").unwrap();
        db.insert_artifact("de", &uid, None, 1, "ÜBER UNS", "Straße", "casual", "short").unwrap();

        let search = |needle: &str| {
            let query = ArtifactQuery { search: Some(needle.into()), limit: 100, ..Default::default() };
            ids(db.list_artifacts(&uid, &query).unwrap())
        };
        assert_eq!(search("Équipe"), vec!["fr"]);
        assert_eq!(search("ÉQUIPE"), vec!["fr"]);
        assert_eq!(search("équipe"), vec!["fr"]);
        assert_eq!(search("über"), vec!["de"]);
        assert!(search("equipe").is_empty());
    }

    #[test]
    fn favorites_toggle_and_sort() {
        let (db, uid) = db_with_user("a@x.com");
        seed(&db, &uid);

        assert_eq!(db.toggle_favorite("a1").unwrap(), Some(true));
        assert_eq!(db.toggle_favorite("missing").unwrap(), None);

        let favs = ArtifactQuery { favorite_only: true, limit: 100, ..Default::default() };
        assert_eq!(ids(db.list_artifacts(&uid, &favs).unwrap()), vec!["a1"]);

        let sorted = ArtifactQuery { sort: ArtifactSort::Favorites, limit: 100, ..Default::default() };
        assert_eq!(ids(db.list_artifacts(&uid, &sorted).unwrap()), vec!["a1", "a3", "a2"]);

        assert_eq!(db.toggle_favorite("a1").unwrap(), Some(false));
    }

    #[test]
    fn counts_group_by_type() {
        let (db, uid) = db_with_user("a@x.com");
        seed(&db, &uid);
        db.toggle_favorite("a2").unwrap();

        let counts = db.artifact_counts(&uid).unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.favorites, 1);
        assert_eq!(counts.total_words, 9);
        assert_eq!(counts.by_content_type, vec![(1, 2), (5, 1)]);
    }
}
