use anyhow::Result;
use rusqlite::{Connection, Row};

use super::{OptionalExt, is_unique_violation};
use crate::models::{ContentTypeRow, UserRow};
use crate::{Database, now_timestamp};

const USER_COLUMNS: &str = "id, email, password_hash, salt, iterations, display_name, \
                            profile_picture_url, created_at, updated_at";

impl Database {
    // -- Users --

    /// Insert a user. Returns `false` when the email is already registered.
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        salt: &str,
        iterations: u32,
        display_name: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let now = now_timestamp();
            let res = conn.execute(
                "INSERT INTO users (id, email, password_hash, salt, iterations, display_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![id, email, password_hash, salt, iterations, display_name, now],
            );
            match res {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn update_user_password(
        &self,
        id: &str,
        password_hash: &str,
        salt: &str,
        iterations: u32,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password_hash = ?1, salt = ?2, iterations = ?3, updated_at = ?4
                 WHERE id = ?5",
                rusqlite::params![password_hash, salt, iterations, now_timestamp(), id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Absent fields keep their current value.
    pub fn update_user_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        profile_picture_url: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET display_name = COALESCE(?1, display_name),
                     profile_picture_url = COALESCE(?2, profile_picture_url),
                     updated_at = ?3
                 WHERE id = ?4",
                rusqlite::params![display_name, profile_picture_url, now_timestamp(), id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn user_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Content types --

    pub fn list_content_types(&self) -> Result<Vec<ContentTypeRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, slug, name, description FROM content_types ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ContentTypeRow {
                        id: row.get(0)?,
                        slug: row.get(1)?,
                        name: row.get(2)?,
                        description: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is one of two literals above, never caller input.
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], map_user).optional()?;
    Ok(row)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        salt: row.get(3)?,
        iterations: row.get(4)?,
        display_name: row.get(5)?,
        profile_picture_url: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn duplicate_email_is_reported_case_insensitively() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.create_user("u1", "a@x.com", "h", "s", 1, None).unwrap());
        assert!(!db.create_user("u2", "A@X.com", "h", "s", 1, None).unwrap());
    }

    #[test]
    fn lookup_by_email_ignores_case() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "a@x.com", "h", "s", 7, Some("Ann")).unwrap();
        let row = db.get_user_by_email("A@x.COM").unwrap().unwrap();
        assert_eq!(row.id, "u1");
        assert_eq!(row.iterations, 7);
        assert_eq!(row.display_name.as_deref(), Some("Ann"));
    }

    #[test]
    fn profile_update_keeps_absent_fields() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "a@x.com", "h", "s", 1, Some("Ann")).unwrap();
        assert!(db.update_user_profile("u1", None, Some("https://img/a.png")).unwrap());

        let row = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(row.display_name.as_deref(), Some("Ann"));
        assert_eq!(row.profile_picture_url.as_deref(), Some("https://img/a.png"));
        assert!(!db.update_user_profile("missing", Some("x"), None).unwrap());
    }

    #[test]
    fn debug_hides_verifier() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "a@x.com", "deadbeefhash", "cafesalt", 1, None).unwrap();
        let row = db.get_user_by_id("u1").unwrap().unwrap();
        let rendered = format!("{row:?}");
        assert!(!rendered.contains("deadbeefhash"));
        assert!(!rendered.contains("cafesalt"));
    }

    #[test]
    fn content_types_listed_by_name() {
        let db = Database::open_in_memory().unwrap();
        let names: Vec<String> = db.list_content_types().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names.len(), 6);
        assert_eq!(names.first().map(String::as_str), Some("Ad Content"));
        assert_eq!(names.last().map(String::as_str), Some("Social Media Caption"));
    }
}
