use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_status(s: &str) -> AccessRequestStatus {
    AccessRequestStatus::parse(s).unwrap_or_else(|| {
        tracing::error!("Invalid access request status in database: '{}'", s);
        AccessRequestStatus::Pending
    })
}

const USER_COLUMNS: &str = "id, username, password_hash, email, is_staff, is_superuser, date_joined";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        email: row.get(3)?,
        is_staff: row.get(4)?,
        is_superuser: row.get(5)?,
        date_joined: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<AccessRequest> {
    Ok(AccessRequest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        status: parse_status(&row.get::<_, String>(2)?),
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        responded_at: row.get::<_, Option<String>>(4)?.map(|s| parse_datetime(&s)),
        note: row.get(5)?,
    })
}

const REQUEST_COLUMNS: &str = "id, user_id, status, created_at, responded_at, note";

fn get_user_tx(conn: &Connection, id: &str) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        user_from_row,
    )
    .optional()
    .map_err(Error::from)
}

fn count_other_superusers(conn: &Connection, excluding_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE is_superuser = 1 AND id != ?1",
        params![excluding_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, username, password_hash, email, is_staff, is_superuser, date_joined)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.username,
                user.password_hash,
                user.email,
                // Superuser implies staff, even at insert time
                user.is_staff || user.is_superuser,
                user.is_superuser,
                format_datetime(&user.date_joined),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        get_user_tx(&self.conn(), id)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![cursor, limit], user_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET username = ?1, password_hash = ?2, email = ?3 WHERE id = ?4",
            params![user.username, user.password_hash, user.email, user.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn set_staff_flag(&self, id: &str, value: bool) -> Result<()> {
        // The privilege floor rides in the same statement: a target promoted
        // between the caller's read and this write still keeps is_staff.
        let rows = self.conn().execute(
            "UPDATE users SET is_staff = CASE WHEN is_superuser = 1 THEN 1 ELSE ?1 END
             WHERE id = ?2",
            params![value, id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn set_superuser_flag(&self, id: &str, value: bool) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let user = get_user_tx(&tx, id)?.ok_or(Error::NotFound)?;

        if user.is_superuser && !value && count_other_superusers(&tx, id)? == 0 {
            return Err(Error::InvariantViolation(
                "cannot remove the last superuser".to_string(),
            ));
        }

        if value {
            // Promotion also raises the privilege floor: superuser implies staff
            tx.execute(
                "UPDATE users SET is_superuser = 1, is_staff = 1 WHERE id = ?1",
                params![id],
            )?;
        } else {
            tx.execute(
                "UPDATE users SET is_superuser = 0 WHERE id = ?1",
                params![id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let user = match get_user_tx(&tx, id)? {
            Some(u) => u,
            None => return Ok(false),
        };

        if user.is_superuser && count_other_superusers(&tx, id)? == 0 {
            return Err(Error::InvariantViolation(
                "cannot delete the last superuser".to_string(),
            ));
        }

        let rows = tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    fn has_superuser(&self) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE is_superuser = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Profile operations

    fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT user_id, avatar FROM profiles WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(Profile {
                    user_id: row.get(0)?,
                    avatar: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn ensure_profile(&self, user_id: &str, avatar: &str) -> Result<Profile> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT avatar FROM profiles WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        let profile = match existing {
            Some(current) if !current.is_empty() => Profile {
                user_id: user_id.to_string(),
                avatar: current,
            },
            Some(_) => {
                tx.execute(
                    "UPDATE profiles SET avatar = ?1 WHERE user_id = ?2",
                    params![avatar, user_id],
                )?;
                Profile {
                    user_id: user_id.to_string(),
                    avatar: avatar.to_string(),
                }
            }
            None => {
                tx.execute(
                    "INSERT INTO profiles (user_id, avatar) VALUES (?1, ?2)",
                    params![user_id, avatar],
                )?;
                Profile {
                    user_id: user_id.to_string(),
                    avatar: avatar.to_string(),
                }
            }
        };

        tx.commit()?;
        Ok(profile)
    }

    // Client operations

    fn create_client(&self, client: &Client) -> Result<()> {
        self.conn().execute(
            "INSERT INTO clients (id, name, company, email, phone, notes, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                client.id,
                client.name,
                client.company,
                client.email,
                client.phone,
                client.notes,
                client.created_by,
                format_datetime(&client.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_client(&self, id: &str) -> Result<Option<Client>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, company, email, phone, notes, created_by, created_at
             FROM clients WHERE id = ?1",
            params![id],
            |row| {
                Ok(Client {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    company: row.get(2)?,
                    email: row.get(3)?,
                    phone: row.get(4)?,
                    notes: row.get(5)?,
                    created_by: row.get(6)?,
                    created_at: parse_datetime(&row.get::<_, String>(7)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_clients(&self) -> Result<Vec<Client>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, company, email, phone, notes, created_by, created_at
             FROM clients ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Client {
                id: row.get(0)?,
                name: row.get(1)?,
                company: row.get(2)?,
                email: row.get(3)?,
                phone: row.get(4)?,
                notes: row.get(5)?,
                created_by: row.get(6)?,
                created_at: parse_datetime(&row.get::<_, String>(7)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_client(&self, client: &Client) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE clients SET name = ?1, company = ?2, email = ?3, phone = ?4, notes = ?5
             WHERE id = ?6",
            params![
                client.name,
                client.company,
                client.email,
                client.phone,
                client.notes,
                client.id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_client(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM clients WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Record operations

    fn create_record(&self, record: &Record) -> Result<()> {
        self.conn().execute(
            "INSERT INTO records (id, title, category, notes, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.title,
                record.category,
                record.notes,
                record.created_by,
                format_datetime(&record.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_record(&self, id: &str) -> Result<Option<Record>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, title, category, notes, created_by, created_at
             FROM records WHERE id = ?1",
            params![id],
            |row| {
                Ok(Record {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    category: row.get(2)?,
                    notes: row.get(3)?,
                    created_by: row.get(4)?,
                    created_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_records(&self) -> Result<Vec<Record>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, title, category, notes, created_by, created_at
             FROM records ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Record {
                id: row.get(0)?,
                title: row.get(1)?,
                category: row.get(2)?,
                notes: row.get(3)?,
                created_by: row.get(4)?,
                created_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_record(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM records WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Access request operations

    fn get_access_request(&self, id: &str) -> Result<Option<AccessRequest>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {REQUEST_COLUMNS} FROM access_requests WHERE id = ?1"),
            params![id],
            request_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn find_pending_request(&self, user_id: &str) -> Result<Option<AccessRequest>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {REQUEST_COLUMNS} FROM access_requests
                 WHERE user_id = ?1 AND status = 'pending'
                 ORDER BY created_at DESC LIMIT 1"
            ),
            params![user_id],
            request_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn latest_access_request(&self, user_id: &str) -> Result<Option<AccessRequest>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {REQUEST_COLUMNS} FROM access_requests
                 WHERE user_id = ?1
                 ORDER BY created_at DESC LIMIT 1"
            ),
            params![user_id],
            request_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_access_requests(
        &self,
        status: Option<AccessRequestStatus>,
    ) -> Result<Vec<AccessRequest>> {
        let conn = self.conn();

        let (sql, filter) = match status {
            Some(s) => (
                format!(
                    "SELECT {REQUEST_COLUMNS} FROM access_requests
                     WHERE status = ?1 ORDER BY created_at DESC"
                ),
                Some(s.as_str()),
            ),
            None => (
                format!("SELECT {REQUEST_COLUMNS} FROM access_requests ORDER BY created_at DESC"),
                None,
            ),
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = match filter {
            Some(s) => stmt.query_map(params![s], request_from_row)?,
            None => stmt.query_map([], request_from_row)?,
        };

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn request_access(
        &self,
        user_id: &str,
        note: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessRequest> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let existing = tx
            .query_row(
                &format!(
                    "SELECT {REQUEST_COLUMNS} FROM access_requests
                     WHERE user_id = ?1 AND status = 'pending'
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![user_id],
                request_from_row,
            )
            .optional()?;

        if let Some(request) = existing {
            return Ok(request);
        }

        let request = AccessRequest {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            status: AccessRequestStatus::Pending,
            created_at: now,
            responded_at: None,
            note: note.to_string(),
        };

        tx.execute(
            "INSERT INTO access_requests (id, user_id, status, created_at, responded_at, note)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![
                request.id,
                request.user_id,
                request.status.as_str(),
                format_datetime(&request.created_at),
                request.note,
            ],
        )?;

        tx.commit()?;
        Ok(request)
    }

    fn approve_access_request(&self, id: &str, now: DateTime<Utc>) -> Result<AccessRequest> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut request = tx
            .query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM access_requests WHERE id = ?1"),
                params![id],
                request_from_row,
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        if request.status.is_terminal() {
            return Err(Error::InvalidState(format!(
                "request is already {}",
                request.status.as_str()
            )));
        }

        tx.execute(
            "UPDATE access_requests SET status = 'approved', responded_at = ?1 WHERE id = ?2",
            params![format_datetime(&now), id],
        )?;

        // Approval is the one self-service path to staff
        tx.execute(
            "UPDATE users SET is_staff = 1 WHERE id = ?1",
            params![request.user_id],
        )?;

        tx.commit()?;

        request.status = AccessRequestStatus::Approved;
        request.responded_at = Some(now);
        Ok(request)
    }

    fn deny_access_request(&self, id: &str, now: DateTime<Utc>) -> Result<AccessRequest> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut request = tx
            .query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM access_requests WHERE id = ?1"),
                params![id],
                request_from_row,
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        if request.status.is_terminal() {
            return Err(Error::InvalidState(format!(
                "request is already {}",
                request.status.as_str()
            )));
        }

        tx.execute(
            "UPDATE access_requests SET status = 'denied', responded_at = ?1 WHERE id = ?2",
            params![format_datetime(&now), id],
        )?;

        tx.commit()?;

        request.status = AccessRequestStatus::Denied;
        request.responded_at = Some(now);
        Ok(request)
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO sessions (id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id,
                session.token_hash,
                session.token_lookup,
                session.user_id,
                format_datetime(&session.created_at),
                session.expires_at.as_ref().map(format_datetime),
                session.last_used_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::SessionLookupCollision)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at
             FROM sessions WHERE token_lookup = ?1",
            params![lookup],
            |row| {
                Ok(Session {
                    id: row.get(0)?,
                    token_hash: row.get(1)?,
                    token_lookup: row.get(2)?,
                    user_id: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    expires_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
                    last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_session_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Flash queue operations

    fn push_flash(&self, session_id: &str, level: FlashLevel, message: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO flash_messages (session_id, level, message, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id,
                level.as_str(),
                message,
                format_datetime(&Utc::now())
            ],
        )?;
        Ok(())
    }

    fn take_flash(&self, session_id: &str) -> Result<Vec<FlashMessage>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let messages = {
            let mut stmt = tx.prepare(
                "SELECT level, message FROM flash_messages
                 WHERE session_id = ?1 ORDER BY id",
            )?;

            let rows = stmt.query_map(params![session_id], |row| {
                let level: String = row.get(0)?;
                Ok(FlashMessage {
                    level: FlashLevel::parse(&level).unwrap_or(FlashLevel::Info),
                    message: row.get(1)?,
                })
            })?;

            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        tx.execute(
            "DELETE FROM flash_messages WHERE session_id = ?1",
            params![session_id],
        )?;

        tx.commit()?;
        Ok(messages)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
