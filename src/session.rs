//! Logged-in user context.
//!
//! The session is an explicit value: `login` creates it, `logout` clears it,
//! and `restore` rebuilds it at start-up from the persisted preferences.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::{PreferenceRepository, Storage, StorageResult, User};

pub const IS_LOGGED_IN_KEY: &str = "is_logged_in";
pub const CURRENT_USERNAME_KEY: &str = "current_username";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub name: String,
}

impl From<User> for Session {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            name: user.name,
        }
    }
}

impl Session {
    /// Remembers this user across restarts.
    pub fn persist(&self, conn: &Connection) -> StorageResult<()> {
        PreferenceRepository::set_internal(conn, IS_LOGGED_IN_KEY, "true")?;
        PreferenceRepository::set_internal(conn, CURRENT_USERNAME_KEY, &self.username)?;
        info!(username = %self.username, "session started");
        Ok(())
    }

    pub fn clear(conn: &Connection) -> StorageResult<()> {
        PreferenceRepository::set_internal(conn, IS_LOGGED_IN_KEY, "false")?;
        PreferenceRepository::remove_internal(conn, CURRENT_USERNAME_KEY)?;
        info!("session cleared");
        Ok(())
    }

    /// The persisted session, if the user is still logged in and still exists.
    pub fn restore(storage: &Storage) -> StorageResult<Option<Self>> {
        let conn = storage.get_connection()?;
        let logged_in = PreferenceRepository::get_internal(&conn, IS_LOGGED_IN_KEY)?
            .map(|v| v == "true")
            .unwrap_or(false);
        if !logged_in {
            return Ok(None);
        }

        let Some(username) = PreferenceRepository::get_internal(&conn, CURRENT_USERNAME_KEY)? else {
            return Ok(None);
        };
        let session = User::find_by_username(&conn, &username)?.map(Session::from);
        if session.is_none() {
            debug!(username = %username, "persisted user no longer exists");
        }
        Ok(session)
    }
}
