//! SQLite implementation of [`NetworkStore`].
//!
//! [`SqliteStore`] persists networks in a SQLite database with WAL mode,
//! a transaction around every write and automatic schema migrations.
//! Snapshots, group states and contents are stored as JSON TEXT columns via
//! serde_json. Each write bumps the network's `seq` counter, which orders the
//! partial saves for composition on load.

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::Value;

use bassline_core::{ContactId, GroupId, GroupState, NetworkState};

use crate::convert::compose;
use crate::error::StorageError;
use crate::traits::NetworkStore;
use crate::types::NetworkId;

/// SQLite-backed implementation of [`NetworkStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::connect(path)?;
        tracing::info!(path, "opened sqlite store");
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::connect_in_memory()?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Ensures the network row exists and returns the next sequence number.
    fn next_seq(tx: &Transaction<'_>, network: &NetworkId) -> Result<i64, StorageError> {
        tx.execute(
            "INSERT INTO networks (id) VALUES (?1) ON CONFLICT(id) DO NOTHING",
            params![network.as_str()],
        )?;
        tx.execute(
            "UPDATE networks SET seq = seq + 1 WHERE id = ?1",
            params![network.as_str()],
        )?;
        let seq = tx.query_row(
            "SELECT seq FROM networks WHERE id = ?1",
            params![network.as_str()],
            |row| row.get(0),
        )?;
        Ok(seq)
    }

    fn snapshot(&self, network: &NetworkId) -> Result<Option<NetworkState>, StorageError> {
        let text: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT snapshot FROM networks WHERE id = ?1",
                params![network.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match text.flatten() {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn stored_group(&self, network: &NetworkId, group: &GroupId) -> Result<Option<GroupState>, StorageError> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM group_states WHERE network_id = ?1 AND group_id = ?2",
                params![network.as_str(), group.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match text {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn stored_contents(&self, network: &NetworkId) -> Result<Vec<(ContactId, Value)>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT contact_id, content FROM contact_contents WHERE network_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![network.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut contents = Vec::new();
        for row in rows {
            let (id, text) = row?;
            contents.push((ContactId(id), serde_json::from_str(&text)?));
        }
        Ok(contents)
    }
}

impl NetworkStore for SqliteStore {
    fn save_contact_content(
        &mut self,
        network: &NetworkId,
        group: &GroupId,
        contact: &ContactId,
        content: &Value,
    ) -> Result<(), StorageError> {
        let text = serde_json::to_string(content)?;
        let tx = self.conn.transaction()?;
        let seq = Self::next_seq(&tx, network)?;
        tx.execute(
            "INSERT INTO contact_contents (network_id, contact_id, group_id, content, seq)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(network_id, contact_id)
             DO UPDATE SET group_id = excluded.group_id, content = excluded.content, seq = excluded.seq",
            params![network.as_str(), contact.as_str(), group.as_str(), text, seq],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load_contact_content(
        &self,
        network: &NetworkId,
        group: &GroupId,
        contact: &ContactId,
    ) -> Result<Option<Value>, StorageError> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT content FROM contact_contents WHERE network_id = ?1 AND contact_id = ?2",
                params![network.as_str(), contact.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(text) = text {
            return Ok(Some(serde_json::from_str(&text)?));
        }
        if let Some(gs) = self.stored_group(network, group)? {
            if let Some(c) = gs.contacts.get(contact) {
                return Ok(Some(c.content.clone()));
            }
        }
        Ok(self
            .snapshot(network)?
            .and_then(|s| s.get_contact(contact).map(|c| c.content.clone())))
    }

    fn save_group_state(&mut self, network: &NetworkId, state: &GroupState) -> Result<(), StorageError> {
        let text = serde_json::to_string(state)?;
        let tx = self.conn.transaction()?;
        let seq = Self::next_seq(&tx, network)?;
        tx.execute(
            "INSERT INTO group_states (network_id, group_id, state, seq)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(network_id, group_id)
             DO UPDATE SET state = excluded.state, seq = excluded.seq",
            params![network.as_str(), state.group.id.as_str(), text, seq],
        )?;
        // The group state already carries the newer contents.
        for contact_id in state.contacts.keys() {
            tx.execute(
                "DELETE FROM contact_contents WHERE network_id = ?1 AND contact_id = ?2",
                params![network.as_str(), contact_id.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn load_group_state(&self, network: &NetworkId, group: &GroupId) -> Result<Option<GroupState>, StorageError> {
        let mut state = match self.stored_group(network, group)? {
            Some(gs) => gs,
            None => match self.snapshot(network)?.and_then(|s| s.get_group(group).cloned()) {
                Some(gs) => gs,
                None => return Ok(None),
            },
        };
        for (contact_id, content) in self.stored_contents(network)? {
            if let Some(contact) = state.contacts.get_mut(&contact_id) {
                contact.content = content;
            }
        }
        Ok(Some(state))
    }

    fn save_network_state(&mut self, network: &NetworkId, state: &NetworkState) -> Result<(), StorageError> {
        let text = serde_json::to_string(state)?;
        let tx = self.conn.transaction()?;
        let seq = Self::next_seq(&tx, network)?;
        tx.execute(
            "UPDATE networks SET snapshot = ?2, seq = ?3 WHERE id = ?1",
            params![network.as_str(), text, seq],
        )?;
        tx.execute(
            "DELETE FROM group_states WHERE network_id = ?1",
            params![network.as_str()],
        )?;
        tx.execute(
            "DELETE FROM contact_contents WHERE network_id = ?1",
            params![network.as_str()],
        )?;
        tx.commit()?;
        tracing::debug!(network = %network, "saved network snapshot");
        Ok(())
    }

    fn load_network_state(&self, network: &NetworkId) -> Result<Option<NetworkState>, StorageError> {
        let Some(base) = self.snapshot(network)? else {
            return Ok(None);
        };
        let mut stmt = self
            .conn
            .prepare("SELECT state FROM group_states WHERE network_id = ?1 ORDER BY seq")?;
        let rows = stmt.query_map(params![network.as_str()], |row| row.get::<_, String>(0))?;
        let mut groups = Vec::new();
        for row in rows {
            groups.push(serde_json::from_str(&row?)?);
        }
        let contents = self.stored_contents(network)?;
        compose(base, groups, contents).map(Some)
    }

    fn list_networks(&self) -> Result<Vec<NetworkId>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT id FROM networks ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(NetworkId(row?));
        }
        Ok(ids)
    }

    fn delete_network(&mut self, network: &NetworkId) -> Result<(), StorageError> {
        let deleted = self
            .conn
            .execute("DELETE FROM networks WHERE id = ?1", params![network.as_str()])?;
        if deleted == 0 {
            return Err(StorageError::NetworkNotFound(network.to_string()));
        }
        Ok(())
    }
}
