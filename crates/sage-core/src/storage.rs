//! Session history storage
//!
//! Agents persist each completed exchange as a user/assistant message pair
//! keyed by session id, and replay the most recent pairs on the next run.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text, Timestamptz, Uuid as DieselUuid};
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::db::{validate_table_name, PgDatabase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl FromStr for MessageRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => bail!("unknown message role '{}'", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionMessage {
    pub id: Uuid,
    pub session_id: String,
    pub agent_id: String,
    pub user_id: Option<String>,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl SessionMessage {
    pub fn new(
        session_id: &str,
        agent_id: &str,
        user_id: Option<&str>,
        role: MessageRole,
        content: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            agent_id: agent_id.to_string(),
            user_id: user_id.map(str::to_string),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }
}

pub trait SessionStore: Send + Sync {
    fn table_name(&self) -> &str;

    /// Store `messages` together: either all of them are kept or none is
    fn append(&self, messages: &[SessionMessage]) -> Result<()>;

    /// Last `limit` messages of a session in insertion order
    fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<SessionMessage>>;
}

/// Session store backed by a PostgreSQL table
pub struct PgSessionStore {
    db: PgDatabase,
    table: String,
}

impl PgSessionStore {
    pub fn new(db: PgDatabase, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        db.ensure_table(
            table,
            &[
                format!(
                    "CREATE TABLE IF NOT EXISTS {table} (\
                     seq BIGSERIAL PRIMARY KEY, \
                     id UUID NOT NULL UNIQUE, \
                     session_id TEXT NOT NULL, \
                     agent_id TEXT NOT NULL, \
                     user_id TEXT, \
                     role TEXT NOT NULL, \
                     content TEXT NOT NULL, \
                     created_at TIMESTAMPTZ NOT NULL DEFAULT now())"
                ),
                format!(
                    "CREATE INDEX IF NOT EXISTS {table}_session_idx ON {table} (session_id, seq)"
                ),
            ],
        )?;
        Ok(Self {
            db,
            table: table.to_string(),
        })
    }
}

#[derive(QueryableByName, Debug)]
struct SessionRow {
    #[diesel(sql_type = DieselUuid)]
    id: Uuid,
    #[diesel(sql_type = Text)]
    session_id: String,
    #[diesel(sql_type = Text)]
    agent_id: String,
    #[diesel(sql_type = Nullable<Text>)]
    user_id: Option<String>,
    #[diesel(sql_type = Text)]
    role: String,
    #[diesel(sql_type = Text)]
    content: String,
    #[diesel(sql_type = Timestamptz)]
    created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for SessionMessage {
    type Error = anyhow::Error;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            session_id: row.session_id,
            agent_id: row.agent_id,
            user_id: row.user_id,
            role: row.role.parse()?,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

impl SessionStore for PgSessionStore {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn append(&self, messages: &[SessionMessage]) -> Result<()> {
        let query = format!(
            "INSERT INTO {} (id, session_id, agent_id, user_id, role, content, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            self.table
        );
        self.db.with_conn(|conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                for message in messages {
                    diesel::sql_query(query.as_str())
                        .bind::<DieselUuid, _>(message.id)
                        .bind::<Text, _>(&message.session_id)
                        .bind::<Text, _>(&message.agent_id)
                        .bind::<Nullable<Text>, _>(message.user_id.as_deref())
                        .bind::<Text, _>(message.role.as_str())
                        .bind::<Text, _>(&message.content)
                        .bind::<Timestamptz, _>(message.created_at)
                        .execute(&mut *conn)?;
                }
                Ok(())
            })
        })?;
        Ok(())
    }

    fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<SessionMessage>> {
        let query = format!(
            "SELECT id, session_id, agent_id, user_id, role, content, created_at FROM ( \
                SELECT * FROM {} WHERE session_id = $1 ORDER BY seq DESC LIMIT $2 \
             ) latest ORDER BY seq ASC",
            self.table
        );
        let limit = i64::try_from(limit).map_err(|_| anyhow!("history limit too large"))?;
        let rows: Vec<SessionRow> = self.db.with_conn(|conn| {
            diesel::sql_query(query)
                .bind::<Text, _>(session_id)
                .bind::<BigInt, _>(limit)
                .load(conn)
        })?;
        rows.into_iter().map(SessionMessage::try_from).collect()
    }
}

pub const DEFAULT_MAX_SESSIONS: usize = 1024;
pub const DEFAULT_MAX_SESSION_MESSAGES: usize = 20;

struct MemorySession {
    messages: VecDeque<SessionMessage>,
    last_used: u64,
}

/// Process-local session store used when no database is configured.
///
/// Keeps at most `max_messages` per session and `max_sessions` sessions;
/// the least recently used session is evicted first.
pub struct InMemorySessionStore {
    table: String,
    max_messages: usize,
    max_sessions: usize,
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<String, MemorySession>,
    clock: u64,
}

impl MemoryState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

impl InMemorySessionStore {
    pub fn new(table: &str) -> Self {
        Self::with_limits(table, DEFAULT_MAX_SESSION_MESSAGES, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_limits(table: &str, max_messages: usize, max_sessions: usize) -> Self {
        Self {
            table: table.to_string(),
            max_messages: max_messages.max(1),
            max_sessions: max_sessions.max(1),
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().map(|s| s.sessions.len()).unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("Failed to acquire session lock"))
    }
}

impl SessionStore for InMemorySessionStore {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn append(&self, messages: &[SessionMessage]) -> Result<()> {
        let mut state = self.lock()?;

        for message in messages {
            let now = state.tick();
            if !state.sessions.contains_key(&message.session_id)
                && state.sessions.len() >= self.max_sessions
            {
                let oldest = state
                    .sessions
                    .iter()
                    .min_by_key(|(_, session)| session.last_used)
                    .map(|(id, _)| id.clone());
                if let Some(oldest) = oldest {
                    debug!("Evicting in-memory session {}", oldest);
                    state.sessions.remove(&oldest);
                }
            }

            let session = state
                .sessions
                .entry(message.session_id.clone())
                .or_insert_with(|| MemorySession {
                    messages: VecDeque::new(),
                    last_used: now,
                });
            session.last_used = now;
            session.messages.push_back(message.clone());
            while session.messages.len() > self.max_messages {
                session.messages.pop_front();
            }
        }
        Ok(())
    }

    fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<SessionMessage>> {
        let mut state = self.lock()?;
        let now = state.tick();
        let Some(session) = state.sessions.get_mut(session_id) else {
            return Ok(Vec::new());
        };
        session.last_used = now;
        let start = session.messages.len().saturating_sub(limit);
        Ok(session.messages.iter().skip(start).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(session: &str, role: MessageRole, content: &str) -> SessionMessage {
        SessionMessage::new(session, "sage", Some("alice"), role, content)
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("user".parse::<MessageRole>().unwrap(), MessageRole::User);
        assert_eq!(MessageRole::Assistant.as_str(), "assistant");
        assert!("system".parse::<MessageRole>().is_err());
    }

    #[test]
    fn test_in_memory_recent_keeps_order_and_limit() {
        let store = InMemorySessionStore::new("sage_sessions");
        for i in 0..4 {
            store
                .append(&[
                    message("s-1", MessageRole::User, &format!("q{}", i)),
                    message("s-1", MessageRole::Assistant, &format!("a{}", i)),
                ])
                .unwrap();
        }
        store.append(&[message("s-2", MessageRole::User, "other")]).unwrap();

        let recent = store.recent("s-1", 3).unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a2", "q3", "a3"]);

        assert_eq!(store.recent("s-2", 10).unwrap().len(), 1);
        assert!(store.recent("missing", 10).unwrap().is_empty());
        assert_eq!(store.table_name(), "sage_sessions");
    }

    #[test]
    fn test_in_memory_trims_each_session() {
        let store = InMemorySessionStore::with_limits("sage_sessions", 4, 8);
        for i in 0..10 {
            store
                .append(&[
                    message("s-1", MessageRole::User, &format!("q{}", i)),
                    message("s-1", MessageRole::Assistant, &format!("a{}", i)),
                ])
                .unwrap();
        }

        let kept = store.recent("s-1", 100).unwrap();
        let contents: Vec<_> = kept.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q8", "a8", "q9", "a9"]);
    }

    #[test]
    fn test_in_memory_evicts_least_recently_used_session() {
        let store = InMemorySessionStore::with_limits("sage_sessions", 6, 2);
        store.append(&[message("old", MessageRole::User, "1")]).unwrap();
        store.append(&[message("kept", MessageRole::User, "2")]).unwrap();
        // reading marks "old" as recently used
        assert_eq!(store.recent("old", 10).unwrap().len(), 1);
        store.append(&[message("new", MessageRole::User, "3")]).unwrap();

        assert_eq!(store.session_count(), 2);
        assert_eq!(store.recent("old", 10).unwrap().len(), 1);
        assert!(store.recent("kept", 10).unwrap().is_empty());
        assert_eq!(store.recent("new", 10).unwrap().len(), 1);
    }
}
