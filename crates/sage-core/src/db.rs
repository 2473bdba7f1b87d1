//! Shared PostgreSQL connection
//!
//! Table names come from agent configuration rather than a fixed schema, so
//! tables are created on first use with `CREATE TABLE IF NOT EXISTS` and every
//! name is checked before it is spliced into SQL.

use anyhow::{anyhow, bail, Result};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[derive(Clone)]
pub struct PgDatabase {
    conn: Arc<Mutex<PgConnection>>,
    ensured: Arc<Mutex<HashSet<String>>>,
}

impl PgDatabase {
    pub fn connect(database_url: &str) -> Result<Self> {
        let conn = PgConnection::establish(database_url)
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;
        info!("Connected to PostgreSQL");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            ensured: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_conn<T>(&self, f: impl FnOnce(&mut PgConnection) -> QueryResult<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Failed to acquire database lock"))?;
        Ok(f(&mut *conn)?)
    }

    /// Execute the DDL statements for `table` once per process
    pub fn ensure_table(&self, table: &str, ddl: &[String]) -> Result<()> {
        validate_table_name(table)?;
        let mut ensured = self
            .ensured
            .lock()
            .map_err(|_| anyhow!("Failed to acquire table registry lock"))?;
        if ensured.contains(table) {
            return Ok(());
        }

        self.with_conn(|conn| {
            for statement in ddl {
                diesel::sql_query(statement.as_str()).execute(&mut *conn)?;
            }
            Ok(())
        })?;
        debug!("Ensured table {}", table);
        ensured.insert(table.to_string());
        Ok(())
    }
}

/// Accept plain SQL identifiers only: a letter or underscore followed by
/// letters, digits or underscores, at most 63 bytes
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        bail!("table name must not be empty");
    };
    if name.len() > 63 {
        bail!("table name too long: {}", name);
    }
    if !(first.is_ascii_alphabetic() || first == '_')
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        bail!("invalid table name: {}", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("sage_sessions").is_ok());
        assert!(validate_table_name("_knowledge2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2fast").is_err());
        assert!(validate_table_name("sessions; DROP TABLE users").is_err());
        assert!(validate_table_name("public.sessions").is_err());
        assert!(validate_table_name(&"a".repeat(64)).is_err());
    }
}
