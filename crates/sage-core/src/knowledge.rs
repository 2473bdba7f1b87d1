//! Knowledge base stored in PostgreSQL
//!
//! Documents live in a configurable table. Search is hybrid: Postgres
//! full-text rank plus a plain substring match, so short or unusual terms
//! the text parser drops can still be found.

use anyhow::{anyhow, Result};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Text};
use tracing::debug;

use crate::db::{validate_table_name, PgDatabase};

#[derive(Debug, Clone, PartialEq, QueryableByName)]
pub struct KnowledgeDocument {
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Text)]
    pub content: String,
    #[diesel(sql_type = Double)]
    pub score: f64,
}

pub struct KnowledgeBase {
    db: PgDatabase,
    table: String,
}

impl KnowledgeBase {
    pub fn new(db: PgDatabase, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        db.ensure_table(
            table,
            &[
                format!(
                    "CREATE TABLE IF NOT EXISTS {table} (\
                     id UUID PRIMARY KEY DEFAULT gen_random_uuid(), \
                     name TEXT NOT NULL, \
                     content TEXT NOT NULL, \
                     created_at TIMESTAMPTZ NOT NULL DEFAULT now())"
                ),
                format!(
                    "CREATE INDEX IF NOT EXISTS {table}_content_fts ON {table} \
                     USING GIN (to_tsvector('english', content))"
                ),
            ],
        )?;
        Ok(Self {
            db,
            table: table.to_string(),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Best matching documents, highest score first
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeDocument>> {
        let limit = i64::try_from(limit).map_err(|_| anyhow!("search limit too large"))?;
        debug!("Knowledge search in {}: {}", self.table, query);

        let sql = search_sql(&self.table);
        let pattern = like_pattern(query);
        let documents: Vec<KnowledgeDocument> = self.db.with_conn(|conn| {
            diesel::sql_query(sql)
                .bind::<Text, _>(query)
                .bind::<Text, _>(&pattern)
                .bind::<BigInt, _>(limit)
                .load(conn)
        })?;

        Ok(documents)
    }
}

/// Full-text rank with a bonus for substring matches on content or name.
/// Binds: `$1` query text, `$2` LIKE pattern, `$3` limit.
fn search_sql(table: &str) -> String {
    format!(
        "SELECT name, content, \
            (ts_rank(to_tsvector('english', content), plainto_tsquery('english', $1)) \
             + CASE WHEN content ILIKE $2 OR name ILIKE $2 THEN 0.1 ELSE 0 END)::float8 \
             AS score \
         FROM {table} \
         WHERE to_tsvector('english', content) @@ plainto_tsquery('english', $1) \
            OR content ILIKE $2 OR name ILIKE $2 \
         ORDER BY score DESC LIMIT $3"
    )
}

/// `%query%` with LIKE wildcards in the query escaped
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("bitcoin"), "%bitcoin%");
        assert_eq!(like_pattern(" 100%_sure "), "%100\\%\\_sure%");
    }

    #[test]
    fn test_search_combines_rank_and_substring() {
        let sql = search_sql("sage_knowledge");
        assert!(sql.contains("FROM sage_knowledge"));
        assert!(sql.contains("plainto_tsquery('english', $1)"));
        assert!(sql.contains("content ILIKE $2 OR name ILIKE $2"));
        assert!(sql.ends_with("LIMIT $3"));
    }
}
