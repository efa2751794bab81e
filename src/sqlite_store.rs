//! SQLite-backed [`RecordStore`] implementation.
//!
//! Each collection maps to one table (`search_history`, `profiles`,
//! `blog_posts`, see [`crate::migrate`]). Filters are translated into a
//! `WHERE` clause with bound parameters; the `UNIQUE` constraint on
//! `blog_posts.slug` and the primary key on `profiles.id` surface as
//! [`StoreError::Conflict`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use dapa_checker_core::models::{BlogPost, Collection, Identity, Record, SearchRecord, UserProfile};
use dapa_checker_core::store::{RecordFilter, RecordStore, SortOrder, StoreError, StoreResult};

/// SQLite implementation of the [`RecordStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Table layout per collection: (table, owner column, slug column, select list).
fn layout(collection: Collection) -> (&'static str, Option<&'static str>, Option<&'static str>, &'static str) {
    match collection {
        Collection::SearchHistory => (
            "search_history",
            Some("user_id"),
            None,
            "id, user_id, domain, url, domain_authority, page_authority, spam_score, backlinks, domain_age, created_at",
        ),
        Collection::Profiles => ("profiles", Some("id"), None, "id, email, created_at"),
        Collection::BlogPosts => (
            "blog_posts",
            None,
            Some("slug"),
            "id, title, slug, content, excerpt, author, created_at, updated_at",
        ),
    }
}

fn map_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Unavailable(e.to_string()),
    }
}

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(v: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(v)
        .ok_or_else(|| StoreError::Unavailable(format!("timestamp out of range: {}", v)))
}

fn small(v: i64, column: &str) -> StoreResult<u8> {
    u8::try_from(v).map_err(|_| StoreError::Unavailable(format!("{} out of range: {}", column, v)))
}

/// Append `WHERE ...` for `filter` to a query on `collection`.
fn push_where(qb: &mut QueryBuilder<'_, Sqlite>, collection: Collection, filter: &RecordFilter) {
    let (_, owner_col, slug_col, _) = layout(collection);
    qb.push(" WHERE 1 = 1");

    if let Some(identity) = &filter.identity {
        match owner_col {
            Some(col) => {
                qb.push(format!(" AND {} = ", col));
                qb.push_bind(identity.as_str().to_string());
            }
            None => {
                qb.push(" AND 0");
            }
        }
    }
    if let Some(since) = filter.since {
        qb.push(" AND created_at >= ");
        qb.push_bind(to_micros(since));
    }
    if let Some(id) = &filter.id {
        qb.push(" AND id = ");
        qb.push_bind(id.clone());
    }
    if let Some(id) = &filter.exclude_id {
        qb.push(" AND id <> ");
        qb.push_bind(id.clone());
    }
    if let Some(slug) = &filter.slug {
        match slug_col {
            Some(col) => {
                qb.push(format!(" AND {} = ", col));
                qb.push_bind(slug.clone());
            }
            None => {
                qb.push(" AND 0");
            }
        }
    }
}

fn decode(collection: Collection, row: &SqliteRow) -> StoreResult<Record> {
    let record = match collection {
        Collection::SearchHistory => {
            let backlinks: i64 = row.get("backlinks");
            Record::Search(SearchRecord {
                id: row.get("id"),
                identity: Identity::new(row.get::<String, _>("user_id")),
                domain: row.get("domain"),
                url: row.get("url"),
                domain_authority: small(row.get("domain_authority"), "domain_authority")?,
                page_authority: small(row.get("page_authority"), "page_authority")?,
                spam_score: small(row.get("spam_score"), "spam_score")?,
                backlinks: u64::try_from(backlinks).unwrap_or(0),
                domain_age: row.get("domain_age"),
                check_timestamp: from_micros(row.get("created_at"))?,
            })
        }
        Collection::Profiles => Record::Profile(UserProfile {
            id: Identity::new(row.get::<String, _>("id")),
            email: row.get("email"),
            created_at: from_micros(row.get("created_at"))?,
        }),
        Collection::BlogPosts => Record::BlogPost(BlogPost {
            id: row.get("id"),
            title: row.get("title"),
            slug: row.get("slug"),
            content: row.get("content"),
            excerpt: row.get("excerpt"),
            author: row.get("author"),
            created_at: from_micros(row.get("created_at"))?,
            updated_at: from_micros(row.get("updated_at"))?,
        }),
    };
    Ok(record)
}

fn bind_post<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    post: &'q BlogPost,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.author)
        .bind(to_micros(post.created_at))
        .bind(to_micros(post.updated_at))
        .bind(&post.id)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert(&self, record: &Record) -> StoreResult<()> {
        match record {
            Record::Search(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO search_history (id, user_id, domain, url, domain_authority,
                                                page_authority, spam_score, backlinks,
                                                domain_age, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&r.id)
                .bind(r.identity.as_str())
                .bind(&r.domain)
                .bind(&r.url)
                .bind(i64::from(r.domain_authority))
                .bind(i64::from(r.page_authority))
                .bind(i64::from(r.spam_score))
                .bind(i64::try_from(r.backlinks).unwrap_or(i64::MAX))
                .bind(&r.domain_age)
                .bind(to_micros(r.check_timestamp))
                .execute(&self.pool)
                .await
                .map_err(map_err)?;
            }
            Record::Profile(p) => {
                sqlx::query("INSERT INTO profiles (id, email, created_at) VALUES (?, ?, ?)")
                    .bind(p.id.as_str())
                    .bind(&p.email)
                    .bind(to_micros(p.created_at))
                    .execute(&self.pool)
                    .await
                    .map_err(map_err)?;
            }
            Record::BlogPost(b) => {
                let query = sqlx::query(
                    r#"
                    INSERT INTO blog_posts (title, slug, content, excerpt, author,
                                            created_at, updated_at, id)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                );
                bind_post(query, b)
                    .execute(&self.pool)
                    .await
                    .map_err(map_err)?;
            }
        }
        Ok(())
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &RecordFilter,
        sort: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Record>> {
        let (table, _, _, columns) = layout(collection);
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM {}", columns, table));
        push_where(&mut qb, collection, filter);
        qb.push(match sort {
            SortOrder::NewestFirst => " ORDER BY created_at DESC, rowid DESC",
            SortOrder::OldestFirst => " ORDER BY created_at ASC, rowid ASC",
        });
        if let Some(limit) = limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_err)?;
        rows.iter().map(|row| decode(collection, row)).collect()
    }

    async fn count(&self, collection: Collection, filter: &RecordFilter) -> StoreResult<u64> {
        let (table, _, _, _) = layout(collection);
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", table));
        push_where(&mut qb, collection, filter);
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn delete(&self, collection: Collection, filter: &RecordFilter) -> StoreResult<u64> {
        let (table, _, _, _) = layout(collection);
        let mut qb = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {}", table));
        push_where(&mut qb, collection, filter);
        let result = qb.build().execute(&self.pool).await.map_err(map_err)?;
        Ok(result.rows_affected())
    }

    async fn replace(&self, record: &Record) -> StoreResult<()> {
        let Record::BlogPost(post) = record else {
            return Err(StoreError::Unsupported(record.collection()));
        };
        let query = sqlx::query(
            r#"
            UPDATE blog_posts
            SET title = ?, slug = ?, content = ?, excerpt = ?, author = ?,
                created_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        );
        let result = bind_post(query, post)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("blog post {}", post.id)));
        }
        Ok(())
    }
}
