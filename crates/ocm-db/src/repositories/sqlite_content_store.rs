//! `SQLite` implementation of the `ContentStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use ocm_core::{
    Action, Content, ContentList, ContentStore, Menu, RawAction, RawContentList,
    RepositoryError, Section,
};

use super::row_mappers::{
    json_column, row_to_content, row_to_layout, row_to_section, storage_error, to_json,
};

/// `SQLite` implementation of the `ContentStore` trait.
pub struct SqliteContentStore {
    pool: SqlitePool,
}

impl SqliteContentStore {
    /// Create a new `SQLite` content store.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'_, Sqlite>, RepositoryError> {
        self.pool.begin().await.map_err(storage_error)
    }

    async fn load_sections(&self, menu_slug: &str) -> Result<Vec<Section>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT value FROM sections WHERE menu_slug = ? ORDER BY order_index ASC",
        )
        .bind(menu_slug)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.iter().map(row_to_section).collect()
    }
}

/// Parse a payload for persistence; an unparseable payload is a serialization error.
fn parse_payload(payload: &RawContentList, path: &str) -> Result<ContentList, RepositoryError> {
    payload
        .parse(path, 1)
        .map(|parsed| parsed.list)
        .map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// Insert `contents` under `path` starting at `first_index`.
///
/// A content id already stored under the path keeps its position and gets
/// the new payload.
async fn insert_elements(
    tx: &mut Transaction<'_, Sqlite>,
    path: &str,
    contents: &[Content],
    first_index: i64,
) -> Result<(), RepositoryError> {
    for (offset, content) in contents.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO elements (content_path, content_id, order_index, value)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(content_path, content_id) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(path)
        .bind(&content.id)
        .bind(first_index + offset as i64)
        .bind(to_json(content)?)
        .execute(&mut **tx)
        .await
        .map_err(storage_error)?;
    }
    Ok(())
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn save_menus(&self, menus: &[Menu]) -> Result<(), RepositoryError> {
        let mut tx = self.begin().await?;

        let existing: Vec<String> = sqlx::query_scalar("SELECT slug FROM menus")
            .fetch_all(&mut *tx)
            .await
            .map_err(storage_error)?;
        for slug in existing
            .iter()
            .filter(|slug| !menus.iter().any(|menu| &menu.slug == *slug))
        {
            sqlx::query("DELETE FROM menus WHERE slug = ?")
                .bind(slug)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
            sqlx::query("DELETE FROM sections WHERE menu_slug = ?")
                .bind(slug)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }

        for (index, menu) in menus.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO menus (slug, order_index) VALUES (?, ?)
                ON CONFLICT(slug) DO UPDATE SET order_index = excluded.order_index
                "#,
            )
            .bind(&menu.slug)
            .bind(index as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)?;
        tracing::debug!(target: "ocm.db", menus = menus.len(), "Menus saved");
        Ok(())
    }

    async fn save_sections(
        &self,
        sections: &[Section],
        menu_slug: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.begin().await?;

        sqlx::query("DELETE FROM sections WHERE menu_slug = ?")
            .bind(menu_slug)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        for (index, section) in sections.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sections (element_url, menu_slug, order_index, value)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(element_url) DO UPDATE SET
                    menu_slug = excluded.menu_slug,
                    order_index = excluded.order_index,
                    value = excluded.value
                "#,
            )
            .bind(&section.element_url)
            .bind(menu_slug)
            .bind(index as i64)
            .bind(to_json(section)?)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }

    async fn save_action_in_section(
        &self,
        action: &RawAction,
        section: &Section,
    ) -> Result<(), RepositoryError> {
        let opens_path = action
            .parse()
            .and_then(|parsed| parsed.content_path().map(str::to_string));

        sqlx::query(
            r#"
            INSERT INTO actions (identifier, value, section_element_url, opens_path)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(identifier) DO UPDATE SET
                value = excluded.value,
                section_element_url = excluded.section_element_url,
                opens_path = excluded.opens_path
            "#,
        )
        .bind(&action.identifier)
        .bind(to_json(&action.payload)?)
        .bind(&section.element_url)
        .bind(opens_path)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn save_content(
        &self,
        payload: &RawContentList,
        path: &str,
        expiration_date: Option<DateTime<Utc>>,
        content_version: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let list = parse_payload(payload, path)?;
        let layout = list.layout.as_ref().map(to_json).transpose()?;

        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO content_lists (path, layout, content_version, expiration_date, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                layout = excluded.layout,
                content_version = excluded.content_version,
                expiration_date = excluded.expiration_date,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(path)
        .bind(layout)
        .bind(content_version)
        .bind(expiration_date)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        sqlx::query("DELETE FROM elements WHERE content_path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        insert_elements(&mut tx, path, &list.contents, 0).await?;

        tx.commit().await.map_err(storage_error)?;
        tracing::debug!(target: "ocm.db", path, contents = list.len(), "Content list saved");
        Ok(())
    }

    async fn append_content(
        &self,
        payload: &RawContentList,
        path: &str,
        expiration_date: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let list = parse_payload(payload, path)?;

        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO content_lists (path, expiration_date, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                expiration_date = COALESCE(excluded.expiration_date, content_lists.expiration_date),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(path)
        .bind(expiration_date)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        let next_index: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(order_index) + 1, 0) FROM elements WHERE content_path = ?",
        )
        .bind(path)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error)?;

        insert_elements(&mut tx, path, &list.contents, next_index).await?;

        tx.commit().await.map_err(storage_error)?;
        tracing::debug!(target: "ocm.db", path, contents = list.len(), "Content page appended");
        Ok(())
    }

    async fn save_action(
        &self,
        action: &RawAction,
        content_path: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let opens_path = action
            .parse()
            .and_then(|parsed| parsed.content_path().map(str::to_string));

        // Keep the section link and the delivering path of an existing row.
        sqlx::query(
            r#"
            INSERT INTO actions (identifier, value, opens_path, content_path)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(identifier) DO UPDATE SET
                value = excluded.value,
                opens_path = excluded.opens_path,
                content_path = COALESCE(excluded.content_path, actions.content_path)
            "#,
        )
        .bind(&action.identifier)
        .bind(to_json(&action.payload)?)
        .bind(opens_path)
        .bind(content_path)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn load_menus(&self) -> Result<Vec<Menu>, RepositoryError> {
        let slugs: Vec<String> =
            sqlx::query_scalar("SELECT slug FROM menus ORDER BY order_index ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(storage_error)?;

        let mut menus = Vec::with_capacity(slugs.len());
        for slug in slugs {
            let sections = self.load_sections(&slug).await?;
            menus.push(Menu { slug, sections });
        }
        Ok(menus)
    }

    async fn load_action(&self, identifier: &str) -> Result<Option<Action>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM actions WHERE identifier = ?")
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: serde_json::Value = json_column(&row, "value")?;
        let action = Action::from_json(identifier, &payload);
        if action.is_none() {
            tracing::warn!(target: "ocm.db", identifier, "Stored action is no longer supported");
        }
        Ok(action)
    }

    async fn load_content_list(
        &self,
        path: &str,
        valid_at: DateTime<Utc>,
        page: u32,
        items: u32,
    ) -> Result<Option<ContentList>, RepositoryError> {
        let header = sqlx::query(
            "SELECT layout, content_version, expiration_date FROM content_lists WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        let Some(header) = header else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT value FROM elements WHERE content_path = ? ORDER BY order_index ASC",
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let mut visible = Vec::with_capacity(rows.len());
        for row in &rows {
            let content = row_to_content(row)?;
            if content.is_visible_at(valid_at) {
                visible.push(content);
            }
        }

        let contents: Vec<Content> = if items == 0 {
            visible
        } else {
            let offset = page.saturating_sub(1) as usize * items as usize;
            visible.into_iter().skip(offset).take(items as usize).collect()
        };

        if page > 1 && contents.is_empty() {
            return Ok(None);
        }

        Ok(Some(ContentList {
            path: path.to_string(),
            page,
            contents,
            layout: row_to_layout(&header)?,
            content_version: header.try_get("content_version").map_err(storage_error)?,
            expiration_date: header.try_get("expiration_date").map_err(storage_error)?,
        }))
    }

    async fn load_content_version(&self, path: &str) -> Result<Option<String>, RepositoryError> {
        let version: Option<Option<String>> =
            sqlx::query_scalar("SELECT content_version FROM content_lists WHERE path = ?")
                .bind(path)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;
        Ok(version.flatten())
    }

    async fn load_section_for_content(
        &self,
        path: &str,
    ) -> Result<Option<Section>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT s.value FROM sections s
            JOIN actions a ON a.section_element_url = s.element_url
            WHERE a.opens_path = ?
            ORDER BY s.order_index ASC
            LIMIT 1
            "#,
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.as_ref().map(row_to_section).transpose()
    }

    async fn load_section_for_action(
        &self,
        identifier: &str,
    ) -> Result<Option<Section>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM sections WHERE element_url = ?")
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.as_ref().map(row_to_section).transpose()
    }

    async fn clean_database(&self) -> Result<(), RepositoryError> {
        let mut tx = self.begin().await?;
        for table in ["menus", "sections", "actions", "content_lists", "elements"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }
        tx.commit().await.map_err(storage_error)?;
        tracing::info!(target: "ocm.db", "Content database cleaned");
        Ok(())
    }
}
