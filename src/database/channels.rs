use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Database;
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Channel, ContentUrls};
use crate::repositories::ChannelStore;

const CHANNEL_COLUMNS: &str = "id, number, display_name, title, name, titles, logo_url, \
     content_urls, image_url, logo_public_url";

fn channel_from_row(row: &SqliteRow) -> RepositoryResult<Channel> {
    let titles: Option<String> = row.try_get("titles")?;
    let content_urls: String = row.try_get("content_urls")?;

    Ok(Channel {
        id: row.try_get("id")?,
        number: row.try_get("number")?,
        display_name: row.try_get("display_name")?,
        title: row.try_get("title")?,
        name: row.try_get("name")?,
        titles: titles.map(|t| serde_json::from_str(&t)).transpose()?,
        logo_url: row.try_get("logo_url")?,
        content_urls: serde_json::from_str::<ContentUrls>(&content_urls)?,
        image_url: row.try_get("image_url")?,
        logo_public_url: row.try_get("logo_public_url")?,
    })
}

#[async_trait]
impl ChannelStore for Database {
    async fn list_channels(&self) -> RepositoryResult<Vec<Channel>> {
        let query = format!(
            "SELECT {} FROM channels ORDER BY number IS NULL, number, id",
            CHANNEL_COLUMNS
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(channel_from_row).collect()
    }

    async fn get_channel(&self, channel_id: i64) -> RepositoryResult<Option<Channel>> {
        let query = format!("SELECT {} FROM channels WHERE id = ?", CHANNEL_COLUMNS);
        let row = sqlx::query(&query)
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(channel_from_row).transpose()
    }

    async fn replace_channels(&self, channels: Vec<Channel>) -> RepositoryResult<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::query_failed("begin_transaction", e.to_string()))?;

        // Public logo URLs are assigned out of band; carry them over
        let preserved: Vec<(i64, String)> = sqlx::query_as(
            "SELECT id, logo_public_url FROM channels WHERE logo_public_url IS NOT NULL",
        )
        .fetch_all(&mut *tx)
        .await?;
        let preserved: std::collections::HashMap<i64, String> = preserved.into_iter().collect();

        sqlx::query("DELETE FROM channels").execute(&mut *tx).await?;

        let now = Utc::now().to_rfc3339();
        let mut count = 0;
        for channel in &channels {
            let titles = channel
                .titles
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let content_urls = serde_json::to_string(&channel.content_urls)?;
            let logo_public_url = channel
                .logo_public_url
                .clone()
                .or_else(|| preserved.get(&channel.id).cloned());

            sqlx::query(
                r#"
                INSERT INTO channels (
                    id, number, display_name, title, name, titles, logo_url,
                    content_urls, image_url, logo_public_url, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(channel.id)
            .bind(channel.number)
            .bind(&channel.display_name)
            .bind(&channel.title)
            .bind(&channel.name)
            .bind(titles)
            .bind(&channel.logo_url)
            .bind(content_urls)
            .bind(&channel.image_url)
            .bind(logo_public_url)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            count += 1;
        }

        tx.commit().await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::memory_database;
    use serde_json::json;

    fn channel(value: serde_json::Value) -> Channel {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_replace_and_list_channels() {
        let db = memory_database().await;
        let count = db
            .replace_channels(vec![
                channel(json!({
                    "id": 10, "number": 20, "name": "Veinte",
                    "titles": {"ES": "Veinte"},
                    "contentUrls": {"hlsFP": "https://cdn.example/20.m3u8"}
                })),
                channel(json!({"id": 11, "number": 3, "displayName": "Tres"})),
                channel(json!({"id": 12, "name": "Sin numero"})),
            ])
            .await
            .unwrap();
        assert_eq!(count, 3);

        let channels = db.list_channels().await.unwrap();
        let ids: Vec<i64> = channels.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![11, 10, 12]);
        assert_eq!(channels[1].titles, Some(json!({"ES": "Veinte"})));
        assert_eq!(
            channels[1].content_urls.hls_fp.as_deref(),
            Some("https://cdn.example/20.m3u8")
        );
    }

    #[tokio::test]
    async fn test_replace_preserves_public_logo() {
        let db = memory_database().await;
        db.replace_channels(vec![channel(json!({
            "id": 1, "number": 1, "logoPublicUrl": "https://cdn.example/1.png"
        }))])
        .await
        .unwrap();

        db.replace_channels(vec![
            channel(json!({"id": 1, "number": 1, "name": "Uno"})),
            channel(json!({"id": 2, "number": 2})),
        ])
        .await
        .unwrap();

        let uno = db.get_channel(1).await.unwrap().unwrap();
        assert_eq!(uno.name.as_deref(), Some("Uno"));
        assert_eq!(
            uno.logo_public_url.as_deref(),
            Some("https://cdn.example/1.png")
        );
        assert!(db.get_channel(2).await.unwrap().unwrap().logo_public_url.is_none());
        assert!(db.get_channel(3).await.unwrap().is_none());
    }
}
