use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeMap;

use super::Database;
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{ChannelGuide, GuideSource, ProgramItem};
use crate::repositories::GuideSink;
use crate::utils::parse_datetime;

fn guide_from_row(row: &SqliteRow) -> RepositoryResult<ChannelGuide> {
    let programs: String = row.try_get("programs")?;
    let epg_source: Option<String> = row.try_get("epg_source")?;
    let updated_at: String = row.try_get("updated_at")?;

    let updated_at =
        parse_datetime(&updated_at).ok_or_else(|| RepositoryError::InvalidTimestamp {
            table: "channel_guides".to_string(),
            field: "updated_at".to_string(),
            value: updated_at.clone(),
        })?;

    Ok(ChannelGuide {
        channel_id: row.try_get("channel_id")?,
        programs: serde_json::from_str::<Vec<ProgramItem>>(&programs)?,
        source: match epg_source {
            Some(url) => GuideSource::Mirror(url),
            None => GuideSource::Placeholder,
        },
        updated_at,
    })
}

#[async_trait]
impl GuideSink for Database {
    async fn upsert(&self, guide: &ChannelGuide) -> RepositoryResult<()> {
        let programs = serde_json::to_string(&guide.programs)?;

        sqlx::query(
            r#"
            INSERT INTO channel_guides (channel_id, programs, epg_source, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(channel_id) DO UPDATE SET
                programs = excluded.programs,
                epg_source = excluded.epg_source,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(guide.channel_id)
        .bind(programs)
        .bind(guide.source.mirror_url())
        .bind(guide.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn read_all(&self) -> RepositoryResult<BTreeMap<i64, ChannelGuide>> {
        let rows = sqlx::query(
            "SELECT channel_id, programs, epg_source, updated_at FROM channel_guides",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| guide_from_row(row).map(|guide| (guide.channel_id, guide)))
            .collect()
    }

    async fn get(&self, channel_id: i64) -> RepositoryResult<Option<ChannelGuide>> {
        let row = sqlx::query(
            "SELECT channel_id, programs, epg_source, updated_at FROM channel_guides WHERE channel_id = ?",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(guide_from_row).transpose()
    }
}
