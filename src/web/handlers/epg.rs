//! Guide document handlers
//!
//! `format` selects JSON (default) or XMLTV, `catchup` overrides the
//! configured catch-up policy for the selected format.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::{
    config::OutputConfig,
    errors::{AppError, AppResult},
    proxy::{assemble, json, xmltv, CatchupPolicy, OutputFormat},
    web::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct EpgQuery {
    pub format: Option<String>,
    pub catchup: Option<String>,
}

impl EpgQuery {
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_query(self.format.as_deref())
    }

    pub fn catchup_policy(
        &self,
        output: &OutputConfig,
        format: OutputFormat,
    ) -> AppResult<CatchupPolicy> {
        match self.catchup.as_deref() {
            Some(value) => CatchupPolicy::from_query(value).ok_or_else(|| {
                AppError::validation(format!(
                    "catchup must be 'keep' or 'exclude', got '{}'",
                    value
                ))
            }),
            None => Ok(match format {
                OutputFormat::Json => output.json_catchup,
                OutputFormat::Xmltv => output.xmltv_catchup,
            }),
        }
    }
}

/// Every stored channel with its guide
pub async fn all_guides(
    State(state): State<AppState>,
    Query(query): Query<EpgQuery>,
) -> AppResult<Response> {
    let format = query.output_format();
    let policy = query.catchup_policy(&state.config.output, format)?;

    let channels = state.channels.list_channels().await?;
    let guides = state.guides.read_all().await?;
    let now = Utc::now();
    let entries = assemble(channels, guides, &state.normalizer, policy, now);
    debug!(
        "Rendering {} channels as {:?} (catchup {:?})",
        entries.len(),
        format,
        policy
    );

    let body = match format {
        OutputFormat::Json => {
            let document = json::build_document(entries, state.registry.mirrors(), now);
            serde_json::to_string(&document).map_err(|e| AppError::internal(e.to_string()))?
        }
        OutputFormat::Xmltv => xmltv::render(&entries, &state.config.output.generator_name),
    };

    Ok(document_response(
        format,
        body,
        state.config.output.all_cache_max_age_secs,
    ))
}

/// One channel's guide. JSON mode answers with the bare programme array.
pub async fn channel_guide(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Query(query): Query<EpgQuery>,
) -> AppResult<Response> {
    let format = query.output_format();
    let policy = query.catchup_policy(&state.config.output, format)?;

    let channel = state
        .channels
        .get_channel(channel_id)
        .await?
        .ok_or_else(|| AppError::not_found("channel", channel_id.to_string()))?;

    let mut guides = BTreeMap::new();
    if let Some(guide) = state.guides.get(channel_id).await? {
        guides.insert(channel_id, guide);
    }
    let entries = assemble(vec![channel], guides, &state.normalizer, policy, Utc::now());

    let body = match format {
        OutputFormat::Json => {
            let programs: Vec<_> = entries.iter().flat_map(|e| e.guide.programs.iter()).collect();
            serde_json::to_string(&programs).map_err(|e| AppError::internal(e.to_string()))?
        }
        OutputFormat::Xmltv => xmltv::render(&entries, &state.config.output.generator_name),
    };

    Ok(document_response(
        format,
        body,
        state.config.output.channel_cache_max_age_secs,
    ))
}

fn document_response(format: OutputFormat, body: String, max_age_secs: u64) -> Response {
    (
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", max_age_secs),
            ),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catchup_override_and_defaults() {
        let output = OutputConfig {
            xmltv_catchup: CatchupPolicy::Exclude,
            ..OutputConfig::default()
        };

        let query = EpgQuery::default();
        assert_eq!(
            query.catchup_policy(&output, OutputFormat::Xmltv).unwrap(),
            CatchupPolicy::Exclude
        );
        assert_eq!(
            query.catchup_policy(&output, OutputFormat::Json).unwrap(),
            CatchupPolicy::Keep
        );

        let query = EpgQuery {
            catchup: Some("keep".into()),
            ..EpgQuery::default()
        };
        assert_eq!(
            query.catchup_policy(&output, OutputFormat::Xmltv).unwrap(),
            CatchupPolicy::Keep
        );

        let query = EpgQuery {
            catchup: Some("sometimes".into()),
            ..EpgQuery::default()
        };
        assert!(matches!(
            query.catchup_policy(&output, OutputFormat::Json),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_unknown_format_falls_back_to_json() {
        let query = EpgQuery {
            format: Some("csv".into()),
            ..EpgQuery::default()
        };
        assert_eq!(query.output_format(), OutputFormat::Json);
    }
}
