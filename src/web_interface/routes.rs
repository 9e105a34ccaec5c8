use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use crate::configuration::config::AppConfig;
use crate::log_store::database::LogDatabase;
use crate::log_store::types::{
    FlowEventRecord, GroupBy, LogFilter, SortColumn, SortOrder,
};

/// API error payload
#[derive(Serialize)]
pub struct ApiError {
    pub message: String,
}

/// Raw query parameters for `GET /api/logs`. Everything is optional and
/// parsed leniently: bad page numbers or unknown sort columns fall back to
/// the defaults rather than failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub hostname: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub action: Option<String>,
    pub protocol: Option<String>,
    pub rule_name: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub limit: Option<String>,
}

#[derive(Serialize)]
pub struct LogsResponse {
    pub logs: Vec<FlowEventRecord>,
    pub total: u64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: u64,
}

pub(crate) fn parse_page(raw: &Option<String>) -> i64 {
    raw.as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}

pub(crate) fn parse_per_page(raw: &Option<String>) -> i64 {
    raw.as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(100)
}

/// Page numbers come from the outside world, so the offset arithmetic must
/// saturate instead of overflowing.
pub(crate) fn offset_for(page: i64, per_page: i64) -> i64 {
    page.saturating_sub(1).saturating_mul(per_page)
}

pub(crate) fn parse_limit(raw: &Option<String>) -> i64 {
    raw.as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|l| *l >= 1)
        .unwrap_or(10)
}

/// Accepts the formats the UI produces: `YYYY-MM-DD HH:MM:SS`, the HTML
/// datetime-local variants with a `T` separator, and RFC3339.
pub(crate) fn parse_time(raw: &Option<String>) -> Option<DateTime<Utc>> {
    let s = raw.as_deref()?.trim();
    if s.is_empty() {
        return None;
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, format) {
            return Some(n.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn non_empty(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn filter_from(query: &LogsQuery) -> LogFilter {
    LogFilter {
        hostname: non_empty(&query.hostname),
        source: non_empty(&query.source),
        destination: non_empty(&query.destination),
        action: non_empty(&query.action),
        protocol: non_empty(&query.protocol),
        rule_name: non_empty(&query.rule_name),
        received_after: parse_time(&query.start_time),
        received_before: parse_time(&query.end_time),
    }
}

fn store_failure(context: &'static str, e: crate::error_handling::types::StoreError) -> impl Reply {
    error!("{}: {}", context, e);
    reply::with_status(
        reply::json(&ApiError {
            message: format!("Failed to {}", context),
        }),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
}

/// GET /
pub fn dashboard_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end().and(warp::get()).and_then(|| async move {
        let html = r#"<html><head><title>FNS Log Viewer</title></head>
                <body><h1>FNS Log Viewer is running</h1>
                <p>See /api/logs for JSON, /api/statistics for store metrics.</p></body></html>"#;
        Ok::<_, Rejection>(reply::html(html))
    })
}

/// GET /api/logs
pub fn logs_route(
    db: Arc<LogDatabase>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "logs")
        .and(warp::get())
        .and(warp::query::<LogsQuery>())
        .and_then(move |query: LogsQuery| {
            let db = db.clone();
            async move {
                let filter = filter_from(&query);
                let sort = query
                    .sort
                    .as_deref()
                    .and_then(SortColumn::parse)
                    .unwrap_or_default();
                let order = query
                    .order
                    .as_deref()
                    .and_then(SortOrder::parse)
                    .unwrap_or_default();
                let page = parse_page(&query.page);
                let per_page = parse_per_page(&query.per_page);
                let offset = offset_for(page, per_page);

                match db.query_events(&filter, sort, order, per_page, offset).await {
                    Ok((logs, total)) => {
                        let response = LogsResponse {
                            total,
                            page,
                            per_page,
                            total_pages: total.div_ceil(per_page as u64),
                            logs,
                        };
                        Ok::<_, Rejection>(
                            reply::with_status(reply::json(&response), StatusCode::OK)
                                .into_response(),
                        )
                    }
                    Err(e) => Ok::<_, Rejection>(store_failure("load logs", e).into_response()),
                }
            }
        })
}

/// GET /api/filter_options
pub fn filter_options_route(
    db: Arc<LogDatabase>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "filter_options")
        .and(warp::get())
        .and_then(move || {
            let db = db.clone();
            async move {
                match db.filter_options().await {
                    Ok(options) => Ok::<_, Rejection>(
                        reply::with_status(reply::json(&options), StatusCode::OK).into_response(),
                    ),
                    Err(e) => {
                        Ok::<_, Rejection>(store_failure("load filter options", e).into_response())
                    }
                }
            }
        })
}

/// GET /api/analytics/:grouping
///
/// Grouping is one of `by_source`, `by_destination`, `by_port`, `by_rule`.
pub fn analytics_route(
    db: Arc<LogDatabase>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "analytics" / String)
        .and(warp::get())
        .and(warp::query::<AnalyticsQuery>())
        .and_then(move |grouping: String, query: AnalyticsQuery| {
            let db = db.clone();
            async move {
                let group = match grouping.as_str() {
                    "by_source" => GroupBy::Source,
                    "by_destination" => GroupBy::Destination,
                    "by_port" => GroupBy::DestinationPort,
                    "by_rule" => GroupBy::RuleName,
                    _ => {
                        return Ok::<_, Rejection>(
                            reply::with_status(
                                reply::json(&ApiError {
                                    message: format!("Unknown analytics grouping: {}", grouping),
                                }),
                                StatusCode::NOT_FOUND,
                            )
                            .into_response(),
                        )
                    }
                };
                let after = parse_time(&query.start_time);
                let before = parse_time(&query.end_time);
                let limit = parse_limit(&query.limit);

                match db.traffic_summary(group, after, before, limit).await {
                    Ok(buckets) => Ok::<_, Rejection>(
                        reply::with_status(reply::json(&buckets), StatusCode::OK).into_response(),
                    ),
                    Err(e) => Ok::<_, Rejection>(
                        store_failure("load traffic summary", e).into_response(),
                    ),
                }
            }
        })
}

/// GET /api/statistics
pub fn statistics_route(
    db: Arc<LogDatabase>,
    config: Arc<AppConfig>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "statistics")
        .and(warp::get())
        .and_then(move || {
            let db = db.clone();
            let config = config.clone();
            async move {
                match db.statistics(config.days_to_keep_logs).await {
                    Ok(stats) => Ok::<_, Rejection>(
                        reply::with_status(reply::json(&stats), StatusCode::OK).into_response(),
                    ),
                    Err(e) => {
                        Ok::<_, Rejection>(store_failure("load statistics", e).into_response())
                    }
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn temp_db() -> LogDatabase {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.sqlite3");
        Box::leak(Box::new(dir));
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let db = LogDatabase::connect_url(&url).await.unwrap();
        db.apply_schema().await.unwrap();
        db
    }

    #[test]
    fn test_offset_saturates_on_extreme_pages() {
        assert_eq!(offset_for(1, 100), 0);
        assert_eq!(offset_for(3, 50), 100);
        assert_eq!(offset_for(i64::MAX, 100), i64::MAX);
        assert_eq!(offset_for(i64::MAX, i64::MAX), i64::MAX);
    }

    #[tokio::test]
    async fn test_dashboard_serves_html() {
        let reply = warp::test::request()
            .path("/")
            .reply(&dashboard_route())
            .await;
        assert_eq!(reply.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_logs_route_survives_huge_page_numbers() {
        let db = temp_db().await;
        let route = logs_route(Arc::new(db));
        let reply = warp::test::request()
            .path("/api/logs?page=9223372036854775807&per_page=100")
            .reply(&route)
            .await;
        assert_eq!(reply.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(body["logs"].as_array().unwrap().len(), 0);
        assert_eq!(body["total"], 0);
    }

    #[test]
    fn test_page_params_fall_back_to_defaults() {
        assert_eq!(parse_page(&None), 1);
        assert_eq!(parse_page(&Some("7".into())), 7);
        assert_eq!(parse_page(&Some("0".into())), 1);
        assert_eq!(parse_page(&Some("eleven".into())), 1);
        assert_eq!(parse_per_page(&Some("-5".into())), 100);
        assert_eq!(parse_per_page(&Some("25".into())), 25);
    }

    #[test]
    fn test_time_parsing_accepts_ui_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_time(&Some("2024-03-01 12:30:00".into())), Some(expected));
        assert_eq!(parse_time(&Some("2024-03-01T12:30".into())), Some(expected));
        assert_eq!(parse_time(&Some("2024-03-01T12:30:00+00:00".into())), Some(expected));
        assert_eq!(parse_time(&Some("yesterday".into())), None);
        assert_eq!(parse_time(&Some("  ".into())), None);
        assert_eq!(parse_time(&None), None);
    }

    #[test]
    fn test_filter_ignores_blank_values() {
        let query = LogsQuery {
            hostname: Some("  ".into()),
            action: Some("ALLOW".into()),
            ..Default::default()
        };
        let filter = filter_from(&query);
        assert!(filter.hostname.is_none());
        assert_eq!(filter.action.as_deref(), Some("ALLOW"));
    }
}
