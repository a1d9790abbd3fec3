use actix_web::{HttpResponse, get, web};
use chrono::{Duration, Utc};
use netpulse_service::database::Store;
use serde::Deserialize;

use crate::error::AppError;

macros_utils::routes! {
    route observations_route,
    route summary_route,
}

const DEFAULT_HOURS: i64 = 24;
const MAX_HOURS: i64 = 24 * 365;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    site: Option<String>,
    hours: Option<i64>,
}

fn window_hours(hours: Option<i64>) -> Result<i64, AppError> {
    match hours.unwrap_or(DEFAULT_HOURS) {
        hours @ 1..=MAX_HOURS => Ok(hours),
        other => Err(AppError::BadRequest(format!("hours must be within 1..={MAX_HOURS}, got {other}"))),
    }
}

/// Observations in the last `hours`, oldest first, optionally for one site
#[get("/observations")]
pub async fn observations_route(
    store: web::Data<dyn Store>,
    query: web::Query<WindowQuery>,
) -> Result<HttpResponse, AppError> {
    let since = Utc::now() - Duration::hours(window_hours(query.hours)?);
    let site = query.site.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let observations = store.query_range(site, Some(since), None).await?;
    Ok(HttpResponse::Ok().json(observations))
}

/// Per-site uptime and latency averages over the last `hours`
#[get("/summary")]
pub async fn summary_route(
    store: web::Data<dyn Store>,
    query: web::Query<WindowQuery>,
) -> Result<HttpResponse, AppError> {
    let since = Utc::now() - Duration::hours(window_hours(query.hours)?);

    let summary = store.site_summary(since).await?;
    Ok(HttpResponse::Ok().json(summary))
}
