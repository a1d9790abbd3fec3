use actix_web::{HttpResponse, get, web};
use netpulse_service::database::Store;
use netpulse_service::database::models::StatusCounts;
use netpulse_service::monitoring::{MonitorStatus, Observation};
use serde::Serialize;

use crate::error::AppError;

macros_utils::routes! {
    route status_route,
}

#[derive(Serialize)]
struct SiteStatus {
    #[serde(flatten)]
    observation: Observation,
    status: MonitorStatus,
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    counts: StatusCounts,
    sites: Vec<SiteStatus>,
}

/// Latest observation of every site plus up/total counts
#[get("/status")]
pub async fn status_route(store: web::Data<dyn Store>) -> Result<HttpResponse, AppError> {
    let latest = store.latest_per_site().await?;
    let counts = StatusCounts::from_latest(&latest);

    let sites = latest
        .into_iter()
        .map(|observation| SiteStatus { status: observation.status(), observation })
        .collect();

    Ok(HttpResponse::Ok().json(StatusResponse { counts, sites }))
}
