use actix_web::web::ServiceConfig;

mod health;
mod observations;
mod status;

pub fn routes(cfg: &mut ServiceConfig) {
    health::routes(cfg);
    status::routes(cfg);
    observations::routes(cfg);
}
