//! Small declarative helpers shared by the HTTP apps.

/// Generate a `routes` function registering each listed actix handler.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
///     route status_route,
/// }
///
/// App::new().configure(routes);
/// ```
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($(route $handler:ident),* $(,)?) => {
        pub fn routes(cfg: &mut $crate::__actix_web::web::ServiceConfig) {
            $( cfg.service($handler); )*
        }
    };
}

#[doc(hidden)]
#[cfg(feature = "actix")]
pub use actix_web as __actix_web;
