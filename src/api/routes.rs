use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/transaction", web::post().to(handlers::new_transaction))
        .route("/mining", web::post().to(handlers::mine))
        .route("/mining/cancel", web::post().to(handlers::cancel_mining))
        .route("/blocks", web::get().to(handlers::get_blocks))
        .route("/block/{index}", web::get().to(handlers::get_block))
        .route("/transactions", web::get().to(handlers::get_transactions))
        .route(
            "/pending-transactions",
            web::get().to(handlers::get_pending_transactions),
        )
        .route("/validate", web::get().to(handlers::validate_chain));
}
