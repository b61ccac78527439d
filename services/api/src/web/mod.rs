pub mod account;
pub mod countdown_task;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::require_user;
pub use state::AppState;
pub use ws_handler::countdown_ws_handler;

/// Builds every API route. CORS and Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no caller identity needed)
    let public_routes = Router::new()
        .route("/products", get(rest::list_products_handler))
        .route("/products/{product_id}", get(rest::get_product_handler));

    // Protected routes (x-user-id required)
    let protected_routes = Router::new()
        .route(
            "/cart",
            get(rest::get_cart_handler).delete(rest::clear_cart_handler),
        )
        .route("/cart/items", post(rest::add_to_cart_handler))
        .route("/cart/items/{product_id}", put(rest::update_cart_item_handler))
        .route(
            "/checkout",
            get(rest::checkout_quote_handler).post(rest::place_order_handler),
        )
        .route("/orders", get(rest::list_orders_handler))
        .route("/orders/{order_id}", get(rest::get_order_handler))
        .route("/orders/{order_id}/tracking", get(rest::track_order_handler))
        .route("/orders/{order_id}/countdown/ws", get(countdown_ws_handler))
        .route(
            "/addresses",
            get(account::list_addresses_handler).post(account::add_address_handler),
        )
        .route(
            "/addresses/{address_id}",
            put(account::update_address_handler).delete(account::delete_address_handler),
        )
        .route(
            "/addresses/{address_id}/default",
            post(account::set_default_address_handler),
        )
        .route(
            "/profile",
            get(account::get_profile_handler).put(account::update_profile_handler),
        )
        .route("/coins", get(account::coin_summary_handler))
        .route("/wallet/{address}/balance", get(account::wallet_balance_handler))
        .route("/wallet/{address}/opt-in", post(account::wallet_opt_in_handler))
        .route("/wallet/rewards", post(account::wallet_reward_handler))
        .layer(axum_middleware::from_fn(require_user));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
