//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the shopping endpoints (catalogue, cart,
//! checkout, orders) and the master definition for the OpenAPI specification.

use crate::error::{checkout_to_http, port_to_http, HttpError};
use crate::web::account;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;
use vidmart_core::countdown::{self, format_remaining};
use vidmart_core::ports::{OrderRepository, ProductRepository};
use vidmart_core::{
    Cart, CartItem, CheckoutRequest, CheckoutService, CountdownPhase, Order, OrderLine,
    OrderTracking, PaymentMethod, PriceBreakdown, Product,
};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_products_handler,
        get_product_handler,
        get_cart_handler,
        add_to_cart_handler,
        update_cart_item_handler,
        clear_cart_handler,
        checkout_quote_handler,
        place_order_handler,
        list_orders_handler,
        get_order_handler,
        track_order_handler,
        account::list_addresses_handler,
        account::add_address_handler,
        account::update_address_handler,
        account::set_default_address_handler,
        account::delete_address_handler,
        account::get_profile_handler,
        account::update_profile_handler,
        account::coin_summary_handler,
        account::wallet_balance_handler,
        account::wallet_opt_in_handler,
        account::wallet_reward_handler,
    ),
    components(
        schemas(
            ProductResponse, CartResponse, CartItemResponse, AddToCartRequest,
            UpdateQuantityRequest, PaymentMethodDto, PlaceOrderRequest, PriceBreakdownResponse,
            QuoteResponse, OrderResponse, OrderLineResponse, OrderPlacedResponse,
            TrackingResponse, CountdownResponse,
            account::AddressRequest, account::AddressResponse, account::ProfileRequest,
            account::ProfileResponse, account::CoinSummaryResponse,
            account::CoinTransactionResponse, account::WalletBalanceResponse,
            account::OptInResponse, account::RewardRequest, account::RewardResponse,
        )
    ),
    tags(
        (name = "VIDMart API", description = "Grocery catalogue, cart, checkout and loyalty coins.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub image_url: String,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            category: p.category,
            price: p.price,
            image_url: p.image_url,
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct ProductQuery {
    /// Only list products of this category.
    pub category: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub image_url: String,
    pub quantity: u32,
    pub line_total: Decimal,
}

impl From<&CartItem> for CartItemResponse {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            unit_price: item.unit_price,
            image_url: item.image_url.clone(),
            quantity: item.quantity,
            line_total: item.line_total(),
        }
    }
}

/// The cart with its derived totals.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct CartResponse {
    pub items: Vec<CartItemResponse>,
    pub item_count: u64,
    pub total: Decimal,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().iter().map(CartItemResponse::from).collect(),
            item_count: cart.item_count(),
            total: cart.total(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    /// Zero or less removes the item.
    pub quantity: i64,
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodDto {
    Card,
    Upi,
    Cod,
}

impl From<PaymentMethodDto> for PaymentMethod {
    fn from(dto: PaymentMethodDto) -> Self {
        match dto {
            PaymentMethodDto::Card => PaymentMethod::Card,
            PaymentMethodDto::Upi => PaymentMethod::Upi,
            PaymentMethodDto::Cod => PaymentMethod::CashOnDelivery,
        }
    }
}

impl From<PaymentMethod> for PaymentMethodDto {
    fn from(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Card => PaymentMethodDto::Card,
            PaymentMethod::Upi => PaymentMethodDto::Upi,
            PaymentMethod::CashOnDelivery => PaymentMethodDto::Cod,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub payment_method: PaymentMethodDto,
    #[serde(default)]
    pub coins_to_use: u32,
}

#[derive(Deserialize, IntoParams)]
pub struct QuoteQuery {
    /// Coins the customer wants to redeem.
    #[serde(default)]
    pub coins: u32,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PriceBreakdownResponse {
    pub subtotal: Decimal,
    pub gst: Decimal,
    pub handling_fee: Decimal,
    pub coins_redeemed: u32,
    pub coin_discount: Decimal,
    pub grand_total: Decimal,
}

impl From<PriceBreakdown> for PriceBreakdownResponse {
    fn from(b: PriceBreakdown) -> Self {
        Self {
            subtotal: b.subtotal,
            gst: b.gst,
            handling_fee: b.handling_fee,
            coins_redeemed: b.coins_redeemed,
            coin_discount: b.coin_discount,
            grand_total: b.grand_total,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct QuoteResponse {
    pub breakdown: PriceBreakdownResponse,
    pub coin_balance: i64,
    pub max_redeemable: u32,
    /// Set when checkout will add to this order instead of placing a new one.
    pub amending_order: Option<Uuid>,
    pub shipping_address: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OrderLineResponse {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub image_url: String,
    pub quantity: u32,
}

impl From<OrderLine> for OrderLineResponse {
    fn from(line: OrderLine) -> Self {
        Self {
            product_id: line.product_id,
            name: line.name,
            unit_price: line.unit_price,
            image_url: line.image_url,
            quantity: line.quantity,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub items: Vec<OrderLineResponse>,
    pub total: Decimal,
    pub payment_method: PaymentMethodDto,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            items: order.items.into_iter().map(OrderLineResponse::from).collect(),
            total: order.total,
            payment_method: order.payment_method.into(),
            shipping_address: order.shipping_address,
            created_at: order.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OrderPlacedResponse {
    pub order: OrderResponse,
    pub breakdown: PriceBreakdownResponse,
    /// True when the cart was merged into a still-open order.
    pub amended: bool,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CountdownResponse {
    /// `running`, `paused` or `expired`.
    pub phase: String,
    pub remaining_secs: Option<u32>,
    pub display: Option<String>,
}

impl From<CountdownPhase> for CountdownResponse {
    fn from(phase: CountdownPhase) -> Self {
        let name = match phase {
            CountdownPhase::Running { .. } => "running",
            CountdownPhase::Paused { .. } => "paused",
            CountdownPhase::Expired => "expired",
        };
        Self {
            phase: name.to_string(),
            remaining_secs: phase.remaining_secs(),
            display: phase.remaining_secs().map(format_remaining),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TrackingResponse {
    pub order_id: Uuid,
    pub reference: String,
    pub status: String,
    pub eta_minutes: u32,
    pub countdown: CountdownResponse,
}

//=========================================================================================
// Catalogue Handlers
//=========================================================================================

/// List products, optionally filtered by category.
#[utoipa::path(
    get,
    path = "/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "Products ordered by name", body = [ProductResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_products_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let products = match query.category.as_deref() {
        Some(category) => app_state.backend.list_products_by_category(category).await,
        None => app_state.backend.list_products().await,
    }
    .map_err(port_to_http)?;

    let response: Vec<ProductResponse> = products.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/products/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "The product", body = ProductResponse),
        (status = 404, description = "Product not found")
    )
)]
pub async fn get_product_handler(
    State(app_state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let product = app_state
        .backend
        .get_product(product_id)
        .await
        .map_err(port_to_http)?;
    Ok(Json(ProductResponse::from(product)))
}

//=========================================================================================
// Cart Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/cart",
    responses((status = 200, description = "The caller's cart", body = CartResponse)),
    params(("x-user-id" = Uuid, Header, description = "The authenticated user."))
)]
pub async fn get_cart_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let session = app_state.sessions.session(user_id).await;
    let session = session.lock().await;
    Ok(Json(CartResponse::from(&session.cart)))
}

/// Add one unit of a product to the cart.
#[utoipa::path(
    post,
    path = "/cart/items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "The updated cart", body = CartResponse),
        (status = 404, description = "Product not found")
    ),
    params(("x-user-id" = Uuid, Header, description = "The authenticated user."))
)]
pub async fn add_to_cart_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<AddToCartRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let product = app_state
        .backend
        .get_product(payload.product_id)
        .await
        .map_err(port_to_http)?;

    let session = app_state.sessions.session(user_id).await;
    let mut session = session.lock().await;
    session.cart.add_to_cart(CartItem::from(&product));
    Ok(Json(CartResponse::from(&session.cart)))
}

/// Set the quantity of a cart line. Zero or less removes it.
#[utoipa::path(
    put,
    path = "/cart/items/{product_id}",
    request_body = UpdateQuantityRequest,
    params(
        ("product_id" = Uuid, Path, description = "Product id of the cart line"),
        ("x-user-id" = Uuid, Header, description = "The authenticated user.")
    ),
    responses((status = 200, description = "The updated cart", body = CartResponse))
)]
pub async fn update_cart_item_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let session = app_state.sessions.session(user_id).await;
    let mut session = session.lock().await;
    session.cart.update_quantity(product_id, payload.quantity);
    Ok(Json(CartResponse::from(&session.cart)))
}

#[utoipa::path(
    delete,
    path = "/cart",
    responses((status = 204, description = "Cart emptied")),
    params(("x-user-id" = Uuid, Header, description = "The authenticated user."))
)]
pub async fn clear_cart_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let session = app_state.sessions.session(user_id).await;
    session.lock().await.cart.clear();
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Checkout Handlers
//=========================================================================================

/// Price the cart, including a merge into the active order if one is open.
#[utoipa::path(
    get,
    path = "/checkout",
    params(QuoteQuery, ("x-user-id" = Uuid, Header, description = "The authenticated user.")),
    responses(
        (status = 200, description = "Price breakdown", body = QuoteResponse),
        (status = 400, description = "Too many coins requested")
    )
)]
pub async fn checkout_quote_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<QuoteQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let session = app_state.sessions.session(user_id).await;
    let session = session.lock().await;

    let quote = CheckoutService::new(&*app_state.backend)
        .quote(user_id, &session.cart, &session.flags, query.coins, Utc::now())
        .await
        .map_err(checkout_to_http)?;

    Ok(Json(QuoteResponse {
        breakdown: quote.breakdown.into(),
        coin_balance: quote.coin_balance,
        max_redeemable: quote.max_redeemable,
        amending_order: quote.amending_order,
        shipping_address: quote.shipping_address,
    }))
}

/// Place the order, or merge the cart into the paused active order.
#[utoipa::path(
    post,
    path = "/checkout",
    request_body = PlaceOrderRequest,
    params(("x-user-id" = Uuid, Header, description = "The authenticated user.")),
    responses(
        (status = 201, description = "Order placed", body = OrderPlacedResponse),
        (status = 200, description = "Active order amended", body = OrderPlacedResponse),
        (status = 400, description = "Empty cart or too many coins"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn place_order_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let session = app_state.sessions.session(user_id).await;
    let mut guard = session.lock().await;
    let session = &mut *guard;

    let request = CheckoutRequest {
        payment_method: payload.payment_method.into(),
        coins_to_use: payload.coins_to_use,
    };
    let outcome = CheckoutService::new(&*app_state.backend)
        .place_order(user_id, &mut session.cart, &mut session.flags, request, Utc::now())
        .await
        .map_err(checkout_to_http)?;

    info!(
        "Checkout for user {} produced order {} (amended: {})",
        user_id, outcome.order.id, outcome.amended
    );
    let status = if outcome.amended {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(OrderPlacedResponse {
            order: outcome.order.into(),
            breakdown: outcome.breakdown.into(),
            amended: outcome.amended,
        }),
    ))
}

//=========================================================================================
// Order Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/orders",
    params(("x-user-id" = Uuid, Header, description = "The authenticated user.")),
    responses((status = 200, description = "Orders, newest first", body = [OrderResponse]))
)]
pub async fn list_orders_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let orders = app_state
        .backend
        .list_orders_for_user(user_id)
        .await
        .map_err(port_to_http)?;
    let response: Vec<OrderResponse> = orders.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/orders/{order_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order id"),
        ("x-user-id" = Uuid, Header, description = "The authenticated user.")
    ),
    responses(
        (status = 200, description = "The order", body = OrderResponse),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn get_order_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let order = owned_order(&app_state, user_id, order_id).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// Tracking view plus the current state of the amend countdown.
#[utoipa::path(
    get,
    path = "/orders/{order_id}/tracking",
    params(
        ("order_id" = Uuid, Path, description = "Order id"),
        ("x-user-id" = Uuid, Header, description = "The authenticated user.")
    ),
    responses(
        (status = 200, description = "Tracking information", body = TrackingResponse),
        (status = 404, description = "Order not found")
    )
)]
pub async fn track_order_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let order = owned_order(&app_state, user_id, order_id).await?;
    let phase = {
        let session = app_state.sessions.session(user_id).await;
        let session = session.lock().await;
        countdown::inspect(order.id, order.created_at, &session.flags, Utc::now())
    };

    let tracking = OrderTracking::for_order(order.id);
    Ok(Json(TrackingResponse {
        order_id: tracking.order_id,
        reference: tracking.reference,
        status: tracking.status.to_string(),
        eta_minutes: tracking.eta_minutes,
        countdown: phase.into(),
    }))
}

/// Loads an order and checks that it belongs to the caller.
async fn owned_order(app_state: &AppState, user_id: Uuid, order_id: Uuid) -> Result<Order, HttpError> {
    let order = app_state
        .backend
        .find_order(order_id)
        .await
        .map_err(port_to_http)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Order {} not found", order_id)))?;
    if order.user_id != user_id {
        return Err((StatusCode::FORBIDDEN, "Forbidden".to_string()));
    }
    Ok(order)
}
