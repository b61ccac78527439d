//! End-to-end checks of the HTTP surface against the in-memory backend.

use std::sync::Arc;

use api_lib::adapters::InMemoryBackend;
use api_lib::web::{self, account::AddressResponse, rest::OrderPlacedResponse, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use testresult::TestResult;
use tower::ServiceExt;
use uuid::Uuid;
use vidmart_core::ports::{MockBlockchainGateway, PortError};
use vidmart_core::{Order, OrderLine, PaymentMethod, Product};

fn product(name: &str, price: i64) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        category: "Dairy".to_string(),
        price: Decimal::from(price),
        image_url: format!("/images/{}.png", name.to_lowercase()),
    }
}

fn app(backend: Arc<InMemoryBackend>, blockchain: MockBlockchainGateway) -> Router {
    web::router(Arc::new(AppState::new(backend, Arc::new(blockchain))))
}

fn app_with_self_rewards(
    backend: Arc<InMemoryBackend>,
    blockchain: MockBlockchainGateway,
) -> Router {
    web::router(Arc::new(
        AppState::new(backend, Arc::new(blockchain)).with_self_rewards(true),
    ))
}

fn get(uri: &str, user: Option<Uuid>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header(web::middleware::USER_ID_HEADER, user.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, user: Uuid, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(web::middleware::USER_ID_HEADER, user.to_string())
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json<T: DeserializeOwned>(response: Response) -> TestResult<T> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn protected_routes_require_a_user_header() -> TestResult {
    let app = app(Arc::new(InMemoryBackend::new()), MockBlockchainGateway::new());

    let response = app.clone().oneshot(get("/cart", None)).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let malformed = Request::builder()
        .uri("/cart")
        .header(web::middleware::USER_ID_HEADER, "not-a-uuid")
        .body(Body::empty())?;
    let response = app.clone().oneshot(malformed).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The catalogue stays public.
    let response = app.oneshot(get("/products", None)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn checkout_places_an_order_from_the_cart() -> TestResult {
    let backend = Arc::new(InMemoryBackend::new());
    let milk = product("Milk", 500);
    backend.insert_product(milk.clone()).await;
    let app = app(backend.clone(), MockBlockchainGateway::new());
    let user = Uuid::new_v4();

    for _ in 0..2 {
        let add = send_json(
            "POST",
            "/cart/items",
            user,
            serde_json::json!({ "product_id": milk.id }),
        );
        assert_eq!(app.clone().oneshot(add).await?.status(), StatusCode::OK);
    }

    let checkout = send_json(
        "POST",
        "/checkout",
        user,
        serde_json::json!({ "payment_method": "upi" }),
    );
    let response = app.clone().oneshot(checkout).await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let placed: OrderPlacedResponse = read_json(response).await?;
    assert!(!placed.amended);
    // 1000 subtotal, 180 GST, 10 handling.
    assert_eq!(placed.breakdown.grand_total, Decimal::new(119000, 2));
    assert_eq!(placed.order.items.len(), 1);
    assert_eq!(placed.order.items[0].quantity, 2);
    assert_eq!(placed.order.shipping_address, "No address provided");

    // The cart is empty again.
    let response = app.oneshot(get("/cart", Some(user))).await?;
    let cart: serde_json::Value = read_json(response).await?;
    assert_eq!(cart["item_count"], 0);
    Ok(())
}

#[tokio::test]
async fn checkout_with_an_empty_cart_is_rejected() -> TestResult {
    let app = app(Arc::new(InMemoryBackend::new()), MockBlockchainGateway::new());

    let checkout = send_json(
        "POST",
        "/checkout",
        Uuid::new_v4(),
        serde_json::json!({ "payment_method": "card" }),
    );
    let response = app.oneshot(checkout).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn orders_of_other_users_are_forbidden() -> TestResult {
    let backend = Arc::new(InMemoryBackend::new());
    let owner = Uuid::new_v4();
    let order = Order {
        id: Uuid::new_v4(),
        user_id: owner,
        items: vec![OrderLine {
            product_id: Uuid::new_v4(),
            name: "Bread".to_string(),
            unit_price: Decimal::from(40),
            image_url: String::new(),
            quantity: 1,
        }],
        total: Decimal::new(5720, 2),
        payment_method: PaymentMethod::Card,
        shipping_address: "No address provided".to_string(),
        created_at: Utc::now(),
    };
    backend.insert_order(order.clone()).await;
    let app = app(backend, MockBlockchainGateway::new());

    let uri = format!("/orders/{}", order.id);
    let response = app.clone().oneshot(get(&uri, Some(Uuid::new_v4()))).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.clone().oneshot(get(&uri, Some(owner))).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let missing = format!("/orders/{}", Uuid::new_v4());
    let response = app.oneshot(get(&missing, Some(owner))).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn first_address_becomes_the_default_and_ships_the_next_order() -> TestResult {
    let backend = Arc::new(InMemoryBackend::new());
    let app = app(backend, MockBlockchainGateway::new());
    let user = Uuid::new_v4();

    let add = send_json(
        "POST",
        "/addresses",
        user,
        serde_json::json!({
            "name": "Asha",
            "phone": "9876543210",
            "address_line1": "12 MG Road",
            "address_line2": null,
            "landmark": "  ",
            "pin_code": "560001"
        }),
    );
    let response = app.clone().oneshot(add).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: AddressResponse = read_json(response).await?;
    assert!(created.is_default);
    assert_eq!(created.landmark, None);

    let response = app.oneshot(get("/checkout", Some(user))).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let quote: serde_json::Value = read_json(response).await?;
    assert_eq!(quote["shipping_address"], created.label.as_str());
    Ok(())
}

#[tokio::test]
async fn invalid_pin_code_is_a_bad_request() -> TestResult {
    let app = app(Arc::new(InMemoryBackend::new()), MockBlockchainGateway::new());

    let add = send_json(
        "POST",
        "/addresses",
        Uuid::new_v4(),
        serde_json::json!({
            "name": "Asha",
            "phone": "9876543210",
            "address_line1": "12 MG Road",
            "pin_code": "56A"
        }),
    );
    let response = app.oneshot(add).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn gateway_failures_surface_as_bad_gateway() -> TestResult {
    let mut blockchain = MockBlockchainGateway::new();
    blockchain
        .expect_reward_coins()
        .returning(|_, _, _| Err(PortError::Gateway("asset not opted in".to_string())));
    let app = app_with_self_rewards(Arc::new(InMemoryBackend::new()), blockchain);
    let user = Uuid::new_v4();

    let reward = send_json(
        "POST",
        "/wallet/rewards",
        user,
        serde_json::json!({ "recipient_address": "WALLET", "amount": 5 }),
    );
    let response = app.clone().oneshot(reward).await?;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    // Nothing was credited.
    let response = app.oneshot(get("/coins", Some(user))).await?;
    let summary: serde_json::Value = read_json(response).await?;
    assert_eq!(summary["balance"], 0);
    Ok(())
}

#[tokio::test]
async fn self_rewards_are_refused_unless_enabled() -> TestResult {
    let mut blockchain = MockBlockchainGateway::new();
    blockchain.expect_reward_coins().never();
    let app = app(Arc::new(InMemoryBackend::new()), blockchain);
    let user = Uuid::new_v4();

    let reward = send_json(
        "POST",
        "/wallet/rewards",
        user,
        serde_json::json!({ "recipient_address": "WALLET", "amount": 5 }),
    );
    let response = app.clone().oneshot(reward).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.oneshot(get("/coins", Some(user))).await?;
    let summary: serde_json::Value = read_json(response).await?;
    assert_eq!(summary["balance"], 0);
    Ok(())
}

#[tokio::test]
async fn huge_quantities_do_not_break_the_cart() -> TestResult {
    let backend = Arc::new(InMemoryBackend::new());
    let milk = product("Milk", 500);
    let bread = product("Bread", 40);
    backend.insert_product(milk.clone()).await;
    backend.insert_product(bread.clone()).await;
    let app = app(backend, MockBlockchainGateway::new());
    let user = Uuid::new_v4();

    for id in [milk.id, bread.id] {
        let add = send_json("POST", "/cart/items", user, serde_json::json!({ "product_id": id }));
        assert_eq!(app.clone().oneshot(add).await?.status(), StatusCode::OK);
        let update = send_json(
            "PUT",
            &format!("/cart/items/{}", id),
            user,
            serde_json::json!({ "quantity": 5_000_000_000_i64 }),
        );
        assert_eq!(app.clone().oneshot(update).await?.status(), StatusCode::OK);
    }

    let response = app.oneshot(get("/cart", Some(user))).await?;
    let cart: serde_json::Value = read_json(response).await?;
    assert_eq!(cart["item_count"], 2 * u64::from(u32::MAX));
    Ok(())
}
