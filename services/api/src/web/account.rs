//! services/api/src/web/account.rs
//!
//! Handlers for the account side of the app: address book, profile, the
//! loyalty coin ledger and the on-chain wallet.

use crate::error::{address_to_http, port_to_http, reward_to_http, HttpError};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;
use vidmart_core::ports::{AddressRepository, BlockchainGateway, ProfileRepository};
use vidmart_core::{
    Address, AddressBook, AddressFields, CoinTransaction, OptInOutcome, Profile, ProfileUpdate,
    RewardReceipt, Rewards, WalletBalance,
};

//=========================================================================================
// Payload and Response Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct AddressRequest {
    pub name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub landmark: Option<String>,
    pub pin_code: String,
}

impl From<AddressRequest> for AddressFields {
    fn from(req: AddressRequest) -> Self {
        Self {
            name: req.name,
            phone: req.phone,
            address_line1: req.address_line1,
            address_line2: req.address_line2,
            landmark: req.landmark,
            pin_code: req.pin_code,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AddressResponse {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub landmark: Option<String>,
    pub pin_code: String,
    pub is_default: bool,
    /// The address as it is stamped onto orders.
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl From<Address> for AddressResponse {
    fn from(a: Address) -> Self {
        let label = a.shipping_label();
        Self {
            id: a.id,
            name: a.name,
            phone: a.phone,
            address_line1: a.address_line1,
            address_line2: a.address_line2,
            landmark: a.landmark,
            pin_code: a.pin_code,
            is_default: a.is_default,
            label,
            created_at: a.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            name: p.name,
            phone: p.phone,
            address: p.address,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CoinTransactionResponse {
    pub id: Uuid,
    pub amount: i64,
    /// `earned` or `spent`.
    pub transaction_type: String,
    pub description: String,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<CoinTransaction> for CoinTransactionResponse {
    fn from(t: CoinTransaction) -> Self {
        Self {
            id: t.id,
            amount: t.amount,
            transaction_type: t.kind.as_str().to_string(),
            description: t.description,
            order_id: t.order_id,
            created_at: t.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CoinSummaryResponse {
    pub balance: i64,
    pub value: Decimal,
    pub transactions: Vec<CoinTransactionResponse>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletBalanceResponse {
    pub address: String,
    pub balance: Decimal,
    pub algo_balance: u64,
    pub is_opted_in: bool,
    pub explorer_url: String,
    pub asset_id: u64,
}

impl From<WalletBalance> for WalletBalanceResponse {
    fn from(w: WalletBalance) -> Self {
        Self {
            address: w.address,
            balance: w.balance,
            algo_balance: w.algo_balance,
            is_opted_in: w.is_opted_in,
            explorer_url: w.explorer_url,
            asset_id: w.asset_id,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OptInResponse {
    pub already_opted_in: bool,
    /// Base64 unsigned transaction for the wallet owner to sign.
    pub transaction: Option<String>,
}

impl From<OptInOutcome> for OptInResponse {
    fn from(outcome: OptInOutcome) -> Self {
        match outcome {
            OptInOutcome::AlreadyOptedIn => Self {
                already_opted_in: true,
                transaction: None,
            },
            OptInOutcome::Prepared { transaction } => Self {
                already_opted_in: false,
                transaction: Some(transaction),
            },
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct RewardRequest {
    pub recipient_address: String,
    pub amount: u32,
    pub note: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RewardResponse {
    pub transaction_id: String,
    pub confirmed_round: u64,
    pub amount: Decimal,
    pub recipient: String,
    pub explorer_url: String,
}

impl From<RewardReceipt> for RewardResponse {
    fn from(r: RewardReceipt) -> Self {
        Self {
            transaction_id: r.transaction_id,
            confirmed_round: r.confirmed_round,
            amount: r.amount,
            recipient: r.recipient,
            explorer_url: r.explorer_url,
        }
    }
}

//=========================================================================================
// Address Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/addresses",
    params(("x-user-id" = Uuid, Header, description = "The authenticated user.")),
    responses((status = 200, description = "Addresses, default first", body = [AddressResponse]))
)]
pub async fn list_addresses_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let addresses = app_state
        .backend
        .list_addresses(user_id)
        .await
        .map_err(port_to_http)?;
    let response: Vec<AddressResponse> = addresses.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// Add an address. The first address becomes the default.
#[utoipa::path(
    post,
    path = "/addresses",
    request_body = AddressRequest,
    params(("x-user-id" = Uuid, Header, description = "The authenticated user.")),
    responses(
        (status = 201, description = "Address created", body = AddressResponse),
        (status = 400, description = "Missing or malformed fields")
    )
)]
pub async fn add_address_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<AddressRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let address = AddressBook::new(&*app_state.backend)
        .add(user_id, payload.into())
        .await
        .map_err(address_to_http)?;
    Ok((StatusCode::CREATED, Json(AddressResponse::from(address))))
}

#[utoipa::path(
    put,
    path = "/addresses/{address_id}",
    request_body = AddressRequest,
    params(
        ("address_id" = Uuid, Path, description = "Address id"),
        ("x-user-id" = Uuid, Header, description = "The authenticated user.")
    ),
    responses(
        (status = 200, description = "Address updated", body = AddressResponse),
        (status = 400, description = "Missing or malformed fields"),
        (status = 404, description = "Address not found")
    )
)]
pub async fn update_address_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(address_id): Path<Uuid>,
    Json(payload): Json<AddressRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let address = AddressBook::new(&*app_state.backend)
        .update(user_id, address_id, payload.into())
        .await
        .map_err(address_to_http)?;
    Ok(Json(AddressResponse::from(address)))
}

#[utoipa::path(
    post,
    path = "/addresses/{address_id}/default",
    params(
        ("address_id" = Uuid, Path, description = "Address id"),
        ("x-user-id" = Uuid, Header, description = "The authenticated user.")
    ),
    responses(
        (status = 204, description = "Default address changed"),
        (status = 404, description = "Address not found")
    )
)]
pub async fn set_default_address_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(address_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    AddressBook::new(&*app_state.backend)
        .make_default(user_id, address_id)
        .await
        .map_err(address_to_http)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/addresses/{address_id}",
    params(
        ("address_id" = Uuid, Path, description = "Address id"),
        ("x-user-id" = Uuid, Header, description = "The authenticated user.")
    ),
    responses(
        (status = 204, description = "Address deleted"),
        (status = 404, description = "Address not found")
    )
)]
pub async fn delete_address_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(address_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    AddressBook::new(&*app_state.backend)
        .remove(user_id, address_id)
        .await
        .map_err(address_to_http)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Profile Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/profile",
    params(("x-user-id" = Uuid, Header, description = "The authenticated user.")),
    responses((status = 200, description = "The caller's profile", body = ProfileResponse))
)]
pub async fn get_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let profile = app_state
        .backend
        .find_profile(user_id)
        .await
        .map_err(port_to_http)?
        .unwrap_or(Profile {
            id: user_id,
            ..Profile::default()
        });
    Ok(Json(ProfileResponse::from(profile)))
}

#[utoipa::path(
    put,
    path = "/profile",
    request_body = ProfileRequest,
    params(("x-user-id" = Uuid, Header, description = "The authenticated user.")),
    responses((status = 200, description = "Profile updated", body = ProfileResponse))
)]
pub async fn update_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<ProfileRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let update = ProfileUpdate {
        name: payload.name,
        phone: payload.phone,
        address: payload.address,
    };
    let profile = app_state
        .backend
        .update_profile(user_id, update)
        .await
        .map_err(port_to_http)?;
    Ok(Json(ProfileResponse::from(profile)))
}

//=========================================================================================
// Coin and Wallet Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/coins",
    params(("x-user-id" = Uuid, Header, description = "The authenticated user.")),
    responses((status = 200, description = "Coin balance and ledger", body = CoinSummaryResponse))
)]
pub async fn coin_summary_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let summary = Rewards::new(&*app_state.backend, &*app_state.blockchain)
        .summary(user_id)
        .await
        .map_err(reward_to_http)?;
    Ok(Json(CoinSummaryResponse {
        balance: summary.balance,
        value: summary.value,
        transactions: summary.transactions.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/wallet/{address}/balance",
    params(
        ("address" = String, Path, description = "Wallet address"),
        ("x-user-id" = Uuid, Header, description = "The authenticated user.")
    ),
    responses(
        (status = 200, description = "Wallet balance", body = WalletBalanceResponse),
        (status = 502, description = "Blockchain gateway error")
    )
)]
pub async fn wallet_balance_handler(
    State(app_state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let balance = app_state
        .blockchain
        .wallet_balance(&address)
        .await
        .map_err(port_to_http)?;
    Ok(Json(WalletBalanceResponse::from(balance)))
}

#[utoipa::path(
    post,
    path = "/wallet/{address}/opt-in",
    params(
        ("address" = String, Path, description = "Wallet address"),
        ("x-user-id" = Uuid, Header, description = "The authenticated user.")
    ),
    responses(
        (status = 200, description = "Opt-in prepared or already done", body = OptInResponse),
        (status = 502, description = "Blockchain gateway error")
    )
)]
pub async fn wallet_opt_in_handler(
    State(app_state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = app_state
        .blockchain
        .prepare_opt_in(&address)
        .await
        .map_err(port_to_http)?;
    Ok(Json(OptInResponse::from(outcome)))
}

/// Transfer coins to a wallet and credit them to the caller's ledger.
///
/// The caller rewards themselves, so this is only served when the
/// deployment enables `ALLOW_SELF_REWARDS`; otherwise it answers 403 without
/// touching the gateway.
#[utoipa::path(
    post,
    path = "/wallet/rewards",
    request_body = RewardRequest,
    params(("x-user-id" = Uuid, Header, description = "The authenticated user.")),
    responses(
        (status = 200, description = "Reward confirmed", body = RewardResponse),
        (status = 400, description = "Amount must be positive"),
        (status = 403, description = "Self-service rewards are disabled"),
        (status = 502, description = "Blockchain gateway error")
    )
)]
pub async fn wallet_reward_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<RewardRequest>,
) -> Result<impl IntoResponse, HttpError> {
    if !app_state.self_rewards {
        warn!("User {} asked for a reward while self rewards are disabled", user_id);
        return Err((
            StatusCode::FORBIDDEN,
            "Self-service rewards are disabled".to_string(),
        ));
    }
    let receipt = Rewards::new(&*app_state.backend, &*app_state.blockchain)
        .credit_reward(user_id, &payload.recipient_address, payload.amount, payload.note)
        .await
        .map_err(reward_to_http)?;
    Ok(Json(RewardResponse::from(receipt)))
}
