//! Provider callbacks and payment account administration.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use domain::models::order::PaymentCallback;
use domain::models::payment::{CreatePaymentAccountRequest, PaymentAccount, ProviderConfig};
use persistence::repositories::PaymentAccountRepository;
use serde::Serialize;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::extractors::ProjectOperator;
use crate::response::{ApiResponse, ApiResult};
use crate::services::{OrderService, PaymentOutcome};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackAck {
    pub order_no: String,
    pub outcome: &'static str,
}

/// Unauthenticated; the signature is the credential.
pub fn callback_router() -> Router<AppState> {
    Router::new().route("/api/payment/callback/:provider", post(payment_callback))
}

pub fn project_router() -> Router<AppState> {
    Router::new().route(
        "/payment-accounts",
        get(list_payment_accounts).post(create_payment_account),
    )
}

/// POST /api/payment/callback/:provider
///
/// Replays of an already applied notification are acknowledged unchanged.
async fn payment_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(callback): Json<PaymentCallback>,
) -> ApiResult<CallbackAck> {
    let outcome = OrderService::new(&state)
        .handle_callback(&provider, &callback)
        .await?;
    let outcome = match outcome {
        PaymentOutcome::Paid => "paid",
        PaymentOutcome::Failed => "failed",
        PaymentOutcome::Unchanged => "unchanged",
    };
    Ok(ApiResponse::ok(CallbackAck {
        order_no: callback.order_no,
        outcome,
    }))
}

async fn list_payment_accounts(
    State(state): State<AppState>,
    _op: ProjectOperator,
) -> ApiResult<Vec<PaymentAccount>> {
    let accounts = PaymentAccountRepository::new(state.pool.clone())
        .list()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(ApiResponse::ok(accounts))
}

/// POST /project/payment-accounts
///
/// The provider config must parse for the named provider.
async fn create_payment_account(
    State(state): State<AppState>,
    op: ProjectOperator,
    Json(request): Json<CreatePaymentAccountRequest>,
) -> ApiResult<PaymentAccount> {
    request.validate()?;
    ProviderConfig::parse(&request.provider_code, &request.config)?;

    let account: PaymentAccount = PaymentAccountRepository::new(state.pool.clone())
        .create(&request)
        .await?
        .into();
    info!(
        account_id = account.id,
        provider = %account.provider_code,
        operator_id = op.operator.id,
        "Payment account created"
    );
    Ok(ApiResponse::with_msg(account, "创建成功"))
}
