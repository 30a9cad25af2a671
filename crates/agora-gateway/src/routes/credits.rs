use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;
use agora_persist::{CreditTransaction, TransactionKind};
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

const TRANSACTION_LIMIT: i64 = 50;

#[derive(Debug, Serialize, ToSchema)]
pub struct CreditsResponse {
    /// Balance in micro-credits (1 credit = 1_000_000)
    pub balance: i64,
    pub transactions: Vec<TransactionResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    /// Positive for grants, negative for debits
    pub amount: i64,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<CreditTransaction> for TransactionResponse {
    fn from(txn: CreditTransaction) -> Self {
        let kind = match txn.kind {
            TransactionKind::Grant => "grant",
            TransactionKind::Debit => "debit",
        };
        Self {
            amount: txn.amount,
            kind: kind.to_string(),
            run_id: txn.run_id,
            description: txn.description,
            created_at: txn.created_at,
        }
    }
}

/// The caller's balance and recent ledger activity, newest first.
#[utoipa::path(
    get,
    path = "/credits",
    responses(
        (status = 200, description = "Balance and recent transactions", body = CreditsResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "credits"
)]
pub async fn get_credits(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<CreditsResponse>> {
    let balance = state.persist.credits().balance(&user.user_id).await?;
    let transactions = state
        .persist
        .credits()
        .transactions(&user.user_id, TRANSACTION_LIMIT)
        .await?;

    Ok(Json(CreditsResponse {
        balance,
        transactions: transactions.into_iter().map(Into::into).collect(),
    }))
}
