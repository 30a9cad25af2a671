use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::{bson::doc, Client, Collection};

use crate::error::{PersistError, Result};
use crate::models::{CreditAccount, CreditTransaction, TransactionKind};

/// Credit accounting for runs.
///
/// Debits are conditional updates (`balance >= amount` lives in the filter),
/// so the balance can never go negative regardless of how many runs settle
/// concurrently. Every balance change leaves a transaction record.
#[derive(Clone)]
pub struct CreditLedger {
    accounts: Collection<CreditAccount>,
    transactions: Collection<CreditTransaction>,
}

impl CreditLedger {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let db = client.database(db_name);
        Self {
            accounts: db.collection("credit_accounts"),
            transactions: db.collection("credit_transactions"),
        }
    }

    pub async fn balance(&self, user_id: &str) -> Result<i64> {
        let account = self.accounts.find_one(doc! { "_id": user_id }).await?;
        Ok(account.map(|a| a.balance).unwrap_or(0))
    }

    pub async fn grant(&self, user_id: &str, amount: i64, description: &str) -> Result<i64> {
        if amount <= 0 {
            return Err(PersistError::Internal(format!(
                "grant amount must be positive, got {}",
                amount
            )));
        }

        let account = self
            .accounts
            .find_one_and_update(
                doc! { "_id": user_id },
                doc! {
                    "$inc": { "balance": amount },
                    "$set": { "updated_at": bson::DateTime::now() },
                },
            )
            .upsert(true)
            .return_document(mongodb::options::ReturnDocument::After)
            .await?
            .ok_or_else(|| PersistError::Internal("upsert returned no account".to_string()))?;

        self.record(user_id, amount, TransactionKind::Grant, None, description)
            .await?;

        Ok(account.balance)
    }

    /// Open an account with `initial` micro-credits if the user has none.
    ///
    /// Safe to call on every request: `$setOnInsert` makes the grant
    /// happen at most once even under concurrent calls.
    pub async fn ensure_account(&self, user_id: &str, initial: i64) -> Result<()> {
        let update = doc! {
            "$setOnInsert": {
                "balance": initial.max(0),
                "updated_at": bson::DateTime::now(),
            },
        };
        let result = self
            .accounts
            .update_one(doc! { "_id": user_id }, update)
            .upsert(true)
            .await?;

        if result.upserted_id.is_some() && initial > 0 {
            self.record(user_id, initial, TransactionKind::Grant, None, "initial grant")
                .await?;
        }
        Ok(())
    }

    /// Debit `amount` micro-credits; fails without touching the balance if
    /// the account would go negative.
    pub async fn debit(
        &self,
        user_id: &str,
        amount: i64,
        run_id: Option<&str>,
        description: &str,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        if amount < 0 {
            return Err(PersistError::Internal(format!(
                "debit amount must be positive, got {}",
                amount
            )));
        }

        let filter = doc! { "_id": user_id, "balance": { "$gte": amount } };
        let update = doc! {
            "$inc": { "balance": -amount },
            "$set": { "updated_at": bson::DateTime::now() },
        };

        let result = self.accounts.update_one(filter, update).await?;
        if result.modified_count == 0 {
            let available = self.balance(user_id).await?;
            return Err(PersistError::InsufficientCredits {
                user_id: user_id.to_string(),
                needed: amount,
                available,
            });
        }

        self.record(user_id, -amount, TransactionKind::Debit, run_id, description)
            .await
    }

    pub async fn transactions(&self, user_id: &str, limit: i64) -> Result<Vec<CreditTransaction>> {
        let transactions = self
            .transactions
            .find(doc! { "user_id": user_id })
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(transactions)
    }

    async fn record(
        &self,
        user_id: &str,
        amount: i64,
        kind: TransactionKind,
        run_id: Option<&str>,
        description: &str,
    ) -> Result<()> {
        let transaction = CreditTransaction {
            id: ObjectId::new(),
            user_id: user_id.to_string(),
            amount,
            kind,
            run_id: run_id.map(str::to_string),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        self.transactions.insert_one(&transaction).await?;
        Ok(())
    }
}
