use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::{bson::doc, Client, Collection};

use crate::error::Result;
use crate::models::{MessageRecord, Thread};

#[derive(Clone)]
pub struct ThreadRepository {
    collection: Collection<Thread>,
    messages: Collection<MessageRecord>,
}

impl ThreadRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let db = client.database(db_name);
        Self {
            collection: db.collection("threads"),
            messages: db.collection("messages"),
        }
    }

    pub async fn create_thread(&self, user_id: String, title: Option<String>) -> Result<Thread> {
        let thread = Thread {
            id: ObjectId::new(),
            user_id,
            title,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        self.collection.insert_one(&thread).await?;
        Ok(thread)
    }

    pub async fn get_thread(&self, thread_id: ObjectId) -> Result<Option<Thread>> {
        let filter = doc! { "_id": thread_id };
        Ok(self.collection.find_one(filter).await?)
    }

    /// Thread only if it exists and belongs to `user_id`.
    ///
    /// Ownership is checked in the query filter so callers cannot forget
    /// the isolation check.
    pub async fn get_owned_thread(
        &self,
        thread_id: ObjectId,
        user_id: &str,
    ) -> Result<Option<Thread>> {
        let filter = doc! { "_id": thread_id, "user_id": user_id };
        Ok(self.collection.find_one(filter).await?)
    }

    pub async fn list_threads(&self, user_id: &str, limit: i64) -> Result<Vec<Thread>> {
        let filter = doc! { "user_id": user_id };
        let threads = self
            .collection
            .find(filter)
            .sort(doc! { "updated_at": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(threads)
    }

    /// Delete a thread and all of its messages.
    pub async fn delete_thread(&self, thread_id: ObjectId) -> Result<bool> {
        let deleted = self
            .collection
            .delete_one(doc! { "_id": thread_id })
            .await?;
        self.messages
            .delete_many(doc! { "thread_id": thread_id })
            .await?;
        Ok(deleted.deleted_count > 0)
    }

    /// Bump `updated_at` so recency listing stays correct.
    pub async fn touch_thread(&self, thread_id: ObjectId) -> Result<()> {
        let filter = doc! { "_id": thread_id };
        let update = doc! { "$set": { "updated_at": bson::DateTime::now() } };
        self.collection.update_one(filter, update).await?;
        Ok(())
    }
}
