use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::{bson::doc, Client, Collection};

use crate::error::Result;
use crate::models::MessageRecord;

#[derive(Clone)]
pub struct MessageRepository {
    collection: Collection<MessageRecord>,
}

impl MessageRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("messages");
        Self { collection }
    }

    pub async fn save_message(&self, message: MessageRecord) -> Result<ObjectId> {
        self.collection.insert_one(&message).await?;
        Ok(message.id)
    }

    pub async fn save_messages(&self, messages: Vec<MessageRecord>) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        self.collection.insert_many(messages).await?;
        Ok(())
    }

    /// All messages of a thread in sequence order.
    pub async fn get_messages(&self, thread_id: ObjectId) -> Result<Vec<MessageRecord>> {
        let filter = doc! { "thread_id": thread_id };
        let messages = self
            .collection
            .find(filter)
            .sort(doc! { "seq": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(messages)
    }

    /// Up to `limit` messages with `seq` below `before`, chronological order.
    pub async fn get_messages_paginated(
        &self,
        thread_id: ObjectId,
        limit: i64,
        before_seq: Option<i64>,
    ) -> Result<Vec<MessageRecord>> {
        let mut filter = doc! { "thread_id": thread_id };
        if let Some(before) = before_seq {
            filter.insert("seq", doc! { "$lt": before });
        }

        let mut messages: Vec<MessageRecord> = self
            .collection
            .find(filter)
            .sort(doc! { "seq": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        messages.reverse();
        Ok(messages)
    }

    pub async fn count_messages(&self, thread_id: ObjectId) -> Result<u64> {
        let filter = doc! { "thread_id": thread_id };
        Ok(self.collection.count_documents(filter).await?)
    }
}
