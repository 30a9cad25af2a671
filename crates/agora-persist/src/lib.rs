pub mod client;
pub mod context;
pub mod error;
pub mod models;
pub mod repositories;
pub mod sequence;

pub use client::PersistClient;
pub use context::ContextBuilder;
pub use error::PersistError;
pub use models::{
    CreditAccount, CreditTransaction, MessageKind, MessageRecord, MessageRole, Thread,
    TransactionKind,
};
pub use repositories::{CreditLedger, MessageRepository, ThreadRepository};
pub use sequence::SequenceAllocator;
