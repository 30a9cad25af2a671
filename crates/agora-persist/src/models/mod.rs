pub mod credit;
pub mod message;
pub mod thread;

pub use credit::{CreditAccount, CreditTransaction, TransactionKind};
pub use message::{MessageKind, MessageRecord, MessageRole};
pub use thread::Thread;
