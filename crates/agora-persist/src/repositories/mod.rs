pub mod credit;
pub mod message;
pub mod thread;

pub use credit::CreditLedger;
pub use message::MessageRepository;
pub use thread::ThreadRepository;
