pub mod manager;
pub mod protocol;
pub mod session;
pub mod token_refresh;

pub use manager::{ConnectionId, WsManager};
pub use protocol::{ClientFrame, ServerFrame};
pub use session::ws_upgrade;
