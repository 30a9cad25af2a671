pub mod credits;
pub mod health;
pub mod stream;
pub mod threads;
