pub mod client;
pub mod extractor;
pub mod jwt;

pub use client::{AuthClient, RefreshedToken};
pub use extractor::AuthUser;
pub use jwt::{Claims, JwtVerifier};
