pub mod jwt;
pub mod webhook_signature;
