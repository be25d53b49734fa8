//! Data Transfer Objects for REST request/response serialization.
//!
//! Monetary amounts are serialized as JSON strings with two decimals and
//! accepted as strings or numbers.

pub mod campaign_dto;
pub mod refund_dto;
pub mod wallet_dto;

pub use campaign_dto::*;
pub use refund_dto::*;
pub use wallet_dto::*;
