pub use ethereum_types::*;
pub mod networks;
pub mod serde_utils;
pub mod types;
pub use bytes::Bytes;
