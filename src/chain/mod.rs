//! Chain access
//!
//! Addresses, the handful of ABI encodings the engine needs, and the
//! read-only JSON-RPC client.

pub mod abi;
pub mod address;
pub mod rpc;

pub use address::{is_valid_address, Address, AddressError, TokenAddress};
pub use rpc::{ChainError, ChainReader, JsonRpcClient, RpcConfig};
