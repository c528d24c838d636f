//! JSON-RPC 2.0 envelopes for nodes without an alloy client (Starknet).

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, P: Serialize> {
	pub jsonrpc: &'static str,
	pub id: u64,
	pub method: &'a str,
	pub params: P,
}

impl<'a, P: Serialize> JsonRpcRequest<'a, P> {
	pub fn new(method: &'a str, params: P) -> Self {
		Self {
			jsonrpc: "2.0",
			id: 1,
			method,
			params,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcErrorObject {
	pub code: i64,
	pub message: String,
	#[serde(default)]
	pub data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
	pub result: Option<T>,
	pub error: Option<JsonRpcErrorObject>,
}

impl<T> JsonRpcResponse<T> {
	/// Collapses the envelope, rendering node errors as text.
	pub fn into_result(self) -> Result<T, String> {
		match (self.result, self.error) {
			(_, Some(e)) => Err(match e.data {
				Some(data) => format!("RPC error {}: {} ({})", e.code, e.message, data),
				None => format!("RPC error {}: {}", e.code, e.message),
			}),
			(Some(result), None) => Ok(result),
			(None, None) => Err("RPC response has neither result nor error".to_string()),
		}
	}
}
