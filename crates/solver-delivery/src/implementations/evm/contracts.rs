//! Solidity interfaces the EVM handler talks to.

use alloy_sol_types::sol;

sol! {
	/// Destination settler.
	interface IDestinationSettler {
		function fill(bytes32 orderId, bytes originData, bytes fillerData) external payable;
		function settle(bytes32[] orderIds) external payable;
		function orderStatus(bytes32 orderId) external view returns (bytes32 status);
		function quoteGasPayment(uint32 destinationDomain) external view returns (uint256 fee);
	}

	interface IERC20 {
		function allowance(address owner, address spender) external view returns (uint256 amount);
		function approve(address spender, uint256 amount) external returns (bool success);
		function balanceOf(address account) external view returns (uint256 balance);
	}
}
