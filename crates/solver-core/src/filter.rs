//! Allow/block list matching.
//!
//! The block list is checked first and wins over the allow list. An empty
//! allow list admits every order that is not blocked.

use solver_types::order::WILDCARD;
use solver_types::{AllowBlockListItem, AllowBlockLists, ParsedArgs};

/// Result of checking an order against the lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListVerdict {
	Allowed,
	/// Matched a block-list item.
	Blocked,
	/// The allow list is non-empty and no item matched.
	NotAllowed,
}

fn field_matches(pattern: &str, value: &str) -> bool {
	pattern == WILDCARD || value == WILDCARD || pattern.eq_ignore_ascii_case(value)
}

/// An item matches when the sender matches and at least one recipient matches
/// both the destination and the recipient address.
fn item_matches(item: &AllowBlockListItem, order: &ParsedArgs) -> bool {
	field_matches(&item.sender_address, &order.sender_address)
		&& order.recipients.iter().any(|recipient| {
			field_matches(&item.destination_domain, &recipient.destination_chain_name)
				&& field_matches(&item.recipient_address, &recipient.recipient_address)
		})
}

pub fn check_lists(lists: &AllowBlockLists, order: &ParsedArgs) -> ListVerdict {
	if lists.block_list.iter().any(|item| item_matches(item, order)) {
		return ListVerdict::Blocked;
	}
	if lists.allow_list.is_empty() || lists.allow_list.iter().any(|item| item_matches(item, order)) {
		ListVerdict::Allowed
	} else {
		ListVerdict::NotAllowed
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use solver_types::Recipient;

	const ALICE: &str = "0xAbCd000000000000000000000000000000000001";
	const BOB: &str = "0x000000000000000000000000000000000000b0b0";

	fn item(sender: &str, domain: &str, recipient: &str) -> AllowBlockListItem {
		AllowBlockListItem {
			sender_address: sender.to_string(),
			destination_domain: domain.to_string(),
			recipient_address: recipient.to_string(),
		}
	}

	fn order(sender: &str, recipients: &[(&str, &str)]) -> ParsedArgs {
		let mut order = crate::test_support::order(vec![]);
		order.sender_address = sender.to_string();
		order.recipients = recipients
			.iter()
			.map(|(chain, address)| Recipient {
				destination_chain_name: chain.to_string(),
				recipient_address: address.to_string(),
			})
			.collect();
		order
	}

	#[test]
	fn test_empty_lists_allow() {
		let order = order(ALICE, &[("optimism", BOB)]);
		assert_eq!(check_lists(&AllowBlockLists::default(), &order), ListVerdict::Allowed);
	}

	#[test]
	fn test_block_takes_precedence_over_allow() {
		let lists = AllowBlockLists {
			allow_list: vec![item("*", "*", "*")],
			block_list: vec![item(&ALICE.to_lowercase(), "*", "*")],
		};
		assert_eq!(
			check_lists(&lists, &order(ALICE, &[("optimism", BOB)])),
			ListVerdict::Blocked
		);
		assert_eq!(
			check_lists(&lists, &order(BOB, &[("optimism", BOB)])),
			ListVerdict::Allowed
		);
	}

	#[test]
	fn test_allow_list_needs_one_matching_recipient() {
		let lists = AllowBlockLists {
			allow_list: vec![item("*", "optimism", BOB)],
			block_list: vec![],
		};
		assert_eq!(
			check_lists(&lists, &order(ALICE, &[("base", BOB), ("optimism", BOB)])),
			ListVerdict::Allowed
		);
		// Domain and recipient must match on the same recipient
		assert_eq!(
			check_lists(&lists, &order(ALICE, &[("base", BOB), ("optimism", ALICE)])),
			ListVerdict::NotAllowed
		);
		assert_eq!(check_lists(&lists, &order(ALICE, &[])), ListVerdict::NotAllowed);
	}

	#[test]
	fn test_wildcard_recipient_in_order() {
		let lists = AllowBlockLists {
			allow_list: vec![],
			block_list: vec![item("*", "base", BOB)],
		};
		assert_eq!(
			check_lists(&lists, &order(ALICE, &[("*", "*")])),
			ListVerdict::Blocked
		);
	}
}
