//! Conversation list derivation
//!
//! Reduces a user's full direct-message history to one row per
//! counterparty. Pure: no state, no caching, same input set in any
//! order gives the same output.

pub mod handlers;

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::db::DirectMessage;

/// One row of the conversation list: the other participant and the most
/// recent message exchanged with them, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub counterparty_id: Uuid,
    pub last_message: DirectMessage,
}

/// Collapse `messages` (already filtered to those involving `viewpoint`)
/// into one summary per distinct counterparty. Within a counterparty the
/// winner is the highest `created_at`, ties broken by highest id so the
/// result is deterministic. Rows come back ordered most recent first.
pub fn summarize_conversations(
    viewpoint: Uuid,
    messages: &[DirectMessage],
) -> Vec<ConversationSummary> {
    let mut latest: HashMap<Uuid, &DirectMessage> = HashMap::new();

    for message in messages {
        let counterparty = if message.sender_id == viewpoint {
            message.receiver_id
        } else {
            message.sender_id
        };

        match latest.entry(counterparty) {
            Entry::Occupied(mut entry) => {
                let current = *entry.get();
                if (message.created_at, message.id) > (current.created_at, current.id) {
                    entry.insert(message);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(message);
            }
        }
    }

    let mut summaries: Vec<ConversationSummary> = latest
        .into_iter()
        .map(|(counterparty_id, message)| ConversationSummary {
            counterparty_id,
            last_message: message.clone(),
        })
        .collect();

    summaries.sort_by(|a, b| {
        (b.last_message.created_at, b.last_message.id)
            .cmp(&(a.last_message.created_at, a.last_message.id))
    });

    summaries
}
