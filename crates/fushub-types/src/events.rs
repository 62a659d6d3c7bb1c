use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::ConversationSummary;
use crate::models::{FavoriteState, Message};

/// Record collections a realtime client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Messages,
    Conversations,
    Favorites,
    Listings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingChange {
    Created,
    Updated,
    Deleted,
}

/// Events sent over the realtime socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChangeEvent {
    /// Server confirms the connection is authenticated
    Ready { user_id: Uuid },

    /// A message row was inserted
    MessageInserted {
        message: Message,
        tenant_id: Uuid,
        owner_id: Uuid,
    },

    /// Messages in a conversation were flipped to read by `reader_id`
    MessagesRead {
        conversation_id: Uuid,
        reader_id: Uuid,
        count: u32,
        tenant_id: Uuid,
        owner_id: Uuid,
    },

    /// Fresh summary of one conversation for the receiving participant.
    /// Clients replace their list entry with the same id.
    ConversationUpdated { summary: ConversationSummary },

    /// The receiving user's favorite set changed
    FavoriteToggled { listing_id: Uuid, state: FavoriteState },

    /// A listing was created, edited, hidden or removed
    ListingChanged { listing_id: Uuid, change: ListingChange },
}

impl ChangeEvent {
    /// The table this event belongs to. `Ready` belongs to none and is always delivered.
    pub fn table(&self) -> Option<Table> {
        match self {
            Self::Ready { .. } => None,
            Self::MessageInserted { .. } | Self::MessagesRead { .. } => Some(Table::Messages),
            Self::ConversationUpdated { .. } => Some(Table::Conversations),
            Self::FavoriteToggled { .. } => Some(Table::Favorites),
            Self::ListingChanged { .. } => Some(Table::Listings),
        }
    }

    /// Returns the conversation this event is scoped to, if any.
    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageInserted { message, .. } => Some(message.conversation_id),
            Self::MessagesRead { conversation_id, .. } => Some(*conversation_id),
            Self::ConversationUpdated { summary } => Some(summary.id),
            _ => None,
        }
    }

    /// Users allowed to receive this event when it is broadcast.
    /// `None` means the event is public.
    pub fn audience(&self) -> Option<[Uuid; 2]> {
        match self {
            Self::MessageInserted { tenant_id, owner_id, .. }
            | Self::MessagesRead { tenant_id, owner_id, .. } => Some([*tenant_id, *owner_id]),
            _ => None,
        }
    }

    pub fn visible_to(&self, user_id: Uuid) -> bool {
        self.audience().is_none_or(|members| members.contains(&user_id))
    }
}

/// Commands sent FROM client TO server over the realtime socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RealtimeCommand {
    /// Start receiving events for a table, optionally narrowed to one conversation.
    /// Subscribing again to the same table replaces the previous filter.
    Subscribe {
        table: Table,
        #[serde(default)]
        conversation_id: Option<Uuid>,
    },

    /// Stop receiving events for a table
    Unsubscribe { table: Table },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(conversation_id: Uuid) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: Uuid::new_v4(),
            body: "Is this still available?".into(),
            created_at: Utc::now(),
            read: false,
            read_at: None,
        }
    }

    #[test]
    fn events_are_adjacently_tagged() {
        let listing_id = Uuid::new_v4();
        let json = serde_json::to_value(ChangeEvent::ListingChanged {
            listing_id,
            change: ListingChange::Deleted,
        })
        .unwrap();
        assert_eq!(json["type"], "ListingChanged");
        assert_eq!(json["data"]["change"], "deleted");
    }

    #[test]
    fn message_events_are_private_to_participants() {
        let (tenant, owner) = (Uuid::new_v4(), Uuid::new_v4());
        let conv = Uuid::new_v4();
        let event = ChangeEvent::MessageInserted {
            message: message(conv),
            tenant_id: tenant,
            owner_id: owner,
        };
        assert_eq!(event.table(), Some(Table::Messages));
        assert_eq!(event.conversation_id(), Some(conv));
        assert!(event.visible_to(tenant));
        assert!(event.visible_to(owner));
        assert!(!event.visible_to(Uuid::new_v4()));

        let public = ChangeEvent::ListingChanged {
            listing_id: Uuid::new_v4(),
            change: ListingChange::Created,
        };
        assert!(public.visible_to(Uuid::new_v4()));
    }

    #[test]
    fn subscribe_filter_is_optional() {
        let cmd: RealtimeCommand =
            serde_json::from_str(r#"{"type":"Subscribe","data":{"table":"messages"}}"#).unwrap();
        match cmd {
            RealtimeCommand::Subscribe { table, conversation_id } => {
                assert_eq!(table, Table::Messages);
                assert!(conversation_id.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
