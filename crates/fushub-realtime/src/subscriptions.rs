use std::collections::HashMap;

use uuid::Uuid;

use fushub_types::events::{ChangeEvent, RealtimeCommand, Table};

/// What one connection asked to hear about.
/// Each table maps to an optional conversation filter.
#[derive(Debug, Default)]
pub struct Subscriptions {
    tables: HashMap<Table, Option<Uuid>>,
}

impl Subscriptions {
    pub fn apply(&mut self, cmd: RealtimeCommand) {
        match cmd {
            RealtimeCommand::Subscribe {
                table,
                conversation_id,
            } => {
                self.tables.insert(table, conversation_id);
            }
            RealtimeCommand::Unsubscribe { table } => {
                self.tables.remove(&table);
            }
        }
    }

    /// Whether the event matches a subscription. Table-less events always pass.
    /// Visibility is checked separately by the connection.
    pub fn wants(&self, event: &ChangeEvent) -> bool {
        let Some(table) = event.table() else {
            return true;
        };
        match self.tables.get(&table) {
            None => false,
            Some(None) => true,
            Some(Some(conversation_id)) => event.conversation_id() == Some(*conversation_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fushub_types::events::ListingChange;

    fn read_event(conversation_id: Uuid) -> ChangeEvent {
        ChangeEvent::MessagesRead {
            conversation_id,
            reader_id: Uuid::new_v4(),
            count: 2,
            tenant_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn nothing_is_delivered_before_subscribing() {
        let subs = Subscriptions::default();
        assert!(subs.is_empty());
        assert!(!subs.wants(&read_event(Uuid::new_v4())));
        assert!(subs.wants(&ChangeEvent::Ready {
            user_id: Uuid::new_v4()
        }));
    }

    #[test]
    fn conversation_filter_narrows_message_events() {
        let watched = Uuid::new_v4();
        let mut subs = Subscriptions::default();
        subs.apply(RealtimeCommand::Subscribe {
            table: Table::Messages,
            conversation_id: Some(watched),
        });

        assert!(subs.wants(&read_event(watched)));
        assert!(!subs.wants(&read_event(Uuid::new_v4())));
        assert!(!subs.wants(&ChangeEvent::ListingChanged {
            listing_id: Uuid::new_v4(),
            change: ListingChange::Created,
        }));

        // Re-subscribing without a filter widens to the whole table
        subs.apply(RealtimeCommand::Subscribe {
            table: Table::Messages,
            conversation_id: None,
        });
        assert!(subs.wants(&read_event(Uuid::new_v4())));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut subs = Subscriptions::default();
        subs.apply(RealtimeCommand::Subscribe {
            table: Table::Listings,
            conversation_id: None,
        });
        subs.apply(RealtimeCommand::Unsubscribe {
            table: Table::Listings,
        });
        assert!(subs.is_empty());
    }
}
