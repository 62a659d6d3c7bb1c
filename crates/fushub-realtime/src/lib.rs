//! Realtime change feed: authenticated WebSocket clients subscribe to tables
//! and receive row changes the API publishes through the [`Dispatcher`].

pub mod connection;
pub mod dispatcher;
pub mod subscriptions;

pub use connection::handle_connection;
pub use dispatcher::Dispatcher;
