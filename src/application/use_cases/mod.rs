pub mod billing_events;
pub mod subscriptions;
