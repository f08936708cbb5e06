pub mod messages;
pub mod publisher;

pub use publisher::TracingEventPublisher;
