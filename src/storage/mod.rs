mod event_storage;

pub use event_storage::{EventStorage, InMemoryEventStorage};
