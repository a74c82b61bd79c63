//! Job id generation

use uuid::Uuid;

/// Source of fresh job ids; every id must be unique and path-safe
pub trait JobIdGenerator: Send + Sync {
    /// Produce the next job id
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl JobIdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
