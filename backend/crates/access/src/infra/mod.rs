//! Infrastructure Layer
//!
//! Repository implementations and the bundled playback resolvers.

pub mod memory;
pub mod postgres;
pub mod resolvers;

pub use memory::InMemoryAccessRepository;
pub use postgres::PgAccessRepository;
pub use resolvers::{DirectUrlResolver, EmbedResolver, SignedUrlResolver};
