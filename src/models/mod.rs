pub mod messages;
pub mod profile;

// Re-export important types
pub use messages::*;
pub use profile::*;
