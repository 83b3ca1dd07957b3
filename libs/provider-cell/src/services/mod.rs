pub mod connection;
pub mod directory;

pub use connection::ConnectionGate;
pub use directory::ProviderDirectory;
