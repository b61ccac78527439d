pub mod blockchain;
pub mod db;
pub mod memory;

pub use blockchain::EdgeFunctionsGateway;
pub use db::DbAdapter;
pub use memory::InMemoryBackend;
