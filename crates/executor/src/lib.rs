pub mod dispatch;

pub use dispatch::RegistryExecutor;
