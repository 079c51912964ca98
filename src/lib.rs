pub mod config;
pub mod contracts;
pub mod defender;
pub mod frontend;
pub mod networks;
pub mod pinning;
pub mod rpc;
pub mod verify;
pub mod watcher;
