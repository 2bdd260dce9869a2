pub mod abi;
pub mod felt;

mod config;
mod descriptor;
mod envelope;
mod error;
mod execution;
mod hub;
mod indexer;
mod network;
mod networks;
mod orchestrator;
mod pending;
mod picker;
mod pin;
mod proposals;
mod registry;
mod relayer;
mod rpc;
mod serve;
mod space;
mod transaction;
mod util;
mod vote;
mod voting_power;
mod wallet;

pub use config::*;
pub use descriptor::*;
pub use envelope::*;
pub use error::*;
pub use execution::*;
pub use hub::*;
pub use indexer::*;
pub use network::*;
pub use networks::*;
pub use orchestrator::*;
pub use pending::*;
pub use picker::*;
pub use pin::*;
pub use proposals::*;
pub use registry::*;
pub use relayer::*;
pub use rpc::*;
pub use serve::*;
pub use space::*;
pub use transaction::*;
pub use util::*;
pub use vote::*;
pub use voting_power::*;
pub use wallet::*;
