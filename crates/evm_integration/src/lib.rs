pub mod abi;
pub mod logs;
pub mod node_wallet;
pub mod rpc;

pub use logs::ResponseLogFeed;
pub use node_wallet::NodeWalletProvider;
pub use rpc::{JsonRpcClient, TransportError};
