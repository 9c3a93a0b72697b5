pub mod amino;
pub mod call;
pub mod messages;
pub mod rest;
pub mod task;
pub mod tx;

pub use call::ChildChainCall;
pub use messages::{HeimdallMsg, MsgEventRecord, MsgTopup};
pub use rest::{AccountResponse, BaseAccount, ResponseWithHeight};
pub use task::EventTask;
pub use tx::{BroadcastMode, BroadcastTxRequest, BroadcastTxResponse, StdFee, StdSignDoc, StdTx, Tx};
