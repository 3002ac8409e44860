//! Pet Client - reconciliation engine for the Maya pet record
//!
//! Keeps a local, continuously decaying view of a record that is only
//! authoritative at confirmation points:
//! - Pull: snapshots fetched over RPC, merged newest-wins into [`RecordCache`]
//! - Push: program events merged as partial updates, each followed by a fetch
//! - Extrapolation and presentation derived every tick by the view loop

pub mod address;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod extrapolate;
pub mod presentation;
pub mod reconciler;
pub mod record;
pub mod rpc;
pub mod session;
pub mod view;

#[cfg(test)]
mod tests;

pub use address::RecordAddress;
pub use cache::{CacheState, RecordCache};
pub use client::PetClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, ClientSettings};
pub use error::{ClientError, ConfigError, RpcError, TransactionFailure};
pub use extrapolate::{extrapolate, DecayExtrapolator, Vitals};
pub use presentation::{PresentationState, Presenter};
pub use reconciler::SubscriptionHandle;
pub use record::{FetchOutcome, Record, RecordPatch};
pub use rpc::{AccountSnapshot, JsonRpcLedger, LedgerRpc, LogNotification, SignatureStatus};
pub use session::PetSession;
pub use view::{spawn_view, PetView, Scene, ViewHandle, ViewSettings};
