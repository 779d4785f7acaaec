//! The activity notifier and dispatch worker (§4.7): couples the
//! local-storage scanner's uuid discoveries to the remote-API client's
//! targeted-sync mode.

pub mod dispatch;
pub mod notifier;

pub use dispatch::DispatchWorker;
pub use notifier::{ActivityEvent, Notifier};
