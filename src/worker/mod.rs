//! Background workers
//!
//! A [`WorkerController`] runs either a discovery pass or a batch run on its own
//! thread and streams [`WorkerEvent`]s back over a channel, so the caller stays
//! responsive and can cancel.

pub mod controller;
pub mod events;

pub use controller::{ControllerState, DiscoveryRequest, WorkerController};
pub use events::{WorkKind, WorkerEvent};
