//! Core bus - parameters, commands, dispatch, update notifications, workers
//!
//! These modules carry no viewer semantics; commands and model live elsewhere.

pub mod cancel;
pub mod command;
pub mod error;
pub mod front_controller;
pub mod invocation;
pub mod params;
pub mod update_bus;
pub mod workers;

// Re-exports for convenience
pub use cancel::{CancelSource, CancelToken};
pub use command::{Command, CommandContext};
pub use error::{BusError, BusResult};
pub use front_controller::FrontController;
pub use invocation::InvocationEvent;
pub use params::{Handle, ParamValue, Params};
pub use update_bus::{SubscriptionId, UiPoster, UpdateBus, UpdateEvent};
pub use workers::Workers;
