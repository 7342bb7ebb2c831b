//! BITVIEW - HEVC bitstream viewer library
//!
//! UI actions become named [`InvocationEvent`]s dispatched through the
//! [`FrontController`]; model changes come back as [`UpdateEvent`]s that
//! views subscribe to by parameter name on the [`UpdateBus`].

// Command/notification bus (params, dispatch, update bus, workers)
pub mod core;

// Application model and viewer commands
pub mod commands;
pub mod model;

// Front end and plumbing
pub mod cli;
pub mod paths;
pub mod ui;

pub use core::{
    BusError, BusResult, Command, CommandContext, FrontController, Handle, InvocationEvent, ParamValue,
    Params, UpdateBus, UpdateEvent,
};
pub use model::AppContext;
pub use ui::ConsoleView;
