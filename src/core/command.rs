//! Command interface.
//!
//! A command is a named unit of work: it reads its input `Params`, mutates
//! the application model reachable through [`CommandContext`], publishes
//! update events, and returns an output `Params`. Commands keep no state
//! between invocations; shared state lives in [`AppContext`].

use std::sync::Arc;

use super::error::{BusError, BusResult};
use super::front_controller::FrontController;
use super::invocation::InvocationEvent;
use super::params::Params;
use super::update_bus::{UiPoster, UpdateBus, UpdateEvent};
use super::workers::Workers;
use crate::model::AppContext;

pub trait Command: Send + Sync {
    /// Registration name, e.g. `"next_frame"`.
    fn name(&self) -> &'static str;

    fn execute(&self, ctx: &CommandContext<'_>, input: &Params) -> BusResult<Params>;
}

/// Everything a command may touch, borrowed from the front controller for
/// the duration of one dispatch (or one UI-thread continuation).
pub struct CommandContext<'a> {
    controller: &'a FrontController,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(controller: &'a FrontController) -> Self {
        Self { controller }
    }

    /// Shared application model.
    pub fn app(&self) -> &'a AppContext {
        self.controller.app()
    }

    pub fn app_arc(&self) -> Arc<AppContext> {
        Arc::clone(self.controller.app_arc())
    }

    pub fn bus(&self) -> &'a UpdateBus {
        self.controller.bus()
    }

    pub fn publish(&self, event: UpdateEvent) {
        self.controller.bus().publish(event);
    }

    /// Hand-off for work that finishes on another thread.
    pub fn poster(&self) -> UiPoster {
        self.controller.bus().poster()
    }

    pub fn workers(&self) -> &'a Workers {
        self.controller.workers()
    }

    /// Chain into another command (same thread, synchronous).
    ///
    /// Failures come back unreported; the outermost dispatch reports them.
    pub fn dispatch(&self, event: &InvocationEvent) -> BusResult<Params> {
        self.controller.execute_inner(event)
    }

    /// Surface a failure that happened outside `execute` (worker results).
    pub fn report(&self, err: &BusError) {
        log::warn!("{}", err);
        self.controller.report(err);
    }
}
