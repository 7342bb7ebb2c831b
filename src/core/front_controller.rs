//! Front controller: command name → command instance.
//!
//! Registration happens once at startup (`&mut self`); dispatch is `&self`
//! and re-entrant, so commands can chain into other commands.
//!
//! Failure policy:
//! - `UnknownCommand` is a wiring bug: logged at error level, never silent
//! - every other failure is logged at warn level
//! - both are forwarded to the UI as an `error_message` update
//!   (transient notification), except cancellations

use log::{debug, error, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::command::{Command, CommandContext};
use super::error::{BusError, BusResult};
use super::invocation::InvocationEvent;
use super::params::Params;
use super::update_bus::{UpdateBus, UpdateEvent};
use super::workers::Workers;
use crate::model::AppContext;

/// Update parameter carrying user-visible failure text.
pub const ERROR_MESSAGE: &str = "error_message";

pub struct FrontController {
    commands: HashMap<String, Box<dyn Command>>,
    app: Arc<AppContext>,
    bus: UpdateBus,
    workers: Arc<Workers>,
}

impl FrontController {
    pub fn new(app: Arc<AppContext>, bus: UpdateBus, workers: Arc<Workers>) -> Self {
        Self {
            commands: HashMap::new(),
            app,
            bus,
            workers,
        }
    }

    /// Register under the command's own name.
    pub fn register(&mut self, command: Box<dyn Command>) -> BusResult<()> {
        let name = command.name();
        self.register_as(name, command)
    }

    /// Register under an explicit name. Duplicate names are rejected.
    pub fn register_as(&mut self, name: &str, command: Box<dyn Command>) -> BusResult<()> {
        if self.commands.contains_key(name) {
            error!("Duplicate registration of command '{}'", name);
            return Err(BusError::DuplicateRegistration(name.to_string()));
        }
        debug!("Registered command '{}'", name);
        self.commands.insert(name.to_string(), command);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve and execute. Synchronous: returns once the command has run
    /// (or, for background commands, once the work was accepted).
    ///
    /// This is the outermost entry point: failures are logged and reported
    /// here, once, however deep the command chain went.
    pub fn dispatch(&self, event: &InvocationEvent) -> BusResult<Params> {
        let result = self.execute_inner(event);
        if let Err(err) = &result {
            match err {
                BusError::UnknownCommand(name) => error!("Dispatch of unregistered command '{}'", name),
                _ => warn!("Command '{}' failed: {}", event.name(), err),
            }
            self.report(err);
        }
        result
    }

    /// Resolve and execute without logging or reporting failures.
    ///
    /// Used for chained dispatch from inside a command; the outer
    /// `dispatch` surfaces whatever comes back.
    pub(crate) fn execute_inner(&self, event: &InvocationEvent) -> BusResult<Params> {
        let name = event.name();
        let command = self
            .commands
            .get(name)
            .ok_or_else(|| BusError::UnknownCommand(name.to_string()))?;

        debug!(
            "Dispatch '{}' ({:?})",
            name,
            event.params().keys().collect::<Vec<_>>()
        );
        command.execute(&self.context(), event.params())
    }

    /// Forward a failure to the UI. Cancellation is not user-visible.
    pub fn report(&self, err: &BusError) {
        if *err == BusError::Cancelled {
            debug!("Cancelled work not reported");
            return;
        }
        self.bus
            .publish(UpdateEvent::new().with(ERROR_MESSAGE, err.to_string()));
    }

    pub fn context(&self) -> CommandContext<'_> {
        CommandContext::new(self)
    }

    // ========== UI-thread queue ==========

    /// Deliver queued updates and run queued continuations.
    pub fn pump(&self) -> usize {
        self.bus.drain(|task| task(&self.context()))
    }

    /// As `pump`, but wait up to `timeout` for the first message.
    pub fn pump_blocking(&self, timeout: Duration) -> usize {
        self.bus.drain_blocking(timeout, |task| task(&self.context()))
    }

    // ========== Accessors ==========

    pub fn app(&self) -> &AppContext {
        &self.app
    }

    pub fn app_arc(&self) -> &Arc<AppContext> {
        &self.app
    }

    pub fn bus(&self) -> &UpdateBus {
        &self.bus
    }

    pub fn workers(&self) -> &Workers {
        &self.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AppContext;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

    struct Echo {
        runs: Arc<AtomicI32>,
    }

    impl Command for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn execute(&self, _ctx: &CommandContext<'_>, input: &Params) -> BusResult<Params> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(input.clone().with("echoed", true))
        }
    }

    struct Fails;

    impl Command for Fails {
        fn name(&self) -> &'static str {
            "fails"
        }

        fn execute(&self, _ctx: &CommandContext<'_>, _input: &Params) -> BusResult<Params> {
            Err(BusError::failed("fails", "always"))
        }
    }

    fn controller() -> FrontController {
        let workers = Arc::new(Workers::new(1, Arc::new(AtomicU64::new(0))));
        FrontController::new(Arc::new(AppContext::in_memory()), UpdateBus::new(), workers)
    }

    #[test]
    fn test_dispatch_routes_to_one_command() {
        let mut fc = controller();
        let runs = Arc::new(AtomicI32::new(0));
        fc.register(Box::new(Echo { runs: Arc::clone(&runs) })).unwrap();

        let out = InvocationEvent::new("echo").with("percent", 50).dispatch(&fc).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(out.get_int("percent"), Ok(50));
        assert_eq!(out.get_bool("echoed"), Ok(true));
    }

    #[test]
    fn test_unknown_command_runs_nothing_and_reports() {
        let mut fc = controller();
        let runs = Arc::new(AtomicI32::new(0));
        fc.register(Box::new(Echo { runs: Arc::clone(&runs) })).unwrap();

        let reported = Arc::new(Mutex::new(Vec::<String>::new()));
        let r = Arc::clone(&reported);
        fc.bus().listen_to(ERROR_MESSAGE, move |evt| {
            r.lock().unwrap().push(evt.get_str(ERROR_MESSAGE).unwrap().to_string());
        });

        let res = InvocationEvent::new("no_such").dispatch(&fc);
        assert_eq!(res, Err(BusError::UnknownCommand("no_such".into())));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(reported.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut fc = controller();
        let runs = Arc::new(AtomicI32::new(0));
        fc.register(Box::new(Echo { runs: Arc::clone(&runs) })).unwrap();
        let again = fc.register(Box::new(Echo { runs }));
        assert_eq!(again, Err(BusError::DuplicateRegistration("echo".into())));
        assert_eq!(fc.command_names(), vec!["echo"]);
    }

    #[test]
    fn test_failure_is_returned_and_reported() {
        let mut fc = controller();
        fc.register(Box::new(Fails)).unwrap();
        let hits = Arc::new(AtomicI32::new(0));
        let h = Arc::clone(&hits);
        fc.bus().listen_to(ERROR_MESSAGE, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(matches!(
            InvocationEvent::new("fails").dispatch(&fc),
            Err(BusError::CommandFailed { .. })
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    struct Chains;

    impl Command for Chains {
        fn name(&self) -> &'static str {
            "chains"
        }

        fn execute(&self, ctx: &CommandContext<'_>, input: &Params) -> BusResult<Params> {
            let target = input.get_str("target")?;
            ctx.dispatch(&InvocationEvent::new(target))
        }
    }

    #[test]
    fn test_chained_failure_reported_once() {
        let mut fc = controller();
        fc.register(Box::new(Fails)).unwrap();
        fc.register(Box::new(Chains)).unwrap();
        let reported = Arc::new(Mutex::new(Vec::<String>::new()));
        let r = Arc::clone(&reported);
        fc.bus().listen_to(ERROR_MESSAGE, move |evt| {
            r.lock().unwrap().push(evt.get_str(ERROR_MESSAGE).unwrap().to_string());
        });

        let res = InvocationEvent::new("chains").with("target", "fails").dispatch(&fc);
        assert!(matches!(res, Err(BusError::CommandFailed { .. })));
        assert_eq!(reported.lock().unwrap().len(), 1);

        let res = InvocationEvent::new("chains").with("target", "no_such").dispatch(&fc);
        assert_eq!(res, Err(BusError::UnknownCommand("no_such".into())));
        assert_eq!(reported.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_register_as_alias() {
        let mut fc = controller();
        let runs = Arc::new(AtomicI32::new(0));
        fc.register_as("echo_alias", Box::new(Echo { runs: Arc::clone(&runs) }))
            .unwrap();
        assert!(fc.contains("echo_alias"));
        assert!(!fc.contains("echo"));
        InvocationEvent::new("echo_alias").dispatch(&fc).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
