//! `print_screen`: hand the current picture to whoever saves snapshots.
//!
//! The picture travels as a shared handle; the sequence keeps its own
//! reference, so subscribers can hold on to it past the publish call.

use super::{names, updates};
use crate::core::{BusError, BusResult, Command, CommandContext, Handle, Params, UpdateEvent};
use crate::model::NavError;

pub struct PrintScreen;

impl Command for PrintScreen {
    fn name(&self) -> &'static str {
        names::PRINT_SCREEN
    }

    fn execute(&self, ctx: &CommandContext<'_>, _input: &Params) -> BusResult<Params> {
        let picture = ctx
            .app()
            .sequence()
            .current_picture()
            .ok_or_else(|| BusError::failed(self.name(), NavError::NoSequence.to_string()))?;
        let poc = picture.poc;
        ctx.publish(UpdateEvent::new().with(updates::SNAPSHOT, Handle::from_arc(picture)));
        Ok(Params::new().with(updates::CURRENT_FRAME_POC, poc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::test_controller;
    use crate::core::InvocationEvent;
    use crate::model::Picture;
    use crate::model::sequence::tests::sequence_of;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_snapshot_shares_current_picture() {
        let fc = test_controller();
        fc.app().sequence().install(sequence_of(4));
        fc.app().sequence().step(2).unwrap();

        let got: Arc<Mutex<Option<Arc<Picture>>>> = Arc::new(Mutex::new(None));
        let g = Arc::clone(&got);
        fc.bus().listen_to(updates::SNAPSHOT, move |evt| {
            *g.lock().unwrap() = evt.get_handle_as::<Picture>(updates::SNAPSHOT).ok();
        });

        InvocationEvent::new(names::PRINT_SCREEN).dispatch(&fc).unwrap();
        let pic = got.lock().unwrap().clone().unwrap();
        assert_eq!(pic.poc, 2);
        let current = fc.app().sequence().current_picture().unwrap();
        assert!(Arc::ptr_eq(&pic, &current));
    }

    #[test]
    fn test_snapshot_without_sequence_fails() {
        let fc = test_controller();
        assert!(InvocationEvent::new(names::PRINT_SCREEN).dispatch(&fc).is_err());
    }
}
