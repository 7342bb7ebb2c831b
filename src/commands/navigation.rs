//! Frame navigation: prev/next, slider percentage, explicit POC.
//!
//! Each command moves the playhead and publishes `picture` together with
//! `current_frame_poc` so the viewport and the counters redraw in one pass.

use super::{frame_update, names, updates};
use crate::core::{BusError, BusResult, Command, CommandContext, Params};
use crate::model::NavError;

/// Apply a playhead move, then publish the resulting frame.
fn navigate(
    ctx: &CommandContext<'_>,
    command: &str,
    mv: impl FnOnce(&mut crate::model::SequenceState) -> Result<usize, NavError>,
) -> BusResult<Params> {
    let index = {
        let mut seq = ctx.app().sequence();
        mv(&mut *seq).map_err(|e| BusError::failed(command, e.to_string()))?
    };
    let evt = frame_update(ctx.app(), false)
        .ok_or_else(|| BusError::failed(command, NavError::NoSequence.to_string()))?;
    let poc = evt.get_int(updates::CURRENT_FRAME_POC)?;
    ctx.publish(evt);
    Ok(Params::new()
        .with("index", index)
        .with(updates::CURRENT_FRAME_POC, poc))
}

pub struct PrevFrame;

impl Command for PrevFrame {
    fn name(&self) -> &'static str {
        names::PREV_FRAME
    }

    fn execute(&self, ctx: &CommandContext<'_>, _input: &Params) -> BusResult<Params> {
        navigate(ctx, self.name(), |seq| seq.step(-1))
    }
}

pub struct NextFrame;

impl Command for NextFrame {
    fn name(&self) -> &'static str {
        names::NEXT_FRAME
    }

    fn execute(&self, ctx: &CommandContext<'_>, _input: &Params) -> BusResult<Params> {
        navigate(ctx, self.name(), |seq| seq.step(1))
    }
}

/// `percent`: slider position 0..=100.
pub struct JumpToPercent;

impl Command for JumpToPercent {
    fn name(&self) -> &'static str {
        names::JUMPTO_PERCENT
    }

    fn execute(&self, ctx: &CommandContext<'_>, input: &Params) -> BusResult<Params> {
        let percent = input.get_int("percent")?;
        if !(0..=100).contains(&percent) {
            return Err(BusError::invalid("percent", format!("{} outside 0..=100", percent)));
        }
        navigate(ctx, self.name(), |seq| seq.jump_to_percent(percent))
    }
}

/// `poc`: picture order count to show.
pub struct JumpToFrame;

impl Command for JumpToFrame {
    fn name(&self) -> &'static str {
        names::JUMPTO_FRAME
    }

    fn execute(&self, ctx: &CommandContext<'_>, input: &Params) -> BusResult<Params> {
        let poc = input.get_int("poc")?;
        navigate(ctx, self.name(), |seq| seq.jump_to_poc(poc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::test_controller;
    use crate::core::InvocationEvent;
    use crate::model::Picture;
    use crate::model::sequence::tests::sequence_of;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_jumpto_percent_midpoint() {
        let fc = test_controller();
        fc.app().sequence().install(sequence_of(101));

        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        fc.bus().listen_to(updates::CURRENT_FRAME_POC, move |evt| {
            *s.lock().unwrap() = Some(evt.get_int(updates::CURRENT_FRAME_POC).unwrap());
        });

        let out = InvocationEvent::new(names::JUMPTO_PERCENT)
            .with("percent", 50)
            .dispatch(&fc)
            .unwrap();
        assert_eq!(out.get_int(updates::CURRENT_FRAME_POC), Ok(50));
        assert_eq!(*seen.lock().unwrap(), Some(50));
        assert_eq!(fc.app().sequence().current_index(), 50);
    }

    #[test]
    fn test_jumpto_percent_rejects_out_of_range() {
        let fc = test_controller();
        fc.app().sequence().install(sequence_of(10));
        let res = InvocationEvent::new(names::JUMPTO_PERCENT)
            .with("percent", 150)
            .dispatch(&fc);
        assert!(matches!(res, Err(BusError::InvalidParameter { .. })));

        let res = InvocationEvent::new(names::JUMPTO_PERCENT).dispatch(&fc);
        assert_eq!(res, Err(BusError::MissingParameter("percent".into())));
    }

    #[test]
    fn test_next_prev_publish_picture() {
        let fc = test_controller();
        fc.app().sequence().install(sequence_of(3));

        let pictures = Arc::new(AtomicI32::new(0));
        let last_poc = Arc::new(AtomicI32::new(-1));
        let (p, l) = (Arc::clone(&pictures), Arc::clone(&last_poc));
        fc.bus().listen_to(updates::PICTURE, move |evt| {
            let pic = evt.get_handle_as::<Picture>(updates::PICTURE).unwrap();
            l.store(pic.poc, Ordering::SeqCst);
            p.fetch_add(1, Ordering::SeqCst);
        });

        InvocationEvent::new(names::NEXT_FRAME).dispatch(&fc).unwrap();
        InvocationEvent::new(names::NEXT_FRAME).dispatch(&fc).unwrap();
        assert_eq!(last_poc.load(Ordering::SeqCst), 2);
        assert!(InvocationEvent::new(names::NEXT_FRAME).dispatch(&fc).is_err());

        InvocationEvent::new(names::PREV_FRAME).dispatch(&fc).unwrap();
        assert_eq!(last_poc.load(Ordering::SeqCst), 1);
        assert_eq!(pictures.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_navigation_without_sequence_fails() {
        let fc = test_controller();
        let res = InvocationEvent::new(names::NEXT_FRAME).dispatch(&fc);
        assert!(matches!(res, Err(BusError::CommandFailed { .. })));
    }

    #[test]
    fn test_jumpto_frame() {
        let fc = test_controller();
        fc.app().sequence().install(sequence_of(8));
        InvocationEvent::new(names::JUMPTO_FRAME)
            .with("poc", 6)
            .dispatch(&fc)
            .unwrap();
        assert_eq!(fc.app().sequence().current_poc(), Some(6));
        assert!(InvocationEvent::new(names::JUMPTO_FRAME)
            .with("poc", 60)
            .dispatch(&fc)
            .is_err());
    }
}
