//! Bitstream opening.
//!
//! `decode_bitstream` returns as soon as the work is accepted; decoding runs
//! on the worker pool and the result is installed by a continuation on the
//! UI thread. Starting a decode cancels any decode still in flight.
//!
//! Update sequence for one decode:
//! 1. `decode_busy = true` (synchronously, from dispatch)
//! 2. `decode_busy = false` + `total_frame_num` + `current_frame_poc` +
//!    `picture` + `sequence_name` (from the UI-thread continuation)

use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{frame_update, names, updates};
use crate::core::{BusError, BusResult, CancelToken, Command, CommandContext, Params, UpdateEvent};
use crate::model::{DecodedSequence, HmVersion, keys};

pub struct DecodeBitstream;

impl Command for DecodeBitstream {
    fn name(&self) -> &'static str {
        names::DECODE_BITSTREAM
    }

    fn execute(&self, ctx: &CommandContext<'_>, input: &Params) -> BusResult<Params> {
        let filename = input.get_str("filename")?;
        let skip_decode = input.opt_bool("skip_decode")?.unwrap_or(false);
        let version: HmVersion = input.opt_str("version")?.unwrap_or("auto").parse()?;
        let path = PathBuf::from(filename);

        if !ctx.app().fs().exists(&path) {
            return Err(BusError::ResourceUnavailable(format!(
                "file not found: {}",
                path.display()
            )));
        }
        {
            let mut settings = ctx.app().settings();
            settings.set(keys::OPEN_BITSTREAM_PATH, filename);
            settings.persist();
        }

        if skip_decode {
            return reuse_cached(ctx, &path);
        }

        let token = ctx.app().decode_cancel().renew();
        ctx.app().set_decoding(true);
        ctx.publish(UpdateEvent::new().with(updates::DECODE_BUSY, true));
        info!("Decoding {} ({}), session {}", path.display(), version, token.epoch());

        let decoder = ctx.app().decoder();
        let poster = ctx.poster();
        let job_path = path.clone();
        ctx.workers().execute_with_epoch(token.epoch(), move || {
            let result = decoder.decode(&job_path, version, &token);
            poster.post_task(move |ctx| finish_decode(ctx, result, &token));
        });

        Ok(Params::new()
            .with("accepted", true)
            .with("filename", filename)
            .with("version", version.to_string()))
    }
}

/// UI-thread continuation: install the sequence or report the failure.
fn finish_decode(ctx: &CommandContext<'_>, result: BusResult<DecodedSequence>, token: &CancelToken) {
    if token.is_cancelled() {
        // A newer decode (or cancel_decode) owns the busy flag now
        debug!("Dropping result of superseded decode session {}", token.epoch());
        return;
    }
    ctx.app().set_decoding(false);

    match result {
        Ok(sequence) => {
            let sequence = Arc::new(sequence);
            let name = sequence.display_name();
            ctx.app().sequence().install(Arc::clone(&sequence));
            info!("{}: {} frame(s) ready", name, sequence.len());

            let mut evt = frame_update(ctx.app(), true).unwrap_or_default();
            evt.set(updates::DECODE_BUSY, false);
            evt.set(updates::SEQUENCE_NAME, name);
            ctx.publish(evt);
        }
        Err(err) => {
            ctx.publish(UpdateEvent::new().with(updates::DECODE_BUSY, false));
            ctx.report(&err);
        }
    }
}

/// `skip_decode`: show the already decoded output of the same file again.
fn reuse_cached(ctx: &CommandContext<'_>, path: &Path) -> BusResult<Params> {
    let cached = ctx
        .app()
        .sequence()
        .sequence()
        .filter(|s| s.source == path)
        .cloned();
    let Some(sequence) = cached else {
        return Err(BusError::ResourceUnavailable(format!(
            "no decoded output cached for {}",
            path.display()
        )));
    };
    ctx.app().sequence().install(Arc::clone(&sequence));
    if let Some(mut evt) = frame_update(ctx.app(), true) {
        evt.set(updates::SEQUENCE_NAME, sequence.display_name());
        ctx.publish(evt);
    }
    Ok(Params::new()
        .with("accepted", true)
        .with("cached", true)
        .with(updates::TOTAL_FRAME_NUM, sequence.len()))
}

/// Abort the decode in flight, if any.
pub struct CancelDecode;

impl Command for CancelDecode {
    fn name(&self) -> &'static str {
        names::CANCEL_DECODE
    }

    fn execute(&self, ctx: &CommandContext<'_>, _input: &Params) -> BusResult<Params> {
        let was_busy = ctx.app().is_decoding();
        ctx.app().decode_cancel().cancel_all();
        if was_busy {
            ctx.app().set_decoding(false);
            ctx.publish(UpdateEvent::new().with(updates::DECODE_BUSY, false));
            info!("Decode cancelled");
        }
        Ok(Params::new().with("cancelled", was_busy))
    }
}
