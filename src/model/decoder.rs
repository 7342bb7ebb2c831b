//! Decoder collaborator.
//!
//! Real HEVC reconstruction is an external concern; the viewer only needs
//! something implementing [`BitstreamDecoder`]. The bundled
//! [`AnnexBDecoder`] splits an H.265 Annex-B stream into access units and
//! renders each one as a grayscale byte map, which is enough to browse a
//! stream frame by frame and is what the viewer falls back to.

use image::GrayImage;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::sequence::{DecodedSequence, Picture};
use crate::core::{BusError, BusResult, CancelToken};

/// Reference-decoder version the stream was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmVersion {
    Auto,
    Hm { major: u32, minor: u32 },
}

static HM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^hm[-_ ]?(\d{1,2})\.(\d{1,2})$").expect("valid HM regex"));

impl FromStr for HmVersion {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("auto") {
            return Ok(HmVersion::Auto);
        }
        let caps = HM_RE
            .captures(s)
            .ok_or_else(|| BusError::invalid("version", format!("unrecognised version '{}'", s)))?;
        let major = caps[1]
            .parse()
            .map_err(|_| BusError::invalid("version", s.to_string()))?;
        let minor = caps[2]
            .parse()
            .map_err(|_| BusError::invalid("version", s.to_string()))?;
        Ok(HmVersion::Hm { major, minor })
    }
}

impl std::fmt::Display for HmVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HmVersion::Auto => write!(f, "auto"),
            HmVersion::Hm { major, minor } => write!(f, "HM-{}.{}", major, minor),
        }
    }
}

pub trait BitstreamDecoder: Send + Sync {
    /// Decode `path` into display-ordered pictures. Must check `cancel`
    /// regularly and return `BusError::Cancelled` once it trips.
    fn decode(&self, path: &Path, version: HmVersion, cancel: &CancelToken) -> BusResult<DecodedSequence>;
}

/// Existence check used before a decode is even queued.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Access-unit scanner for H.265 Annex-B byte streams.
#[derive(Debug, Clone)]
pub struct AnnexBDecoder {
    /// Width of the byte-map preview in pixels
    pub preview_width: u32,
    /// Preview height cap; longer access units are truncated
    pub max_preview_height: u32,
}

impl Default for AnnexBDecoder {
    fn default() -> Self {
        Self {
            preview_width: 64,
            max_preview_height: 64,
        }
    }
}

/// NAL unit located inside the stream (payload excludes the start code).
#[derive(Debug, Clone, Copy, PartialEq)]
struct NalUnit {
    start: usize,
    end: usize,
    nal_type: u8,
    first_slice: bool,
}

impl NalUnit {
    fn is_vcl(&self) -> bool {
        self.nal_type < 32
    }
}

/// Find NAL units delimited by 00 00 01 (optionally preceded by another 00).
fn scan_nal_units(data: &[u8]) -> Vec<NalUnit> {
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            starts.push((i, i + 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut units = Vec::with_capacity(starts.len());
    for (n, &(_, payload)) in starts.iter().enumerate() {
        let mut end = starts.get(n + 1).map(|&(sc, _)| sc).unwrap_or(data.len());
        // Trailing zero belongs to a 4-byte start code of the next unit
        while end > payload && data[end - 1] == 0 {
            end -= 1;
        }
        if end < payload + 2 {
            continue;
        }
        let nal_type = (data[payload] >> 1) & 0x3f;
        let first_slice = data.get(payload + 2).is_some_and(|b| b & 0x80 != 0);
        units.push(NalUnit {
            start: payload,
            end,
            nal_type,
            first_slice,
        });
    }
    units
}

/// Byte ranges of access units: each begins at a VCL NAL with
/// `first_slice_segment_in_pic_flag` set.
fn access_units(units: &[NalUnit]) -> Vec<(usize, usize)> {
    let mut aus: Vec<(usize, usize)> = Vec::new();
    for nal in units.iter().filter(|n| n.is_vcl()) {
        match aus.last_mut() {
            Some(last) if !nal.first_slice => last.1 = nal.end,
            _ => aus.push((nal.start, nal.end)),
        }
    }
    aus
}

impl AnnexBDecoder {
    fn render(&self, poc: i32, bytes: &[u8]) -> Picture {
        let w = self.preview_width.max(1);
        let rows = (bytes.len() as u32).div_ceil(w).clamp(1, self.max_preview_height.max(1));
        let mut image = GrayImage::new(w, rows);
        for (px, byte) in image.pixels_mut().zip(bytes.iter()) {
            px.0[0] = *byte;
        }
        Picture { poc, image }
    }
}

impl BitstreamDecoder for AnnexBDecoder {
    fn decode(&self, path: &Path, version: HmVersion, cancel: &CancelToken) -> BusResult<DecodedSequence> {
        let data = std::fs::read(path)
            .map_err(|e| BusError::ResourceUnavailable(format!("{}: {}", path.display(), e)))?;
        debug!("Scanning {} ({} bytes, {})", path.display(), data.len(), version);

        let nals = scan_nal_units(&data);
        let aus = access_units(&nals);
        if aus.is_empty() {
            return Err(BusError::failed(
                "decode_bitstream",
                format!("no access units found in {}", path.display()),
            ));
        }

        let mut frames = Vec::with_capacity(aus.len());
        for (poc, (start, end)) in aus.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(BusError::Cancelled);
            }
            // Decode order stands in for POC: no slice header parsing here
            frames.push(Arc::new(self.render(poc as i32, &data[*start..*end])));
        }

        info!("{}: {} access units ({} NAL units)", path.display(), frames.len(), nals.len());
        Ok(DecodedSequence {
            source: path.to_path_buf(),
            version,
            frames,
        })
    }
}
