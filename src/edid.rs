//! HDR peak brightness from display EDID
//!
//! Decodes just enough of a CTA-861 extension block to find the HDR Static
//! Metadata data block (CTA-861.3) and turn its max luminance code into nits.
//! Checksums and the rest of the EDID structure are not validated.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::edid::*;

/// Convert a CTA-861.3 max luminance code to nits: `50 * 2^(code / 32)`
pub fn luminance_code_to_nits(code: u8) -> u32 {
    let nits = LUMINANCE_BASE_NITS * (f64::from(code) / LUMINANCE_CODE_DIVISOR).exp2();
    nits.round() as u32
}

/// Extract the HDR peak brightness in nits from raw EDID bytes.
///
/// Returns `None` when the EDID has no extension, no CTA extension carries an
/// HDR Static Metadata block, or the advertised luminance code is zero.
pub fn parse_peak_brightness(edid: &[u8]) -> Option<u32> {
    if edid.len() < MIN_LEN_WITH_EXTENSION {
        return None;
    }

    edid.chunks_exact(BLOCK_SIZE)
        .skip(1)
        .filter(|block| block[0] == CTA_EXTENSION_TAG)
        .find_map(scan_cta_block)
}

/// Walk the data block collection of one CTA extension block
fn scan_cta_block(block: &[u8]) -> Option<u32> {
    let dtd_offset = usize::from(block[DTD_OFFSET_INDEX]);
    let end = dtd_offset.min(block.len() - 1);
    let mut pos = DATA_BLOCK_START;

    while pos < end {
        let header = block[pos];
        let tag = (header >> 5) & 0x07;
        let length = usize::from(header & 0x1F);

        if tag == EXTENDED_TAG && length > 0 {
            let extended_tag = block.get(pos + 1).copied();
            if extended_tag == Some(HDR_STATIC_METADATA_TAG) && length >= 4 {
                if let Some(&code) = block.get(pos + MAX_LUMINANCE_OFFSET)
                    && code > 0
                {
                    return Some(luminance_code_to_nits(code));
                }
            }
        }

        pos += length + 1;
        if pos >= block.len() {
            break;
        }
    }

    None
}

/// Source of raw EDID blobs, one per connected display
pub trait EdidSource {
    fn edid_blobs(&self) -> Vec<(String, Vec<u8>)>;
}

/// Reads EDID blobs from the Linux DRM sysfs tree (`/sys/class/drm/*/edid`)
#[derive(Debug, Clone)]
pub struct DrmSysfs {
    root: PathBuf,
}

impl Default for DrmSysfs {
    fn default() -> Self {
        Self::new(DRM_SYSFS_DIR)
    }
}

impl DrmSysfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl EdidSource for DrmSysfs {
    fn edid_blobs(&self) -> Vec<(String, Vec<u8>)> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %self.root.display(), error = %e, "Cannot enumerate DRM connectors");
                return Vec::new();
            }
        };

        let mut connectors: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        connectors.sort();

        connectors
            .into_iter()
            .filter_map(|connector| {
                let edid_path = connector.join(EDID_FILENAME);
                let name = connector
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match fs::read(&edid_path) {
                    Ok(bytes) if !bytes.is_empty() => Some((name, bytes)),
                    Ok(_) => None,
                    Err(e) => {
                        debug!(path = %edid_path.display(), error = %e, "Skipping connector without readable EDID");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Finds the HDR peak brightness of the first display that advertises one
#[derive(Debug, Clone, Default)]
pub struct BrightnessDetector<S = DrmSysfs> {
    source: S,
}

impl<S: EdidSource> BrightnessDetector<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Peak brightness in nits, or `None` if no display reports HDR metadata
    pub fn peak_brightness(&self) -> Option<u32> {
        for (connector, edid) in self.source.edid_blobs() {
            match parse_peak_brightness(&edid) {
                Some(nits) => {
                    info!(connector = %connector, nits = nits, "Detected peak brightness");
                    return Some(nits);
                }
                None => debug!(connector = %connector, len = edid.len(), "No HDR static metadata in EDID"),
            }
        }
        None
    }
}
