//! Resolution negotiation.

use crate::error::{CapCamError, Result};
use crate::traits::Resolution;

/// Pick the capture resolution.
///
/// With a requested index, that entry is returned if it exists. Otherwise the
/// entry with the largest `(width, height)` wins, compared width first; on an
/// exact tie the earliest entry is kept.
pub fn negotiate(resolutions: &[Resolution], requested: Option<usize>) -> Result<&Resolution> {
    if resolutions.is_empty() {
        return Err(CapCamError::NoResolutionsFound);
    }

    if let Some(index) = requested {
        return resolutions
            .get(index)
            .ok_or(CapCamError::InvalidResolution {
                index,
                available: resolutions.len(),
            });
    }

    resolutions
        .iter()
        .fold(None, |best: Option<&Resolution>, candidate| match best {
            Some(best) if best.dimensions() >= candidate.dimensions() => Some(best),
            _ => Some(candidate),
        })
        .ok_or(CapCamError::NoResolutionsFound)
}
