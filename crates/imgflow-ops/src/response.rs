// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Encodes the transformed buffer and packages any contour geometry into the
// outbound payload.

use imgflow_core::error::Result;
use imgflow_core::types::{ContourPayload, ProcessResponse};
use tracing::debug;

use crate::codec;
use crate::dispatch::Outcome;

/// Build the reply body.
///
/// Plain results carry the PNG data URI directly. Contour results carry the
/// JSON text of a [`ContourPayload`] in the same `result` field.
pub fn assemble(outcome: Outcome) -> Result<ProcessResponse> {
    let image = codec::encode(&outcome.buffer)?;

    let result = match outcome.contours {
        None => image,
        Some(contours) => {
            let payload = ContourPayload {
                image,
                contours_count: contours.len(),
                contours,
            };
            debug!(contours = payload.contours_count, "Contour payload assembled");
            serde_json::to_string(&payload)?
        }
    };

    Ok(ProcessResponse { result })
}
