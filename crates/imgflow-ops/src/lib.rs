// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// imgflow-ops — the image operation engine.
//
// Decodes base64 images, normalizes loosely-typed parameters into typed
// per-operation structs, dispatches to the transform library (thresholding,
// morphology, Canny, drawing, compositing, contours) and assembles the
// encoded reply.

pub mod buffer;
pub mod codec;
pub mod dispatch;
pub mod engine;
pub mod params;
pub mod response;
pub mod transform;

// Re-export the entry points so callers can use `imgflow_ops::process` etc.
pub use buffer::PixelBuffer;
pub use dispatch::{Operation, Outcome};
pub use engine::{process, run};
