// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// imgflow-server — raw TCP / HTTP/1.1 binding that exposes the image
// operation engine as `POST /process`.

pub mod http;
pub mod server;

pub use server::ProcessServer;
