// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Render module: page rasterisation and cropped region snapshots used to
// compare a page before and after an edit.

pub mod rasterizer;
pub mod region;
