// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// retouch-quality: post-edit visual checks for Retouch.
//
// Renders each edited region before and after, asks a vision model whether
// anything besides the text changed, and redraws lost vector strokes when
// it reports border damage.

pub mod openai;
pub mod oracle;
pub mod repair;
pub mod retry;
pub mod validator;

pub use openai::OpenAiJudge;
pub use oracle::{OracleError, Verdict, VisualJudge, parse_verdict};
pub use repair::AutoRepairer;
pub use validator::VisualDiffValidator;
