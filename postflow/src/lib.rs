//! Topic-to-post content pipeline for social media.
//!
//! A topic string becomes an image and caption through a fixed sequence of
//! role agents (designer, copywriter, auditor, manager) and a bounded
//! revision loop, then is optionally archived and scheduled. The crate keeps
//! a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (platform rules, response parsing,
//!   the approval floor, quick decisions, the serious-concern override).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (providers, renderer, publisher,
//!   archive, config, run logs). Each sits behind a trait so tests can script it.
//!
//! Orchestration modules ([`pipeline`], [`revision`], [`publish`], [`check`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod agents;
pub mod check;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod publish;
pub mod revision;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
