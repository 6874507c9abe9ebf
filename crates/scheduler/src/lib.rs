//! Render scheduling primitives for the pagemark editor.
//!
//! Three pieces cooperate so that only the most recent render request for a
//! target is ever displayed:
//!
//! - [`CancellationToken`] lets superseded work stop early.
//! - [`RenderSlot`] stamps each request with a generation and drops results
//!   that arrive for anything but the newest one.
//! - [`RenderWorker`] runs jobs on a background thread and reports back over
//!   a channel, skipping jobs cancelled before they started.

pub mod cancel;
pub mod slot;
pub mod worker;

pub use cancel::CancellationToken;
pub use slot::{RenderOutcome, RenderSlot, RenderTicket};
pub use worker::{Completion, RenderWorker, WorkerError};
