//! Render scheduling for the page viewer.
//!
//! [`RenderScheduler`] guarantees that at most one render touches the shared
//! drawing surface at a time and coalesces rapid requests into a single
//! pending slot, so the most recently requested page always wins.
//! [`RenderWorker`] runs the dispatched renders on a background thread and
//! reports completions over a channel.
//!
//! # Example
//!
//! ```
//! use pageview_scheduler::{RenderOutcome, RenderScheduler};
//!
//! let mut scheduler = RenderScheduler::new();
//!
//! // Page 3 starts rendering right away.
//! let ticket = scheduler.request(3_u32).expect("scheduler is idle");
//!
//! // Rapid navigation while it runs only keeps the last request.
//! assert!(scheduler.request(1).is_none());
//! assert!(scheduler.request(1).is_none());
//!
//! let next = scheduler.complete(ticket.id, RenderOutcome::Succeeded);
//! assert_eq!(next.map(|ticket| ticket.job), Some(1));
//! ```

mod scheduler;
mod worker;

pub use scheduler::{RenderOutcome, RenderScheduler, RenderTicket, SchedulerStats, TicketId};
pub use worker::{Completion, RenderWorker, WorkerError};
