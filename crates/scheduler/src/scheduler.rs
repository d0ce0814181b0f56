//! Single-flight render scheduler
//!
//! Serializes render requests against one shared drawing surface. At most
//! one render is in flight; while it runs, new requests land in a single
//! pending slot where later requests overwrite earlier ones. When the
//! in-flight render completes the pending request (if any) is started.

/// Identifier of a dispatched render.
pub type TicketId = u64;

/// A render that has been granted the drawing surface and must be executed
/// by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTicket<J> {
    /// Identifier to hand back to [`RenderScheduler::complete`]
    pub id: TicketId,

    /// The job payload captured at request time
    pub job: J,
}

/// How a dispatched render finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Succeeded,
    Failed,
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Calls to `request`
    pub requested: u64,

    /// Tickets handed out for execution
    pub started: u64,

    /// Tickets completed successfully
    pub completed: u64,

    /// Tickets completed with a failure
    pub failed: u64,

    /// Pending requests overwritten before they could start
    pub superseded: u64,
}

/// Single-flight scheduler with a depth-1 pending slot.
///
/// The scheduler does not execute anything itself. `request` and `complete`
/// return the ticket the caller must dispatch next, which keeps the
/// ordering logic independent of how completion is delivered.
///
/// # Example
///
/// ```
/// use pageview_scheduler::{RenderOutcome, RenderScheduler};
///
/// let mut scheduler = RenderScheduler::new();
///
/// let first = scheduler.request(3).expect("idle scheduler starts immediately");
/// assert!(scheduler.request(1).is_none());
/// assert!(scheduler.request(2).is_none());
///
/// let next = scheduler.complete(first.id, RenderOutcome::Succeeded).expect("pending drains");
/// assert_eq!(next.job, 2);
/// assert!(scheduler.complete(next.id, RenderOutcome::Succeeded).is_none());
/// ```
#[derive(Debug)]
pub struct RenderScheduler<J> {
    next_id: TicketId,
    in_flight: Option<TicketId>,
    pending: Option<J>,
    stats: SchedulerStats,
}

impl<J> RenderScheduler<J> {
    /// Create an idle scheduler
    pub fn new() -> Self {
        Self { next_id: 0, in_flight: None, pending: None, stats: SchedulerStats::default() }
    }

    /// Request a render.
    ///
    /// Returns a ticket to dispatch when the surface is free. When a render
    /// is already in flight the job replaces whatever was pending and `None`
    /// is returned.
    pub fn request(&mut self, job: J) -> Option<RenderTicket<J>> {
        self.stats.requested += 1;

        if let Some(in_flight) = self.in_flight {
            if self.pending.replace(job).is_some() {
                self.stats.superseded += 1;
            }
            tracing::debug!(in_flight, "render busy, request parked in pending slot");
            return None;
        }

        Some(self.start(job))
    }

    /// Record completion of the in-flight ticket.
    ///
    /// Failures release the surface exactly like successes. Returns the next
    /// ticket to dispatch if a request was pending. Ids that do not match the
    /// in-flight ticket are ignored.
    pub fn complete(&mut self, id: TicketId, outcome: RenderOutcome) -> Option<RenderTicket<J>> {
        if self.in_flight != Some(id) {
            tracing::warn!(ticket = id, "ignoring completion for a ticket that is not in flight");
            return None;
        }

        self.in_flight = None;
        match outcome {
            RenderOutcome::Succeeded => self.stats.completed += 1,
            RenderOutcome::Failed => self.stats.failed += 1,
        }

        let job = self.pending.take()?;
        Some(self.start(job))
    }

    /// Drop the pending request without touching the in-flight render.
    ///
    /// Returns `true` if something was pending.
    pub fn clear_pending(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Whether a render currently holds the surface
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether nothing is running or waiting
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.pending.is_none()
    }

    /// Id of the in-flight ticket
    pub fn in_flight(&self) -> Option<TicketId> {
        self.in_flight
    }

    /// The request waiting for the surface
    pub fn pending(&self) -> Option<&J> {
        self.pending.as_ref()
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    fn start(&mut self, job: J) -> RenderTicket<J> {
        self.next_id += 1;
        let id = self.next_id;
        self.in_flight = Some(id);
        self.stats.started += 1;
        RenderTicket { id, job }
    }
}

impl<J> Default for RenderScheduler<J> {
    fn default() -> Self {
        Self::new()
    }
}
