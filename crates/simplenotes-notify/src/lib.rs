//! `simplenotes-notify`: realtime notification core.
//!
//! # Overview
//!
//! [`NotificationService`] is the only component that mutates the
//! connection registry on behalf of live traffic, and the only one that
//! turns domain events into envelopes. [`Reaper`] runs beside it on a fixed
//! interval and reclaims channels that went quiet or whose authorization
//! expired.
//!
//! | Failure                          | Handling               |
//! |----------------------------------|------------------------|
//! | registry save on register        | surfaced as `Internal` |
//! | any other registry call          | logged, swallowed      |
//! | any gateway post / delete        | logged, swallowed      |
//!
//! Nothing is retried: notifications are advisory.

pub mod error;
pub mod reaper;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{NotifyError, Result};
pub use reaper::{Reaper, StaleReason, SweepReport};
pub use service::{Fanout, NotificationService};
