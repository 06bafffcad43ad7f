// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.

use chrono::{DateTime, Duration, Utc};

/// Whether `later` falls within `window` after `earlier` (inclusive).
///
/// A `later` that precedes `earlier` is never within the window.
pub fn is_within(earlier: DateTime<Utc>, later: DateTime<Utc>, window: Duration) -> bool {
    let elapsed = later - earlier;
    elapsed >= Duration::zero() && elapsed <= window
}
