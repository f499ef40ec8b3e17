// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interruptible sleep between polling cycles.

use std::time::Duration;

use tokio::sync::Semaphore;

/// Timed wait that can be cut short from another task.
///
/// A signal raised while nobody waits is kept, so the next [`wait`] returns
/// immediately. Several signals raised before a wait are all kept; each one
/// releases one wait.
///
/// [`wait`]: WakeSignal::wait
#[derive(Debug)]
pub struct WakeSignal {
    permits: Semaphore,
}

impl WakeSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(0),
        }
    }

    /// Releases the current or the next wait.
    pub fn signal(&self) {
        self.permits.add_permits(1);
    }

    /// Sleeps for `timeout` or until signalled, whichever comes first.
    ///
    /// Returns true if woken by a signal.
    pub async fn wait(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.permits.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                true
            }
            // The semaphore is never closed.
            Ok(Err(_)) | Err(_) => false,
        }
    }

    /// Returns the number of pending signals.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn times_out_without_signal() {
        let wake = WakeSignal::new();
        let start = tokio::time::Instant::now();
        assert!(!wake.wait(Duration::from_secs(30)).await);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn early_signal_is_kept() {
        let wake = WakeSignal::new();
        wake.signal();
        assert_eq!(wake.pending(), 1);

        let start = tokio::time::Instant::now();
        assert!(wake.wait(Duration::from_secs(30)).await);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(wake.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn signal_cuts_wait_short() {
        let wake = std::sync::Arc::new(WakeSignal::new());
        let signaller = wake.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            signaller.signal();
        });

        let start = tokio::time::Instant::now();
        assert!(wake.wait(Duration::from_secs(30)).await);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }
}
