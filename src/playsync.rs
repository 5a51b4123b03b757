// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Condvar, Mutex,
};

/// The state of cancellation.
#[derive(PartialEq)]
enum CancelState {
    /// The cancel handle is untouched.
    Untouched,
    /// The cancel handle has been cancelled.
    Cancelled,
}

/// A handle that can be used for cancelling an in-flight preview.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<Mutex<CancelState>>,
    condvar: Arc<Condvar>,
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle {
            cancelled: Arc::new(Mutex::new(CancelState::Untouched)),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// Returns true if this handle has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().expect("Error getting lock") == CancelState::Cancelled
    }

    /// Waits until this handle is cancelled or the finished flag is set. The
    /// device playing a preview parks on this while a watcher thread flips
    /// the flag and notifies once the audio runs out.
    pub fn wait(&self, finished: Arc<AtomicBool>) {
        let guard = self.cancelled.lock().expect("Error getting lock");
        let _unused = self
            .condvar
            .wait_while(guard, |cancelled| {
                *cancelled == CancelState::Untouched && !finished.load(Ordering::Relaxed)
            })
            .expect("Error getting lock");
    }

    /// Notifies threads waiting on this handle to check their conditions.
    pub fn notify(&self) {
        self.condvar.notify_all();
    }

    /// Cancels the handle and wakes all waiters. Returns true if this call
    /// performed the cancellation, false if the handle was already cancelled.
    pub fn cancel(&self) -> bool {
        {
            let mut cancelled = self.cancelled.lock().expect("Error getting lock");
            if *cancelled == CancelState::Cancelled {
                return false;
            }
            *cancelled = CancelState::Cancelled;
        }

        self.condvar.notify_all();
        true
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{atomic::AtomicBool, Arc},
        thread,
    };

    use super::CancelHandle;

    #[test]
    fn test_cancel_handle() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.is_cancelled());

        let wait_handle = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || cancel_handle.wait(Arc::new(AtomicBool::new(false))))
        };

        assert!(cancel_handle.cancel());
        assert!(cancel_handle.is_cancelled());
        wait_handle.join().expect("Error joining thread");
    }

    #[test]
    fn test_cancel_only_once() {
        let cancel_handle = CancelHandle::new();

        assert!(cancel_handle.cancel());
        assert!(!cancel_handle.cancel());
        assert!(cancel_handle.is_cancelled());
    }

    #[test]
    fn test_wait_returns_when_finished() {
        let cancel_handle = CancelHandle::new();
        let finished = Arc::new(AtomicBool::new(true));

        // The handle is not cancelled, but the finished flag short circuits
        // the wait.
        cancel_handle.wait(finished);
        assert!(!cancel_handle.is_cancelled());
    }
}
