//! Scoped SIGINT/SIGTERM interception.
//!
//! While a [`SignalGuard`] is alive, SIGINT and SIGTERM set process-global
//! flags instead of terminating the process. Dropping the guard restores the
//! previous dispositions. Only one guarded program should run at a time.

#[cfg(unix)]
mod imp {
    use std::sync::atomic::{AtomicBool, Ordering};

    use nix::libc;
    use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
    use tracing::{debug, warn};

    use crate::program::ProgramError;

    static INTERRUPTED: AtomicBool = AtomicBool::new(false);
    static TERMINATED: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_signal(signum: libc::c_int) {
        if signum == libc::SIGTERM {
            TERMINATED.store(true, Ordering::SeqCst);
        } else {
            INTERRUPTED.store(true, Ordering::SeqCst);
        }
    }

    pub(crate) struct SignalGuard {
        previous_int: SigAction,
        previous_term: SigAction,
    }

    impl SignalGuard {
        pub(crate) fn install() -> Result<Self, ProgramError> {
            INTERRUPTED.store(false, Ordering::SeqCst);
            TERMINATED.store(false, Ordering::SeqCst);

            let action = SigAction::new(
                SigHandler::Handler(on_signal),
                SaFlags::SA_RESTART,
                SigSet::empty(),
            );

            // SAFETY: the handler only stores to atomics.
            let previous_int = unsafe { signal::sigaction(Signal::SIGINT, &action) }
                .map_err(|e| ProgramError::Signal(e.to_string()))?;
            // SAFETY: as above.
            let previous_term = match unsafe { signal::sigaction(Signal::SIGTERM, &action) } {
                Ok(previous) => previous,
                Err(e) => {
                    // SAFETY: restores the disposition returned by the kernel.
                    let _ = unsafe { signal::sigaction(Signal::SIGINT, &previous_int) };
                    return Err(ProgramError::Signal(e.to_string()));
                }
            };

            debug!("signal:handlers installed");
            Ok(Self {
                previous_int,
                previous_term,
            })
        }

        pub(crate) fn interrupted(&self) -> bool {
            INTERRUPTED.load(Ordering::SeqCst)
        }

        pub(crate) fn terminated(&self) -> bool {
            TERMINATED.load(Ordering::SeqCst)
        }
    }

    impl Drop for SignalGuard {
        fn drop(&mut self) {
            // SAFETY: restores dispositions previously returned by the kernel.
            let restored = unsafe {
                signal::sigaction(Signal::SIGINT, &self.previous_int)
                    .and(signal::sigaction(Signal::SIGTERM, &self.previous_term))
            };
            match restored {
                Ok(_) => debug!("signal:handlers restored"),
                Err(e) => warn!(error = %e, "signal:failed to restore handlers"),
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use crate::program::ProgramError;

    pub(crate) struct SignalGuard;

    impl SignalGuard {
        pub(crate) fn install() -> Result<Self, ProgramError> {
            Ok(Self)
        }

        pub(crate) fn interrupted(&self) -> bool {
            false
        }

        pub(crate) fn terminated(&self) -> bool {
            false
        }
    }
}

pub(crate) use imp::SignalGuard;
