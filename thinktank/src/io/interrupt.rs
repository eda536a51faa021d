//! Operator interruption (Ctrl-C) honored at cycle boundaries.
//!
//! The signal only raises a flag. The orchestrator polls it between cycles and
//! during the inter-cycle pause, so an in-flight cycle always resolves first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// Poll interval while pausing between cycles.
const PAUSE_SLICE: Duration = Duration::from_millis(200);

/// Shared graceful-stop flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    requested: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, returning early if an interruption is requested.
    ///
    /// Returns `true` if the full pause elapsed. A duration too large to
    /// represent as a deadline waits until interrupted.
    pub fn pause(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_requested() {
                return false;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    PAUSE_SLICE.min(deadline - now)
                }
                None => PAUSE_SLICE,
            };
            thread::sleep(slice);
        }
    }

    /// Route Ctrl-C into this flag for the rest of the process lifetime.
    ///
    /// A dedicated thread runs a single-threaded tokio runtime that waits for
    /// the signal; the loop itself stays synchronous.
    pub fn install_ctrl_c(&self) {
        let interrupt = self.clone();
        let spawned = thread::Builder::new()
            .name("ctrl-c".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        warn!(error = %err, "could not start signal runtime");
                        return;
                    }
                };
                runtime.block_on(async {
                    loop {
                        if let Err(err) = tokio::signal::ctrl_c().await {
                            warn!(error = %err, "ctrl-c listener failed");
                            return;
                        }
                        if interrupt.is_requested() {
                            debug!("repeated ctrl-c while stopping");
                        } else {
                            info!("stop requested; finishing the current cycle");
                        }
                        interrupt.request();
                    }
                });
            });
        if let Err(err) = spawned {
            warn!(error = %err, "could not spawn ctrl-c thread");
        }
    }
}
