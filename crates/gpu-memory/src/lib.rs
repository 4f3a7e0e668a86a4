//! Stage-boundary memory reclamation.
//!
//! Compute stages grow the host heap and the accelerator's allocator caches
//! while they run. [`ResourceReclaimer`] hands back whatever is safely
//! reclaimable between two stages; it never guarantees a byte count and it
//! never fails.

#[cfg(feature = "cuda")]
mod cuda;
mod host;

use std::{error::Error, result::Result as StdResult};

use tracing::{debug, warn};

#[cfg(feature = "cuda")]
pub use cuda::CudaPool;
pub use host::trim_heap;

/// Convenient result alias for accelerator operations.
pub type Result<T> = StdResult<T, Box<dyn Error + Send + Sync>>;

/// Release transient compute memory. Must be idempotent and infallible.
pub trait Reclaim {
    fn reclaim(&mut self);
}

/// Allocator cache on a compute device.
pub trait AcceleratorPool {
    fn name(&self) -> &str;

    /// Return cached, unreachable allocations to the device.
    fn release_cached(&self) -> Result<()>;
}

/// Host heap trim plus an optional accelerator pool release.
pub struct ResourceReclaimer {
    accelerator: Option<Box<dyn AcceleratorPool>>,
    passes: u64,
}

impl ResourceReclaimer {
    pub fn new(accelerator: Option<Box<dyn AcceleratorPool>>) -> Self {
        Self {
            accelerator,
            passes: 0,
        }
    }

    /// Reclaimer for the devices visible to this build.
    pub fn detect() -> Self {
        #[cfg(feature = "cuda")]
        {
            if let Some(pool) = CudaPool::detect() {
                return Self::new(Some(Box::new(pool)));
            }
        }
        debug!("no accelerator pool detected; reclaiming host memory only");
        Self::new(None)
    }

    pub fn accelerator(&self) -> Option<&str> {
        self.accelerator.as_deref().map(|pool| pool.name())
    }

    /// Number of completed reclaim passes.
    pub fn passes(&self) -> u64 {
        self.passes
    }
}

impl Reclaim for ResourceReclaimer {
    fn reclaim(&mut self) {
        let trimmed = trim_heap();

        if let Some(pool) = self.accelerator.as_deref() {
            if let Err(err) = pool.release_cached() {
                warn!("failed to release cached {} memory: {err}", pool.name());
            }
        }

        self.passes += 1;
        debug!(
            pass = self.passes,
            heap_trimmed = trimmed,
            accelerator = self.accelerator().unwrap_or("none"),
            "memory reclaimed"
        );
    }
}
