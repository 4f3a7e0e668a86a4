use std::ptr;

use cudarc::driver::{CudaContext, sys};
use tracing::{debug, warn};

use crate::{AcceleratorPool, Result};

/// Default memory pools of every visible CUDA device.
///
/// Only allocations made by this process are trimmed. Stages run as child
/// processes release their device memory when they exit, so the trim matters
/// for stages implemented in-process.
pub struct CudaPool {
    devices: usize,
}

impl CudaPool {
    /// `None` when the driver is missing or reports no devices.
    pub fn detect() -> Option<Self> {
        match CudaContext::device_count() {
            Ok(count) if count > 0 => {
                debug!("CUDA devices available: {count}");
                Some(Self {
                    devices: count as usize,
                })
            }
            Ok(_) => None,
            Err(err) => {
                debug!("CUDA driver unavailable: {err}");
                None
            }
        }
    }

    fn trim_device(ordinal: usize) -> Result<()> {
        let ctx = CudaContext::new(ordinal)?;
        ctx.bind_to_thread()?;
        ctx.synchronize()?;

        let mut pool: sys::CUmemoryPool = ptr::null_mut();
        // SAFETY: the context for `ordinal` is bound to this thread and `pool`
        // is a valid out-pointer for the duration of the call.
        unsafe {
            sys::cuDeviceGetDefaultMemPool(&mut pool, ctx.cu_device()).result()?;
            sys::cuMemPoolTrimTo(pool, 0).result()?;
        }
        Ok(())
    }
}

impl AcceleratorPool for CudaPool {
    fn name(&self) -> &str {
        "cuda"
    }

    fn release_cached(&self) -> Result<()> {
        let mut first_err = None;
        for ordinal in 0..self.devices {
            if let Err(err) = Self::trim_device(ordinal) {
                warn!("CUDA device #{ordinal}: memory pool trim failed: {err}");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
