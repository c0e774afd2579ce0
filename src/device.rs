//! Devices and the per-device contexts kernels run with.
use crate::config::Config;
use crate::dtype::DataType;
use crate::op::OpError;
use std::fmt;

/// Kind of device, the device half of a [crate::KernelKey].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

/// A concrete device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Place {
    Cpu,
    Gpu(usize),
}

impl Place {
    #[inline]
    pub fn kind(&self) -> DeviceKind {
        match self {
            Place::Cpu => DeviceKind::Cpu,
            Place::Gpu(_) => DeviceKind::Gpu,
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Place::Cpu => write!(f, "cpu"),
            Place::Gpu(id) => write!(f, "gpu:{}", id),
        }
    }
}

/// Device services a kernel needs: identity, allocation, launch sizing.
pub trait DeviceContext: Send + Sync {
    fn place(&self) -> Place;

    /// Reserves room for an output buffer of `numel` elements of `dtype`.
    ///
    /// Fails with `OpError::Execution` if the device can't hold it.
    fn allocate(&self, dtype: DataType, numel: usize) -> Result<(), OpError>;

    /// Element count from which work is split across threads.
    fn parallel_threshold(&self) -> usize;
}

fn check_budget(
    place: Place,
    limit: Option<usize>,
    dtype: DataType,
    numel: usize,
) -> Result<(), OpError> {
    let bytes = numel.checked_mul(dtype.size_of()).ok_or_else(|| {
        OpError::Execution(format!(
            "allocation of {} {} elements on {} overflows",
            numel, dtype, place
        ))
    })?;
    match limit {
        Some(limit) if bytes > limit => Err(OpError::Execution(format!(
            "cannot allocate {} bytes on {}: limit is {} bytes",
            bytes, place, limit
        ))),
        _ => Ok(()),
    }
}

/// Host CPU context.
#[derive(Clone, Debug, Default)]
pub struct CpuDeviceContext {
    config: Config,
}

impl CpuDeviceContext {
    pub fn new(config: Config) -> Self {
        CpuDeviceContext { config }
    }
}

impl DeviceContext for CpuDeviceContext {
    fn place(&self) -> Place {
        Place::Cpu
    }

    fn allocate(&self, dtype: DataType, numel: usize) -> Result<(), OpError> {
        check_budget(self.place(), self.config.memory_limit, dtype, numel)
    }

    fn parallel_threshold(&self) -> usize {
        self.config.parallel_threshold
    }
}

/// Accelerator context.
///
/// Buffers stay host-resident and grid launches are executed on the rayon
/// pool, one work item per output element; `memory_limit` stands in for the
/// device memory size.
#[derive(Clone, Debug)]
pub struct GpuDeviceContext {
    device_id: usize,
    config: Config,
}

impl GpuDeviceContext {
    pub fn new(device_id: usize, config: Config) -> Self {
        GpuDeviceContext { device_id, config }
    }
}

impl DeviceContext for GpuDeviceContext {
    fn place(&self) -> Place {
        Place::Gpu(self.device_id)
    }

    fn allocate(&self, dtype: DataType, numel: usize) -> Result<(), OpError> {
        check_budget(self.place(), self.config.memory_limit, dtype, numel)
    }

    // Grids always cover the whole index space.
    fn parallel_threshold(&self) -> usize {
        0
    }
}
