//! Lane-parallel compute device: a fixed worker pool plus per-request
//! memory accounting.

use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::trace;

use crate::alignment_mode::Direction;
use crate::config::AlignerParameters;
use crate::AlignerError;

pub struct Device {
    pool: rayon::ThreadPool,
    memory_budget: usize,
}

impl Device {
    pub fn new(params: &AlignerParameters) -> Result<Self, AlignerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.lane_groups())
            .thread_name(|index| format!("sw-lane-group-{}", index))
            .build()
            .map_err(|err| AlignerError::InitializationError(format!("Failed to start lane groups: {}", err)))?;

        Ok(Self {
            pool,
            memory_budget: params.memory_budget(),
        })
    }

    pub fn lane_groups(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn memory_budget(&self) -> usize {
        self.memory_budget
    }

    /// Runs `op` with the device's workers as the parallel context.
    pub(crate) fn launch<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Opens the memory scope for a single alignment request.
    pub fn workspace(&self) -> Workspace<'_> {
        Workspace {
            device: self,
            in_use: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

/// Device memory accounting for one alignment request.
pub struct Workspace<'d> {
    device: &'d Device,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

impl<'d> Workspace<'d> {
    pub fn device(&self) -> &'d Device {
        self.device
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    pub fn alloc<T: Copy>(&self, len: usize, fill: T) -> Result<DeviceBuffer<'_, T>, AlignerError> {
        let bytes = len.checked_mul(mem::size_of::<T>()).ok_or_else(|| {
            AlignerError::MemoryError(format!("Buffer of {} elements overflows the address space", len))
        })?;
        self.reserve(bytes)?;

        let mut data = Vec::new();
        if let Err(err) = data.try_reserve_exact(len) {
            self.in_use.fetch_sub(bytes, Ordering::AcqRel);
            return Err(AlignerError::MemoryError(format!(
                "Host reservation of {} bytes failed: {}",
                bytes, err
            )));
        }
        data.resize(len, fill);

        Ok(DeviceBuffer {
            data,
            bytes,
            in_use: &self.in_use,
        })
    }

    /// Copies a residue range to the device, encoding each residue and
    /// reversing the range for reverse sweeps.
    pub fn upload<F>(&self, residues: &[u8], direction: Direction, encode: F) -> Result<DeviceBuffer<'_, u8>, AlignerError>
    where
        F: Fn(u8) -> u8,
    {
        let mut buffer = self.alloc(residues.len(), 0u8)?;
        match direction {
            Direction::Forward => {
                for (dst, &src) in buffer.iter_mut().zip(residues) {
                    *dst = encode(src);
                }
            }
            Direction::Reverse => {
                for (dst, &src) in buffer.iter_mut().zip(residues.iter().rev()) {
                    *dst = encode(src);
                }
            }
        }
        Ok(buffer)
    }

    fn reserve(&self, bytes: usize) -> Result<(), AlignerError> {
        let budget = self.device.memory_budget;
        let mut current = self.in_use.load(Ordering::Acquire);
        loop {
            let next = match current.checked_add(bytes) {
                Some(next) if next <= budget => next,
                _ => {
                    return Err(AlignerError::MemoryError(format!(
                        "Device allocation of {} bytes failed: {} of {} bytes in use",
                        bytes, current, budget
                    )))
                }
            };
            match self
                .in_use
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    self.peak.fetch_max(next, Ordering::AcqRel);
                    trace!("device alloc {} bytes ({} in use)", bytes, next);
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }
}

/// Device-resident buffer. Its bytes are returned to the workspace on drop.
pub struct DeviceBuffer<'w, T> {
    data: Vec<T>,
    bytes: usize,
    in_use: &'w AtomicUsize,
}

impl<T: Copy> DeviceBuffer<'_, T> {
    /// Copies the buffer back to host memory.
    pub fn download(&self) -> Vec<T> {
        self.data.clone()
    }
}

impl<T> Deref for DeviceBuffer<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for DeviceBuffer<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Drop for DeviceBuffer<'_, T> {
    fn drop(&mut self) {
        self.in_use.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(budget: usize) -> Device {
        let params = AlignerParameters::new()
            .with_memory_budget(budget)
            .with_lane_groups(2)
            .unwrap();
        Device::new(&params).unwrap()
    }

    #[test]
    fn buffers_release_on_drop() {
        let device = device(1024);
        let workspace = device.workspace();
        {
            let a = workspace.alloc(16, 0i32).unwrap();
            let b = workspace.alloc(8, 0u8).unwrap();
            assert_eq!(a.len(), 16);
            assert_eq!(b.len(), 8);
            assert_eq!(workspace.in_use(), 72);
        }
        assert_eq!(workspace.in_use(), 0);
        assert_eq!(workspace.peak(), 72);
    }

    #[test]
    fn over_budget_allocation_fails_cleanly() {
        let device = device(64);
        let workspace = device.workspace();
        let _held = workspace.alloc(10, 0i32).unwrap();
        match workspace.alloc(10, 0i32) {
            Err(AlignerError::MemoryError(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("allocation should exceed the budget"),
        }
        assert_eq!(workspace.in_use(), 40);
    }

    #[test]
    fn upload_encodes_and_reverses() {
        let device = device(1024);
        let workspace = device.workspace();
        let forward = workspace
            .upload(b"acgt", Direction::Forward, |r| r.to_ascii_uppercase())
            .unwrap();
        let reverse = workspace
            .upload(b"acgt", Direction::Reverse, |r| r.to_ascii_uppercase())
            .unwrap();
        assert_eq!(forward.download(), b"ACGT".to_vec());
        assert_eq!(reverse.download(), b"TGCA".to_vec());
    }

    #[test]
    fn lane_group_count_follows_parameters() {
        assert_eq!(device(1024).lane_groups(), 2);
    }
}
