use std::sync::{Arc, Mutex};

use ash::vk;
use color_eyre::eyre::Result;
use color_eyre::eyre::eyre;
use gpu_allocator::{
    MemoryLocation,
    vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator},
};

use crate::renderer::resources::upload::UploadContext;

/// A buffer together with its allocation. Dropping it frees the allocation
/// and destroys the buffer; the caller must ensure no in-flight GPU work
/// still references it.
pub struct Buffer {
    pub buffer: vk::Buffer,
    pub size: u64,

    allocation: Option<Allocation>,
    memory_allocator: Arc<Mutex<Allocator>>,
    device: Arc<ash::Device>,
}

impl Buffer {
    pub fn new(
        size: u64,
        usage: vk::BufferUsageFlags,
        name: &str,
        mem_loc: MemoryLocation,
        mem_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let buffer = {
            let buffer_info = vk::BufferCreateInfo {
                size,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                ..Default::default()
            };
            unsafe { device.create_buffer(&buffer_info, None)? }
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let allocation = mem_allocator
            .lock()
            .map_err(|e| eyre!(e.to_string()))?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: mem_loc,
                linear: true,
                allocation_scheme: AllocationScheme::DedicatedBuffer(buffer),
            })?;

        unsafe {
            device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }

        Ok(Self {
            buffer,
            size,

            allocation: Some(allocation),
            memory_allocator: mem_allocator,
            device,
        })
    }

    /// Write into the persistently mapped allocation. Only valid for
    /// host-visible buffers.
    pub fn write<T>(&mut self, data: &[T], start_offset: usize) -> Result<presser::CopyRecord>
    where
        T: Copy,
    {
        Ok(presser::copy_from_slice_to_offset(
            data,
            self.allocation.as_mut().unwrap(),
            start_offset,
        )?)
    }

    /// Staged update for buffers the host cannot map: copies `data` through a
    /// temporary staging buffer with a one-shot transfer command. Blocks until
    /// the copy finishes, so it must stay off the per-frame path.
    pub fn upload<T>(&mut self, data: &[T], upload_ctx: &UploadContext) -> Result<()>
    where
        T: Copy,
    {
        let mut staging_buffer = Buffer::new(
            std::mem::size_of_val(data) as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            "Buffer staging",
            MemoryLocation::CpuToGpu,
            self.memory_allocator.clone(),
            self.device.clone(),
        )?;
        staging_buffer.write(data, 0)?;

        upload_ctx.immediate_submit(|cmd: vk::CommandBuffer, device: &ash::Device| {
            let copy_region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: staging_buffer.size,
            };
            unsafe {
                device.cmd_copy_buffer(cmd, staging_buffer.buffer, self.buffer, &[copy_region]);
            }
            Ok(())
        })?;

        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.memory_allocator
                .lock()
                .unwrap()
                .free(self.allocation.take().unwrap())
                .unwrap();
            self.device.destroy_buffer(self.buffer, None);
        }
    }
}
