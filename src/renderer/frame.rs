use std::sync::{Arc, Mutex};

use ash::vk;
use color_eyre::Result;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::Allocator;

use crate::renderer::resources::buffer::Buffer;
use crate::renderer::shader_data::SceneUbo;

/// How many frames the CPU may record ahead of the GPU.
pub const FRAMES_IN_FLIGHT: usize = 2;

/// The frame slot the given frame counter drives.
pub fn slot_index(frame_counter: u64) -> usize {
    (frame_counter % FRAMES_IN_FLIGHT as u64) as usize
}

/// Per-slot recording and synchronization state. Nothing in a slot may be
/// touched by the CPU until its fence has signaled.
pub struct FrameSlot {
    pub command_buffer: vk::CommandBuffer,

    // Signals when the swapchain image is ready to render into.
    pub acquire_semaphore: vk::Semaphore,

    // Signals when this slot's rendering commands have finished on the GPU,
    // gating presentation.
    pub render_semaphore: vk::Semaphore,

    // Signals when this slot's submission has fully completed.
    pub render_fence: vk::Fence,

    // Persistently mapped, rewritten at the start of every frame this slot runs.
    pub uniform_buffer: Buffer,
    pub scene_set: vk::DescriptorSet,

    device: Arc<ash::Device>,
}

impl FrameSlot {
    pub fn new(
        command_pool: vk::CommandPool,
        scene_set: vk::DescriptorSet,
        memory_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let command_buffer = {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            unsafe { device.allocate_command_buffers(&alloc_info)?[0] }
        };

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let acquire_semaphore = unsafe { device.create_semaphore(&semaphore_info, None)? };
        let render_semaphore = unsafe { device.create_semaphore(&semaphore_info, None)? };

        // Created signaled so the first wait on this slot passes immediately
        let render_fence = unsafe {
            device.create_fence(
                &vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED),
                None,
            )?
        };

        let uniform_buffer = Buffer::new(
            std::mem::size_of::<SceneUbo>() as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            "Scene uniform buffer",
            MemoryLocation::CpuToGpu,
            memory_allocator,
            device.clone(),
        )?;

        Ok(Self {
            command_buffer,
            acquire_semaphore,
            render_semaphore,
            render_fence,
            uniform_buffer,
            scene_set,
            device,
        })
    }
}

impl Drop for FrameSlot {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.acquire_semaphore, None);
            self.device.destroy_semaphore(self.render_semaphore, None);
            self.device.destroy_fence(self.render_fence, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_index_cycles_through_every_slot() {
        for counter in 0..16u64 {
            let slot = slot_index(counter);
            assert!(slot < FRAMES_IN_FLIGHT);
            assert_eq!(slot as u64, counter % FRAMES_IN_FLIGHT as u64);
        }
    }

    #[test]
    fn consecutive_frames_use_different_slots() {
        for counter in 0..8u64 {
            assert_ne!(slot_index(counter), slot_index(counter + 1));
        }
    }
}
