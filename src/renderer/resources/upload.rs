use std::sync::Arc;

use ash::vk;
use color_eyre::eyre::Result;

/// One-shot command submission on the graphics queue, used for staging
/// uploads. Owns its own command pool so resetting it never disturbs the
/// per-frame command buffers.
pub struct UploadContext {
    upload_fence: vk::Fence,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,

    queue: vk::Queue,
    device: Arc<ash::Device>,
}

impl UploadContext {
    pub fn new(queue: vk::Queue, queue_family: u32, device: Arc<ash::Device>) -> Result<Self> {
        let upload_fence_info = vk::FenceCreateInfo::default();
        let upload_fence = unsafe { device.create_fence(&upload_fence_info, None)? };

        let command_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { device.create_command_pool(&command_pool_info, None)? };

        let command_buffer_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .command_buffer_count(1)
            .level(vk::CommandBufferLevel::PRIMARY);
        let command_buffer = unsafe { device.allocate_command_buffers(&command_buffer_info)?[0] };

        Ok(Self {
            upload_fence,
            command_pool,
            command_buffer,
            queue,
            device,
        })
    }

    /// Record `func` into a one-time command buffer, submit it, and block
    /// until the GPU finishes. Must never be called from the per-frame path.
    pub fn immediate_submit<F>(&self, func: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer, &ash::Device) -> Result<()>,
    {
        let cmd = self.command_buffer;

        let cmd_begin_info =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device.begin_command_buffer(cmd, &cmd_begin_info)?;
        }

        func(cmd, &self.device)?;

        unsafe {
            self.device.end_command_buffer(cmd)?;
        }

        let cmd = [cmd];
        let submit = vk::SubmitInfo::default().command_buffers(&cmd);
        unsafe {
            self.device
                .queue_submit(self.queue, &[submit], self.upload_fence)?;

            // Block until the commands finish execution
            self.device
                .wait_for_fences(&[self.upload_fence], true, u64::MAX)?;
            self.device.reset_fences(&[self.upload_fence])?;
            self.device
                .reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())?;
        }

        Ok(())
    }
}

impl Drop for UploadContext {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_fence(self.upload_fence, None);
        }
    }
}
