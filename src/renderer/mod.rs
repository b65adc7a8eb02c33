pub mod camera;
pub mod context;
pub mod descriptors;
pub mod frame;
pub mod pipeline;
pub mod resources;
pub mod shader_data;

use std::sync::{Arc, Mutex};

use ash::vk;
use color_eyre::Result;
use glam::Vec2;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use winit::window::Window;

use crate::io::image::Image;
use crate::renderer::camera::Camera;
use crate::renderer::context::GraphicsContext;
use crate::renderer::descriptors::Descriptors;
use crate::renderer::frame::{FRAMES_IN_FLIGHT, FrameSlot, slot_index};
use crate::renderer::pipeline::Pipeline;
use crate::renderer::resources::image::GpuImage;
use crate::renderer::resources::shader::GraphicsShader;
use crate::renderer::resources::upload::UploadContext;
use crate::renderer::shader_data::{SceneUbo, SpriteConstants};

/// The single resident sprite texture. Replaced wholesale by `set_sprite`;
/// dropping it frees the view and image.
pub struct Sprite {
    pub image: GpuImage,
    pub width: u32,
    pub height: u32,
}

/// Latest window dimensions plus a flag for a resize the frame loop has not
/// acted on yet.
struct PendingResize {
    width: u32,
    height: u32,
    requested: bool,
}

impl PendingResize {
    /// Record new target dimensions. Returns whether anything changed;
    /// identical dimensions are a no-op and set no flag.
    fn request(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.requested = true;
        true
    }
}

/// Owns every GPU resource and drives the double-buffered frame loop.
///
/// Field order doubles as teardown order: the sprite and per-frame resources
/// release their allocations before the allocator goes away, and the
/// allocator before the context destroys the device.
pub struct Renderer {
    camera: Camera,
    sprite: Option<Sprite>,
    frames: [FrameSlot; FRAMES_IN_FLIGHT],
    frame_counter: u64,
    pending_resize: PendingResize,

    checkerboard_pipeline: Pipeline,
    sprite_pipeline: Pipeline,
    upload_ctx: UploadContext,
    descriptors: Descriptors,
    memory_allocator: Arc<Mutex<Allocator>>,
    ctx: GraphicsContext,
}

impl Renderer {
    pub fn new(window: Arc<Window>, validation: bool) -> Result<Self> {
        let ctx = GraphicsContext::new(window, validation)?;
        let device = ctx.device().clone();

        let memory_allocator = Arc::new(Mutex::new(Allocator::new(&AllocatorCreateDesc {
            instance: ctx.instance().clone(),
            device: (*device).clone(),
            physical_device: ctx.physical_device(),
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?));

        let descriptors = Descriptors::new(device.clone())?;
        let upload_ctx = UploadContext::new(ctx.graphics_queue(), ctx.queue_family(), device.clone())?;

        let frames = [
            FrameSlot::new(
                ctx.command_pool(),
                descriptors.scene_sets[0],
                memory_allocator.clone(),
                device.clone(),
            )?,
            FrameSlot::new(
                ctx.command_pool(),
                descriptors.scene_sets[1],
                memory_allocator.clone(),
                device.clone(),
            )?,
        ];
        for (slot, frame) in frames.iter().enumerate() {
            descriptors.bind_scene_buffer(
                slot,
                frame.uniform_buffer.buffer,
                std::mem::size_of::<SceneUbo>() as u64,
            );
        }

        // Shader modules are only needed until pipeline creation consumes them
        let checkerboard_pipeline = {
            let shader = GraphicsShader::new("checkerboard", device.clone())?;
            Pipeline::new(&shader, &[], &[], ctx.render_pass(), device.clone())?
        };
        let sprite_pipeline = {
            let shader = GraphicsShader::new("sprite", device.clone())?;
            let push_constant_range = vk::PushConstantRange::default()
                .stage_flags(vk::ShaderStageFlags::VERTEX)
                .size(std::mem::size_of::<SpriteConstants>() as u32);
            Pipeline::new(
                &shader,
                &[descriptors.scene_layout, descriptors.texture_layout],
                &[push_constant_range],
                ctx.render_pass(),
                device.clone(),
            )?
        };

        let extent = ctx.swapchain_extent();
        log::info!("Renderer initialized at {}x{}", extent.width, extent.height);

        Ok(Self {
            camera: Camera::new(),
            sprite: None,
            frames,
            frame_counter: 0,
            pending_resize: PendingResize {
                width: extent.width,
                height: extent.height,
                requested: false,
            },
            checkerboard_pipeline,
            sprite_pipeline,
            upload_ctx,
            descriptors,
            memory_allocator,
            ctx,
        })
    }

    /// Record new target dimensions; the actual swapchain recreation happens
    /// inside `draw`, never while a command buffer may reference the old one.
    pub fn window_resize(&mut self, width: u32, height: u32) {
        if self.pending_resize.request(width, height) {
            log::debug!("Resize requested: {}x{}", width, height);
        }
    }

    /// Replace the resident sprite texture with a freshly decoded image.
    ///
    /// Stop-the-world by design: waits for the whole device to go idle before
    /// destroying the previous texture or rewriting the shared descriptor,
    /// since any in-flight frame may still sample it. Acceptable for a rare,
    /// user-triggered event; must never run on the per-frame path.
    pub fn set_sprite(&mut self, image: &Image) -> Result<()> {
        let device = self.ctx.device().clone();
        unsafe {
            device.device_wait_idle()?;
        }

        // Frees the previous view and image, valid only after the idle wait
        self.sprite = None;

        let mut gpu_image = GpuImage::new_texture(
            image.width(),
            image.height(),
            self.memory_allocator.clone(),
            device,
        )?;
        gpu_image.upload(image.pixels(), &self.upload_ctx)?;
        self.descriptors.set_texture(gpu_image.view);

        log::info!("Sprite replaced: {}x{}px", image.width(), image.height());

        self.sprite = Some(Sprite {
            width: image.width(),
            height: image.height(),
            image: gpu_image,
        });

        Ok(())
    }

    /// Advance exactly one presented frame.
    pub fn draw(&mut self) -> Result<()> {
        let device = self.ctx.device().clone();
        let slot = slot_index(self.frame_counter);

        // Bounds the CPU to FRAMES_IN_FLIGHT frames ahead of the GPU
        unsafe {
            device.wait_for_fences(&[self.frames[slot].render_fence], true, u64::MAX)?;
        }

        let acquired = unsafe {
            self.ctx.swapchain_loader().acquire_next_image(
                self.ctx.swapchain(),
                u64::MAX,
                self.frames[slot].acquire_semaphore,
                vk::Fence::null(),
            )
        };
        let (image_index, _) = match acquired {
            Ok(acquired) => acquired,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                // Stale surface: skip this frame and retry acquisition next
                // tick. The fence was not reset, so the slot stays reusable.
                self.ctx
                    .resize(self.pending_resize.width, self.pending_resize.height)?;
                self.pending_resize.requested = false;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        // The fence has signaled and will be resubmitted: this slot's command
        // buffer and uniform buffer now belong to the CPU
        unsafe {
            device.reset_fences(&[self.frames[slot].render_fence])?;
            device.reset_command_buffer(
                self.frames[slot].command_buffer,
                vk::CommandBufferResetFlags::empty(),
            )?;
        }

        let extent = self.ctx.swapchain_extent();
        let ubo = SceneUbo {
            projection: self.camera.proj_mat(extent),
            view: self.camera.view_mat(),
        };
        self.frames[slot].uniform_buffer.write(&[ubo], 0)?;

        let frame = &self.frames[slot];
        let cmd = frame.command_buffer;

        unsafe {
            device.begin_command_buffer(cmd, &vk::CommandBufferBeginInfo::default())?;

            let clear_value = vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            };
            let render_pass_info = vk::RenderPassBeginInfo::default()
                .render_pass(self.ctx.render_pass())
                .framebuffer(self.ctx.framebuffer(image_index))
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D::default(),
                    extent,
                })
                .clear_values(std::slice::from_ref(&clear_value));
            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            let scissor = vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            };
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[scissor]);

            device.cmd_bind_pipeline(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.checkerboard_pipeline.handle,
            );
            device.cmd_draw(cmd, 3, 1, 0, 0);

            if let Some(sprite) = &self.sprite {
                device.cmd_bind_pipeline(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.sprite_pipeline.handle,
                );

                let descriptor_sets = [frame.scene_set, self.descriptors.texture_set];
                device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.sprite_pipeline.layout,
                    0,
                    &descriptor_sets,
                    &[],
                );

                let constants = SpriteConstants {
                    model: camera::sprite_model_mat(
                        Vec2::ZERO,
                        0.0,
                        Vec2::new(sprite.width as f32, sprite.height as f32),
                    ),
                };
                device.cmd_push_constants(
                    cmd,
                    self.sprite_pipeline.layout,
                    vk::ShaderStageFlags::VERTEX,
                    0,
                    bytemuck::bytes_of(&constants),
                );

                device.cmd_draw(cmd, 6, 1, 0, 0);
            }

            device.cmd_end_render_pass(cmd);
            device.end_command_buffer(cmd)?;
        }

        let wait_semaphores = [frame.acquire_semaphore];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cmd];
        let signal_semaphores = [frame.render_semaphore];
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe {
            device.queue_submit(self.ctx.graphics_queue(), &[submit], frame.render_fence)?;
        }

        let swapchains = [self.ctx.swapchain()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        let present_result = unsafe {
            self.ctx
                .swapchain_loader()
                .queue_present(self.ctx.present_queue(), &present_info)
        };

        let surface_stale = match present_result {
            Ok(suboptimal) => suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(e) => return Err(e.into()),
        };
        if surface_stale || self.pending_resize.requested {
            self.ctx
                .resize(self.pending_resize.width, self.pending_resize.height)?;
            self.pending_resize.requested = false;
        }

        self.frame_counter += 1;

        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Resources dropped below may still be referenced by in-flight frames
        unsafe {
            let _ = self.ctx.device().device_wait_idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_to_same_dimensions_is_a_noop() {
        let mut pending = PendingResize {
            width: 640,
            height: 480,
            requested: false,
        };
        assert!(!pending.request(640, 480));
        assert!(!pending.requested);
    }

    #[test]
    fn resize_to_new_dimensions_sets_the_flag() {
        let mut pending = PendingResize {
            width: 640,
            height: 480,
            requested: false,
        };
        assert!(pending.request(800, 600));
        assert!(pending.requested);
        assert_eq!((pending.width, pending.height), (800, 600));

        // Repeating the same request changes nothing further
        assert!(!pending.request(800, 600));
        assert!(pending.requested);
    }
}
