use std::sync::Arc;

use ash::vk;
use color_eyre::Result;

use crate::renderer::frame::FRAMES_IN_FLIGHT;

/// Fixed descriptor state for the whole renderer: a pool sized exactly for
/// this application, the two set layouts, one scene set per frame slot, and
/// the single shared texture set.
pub struct Descriptors {
    pub scene_layout: vk::DescriptorSetLayout,
    pub texture_layout: vk::DescriptorSetLayout,
    pub scene_sets: [vk::DescriptorSet; FRAMES_IN_FLIGHT],
    pub texture_set: vk::DescriptorSet,
    pub sampler: vk::Sampler,

    pool: vk::DescriptorPool,
    device: Arc<ash::Device>,
}

impl Descriptors {
    pub fn new(device: Arc<ash::Device>) -> Result<Self> {
        // The pool holds exactly what this renderer ever allocates: one
        // uniform buffer per frame slot plus the shared sampler/image pair.
        let pool = {
            let pool_sizes = [
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: FRAMES_IN_FLIGHT as u32,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLER,
                    descriptor_count: 1,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLED_IMAGE,
                    descriptor_count: 1,
                },
            ];
            let max_sets = pool_sizes.iter().map(|size| size.descriptor_count).sum();
            let pool_info = vk::DescriptorPoolCreateInfo::default()
                .max_sets(max_sets)
                .pool_sizes(&pool_sizes);
            unsafe { device.create_descriptor_pool(&pool_info, None)? }
        };

        let scene_layout = {
            let binding = vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX);
            let layout_info =
                vk::DescriptorSetLayoutCreateInfo::default().bindings(std::slice::from_ref(&binding));
            unsafe { device.create_descriptor_set_layout(&layout_info, None)? }
        };

        let texture_layout = {
            let bindings = [
                vk::DescriptorSetLayoutBinding::default()
                    .binding(0)
                    .descriptor_type(vk::DescriptorType::SAMPLER)
                    .descriptor_count(1)
                    .stage_flags(vk::ShaderStageFlags::FRAGMENT),
                vk::DescriptorSetLayoutBinding::default()
                    .binding(1)
                    .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
                    .descriptor_count(1)
                    .stage_flags(vk::ShaderStageFlags::FRAGMENT),
            ];
            let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            unsafe { device.create_descriptor_set_layout(&layout_info, None)? }
        };

        let scene_sets = {
            let layouts = [scene_layout; FRAMES_IN_FLIGHT];
            let alloc_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);
            let sets = unsafe { device.allocate_descriptor_sets(&alloc_info)? };
            [sets[0], sets[1]]
        };

        let texture_set = {
            let layouts = [texture_layout];
            let alloc_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);
            unsafe { device.allocate_descriptor_sets(&alloc_info)?[0] }
        };

        // The sampler object never changes, so its binding is written once
        let sampler = {
            let sampler_info = vk::SamplerCreateInfo::default()
                .mag_filter(vk::Filter::NEAREST)
                .min_filter(vk::Filter::NEAREST)
                .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
                .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
                .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
                .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
                .anisotropy_enable(false)
                .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK);
            unsafe { device.create_sampler(&sampler_info, None)? }
        };

        let sampler_image_info = vk::DescriptorImageInfo::default().sampler(sampler);
        let sampler_write = vk::WriteDescriptorSet::default()
            .dst_set(texture_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::SAMPLER)
            .image_info(std::slice::from_ref(&sampler_image_info));
        unsafe {
            device.update_descriptor_sets(&[sampler_write], &[]);
        }

        Ok(Self {
            scene_layout,
            texture_layout,
            scene_sets,
            texture_set,
            sampler,
            pool,
            device,
        })
    }

    /// Point a frame slot's scene set at its uniform buffer. Called once
    /// during initialization.
    pub fn bind_scene_buffer(&self, slot: usize, buffer: vk::Buffer, range: u64) {
        let buffer_info = vk::DescriptorBufferInfo::default().buffer(buffer).range(range);
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.scene_sets[slot])
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(std::slice::from_ref(&buffer_info));
        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }
    }

    /// Rewrite the sampled-image binding of the shared texture set. The
    /// caller must have synchronized against in-flight frames first.
    pub fn set_texture(&self, view: vk::ImageView) {
        let image_info = vk::DescriptorImageInfo::default()
            .image_view(view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.texture_set)
            .dst_binding(1)
            .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
            .image_info(std::slice::from_ref(&image_info));
        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }
    }
}

impl Drop for Descriptors {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device
                .destroy_descriptor_set_layout(self.texture_layout, None);
            self.device
                .destroy_descriptor_set_layout(self.scene_layout, None);
        }
    }
}
