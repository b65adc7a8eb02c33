use std::ffi::CStr;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use color_eyre::Result;

const SHADERS_DIR: &str = "shaders-built";

pub const VS_ENTRY_POINT: &CStr = c"vs_main";
pub const FS_ENTRY_POINT: &CStr = c"fs_main";

/// A compiled shader module holding both the vertex and fragment entry
/// points of one WGSL source file. Only needed while the pipeline using it
/// is being created.
pub struct GraphicsShader {
    pub module: vk::ShaderModule,
    device: Arc<ash::Device>,
}

impl GraphicsShader {
    pub fn new(shader_name: &str, device: Arc<ash::Device>) -> Result<Self> {
        let module = create_shader_module(
            (&format!("{}/{}.spv", SHADERS_DIR, shader_name)).as_ref(),
            &device,
        )?;
        Ok(Self { module, device })
    }
}

impl Drop for GraphicsShader {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

fn create_shader_module(filepath: &Path, device: &ash::Device) -> Result<vk::ShaderModule> {
    let code = std::fs::read(filepath)?;

    let shader_module_info = vk::ShaderModuleCreateInfo::default().code(bytemuck::cast_slice(&code));

    let shader_module = unsafe { device.create_shader_module(&shader_module_info, None)? };

    Ok(shader_module)
}
