pub mod buffer;
pub mod image;
pub mod shader;
pub mod upload;
