pub mod app;
pub mod io;
pub mod renderer;
