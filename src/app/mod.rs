use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::Result;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use crate::io::image::Image;
use crate::renderer::Renderer;

const WINDOW_TITLE: &str = "spriteboard";
const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;

pub struct App {
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    validation: bool,
    close_requested: bool,
}

impl App {
    pub fn new(validation: bool) -> Result<Self> {
        Ok(Self {
            window: None,
            renderer: None,
            validation,
            close_requested: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn load_sprite(&mut self, path: PathBuf) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        match Image::load(&path) {
            Ok(image) => {
                if let Err(e) = renderer.set_sprite(&image) {
                    log::error!("Sprite upload failed: {e:#}");
                }
            }
            // Decode failures keep the previous sprite on screen
            Err(e) => log::warn!("Could not decode {:?}: {e:#}", path),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let attributes = Window::default_attributes()
                .with_title(WINDOW_TITLE)
                .with_inner_size(PhysicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT));
            self.window = Some(Arc::new(
                event_loop.create_window(attributes).unwrap(),
            ));
        }

        if self.renderer.is_none() {
            let window = self.window.as_ref().unwrap().clone();
            self.renderer = Some(Renderer::new(window, self.validation).unwrap());
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if window_id != self.window.as_ref().unwrap().id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::Resized(new_size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.window_resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::DroppedFile(path) => {
                self.load_sprite(path);
            }
            WindowEvent::RedrawRequested => {
                if let Some(renderer) = self.renderer.as_mut() {
                    if let Err(e) = renderer.draw() {
                        log::error!("Frame failed: {e:#}");
                        self.close_requested = true;
                    }
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if let Key::Named(NamedKey::Escape) = key {
                    self.close_requested = true;
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }

        if self.close_requested {
            event_loop.exit();
        }
    }
}
