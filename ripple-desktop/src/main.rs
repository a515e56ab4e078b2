use ripple::settings::Settings;
use ripple::shader::EmbeddedShaders;
use ripple::Ripple;

use glutin::event::{ElementState, Event, MouseButton, VirtualKeyCode, WindowEvent};
use glutin::event_loop::{ControlFlow, EventLoop};
use glutin::window::Window;
use glutin::PossiblyCurrent;
use std::rc::Rc;

#[cfg(target_os = "macos")]
use glutin::platform::macos::WindowBuilderExtMacOS;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Rc::new(read_settings());

    let logical_size = glutin::dpi::LogicalSize::new(1280, 800);
    let (context, window, event_loop) = get_rendering_context(logical_size);
    let mut physical_size = window.window().inner_size();

    let context = Rc::new(context);
    let mut ripple = match Ripple::new(
        &context,
        physical_size.width,
        physical_size.height,
        &settings,
        &EmbeddedShaders,
    ) {
        Ok(ripple) => ripple,
        Err(problem) => {
            log::error!("{}", problem);
            std::process::exit(1);
        }
    };

    let start = std::time::Instant::now();
    let mut cursor = glutin::dpi::PhysicalPosition::new(0.0_f64, 0.0);
    let mut dragging = false;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::LoopDestroyed => (),

            Event::MainEventsCleared => {
                window.window().request_redraw();
            }

            Event::RedrawRequested(_) => {
                ripple.animate(start.elapsed().as_secs_f64() * 1000.0);
                window.swap_buffers().unwrap();
            }

            Event::WindowEvent { ref event, .. } => match event {
                WindowEvent::CursorMoved { position, .. } => {
                    cursor = *position;
                    if dragging {
                        let (x, y) = plane_coordinates(cursor, physical_size);
                        ripple.add_drop(x, y);
                    }
                }

                WindowEvent::MouseInput {
                    state,
                    button: MouseButton::Left,
                    ..
                } => {
                    dragging = *state == ElementState::Pressed;
                    if dragging {
                        let (x, y) = plane_coordinates(cursor, physical_size);
                        ripple.add_drop(x, y);
                    }
                }

                WindowEvent::KeyboardInput { input, .. } => {
                    if input.state == ElementState::Pressed
                        && input.virtual_keycode == Some(VirtualKeyCode::R)
                    {
                        ripple.reset();
                    }
                }

                WindowEvent::DroppedFile(path) => match std::fs::read(path) {
                    Ok(bytes) => ripple.sample_tiles_from_image(&bytes),
                    Err(err) => log::error!("Cannot read {}: {}", path.display(), err),
                },

                WindowEvent::Resized(new_physical_size) => {
                    window.resize(*new_physical_size);
                    physical_size = *new_physical_size;
                    ripple.resize(physical_size.width, physical_size.height);
                }

                WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
                _ => (),
            },
            _ => (),
        }
    });
}

// Map a window position to [-1, 1]² coordinates on the water plane.
fn plane_coordinates(
    cursor: glutin::dpi::PhysicalPosition<f64>,
    size: glutin::dpi::PhysicalSize<u32>,
) -> (f32, f32) {
    let x = 2.0 * (cursor.x / f64::from(size.width.max(1))) as f32 - 1.0;
    let y = 1.0 - 2.0 * (cursor.y / f64::from(size.height.max(1))) as f32;
    (x, y)
}

fn read_settings() -> Settings {
    match std::env::args().nth(1) {
        None => Settings::default(),
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => settings,
                Err(err) => {
                    log::error!("Cannot parse {}: {}", path, err);
                    std::process::exit(1);
                }
            },
            Err(err) => {
                log::error!("Cannot read {}: {}", path, err);
                std::process::exit(1);
            }
        },
    }
}

pub fn get_rendering_context(
    logical_size: glutin::dpi::LogicalSize<u32>,
) -> (
    glow::Context,
    glutin::ContextWrapper<PossiblyCurrent, Window>,
    EventLoop<()>,
) {
    let event_loop = glutin::event_loop::EventLoop::new();

    #[cfg(not(target_os = "macos"))]
    let window_builder = glutin::window::WindowBuilder::new()
        .with_title("Ripple")
        .with_decorations(true)
        .with_resizable(true)
        .with_inner_size(logical_size);

    #[cfg(target_os = "macos")]
    let window_builder = glutin::window::WindowBuilder::new()
        .with_title("Ripple")
        .with_inner_size(logical_size)
        .with_resizable(true)
        .with_title_hidden(true)
        .with_titlebar_transparent(true)
        .with_fullsize_content_view(true);

    let window = glutin::ContextBuilder::new()
        .with_vsync(true)
        .with_multisampling(0)
        .with_double_buffer(Some(true))
        .with_gl_profile(glutin::GlProfile::Core)
        .with_depth_buffer(24)
        .build_windowed(window_builder, &event_loop)
        .unwrap();
    let window = unsafe { window.make_current().unwrap() };

    let gl =
        unsafe { glow::Context::from_loader_function(|s| window.get_proc_address(s) as *const _) };

    (gl, window, event_loop)
}
