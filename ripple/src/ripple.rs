use crate::caustics::Caustics;
use crate::debug::DebugView;
use crate::pool::Pool;
use crate::settings::{Mode, Settings};
use crate::shader::ShaderStore;
use crate::water::WaterSimulation;
use crate::{render, rng, shader};

use glow::HasContext;
use nalgebra::{Isometry3, Perspective3, Point3, Vector3};
use std::rc::Rc;
use thiserror::Error;

// The time at which the animation timer will reset to zero.
const MAX_ELAPSED_TIME: f32 = 1000.0;
const MAX_FRAME_TIME: f32 = 1.0 / 10.0;

pub struct Ripple {
    settings: Rc<Settings>,

    water: WaterSimulation,
    caustics: Caustics,
    pool: Pool,
    debug_view: DebugView,

    physical_width: u32,
    physical_height: u32,

    // A timestamp in milliseconds. Either host or video time.
    last_timestamp: f64,

    // A local animation timer in seconds that resets at MAX_ELAPSED_TIME.
    elapsed_time: f32,

    frame_time: f32,
    update_interval: f32,
}

impl Ripple {
    pub fn new(
        context: &render::Context,
        physical_width: u32,
        physical_height: u32,
        settings: &Rc<Settings>,
        shaders: &dyn ShaderStore,
    ) -> Result<Ripple, Problem> {
        log::info!("Initialising the pool");

        rng::init_from_seed(&settings.seed);

        let mut water = WaterSimulation::new(context, settings)?;
        water.initialize(shaders)?;

        let mut caustics = Caustics::new(context, settings)?;
        caustics.initialize(shaders)?;

        let mut pool = Pool::new(context, settings)?;
        pool.initialize(shaders)?;

        let mut debug_view = DebugView::new(context)?;
        debug_view.initialize(shaders)?;

        if let Some(path) = &settings.tiles_texture {
            let result = std::fs::read(path)
                .map_err(Problem::ReadImage)
                .and_then(|bytes| pool.set_tiles_texture(&bytes));

            if let Err(problem) = result {
                log::error!(
                    "Failed to load tiles from {}: {}. Keeping the checkerboard.",
                    path.display(),
                    problem
                );
            }
        }

        unsafe {
            context.disable(glow::BLEND);
            context.disable(glow::DEPTH_TEST);
        }

        // Disturb the surface so the first frame already has some life in it.
        for _ in 0..settings.initial_drops {
            let x = 2.0 * rng::gen::<f32>() - 1.0;
            let y = 2.0 * rng::gen::<f32>() - 1.0;
            water.add_drop(x, y, settings.drop_radius, settings.drop_strength);
        }
        water.update_normals();

        Ok(Ripple {
            settings: Rc::clone(settings),

            water,
            caustics,
            pool,
            debug_view,

            physical_width,
            physical_height,

            last_timestamp: 0.0,
            elapsed_time: 0.0,
            frame_time: 0.0,
            update_interval: 1.0 / settings.simulation_frame_rate,
        })
    }

    pub fn update(&mut self, settings: &Rc<Settings>) {
        self.settings = Rc::clone(settings);

        self.water.update_settings(settings);
        self.caustics.update_settings(settings);
        self.pool.update_settings(settings);

        self.update_interval = 1.0 / settings.simulation_frame_rate;
    }

    pub fn is_ready(&self) -> bool {
        self.water.is_ready()
            && self.caustics.is_ready()
            && self.pool.is_ready()
            && self.debug_view.is_ready()
    }

    pub fn resize(&mut self, physical_width: u32, physical_height: u32) {
        log::debug!("Resizing to {}x{}px", physical_width, physical_height);
        self.physical_width = physical_width;
        self.physical_height = physical_height;
    }

    /// Splash the surface at `(x, y)` in [-1, 1]² plane coordinates with the
    /// configured drop size.
    pub fn add_drop(&mut self, x: f32, y: f32) {
        let radius = self.settings.drop_radius;
        let strength = self.settings.drop_strength;
        self.water.add_drop(x, y, radius, strength);
    }

    pub fn add_drop_with(&mut self, x: f32, y: f32, radius: f32, strength: f32) {
        self.water.add_drop(x, y, radius, strength);
    }

    /// Settle the surface back to a flat state.
    pub fn reset(&mut self) {
        self.water.reset();
    }

    pub fn sample_tiles_from_image(&mut self, encoded_bytes: &[u8]) {
        if let Err(problem) = self.pool.set_tiles_texture(encoded_bytes) {
            log::error!("{}", problem);
        }
    }

    pub fn animate(&mut self, timestamp: f64) {
        // The delta time in seconds
        let timestep = f32::min(
            MAX_FRAME_TIME,
            0.001 * (timestamp - self.last_timestamp) as f32,
        );
        self.last_timestamp = timestamp;
        self.elapsed_time += timestep;
        self.frame_time += timestep;

        // Reset animation timers to avoid precision issues
        let timer_overflow = self.elapsed_time - MAX_ELAPSED_TIME;
        if timer_overflow >= 0.0 {
            self.elapsed_time = timer_overflow;
        }

        let mut stepped = false;
        while self.frame_time >= self.update_interval {
            self.water.step();
            self.frame_time -= self.update_interval;
            stepped = true;
        }

        // The downstream stages sample height and normal from the same
        // texture, so the normals have to be refreshed before either runs.
        if stepped {
            self.water.update_normals();
        }

        self.caustics.update(self.water.current());

        let view_projection = view_projection_matrix(self.physical_width, self.physical_height);

        match self.settings.mode {
            Mode::Normal => self.pool.draw(
                self.water.current(),
                self.caustics.texture(),
                &view_projection,
                self.physical_width,
                self.physical_height,
            ),
            Mode::DebugWater => self.debug_view.draw(
                self.water.current(),
                self.physical_width,
                self.physical_height,
            ),
            Mode::DebugCaustics => self.debug_view.draw(
                self.caustics.texture(),
                self.physical_width,
                self.physical_height,
            ),
        }
    }
}

fn view_projection_matrix(width: u32, height: u32) -> [f32; 16] {
    // Hosts report zero-size windows while minimized; a zero aspect ratio
    // is rejected by Perspective3.
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    let projection = Perspective3::new(aspect, std::f32::consts::FRAC_PI_4, 0.01, 100.0);

    let eye = Point3::new(0.0, 1.4, 3.0);
    let target = Point3::new(0.0, -0.2, 0.0);
    let view = Isometry3::look_at_rh(&eye, &target, &Vector3::y());

    let matrix = projection.as_matrix() * view.to_homogeneous();
    let mut columns = [0.0; 16];
    columns.copy_from_slice(matrix.as_slice());
    columns
}

#[derive(Error, Debug)]
pub enum Problem {
    #[error("{0}")]
    Render(#[from] render::Problem),

    #[error("{0}")]
    LoadShader(#[from] shader::Problem),

    #[error("Failed to read image: {0}")]
    ReadImage(std::io::Error),

    #[error("Failed to decode image: {0}")]
    DecodeTilesTexture(image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_projection_is_finite_and_column_major() {
        let matrix = view_projection_matrix(1280, 800);
        assert!(matrix.iter().all(|v| v.is_finite()));

        // A perspective projection keeps zeros in the first column's tail.
        assert_eq!(matrix[1], 0.0);
        assert_eq!(matrix[3], 0.0);
    }

    #[test]
    fn view_projection_survives_degenerate_sizes() {
        for (width, height) in [(1, 0), (0, 800), (0, 0)] {
            let matrix = view_projection_matrix(width, height);
            assert!(
                matrix.iter().all(|v| v.is_finite()),
                "non-finite matrix at {}x{}",
                width,
                height
            );
        }
    }
}
