use crate::render::{
    Buffer, Context, DoubleFramebuffer, Framebuffer, TextureOptions, Uniform, UniformValue,
    VertexArrayObject, VertexBufferLayout,
};
use crate::settings::Settings;
use crate::shader::ShaderStore;
use crate::{data, render, Problem};

use glow::HasContext;
use std::rc::Rc;

/// The ping-ponged height-field simulator.
///
/// Both targets pack the simulation state into a single RGBA32F texture:
/// height in `r`, vertical velocity in `g` and the surface normal's xz
/// components in `ba`. Every pass reads the current target, writes the
/// inactive one and swaps.
pub struct WaterSimulation {
    context: Context,
    settings: Rc<Settings>,

    texel_size: [f32; 2],
    textures: DoubleFramebuffer,
    quad_vertices: Buffer,

    // None until `initialize` has compiled the shader programs. All passes
    // are silent no-ops while unset.
    passes: Option<Passes>,
}

struct Passes {
    drop_pass: render::Program,
    drop_vertices: VertexArrayObject,
    step_pass: render::Program,
    step_vertices: VertexArrayObject,
    normal_pass: render::Program,
    normal_vertices: VertexArrayObject,
}

impl WaterSimulation {
    pub fn new(context: &Context, settings: &Rc<Settings>) -> Result<Self, render::Problem> {
        // Keep the height field in the range the caustics grid can index.
        let resolution = settings
            .water_resolution
            .clamp(2, data::MAX_GRID_RESOLUTION);
        if resolution != settings.water_resolution {
            log::warn!(
                "Unsupported water resolution {}; clamping to {}",
                settings.water_resolution,
                resolution
            );
        }
        let texel_size = [1.0 / resolution as f32, 1.0 / resolution as f32];

        let textures = DoubleFramebuffer::new(
            context,
            resolution,
            resolution,
            TextureOptions {
                mag_filter: glow::LINEAR,
                min_filter: glow::LINEAR,
                ..Default::default()
            },
        )?;
        let flat_surface = vec![0.0_f32; (4 * resolution * resolution) as usize];
        textures.with_data(Some(&flat_surface))?;

        let quad_vertices = Buffer::from_f32(
            context,
            &data::QUAD_VERTICES,
            glow::ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;

        Ok(Self {
            context: Rc::clone(context),
            settings: Rc::clone(settings),

            texel_size,
            textures,
            quad_vertices,

            passes: None,
        })
    }

    /// Compile the drop, step and normal programs. Until this succeeds the
    /// simulator ignores every pass request.
    pub fn initialize(&mut self, shaders: &dyn ShaderStore) -> Result<(), Problem> {
        let vertex_shader = shaders.load("shaders/quad.vert")?;
        let drop_shader = shaders.load("shaders/drop.frag")?;
        let update_shader = shaders.load("shaders/update.frag")?;
        let normal_shader = shaders.load("shaders/normal.frag")?;

        let drop_pass = render::Program::new(&self.context, (&vertex_shader, &drop_shader))?;
        let step_pass = render::Program::new(&self.context, (&vertex_shader, &update_shader))?;
        let normal_pass = render::Program::new(&self.context, (&vertex_shader, &normal_shader))?;

        let quad_layout = || VertexBufferLayout {
            name: "position",
            size: 2,
            type_: glow::FLOAT,
            ..Default::default()
        };
        let drop_vertices = VertexArrayObject::new(
            &self.context,
            &drop_pass,
            &[(&self.quad_vertices, quad_layout())],
            None,
        )?;
        let step_vertices = VertexArrayObject::new(
            &self.context,
            &step_pass,
            &[(&self.quad_vertices, quad_layout())],
            None,
        )?;
        let normal_vertices = VertexArrayObject::new(
            &self.context,
            &normal_pass,
            &[(&self.quad_vertices, quad_layout())],
            None,
        )?;

        for pass in [&drop_pass, &step_pass, &normal_pass] {
            pass.set_uniform(&Uniform {
                name: "waterTexture",
                value: UniformValue::Texture2D(0),
            });
        }
        for pass in [&step_pass, &normal_pass] {
            pass.set_uniform(&Uniform {
                name: "texelSize",
                value: UniformValue::Vec2(&self.texel_size),
            });
        }
        step_pass.set_uniform(&Uniform {
            name: "damping",
            value: UniformValue::Float(self.settings.wave_damping),
        });

        self.passes = Some(Passes {
            drop_pass,
            drop_vertices,
            step_pass,
            step_vertices,
            normal_pass,
            normal_vertices,
        });

        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.passes.is_some()
    }

    pub fn update_settings(&mut self, settings: &Rc<Settings>) {
        self.settings = Rc::clone(settings);

        if let Some(passes) = &self.passes {
            passes.step_pass.set_uniform(&Uniform {
                name: "damping",
                value: UniformValue::Float(settings.wave_damping),
            });
        }
    }

    /// Splash the surface at `(x, y)` in [-1, 1]² plane coordinates.
    /// Negative `strength` pushes the surface down instead.
    pub fn add_drop(&mut self, x: f32, y: f32, radius: f32, strength: f32) {
        let Some(passes) = &self.passes else {
            return;
        };
        if radius <= 0.0 {
            log::warn!("Ignoring drop with non-positive radius {}", radius);
            return;
        }

        let center = [x, y];
        passes.drop_pass.set_uniforms(&[
            &Uniform {
                name: "center",
                value: UniformValue::Vec2(&center),
            },
            &Uniform {
                name: "radius",
                value: UniformValue::Float(radius),
            },
            &Uniform {
                name: "strength",
                value: UniformValue::Float(strength),
            },
        ]);

        let context = Rc::clone(&self.context);
        self.textures.draw_to(&context, |current| unsafe {
            passes.drop_pass.use_program();
            passes.drop_vertices.bind();

            context.active_texture(glow::TEXTURE0);
            context.bind_texture(glow::TEXTURE_2D, Some(current.texture));

            context.draw_arrays(glow::TRIANGLES, 0, 6);
        });
    }

    /// Advance the wave equation by one tick. The simulator has no clock;
    /// the caller decides how many ticks make up a frame.
    pub fn step(&mut self) {
        let Some(passes) = &self.passes else {
            return;
        };

        let context = Rc::clone(&self.context);
        self.textures.draw_to(&context, |current| unsafe {
            passes.step_pass.use_program();
            passes.step_vertices.bind();

            context.active_texture(glow::TEXTURE0);
            context.bind_texture(glow::TEXTURE_2D, Some(current.texture));

            context.draw_arrays(glow::TRIANGLES, 0, 6);
        });
    }

    /// Refresh the packed normals. Must run after any height change and
    /// before the caustics or pool stages sample the texture.
    pub fn update_normals(&mut self) {
        let Some(passes) = &self.passes else {
            return;
        };

        let context = Rc::clone(&self.context);
        self.textures.draw_to(&context, |current| unsafe {
            passes.normal_pass.use_program();
            passes.normal_vertices.bind();

            context.active_texture(glow::TEXTURE0);
            context.bind_texture(glow::TEXTURE_2D, Some(current.texture));

            context.draw_arrays(glow::TRIANGLES, 0, 6);
        });
    }

    /// Flatten the surface by clearing both height textures.
    pub fn reset(&mut self) {
        self.textures.zero_out();
    }

    pub fn textures(&self) -> &DoubleFramebuffer {
        &self.textures
    }

    pub fn current(&self) -> &Framebuffer {
        self.textures.current()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    // A CPU mirror of the shader passes, close enough to check the
    // numerical properties of the update rule: the same stencil, the same
    // drop profile, clamp-to-edge sampling.
    struct CpuWater {
        resolution: usize,
        height: Vec<f32>,
        velocity: Vec<f32>,
        damping: f32,
    }

    fn drop_profile(distance: f32, radius: f32) -> f32 {
        let falloff = (1.0 - distance / radius).max(0.0);
        0.5 - (falloff * PI).cos() * 0.5
    }

    impl CpuWater {
        fn new(resolution: usize, damping: f32) -> Self {
            Self {
                resolution,
                height: vec![0.0; resolution * resolution],
                velocity: vec![0.0; resolution * resolution],
                damping,
            }
        }

        fn texel(&self, x: isize, y: isize) -> f32 {
            let clamp = |v: isize| v.clamp(0, self.resolution as isize - 1) as usize;
            self.height[clamp(y) * self.resolution + clamp(x)]
        }

        fn add_drop(&mut self, x: f32, y: f32, radius: f32, strength: f32) {
            let center = [x * 0.5 + 0.5, y * 0.5 + 0.5];
            for ty in 0..self.resolution {
                for tx in 0..self.resolution {
                    let u = (tx as f32 + 0.5) / self.resolution as f32;
                    let v = (ty as f32 + 0.5) / self.resolution as f32;
                    let distance = ((u - center[0]).powi(2) + (v - center[1]).powi(2)).sqrt();
                    self.height[ty * self.resolution + tx] +=
                        drop_profile(distance, radius) * strength;
                }
            }
        }

        fn step(&mut self) {
            let mut next_height = self.height.clone();
            for y in 0..self.resolution {
                for x in 0..self.resolution {
                    let (xi, yi) = (x as isize, y as isize);
                    let average = 0.25
                        * (self.texel(xi - 1, yi)
                            + self.texel(xi + 1, yi)
                            + self.texel(xi, yi - 1)
                            + self.texel(xi, yi + 1));

                    let index = y * self.resolution + x;
                    let mut velocity = self.velocity[index];
                    velocity += (average - self.height[index]) * 2.0;
                    velocity *= self.damping;
                    self.velocity[index] = velocity;
                    next_height[index] = self.height[index] + velocity;
                }
            }
            self.height = next_height;
        }

        fn normal_xz(&self, x: usize, y: usize) -> [f32; 2] {
            let texel_size = 1.0 / self.resolution as f32;
            let here = self.texel(x as isize, y as isize);
            let dx = [
                texel_size,
                self.texel(x as isize + 1, y as isize) - here,
                0.0,
            ];
            let dy = [
                0.0,
                self.texel(x as isize, y as isize + 1) - here,
                texel_size,
            ];
            // cross(dy, dx), then the normalized xz components
            let cross = [
                dy[1] * dx[2] - dy[2] * dx[1],
                dy[2] * dx[0] - dy[0] * dx[2],
                dy[0] * dx[1] - dy[1] * dx[0],
            ];
            let length = (cross[0].powi(2) + cross[1].powi(2) + cross[2].powi(2)).sqrt();
            [cross[0] / length, cross[2] / length]
        }

        fn max_abs_height(&self) -> f32 {
            self.height.iter().fold(0.0_f32, |max, h| max.max(h.abs()))
        }
    }

    #[test]
    fn flat_surface_is_a_fixed_point() {
        let mut water = CpuWater::new(64, 0.995);
        for _ in 0..100 {
            water.step();
        }
        assert_eq!(water.max_abs_height(), 0.0);
    }

    #[test]
    fn ripples_decay_instead_of_diverging() {
        let mut water = CpuWater::new(64, 0.995);
        water.add_drop(0.0, 0.0, 0.2, 0.05);
        let initial = water.max_abs_height();

        for _ in 0..400 {
            water.step();
            assert!(water.max_abs_height().is_finite());
        }

        assert!(
            water.max_abs_height() < 0.5 * initial,
            "field failed to settle: {} -> {}",
            initial,
            water.max_abs_height()
        );
    }

    #[test]
    fn drop_amplitude_is_linear_in_strength() {
        let mut single = CpuWater::new(32, 0.995);
        let mut double = CpuWater::new(32, 0.995);
        single.add_drop(0.0, 0.0, 0.25, 0.02);
        double.add_drop(0.0, 0.0, 0.25, 0.04);
        single.step();
        double.step();

        for (a, b) in single.height.iter().zip(double.height.iter()) {
            assert_relative_eq!(2.0 * a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn drop_profile_is_a_smooth_bounded_bump() {
        assert_relative_eq!(drop_profile(0.0, 0.1), 1.0);
        assert_eq!(drop_profile(0.1, 0.1), 0.0);
        assert_eq!(drop_profile(0.5, 0.1), 0.0);

        // Continuous roll-off towards the rim.
        assert!(drop_profile(0.0999, 0.1) < 1e-3);

        let mut previous = drop_profile(0.0, 0.1);
        for i in 1..=100 {
            let current = drop_profile(0.1 * i as f32 / 100.0, 0.1);
            assert!(current <= previous);
            previous = current;
        }
    }

    #[test]
    fn a_drop_perturbs_the_normals() {
        let mut water = CpuWater::new(64, 0.995);

        // A flat surface points straight up; the packed xz components are
        // zero everywhere.
        assert_eq!(water.normal_xz(32, 32), [0.0, 0.0]);

        water.add_drop(0.0, 0.0, 0.2, 0.05);
        water.step();

        // Somewhere inside the drop footprint the surface now tilts.
        let tilted = (24..40).any(|y| {
            (24..40).any(|x| {
                let [nx, nz] = water.normal_xz(x, y);
                (nx.powi(2) + nz.powi(2)).sqrt() > 1e-4
            })
        });
        assert!(tilted);
    }
}
