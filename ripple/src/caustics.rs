use crate::render::{
    Buffer, Context, Framebuffer, PixelFormat, TextureOptions, Uniform, UniformValue,
    VertexArrayObject, VertexBufferLayout,
};
use crate::settings::Settings;
use crate::shader::ShaderStore;
use crate::{data, render, Problem};

use glow::HasContext;
use std::rc::Rc;

/// Renders the light pattern cast on the pool floor by the rippled surface.
///
/// A fine grid is pushed through the height field in the vertex shader and
/// refracted towards the floor; where the projected cells bunch up, light
/// focuses. The result lands in a single RGBA8 texture that is fully
/// rewritten on every update.
pub struct Caustics {
    context: Context,
    settings: Rc<Settings>,

    texture: Framebuffer,
    grid_vertices: Buffer,
    grid_indices: Buffer,
    index_count: i32,

    pass: Option<CausticsPass>,
}

struct CausticsPass {
    program: render::Program,
    vertices: VertexArrayObject,
}

impl Caustics {
    pub fn new(context: &Context, settings: &Rc<Settings>) -> Result<Self, render::Problem> {
        let resolution = settings.caustics_resolution;

        let texture = Framebuffer::new(
            context,
            resolution,
            resolution,
            TextureOptions {
                mag_filter: glow::LINEAR,
                min_filter: glow::LINEAR,
                format: PixelFormat::Rgba8,
                ..Default::default()
            },
        )?;
        texture.with_data(None::<&[u8]>)?;

        // The light front mesh matches the water resolution so every height
        // texel bends its own patch of light.
        let (vertices, indices) = data::grid_mesh(settings.water_resolution);
        let grid_vertices =
            Buffer::from_f32(context, &vertices, glow::ARRAY_BUFFER, glow::STATIC_DRAW)?;
        let grid_indices = Buffer::from_u16(
            context,
            &indices,
            glow::ELEMENT_ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;

        Ok(Self {
            context: Rc::clone(context),
            settings: Rc::clone(settings),

            texture,
            grid_vertices,
            grid_indices,
            index_count: indices.len() as i32,

            pass: None,
        })
    }

    pub fn initialize(&mut self, shaders: &dyn ShaderStore) -> Result<(), Problem> {
        let vertex_shader = shaders.load("shaders/caustics.vert")?;
        let fragment_shader = shaders.load("shaders/caustics.frag")?;

        let program = render::Program::new(&self.context, (&vertex_shader, &fragment_shader))?;
        let vertices = VertexArrayObject::new(
            &self.context,
            &program,
            &[(
                &self.grid_vertices,
                VertexBufferLayout {
                    name: "position",
                    size: 2,
                    type_: glow::FLOAT,
                    ..Default::default()
                },
            )],
            Some(&self.grid_indices),
        )?;

        program.set_uniforms(&[
            &Uniform {
                name: "waterTexture",
                value: UniformValue::Texture2D(0),
            },
            &Uniform {
                name: "light",
                value: UniformValue::Vec3(&self.settings.light_direction),
            },
        ]);

        self.pass = Some(CausticsPass { program, vertices });

        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.pass.is_some()
    }

    pub fn update_settings(&mut self, settings: &Rc<Settings>) {
        self.settings = Rc::clone(settings);

        if let Some(pass) = &self.pass {
            pass.program.set_uniform(&Uniform {
                name: "light",
                value: UniformValue::Vec3(&settings.light_direction),
            });
        }
    }

    /// Rebuild the caustics texture from the given height field. The target
    /// is cleared to transparent first, so two updates with the same input
    /// produce the same output.
    pub fn update(&self, water: &Framebuffer) {
        let Some(pass) = &self.pass else {
            return;
        };

        self.texture.zero_out();
        self.texture.draw_to(&self.context, || unsafe {
            pass.program.use_program();
            pass.vertices.bind();

            self.context.active_texture(glow::TEXTURE0);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(water.texture));

            self.context.draw_elements(
                glow::TRIANGLES,
                self.index_count,
                glow::UNSIGNED_SHORT,
                0,
            );
        });
    }

    pub fn texture(&self) -> &Framebuffer {
        &self.texture
    }
}
