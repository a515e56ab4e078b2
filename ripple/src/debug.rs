use crate::render::{
    Buffer, Context, Framebuffer, Uniform, UniformValue, VertexArrayObject, VertexBufferLayout,
};
use crate::shader::ShaderStore;
use crate::{data, render, Problem};

use glow::HasContext;
use std::rc::Rc;

/// Blits any intermediate texture straight to the screen for inspection.
/// Nothing else in the pipeline depends on this stage.
pub struct DebugView {
    context: Context,
    quad_vertices: Buffer,
    pass: Option<DebugPass>,
}

struct DebugPass {
    program: render::Program,
    vertices: VertexArrayObject,
}

impl DebugView {
    pub fn new(context: &Context) -> Result<Self, render::Problem> {
        let quad_vertices = Buffer::from_f32(
            context,
            &data::QUAD_VERTICES,
            glow::ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;

        Ok(Self {
            context: Rc::clone(context),
            quad_vertices,
            pass: None,
        })
    }

    pub fn initialize(&mut self, shaders: &dyn ShaderStore) -> Result<(), Problem> {
        let vertex_shader = shaders.load("shaders/quad.vert")?;
        let fragment_shader = shaders.load("shaders/texture.frag")?;

        let program = render::Program::new(&self.context, (&vertex_shader, &fragment_shader))?;
        let vertices = VertexArrayObject::new(
            &self.context,
            &program,
            &[(
                &self.quad_vertices,
                VertexBufferLayout {
                    name: "position",
                    size: 2,
                    type_: glow::FLOAT,
                    ..Default::default()
                },
            )],
            None,
        )?;

        program.set_uniform(&Uniform {
            name: "inputTexture",
            value: UniformValue::Texture2D(0),
        });

        self.pass = Some(DebugPass { program, vertices });

        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.pass.is_some()
    }

    pub fn draw(&self, texture: &Framebuffer, width: u32, height: u32) {
        let Some(pass) = &self.pass else {
            return;
        };

        unsafe {
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.context.viewport(0, 0, width as i32, height as i32);

            pass.program.use_program();
            pass.vertices.bind();

            self.context.active_texture(glow::TEXTURE0);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(texture.texture));

            self.context.draw_arrays(glow::TRIANGLES, 0, 6);
        }
    }
}
