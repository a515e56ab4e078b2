use crate::render::{
    Buffer, Context, Framebuffer, PixelFormat, TextureOptions, Uniform, UniformValue,
    VertexArrayObject, VertexBufferLayout,
};
use crate::settings::Settings;
use crate::shader::ShaderStore;
use crate::{data, render, Problem};

use glow::HasContext;
use std::rc::Rc;

const TILES_FALLBACK_SIZE: u32 = 256;
const TILES_MAX_SIZE: u32 = 1024;

/// Composites the pool box to the screen: tiled walls, the height field for
/// the water line and the caustics texture for underwater lighting.
pub struct Pool {
    context: Context,
    settings: Rc<Settings>,

    vertices: Buffer,
    indices: Buffer,
    tiles_texture: Framebuffer,

    pass: Option<PoolPass>,
}

struct PoolPass {
    program: render::Program,
    vertices: VertexArrayObject,
}

impl Pool {
    pub fn new(context: &Context, settings: &Rc<Settings>) -> Result<Self, render::Problem> {
        let vertices = Buffer::from_f32(
            context,
            &data::POOL_VERTICES,
            glow::ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;
        let indices = Buffer::from_u16(
            context,
            &data::POOL_INDICES,
            glow::ELEMENT_ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;

        let tiles_texture = upload_tiles(
            context,
            TILES_FALLBACK_SIZE,
            TILES_FALLBACK_SIZE,
            &data::checkerboard_tiles(TILES_FALLBACK_SIZE, 8),
        )?;

        Ok(Self {
            context: Rc::clone(context),
            settings: Rc::clone(settings),

            vertices,
            indices,
            tiles_texture,

            pass: None,
        })
    }

    pub fn initialize(&mut self, shaders: &dyn ShaderStore) -> Result<(), Problem> {
        let vertex_shader = shaders.load("shaders/pool.vert")?;
        let fragment_shader = shaders.load("shaders/pool.frag")?;

        let program = render::Program::new(&self.context, (&vertex_shader, &fragment_shader))?;
        let vertices = VertexArrayObject::new(
            &self.context,
            &program,
            &[(
                &self.vertices,
                VertexBufferLayout {
                    name: "position",
                    size: 3,
                    type_: glow::FLOAT,
                    ..Default::default()
                },
            )],
            Some(&self.indices),
        )?;

        program.set_uniforms(&[
            &Uniform {
                name: "tilesTexture",
                value: UniformValue::Texture2D(0),
            },
            &Uniform {
                name: "waterTexture",
                value: UniformValue::Texture2D(1),
            },
            &Uniform {
                name: "causticsTexture",
                value: UniformValue::Texture2D(2),
            },
            &Uniform {
                name: "light",
                value: UniformValue::Vec3(&self.settings.light_direction),
            },
        ]);

        self.pass = Some(PoolPass { program, vertices });

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

    /// Replace the wall texture with a decoded image. Oversized images are
    /// scaled down before upload.
    pub fn set_tiles_texture(&mut self, encoded_bytes: &[u8]) -> Result<(), Problem> {
        log::debug!("Decoding tiles image");

        let mut img =
            image::load_from_memory(encoded_bytes).map_err(Problem::DecodeTilesTexture)?;
        if u32::max(img.width(), img.height()) > TILES_MAX_SIZE {
            img = img.resize(
                TILES_MAX_SIZE,
                TILES_MAX_SIZE,
                image::imageops::FilterType::Nearest,
            );
        }

        log::debug!(
            "Uploading tiles image (width: {}, height: {})",
            img.width(),
            img.height()
        );

        self.tiles_texture = upload_tiles(
            &self.context,
            img.width(),
            img.height(),
            &img.to_rgba8(),
        )
        .map_err(Problem::Render)?;

        Ok(())
    }

    /// Draw the pool box to the screen framebuffer. The screen target is
    /// bound explicitly; everything upstream renders offscreen.
    pub fn draw(
        &self,
        water: &Framebuffer,
        caustics: &Framebuffer,
        view_projection: &[f32; 16],
        width: u32,
        height: u32,
    ) {
        let Some(pass) = &self.pass else {
            return;
        };

        pass.program.set_uniform(&Uniform {
            name: "viewProjectionMatrix",
            value: UniformValue::Mat4(view_projection),
        });

        unsafe {
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.context.viewport(0, 0, width as i32, height as i32);

            self.context.clear_color(0.0, 0.0, 0.0, 1.0);
            self.context
                .clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
            self.context.enable(glow::DEPTH_TEST);

            pass.program.use_program();
            pass.vertices.bind();

            self.context.active_texture(glow::TEXTURE0);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(self.tiles_texture.texture));
            self.context.active_texture(glow::TEXTURE1);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(water.texture));
            self.context.active_texture(glow::TEXTURE2);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(caustics.texture));

            self.context
                .draw_elements(glow::TRIANGLES, 36, glow::UNSIGNED_SHORT, 0);

            self.context.disable(glow::DEPTH_TEST);
        }
    }
}

fn upload_tiles(
    context: &Context,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<Framebuffer, render::Problem> {
    let texture = Framebuffer::new(
        context,
        width,
        height,
        TextureOptions {
            mag_filter: glow::LINEAR,
            min_filter: glow::LINEAR,
            format: PixelFormat::Rgba8,
            wrap_s: glow::REPEAT,
            wrap_t: glow::REPEAT,
        },
    )?;
    texture.with_data(Some(pixels))?;

    Ok(texture)
}
