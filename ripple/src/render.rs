use glow::HasContext;
use rustc_hash::FxHashMap;
use std::rc::Rc;
use thiserror::Error;

pub type Context = Rc<glow::Context>;
type Result<T> = std::result::Result<T, Problem>;

#[derive(Error, Debug)]
pub enum Problem {
    #[error("Ran out of memory")]
    OutOfMemory,

    #[error("Cannot create buffer")]
    CannotCreateBuffer,

    #[error("Cannot create texture")]
    CannotCreateTexture,

    #[error("Cannot create framebuffer")]
    CannotCreateFramebuffer,

    #[error("{}", match .0 {
        Some(n) => format!("Cannot create shader: {}", n),
        None => format!("Cannot create shader"),
    })]
    CannotCreateShader(Option<String>),

    #[error("Cannot create program")]
    CannotCreateProgram,

    #[error("Cannot link program: {0}")]
    CannotLinkProgram(String),

    #[error("Unexpected data size. Expected: {expected:?}. Actual: {actual:?} ")]
    WrongDataSize { expected: usize, actual: usize },

    #[error("Vertex attribute type is not supported")]
    CannotBindUnsupportedVertexType,
}

#[derive(Clone, Debug)]
pub struct Buffer {
    context: Context,
    pub id: glow::Buffer,
    pub size: usize,
    pub type_: u32,
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_buffer(self.id);
        }
    }
}

impl Buffer {
    pub fn from_bytes(
        context: &Context,
        data: &[u8],
        buffer_type: u32,
        usage: u32,
    ) -> Result<Self> {
        let buffer = unsafe {
            let buffer = context
                .create_buffer()
                .map_err(|_| Problem::CannotCreateBuffer)?;

            context.bind_buffer(buffer_type, Some(buffer));
            context.buffer_data_u8_slice(buffer_type, data, usage);
            context.bind_buffer(buffer_type, None);

            buffer
        };

        Ok(Self {
            context: Rc::clone(context),
            id: buffer,
            size: data.len(),
            type_: buffer_type,
        })
    }

    pub fn from_f32(context: &Context, data: &[f32], buffer_type: u32, usage: u32) -> Result<Self> {
        Self::from_bytes(context, bytemuck::cast_slice(data), buffer_type, usage)
    }

    pub fn from_u16(context: &Context, data: &[u16], buffer_type: u32, usage: u32) -> Result<Self> {
        Self::from_bytes(context, bytemuck::cast_slice(data), buffer_type, usage)
    }
}

/// The pixel layout of a render target. Each variant knows the matching
/// GL internal format, upload format and component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    R32F,
    Rg32F,
    Rgba16F,
    Rgba32F,
}

impl PixelFormat {
    pub fn internal_format(self) -> u32 {
        match self {
            PixelFormat::Rgba8 => glow::RGBA8,
            PixelFormat::R32F => glow::R32F,
            PixelFormat::Rg32F => glow::RG32F,
            PixelFormat::Rgba16F => glow::RGBA16F,
            PixelFormat::Rgba32F => glow::RGBA32F,
        }
    }

    pub fn format(self) -> u32 {
        match self {
            PixelFormat::Rgba8 => glow::RGBA,
            PixelFormat::R32F => glow::RED,
            PixelFormat::Rg32F => glow::RG,
            PixelFormat::Rgba16F | PixelFormat::Rgba32F => glow::RGBA,
        }
    }

    pub fn type_(self) -> u32 {
        match self {
            PixelFormat::Rgba8 => glow::UNSIGNED_BYTE,
            PixelFormat::Rgba16F => glow::HALF_FLOAT,
            PixelFormat::R32F | PixelFormat::Rg32F | PixelFormat::Rgba32F => glow::FLOAT,
        }
    }

    /// Number of channels per texel. Upload size checks depend on this.
    pub fn channel_count(self) -> usize {
        match self {
            PixelFormat::R32F => 1,
            PixelFormat::Rg32F => 2,
            PixelFormat::Rgba8 | PixelFormat::Rgba16F | PixelFormat::Rgba32F => 4,
        }
    }
}

#[derive(Clone, Copy)]
pub struct TextureOptions {
    pub mag_filter: u32,
    pub min_filter: u32,
    pub wrap_s: u32,
    pub wrap_t: u32,
    pub format: PixelFormat,
}

impl Default for TextureOptions {
    fn default() -> Self {
        TextureOptions {
            mag_filter: glow::NEAREST,
            min_filter: glow::NEAREST,
            wrap_s: glow::CLAMP_TO_EDGE,
            wrap_t: glow::CLAMP_TO_EDGE,
            format: PixelFormat::Rgba32F,
        }
    }
}

pub struct Framebuffer {
    context: Context,
    pub id: glow::Framebuffer,
    pub width: u32,
    pub height: u32,
    pub texture: glow::Texture,
    pub options: TextureOptions,
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.context
                .bind_framebuffer(glow::FRAMEBUFFER, Some(self.id));
            self.context.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                None,
                0,
            );
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.context.delete_framebuffer(self.id);
            self.context.delete_texture(self.texture);
        }
    }
}

impl Framebuffer {
    pub fn new(
        context: &Context,
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> Result<Self> {
        let (framebuffer, texture) = unsafe {
            let texture = context
                .create_texture()
                .map_err(|_| Problem::CannotCreateTexture)?;

            context.bind_texture(glow::TEXTURE_2D, Some(texture));
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                options.mag_filter as i32,
            );
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                options.min_filter as i32,
            );
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                options.wrap_s as i32,
            );
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                options.wrap_t as i32,
            );
            context.bind_texture(glow::TEXTURE_2D, None);

            let framebuffer = context
                .create_framebuffer()
                .map_err(|_| Problem::CannotCreateFramebuffer)?;

            (framebuffer, texture)
        };

        Ok(Self {
            context: Rc::clone(context),
            id: framebuffer,
            width,
            height,
            texture,
            options,
        })
    }

    /// Allocate the backing texture and attach it to the framebuffer,
    /// optionally uploading initial texel data.
    pub fn with_data<T: bytemuck::Pod>(&self, data: Option<&[T]>) -> Result<()> {
        let format = self.options.format;

        let expected_size = format.channel_count() * ((self.width * self.height) as usize);
        if let Some(buffer) = data {
            if buffer.len() != expected_size {
                return Err(Problem::WrongDataSize {
                    expected: expected_size,
                    actual: buffer.len(),
                });
            }
        }

        unsafe {
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(self.texture));

            self.context.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                format.internal_format() as i32,
                self.width as i32,
                self.height as i32,
                0,
                format.format(),
                format.type_(),
                data.map(|buffer| bytemuck::cast_slice(buffer)),
            );

            self.context.bind_texture(glow::TEXTURE_2D, None);

            self.context
                .bind_framebuffer(glow::FRAMEBUFFER, Some(self.id));
            self.context.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(self.texture),
                0,
            );
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
        }

        Ok(())
    }

    pub fn zero_out(&self) {
        self.clear_color_with(&[0.0, 0.0, 0.0, 0.0])
    }

    pub fn clear_color_with(&self, color: &[f32; 4]) {
        unsafe {
            self.context
                .bind_framebuffer(glow::FRAMEBUFFER, Some(self.id));

            self.context
                .viewport(0, 0, self.width as i32, self.height as i32);
            self.context
                .clear_color(color[0], color[1], color[2], color[3]);
            self.context.clear(glow::COLOR_BUFFER_BIT);

            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    pub fn draw_to<T>(&self, context: &Context, draw_call: T)
    where
        T: Fn(),
    {
        unsafe {
            context.bind_framebuffer(glow::DRAW_FRAMEBUFFER, Some(self.id));
            context.viewport(0, 0, self.width as i32, self.height as i32);
            draw_call();
            context.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
        }
    }
}

/// A two-slot arena for ping-pong rendering.
///
/// Exactly one slot is active at any time. Writers read from the active
/// slot, render into the inactive one and toggle the index afterwards, so a
/// single pass can never read and write the same slot.
pub struct PingPongArena<T> {
    slots: [T; 2],
    active_index: usize,
}

impl<T> PingPongArena<T> {
    pub fn new(front: T, back: T) -> Self {
        Self {
            slots: [front, back],
            active_index: 0,
        }
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn current(&self) -> &T {
        &self.slots[self.active_index]
    }

    pub fn next(&self) -> &T {
        &self.slots[1 - self.active_index]
    }

    pub fn swap(&mut self) {
        self.active_index = 1 - self.active_index;
    }
}

pub struct DoubleFramebuffer {
    pub width: u32,
    pub height: u32,
    arena: PingPongArena<Framebuffer>,
}

impl DoubleFramebuffer {
    pub fn new(
        context: &Context,
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> Result<Self> {
        let front = Framebuffer::new(context, width, height, options)?;
        let back = Framebuffer::new(context, width, height, options)?;
        Ok(Self {
            width,
            height,
            arena: PingPongArena::new(front, back),
        })
    }

    pub fn with_data<T: bytemuck::Pod>(&self, data: Option<&[T]>) -> Result<()> {
        self.arena.current().with_data(data)?;
        self.arena.next().with_data(data)?;

        Ok(())
    }

    pub fn zero_out(&self) {
        self.arena.current().zero_out();
        self.arena.next().zero_out();
    }

    pub fn current(&self) -> &Framebuffer {
        self.arena.current()
    }

    pub fn next(&self) -> &Framebuffer {
        self.arena.next()
    }

    pub fn active_index(&self) -> usize {
        self.arena.active_index()
    }

    pub fn swap(&mut self) {
        self.arena.swap();
    }

    /// Render into the inactive target while sampling the active one, then
    /// make the freshly written target the active one.
    pub fn draw_to<T>(&mut self, context: &Context, draw_call: T)
    where
        T: Fn(&Framebuffer),
    {
        let target = self.arena.next();

        unsafe {
            context.bind_framebuffer(glow::DRAW_FRAMEBUFFER, Some(target.id));
            context.viewport(0, 0, target.width as i32, target.height as i32);
            draw_call(self.arena.current());
            context.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
        }

        self.arena.swap();
    }
}

#[derive(Clone)]
pub struct Program {
    context: Context,
    pub program: glow::Program,
    attributes: FxHashMap<String, AttributeInfo>,
    uniforms: FxHashMap<String, UniformInfo>,
}

impl Drop for Program {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_program(self.program);
        }
    }
}

impl Program {
    pub fn new(context: &Context, shaders: (&str, &str)) -> Result<Self> {
        let vertex_shader = compile_shader(context, glow::VERTEX_SHADER, shaders.0)?;
        let fragment_shader = compile_shader(context, glow::FRAGMENT_SHADER, shaders.1)?;

        let program = unsafe {
            let program = context
                .create_program()
                .map_err(|_| Problem::CannotCreateProgram)?;
            context.attach_shader(program, vertex_shader);
            context.attach_shader(program, fragment_shader);
            context.link_program(program);

            if !context.get_program_link_status(program) {
                return Err(Problem::CannotLinkProgram(
                    context.get_program_info_log(program),
                ));
            }

            // Delete the shaders to free up memory
            context.detach_shader(program, vertex_shader);
            context.detach_shader(program, fragment_shader);
            context.delete_shader(vertex_shader);
            context.delete_shader(fragment_shader);

            program
        };

        // Get attribute locations
        let mut attributes = FxHashMap::default();
        unsafe {
            let attribute_count = context.get_active_attributes(program);
            for num in 0..attribute_count {
                if let Some(info) = context.get_active_attribute(program, num) {
                    if let Some(location) = context.get_attrib_location(program, &info.name) {
                        attributes.insert(
                            info.name,
                            AttributeInfo {
                                type_: info.atype,
                                size: info.size as u32,
                                location,
                            },
                        );
                    }
                }
            }
        }

        // Get uniform locations
        let mut uniforms = FxHashMap::default();
        unsafe {
            let uniform_count = context.get_active_uniforms(program);
            for num in 0..uniform_count {
                if let Some(info) = context.get_active_uniform(program, num) {
                    if let Some(location) = context.get_uniform_location(program, &info.name) {
                        uniforms.insert(
                            info.name,
                            UniformInfo {
                                type_: info.utype,
                                size: info.size,
                                location,
                            },
                        );
                    }
                }
            }
        }

        Ok(Program {
            context: Rc::clone(context),
            program,
            attributes,
            uniforms,
        })
    }

    pub fn use_program(&self) {
        unsafe {
            self.context.use_program(Some(self.program));
        }
    }

    pub fn set_uniforms(&self, uniforms: &[&Uniform]) {
        for uniform in uniforms.iter() {
            self.set_uniform(uniform);
        }
    }

    pub fn set_uniform(&self, uniform: &Uniform) {
        let context = &self.context;
        self.use_program();

        unsafe {
            match uniform.value {
                UniformValue::SignedInt(value) => {
                    context.uniform_1_i32(self.get_uniform_location(uniform.name).as_ref(), value)
                }

                UniformValue::Float(value) => {
                    context.uniform_1_f32(self.get_uniform_location(uniform.name).as_ref(), value)
                }

                UniformValue::Vec2(value) => context.uniform_2_f32(
                    self.get_uniform_location(uniform.name).as_ref(),
                    value[0],
                    value[1],
                ),

                UniformValue::Vec3(value) => context.uniform_3_f32(
                    self.get_uniform_location(uniform.name).as_ref(),
                    value[0],
                    value[1],
                    value[2],
                ),

                UniformValue::Mat4(ref value) => context.uniform_matrix_4_f32_slice(
                    self.get_uniform_location(uniform.name).as_ref(),
                    false,
                    value,
                ),

                UniformValue::Texture2D(id) => {
                    context.uniform_1_i32(
                        self.get_uniform_location(uniform.name).as_ref(),
                        id as i32,
                    );
                }
            }
        }
    }

    pub fn get_attrib_location(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).map(|info| info.location)
    }

    pub fn get_uniform_location(&self, name: &str) -> Option<glow::UniformLocation> {
        self.uniforms.get(name).map(|info| info.location.clone())
    }
}

#[derive(Clone)]
struct AttributeInfo {
    #[allow(dead_code)]
    type_: u32,
    #[allow(dead_code)]
    size: u32,
    location: u32,
}

#[derive(Clone)]
struct UniformInfo {
    #[allow(dead_code)]
    type_: u32,
    #[allow(dead_code)]
    size: i32,
    location: glow::UniformLocation,
}

pub struct Uniform<'a> {
    pub name: &'static str,
    pub value: UniformValue<'a>,
}

#[derive(Clone)]
pub enum UniformValue<'a> {
    SignedInt(i32),
    Float(f32),
    Vec2(&'a [f32; 2]),
    Vec3(&'a [f32; 3]),
    Mat4(&'a [f32]),
    Texture2D(u32),
}

pub fn compile_shader(context: &Context, shader_type: u32, source: &str) -> Result<glow::Shader> {
    unsafe {
        let shader = context
            .create_shader(shader_type)
            .map_err(|_| Problem::CannotCreateShader(None))?;
        context.shader_source(shader, source);
        context.compile_shader(shader);

        if context.get_shader_compile_status(shader) {
            Ok(shader)
        } else {
            Err(Problem::CannotCreateShader(Some(
                context.get_shader_info_log(shader),
            )))
        }
    }
}

#[derive(Default)]
pub struct VertexBufferLayout {
    pub name: &'static str,
    pub size: u32,
    pub type_: u32,
    pub divisor: u32,
    pub stride: u32,
    pub offset: u32,
}

pub struct VertexArrayObject {
    context: Context,
    pub id: glow::VertexArray,
}

impl Drop for VertexArrayObject {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_vertex_array(self.id);
        }
    }
}

impl VertexArrayObject {
    pub fn empty(context: &Context) -> Result<Self> {
        let id = unsafe {
            context
                .create_vertex_array()
                .map_err(|_| Problem::OutOfMemory)?
        };

        Ok(Self {
            id,
            context: Rc::clone(context),
        })
    }

    pub fn new(
        context: &Context,
        program: &Program,
        vertices: &[(&Buffer, VertexBufferLayout)],
        indices: Option<&Buffer>,
    ) -> Result<Self> {
        let vao = Self::empty(context)?;
        vao.update(program, vertices, indices)?;
        Ok(vao)
    }

    pub fn update(
        &self,
        program: &Program,
        vertices: &[(&Buffer, VertexBufferLayout)],
        indices: Option<&Buffer>,
    ) -> Result<()> {
        unsafe {
            self.context.bind_vertex_array(Some(self.id));

            for (vertex, attribute) in vertices.iter() {
                bind_attributes(&self.context, program, vertex, attribute)?;
            }

            if indices.is_some() {
                self.context
                    .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, indices.map(|buffer| buffer.id));
            }

            self.context.bind_vertex_array(None);
        }

        Ok(())
    }

    pub fn bind(&self) {
        unsafe {
            self.context.bind_vertex_array(Some(self.id));
        }
    }
}

pub fn bind_attributes(
    context: &Context,
    program: &Program,
    buffer: &Buffer,
    buffer_layout: &VertexBufferLayout,
) -> Result<()> {
    unsafe {
        context.bind_buffer(glow::ARRAY_BUFFER, Some(buffer.id));

        if let Some(location) = program.get_attrib_location(buffer_layout.name) {
            context.enable_vertex_attrib_array(location);

            match buffer_layout.type_ {
                glow::FLOAT => context.vertex_attrib_pointer_f32(
                    location,
                    buffer_layout.size as i32,
                    buffer_layout.type_,
                    false,
                    buffer_layout.stride as i32,
                    buffer_layout.offset as i32,
                ),
                glow::UNSIGNED_SHORT | glow::UNSIGNED_INT | glow::INT => context
                    .vertex_attrib_pointer_i32(
                        location,
                        buffer_layout.size as i32,
                        buffer_layout.type_,
                        buffer_layout.stride as i32,
                        buffer_layout.offset as i32,
                    ),
                _ => return Err(Problem::CannotBindUnsupportedVertexType),
            };

            context.vertex_attrib_divisor(location, buffer_layout.divisor);
        }

        context.bind_buffer(glow::ARRAY_BUFFER, None);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_pong_swap_round_trips() {
        let mut arena = PingPongArena::new(11u32, 22u32);
        assert_eq!(*arena.current(), 11);
        assert_eq!(*arena.next(), 22);

        // An odd number of swaps lands on the other slot.
        for _ in 0..3 {
            arena.swap();
        }
        assert_eq!(arena.active_index(), 1);
        assert_eq!(*arena.current(), 22);

        // An even number of swaps is the identity.
        for _ in 0..4 {
            arena.swap();
        }
        assert_eq!(arena.active_index(), 1);
        assert_eq!(*arena.current(), 22);
        arena.swap();
        assert_eq!(arena.active_index(), 0);
        assert_eq!(*arena.current(), 11);
    }

    #[test]
    fn ping_pong_never_aliases() {
        let mut arena = PingPongArena::new(0u32, 1u32);
        for _ in 0..5 {
            assert_ne!(*arena.current(), *arena.next());
            arena.swap();
        }
    }

    #[test]
    fn pixel_format_channel_counts_match_gl_formats() {
        for format in [
            PixelFormat::Rgba8,
            PixelFormat::R32F,
            PixelFormat::Rg32F,
            PixelFormat::Rgba16F,
            PixelFormat::Rgba32F,
        ] {
            let channels = match format.format() {
                glow::RED => 1,
                glow::RG => 2,
                glow::RGBA => 4,
                other => panic!("unexpected GL format: {}", other),
            };
            assert_eq!(format.channel_count(), channels);
        }
    }

    #[test]
    fn pixel_format_types_are_consistent() {
        assert_eq!(PixelFormat::Rgba8.type_(), glow::UNSIGNED_BYTE);
        assert_eq!(PixelFormat::Rgba16F.type_(), glow::HALF_FLOAT);
        assert_eq!(PixelFormat::Rgba32F.type_(), glow::FLOAT);
        assert_eq!(PixelFormat::Rgba32F.internal_format(), glow::RGBA32F);
    }
}
