//! Thin seam over the OpenGL calls the renderer issues.
//!
//! [`NativeGl`] forwards to the `gl` crate once its function pointers have
//! been loaded from the current EGL instance. Tests substitute a recording
//! implementation so nothing here needs a GPU to be exercised.

use std::{
    ffi::{CStr, c_void},
    fmt, mem, ptr,
};

use gl::types::{GLchar, GLenum, GLint, GLsizei, GLsizeiptr, GLuint};

use crate::renderer::Vertex;

/// Size of the buffer the compiler and linker logs are read into.
const INFO_LOG_CAPACITY: usize = 512;

/// Upper bound on `glGetError` polls per check, a lost context can report
/// errors indefinitely.
const MAX_DRAINED_ERRORS: usize = 32;

const GL_TABLE_TOO_LARGE: GLenum = 0x8031;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn as_gl(self) -> GLenum {
        match self {
            ShaderStage::Vertex => gl::VERTEX_SHADER,
            ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// The OpenGL operations the renderer depends on.
///
/// Object handles are raw GL names, `0` meaning "no object" exactly as it
/// does for the driver.
pub trait Gl {
    fn create_shader(&self, stage: ShaderStage) -> GLuint;
    /// Uploads `source` and compiles it, returning the compile status.
    fn compile_shader(&self, shader: GLuint, source: &CStr) -> bool;
    fn shader_info_log(&self, shader: GLuint) -> String;
    fn delete_shader(&self, shader: GLuint);

    fn create_program(&self) -> GLuint;
    /// Attaches every shader and links, returning the link status.
    fn link_program(&self, program: GLuint, shaders: &[GLuint]) -> bool;
    fn program_info_log(&self, program: GLuint) -> String;
    fn delete_program(&self, program: GLuint);

    /// Creates an array buffer holding `vertices` with static usage.
    fn create_vertex_buffer(&self, vertices: &[Vertex]) -> GLuint;
    /// Creates a vertex array describing the [`Vertex`] layout of `buffer`.
    fn create_vertex_array(&self, buffer: GLuint) -> GLuint;
    fn delete_buffer(&self, buffer: GLuint);
    fn delete_vertex_array(&self, vertex_array: GLuint);

    fn viewport(&self, width: i32, height: i32);
    fn clear(&self, color: [f32; 4]);
    fn draw_triangles(&self, program: GLuint, vertex_array: GLuint, count: i32);

    /// Returns the oldest pending error flag, `gl::NO_ERROR` when none is set.
    fn get_error(&self) -> GLenum;
}

impl<G: Gl + ?Sized> Gl for &G {
    fn create_shader(&self, stage: ShaderStage) -> GLuint {
        (**self).create_shader(stage)
    }
    fn compile_shader(&self, shader: GLuint, source: &CStr) -> bool {
        (**self).compile_shader(shader, source)
    }
    fn shader_info_log(&self, shader: GLuint) -> String {
        (**self).shader_info_log(shader)
    }
    fn delete_shader(&self, shader: GLuint) {
        (**self).delete_shader(shader)
    }
    fn create_program(&self) -> GLuint {
        (**self).create_program()
    }
    fn link_program(&self, program: GLuint, shaders: &[GLuint]) -> bool {
        (**self).link_program(program, shaders)
    }
    fn program_info_log(&self, program: GLuint) -> String {
        (**self).program_info_log(program)
    }
    fn delete_program(&self, program: GLuint) {
        (**self).delete_program(program)
    }
    fn create_vertex_buffer(&self, vertices: &[Vertex]) -> GLuint {
        (**self).create_vertex_buffer(vertices)
    }
    fn create_vertex_array(&self, buffer: GLuint) -> GLuint {
        (**self).create_vertex_array(buffer)
    }
    fn delete_buffer(&self, buffer: GLuint) {
        (**self).delete_buffer(buffer)
    }
    fn delete_vertex_array(&self, vertex_array: GLuint) {
        (**self).delete_vertex_array(vertex_array)
    }
    fn viewport(&self, width: i32, height: i32) {
        (**self).viewport(width, height)
    }
    fn clear(&self, color: [f32; 4]) {
        (**self).clear(color)
    }
    fn draw_triangles(&self, program: GLuint, vertex_array: GLuint, count: i32) {
        (**self).draw_triangles(program, vertex_array, count)
    }
    fn get_error(&self) -> GLenum {
        (**self).get_error()
    }
}

pub fn error_name(code: GLenum) -> &'static str {
    match code {
        gl::NO_ERROR => "GL_NO_ERROR",
        gl::INVALID_ENUM => "GL_INVALID_ENUM",
        gl::INVALID_VALUE => "GL_INVALID_VALUE",
        gl::INVALID_OPERATION => "GL_INVALID_OPERATION",
        gl::STACK_OVERFLOW => "GL_STACK_OVERFLOW",
        gl::STACK_UNDERFLOW => "GL_STACK_UNDERFLOW",
        gl::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        gl::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        GL_TABLE_TOO_LARGE => "GL_TABLE_TOO_LARGE",
        _ => "GL_UNKNOWN_ERROR",
    }
}

/// Drains and logs every pending error flag, returning the codes seen.
///
/// Purely diagnostic: callers never treat a non-empty result as failure.
pub fn drain_errors<G: Gl + ?Sized>(gl: &G, file: &str, line: u32) -> Vec<GLenum> {
    let mut drained = Vec::new();
    while drained.len() < MAX_DRAINED_ERRORS {
        let code = gl.get_error();
        if code == gl::NO_ERROR {
            break;
        }
        tracing::error!("{file}:{line}: error: {}", error_name(code));
        drained.push(code);
    }
    drained
}

/// Reports pending GL errors at the call site in debug builds.
#[macro_export]
macro_rules! gl_check {
    ($gl:expr) => {
        if cfg!(debug_assertions) {
            $crate::gpu::drain_errors($gl, file!(), line!());
        }
    };
}

/// [`Gl`] backed by the process-wide function pointers of the `gl` crate.
#[derive(Debug, Clone, Copy)]
pub struct NativeGl {
    _loaded: (),
}

impl NativeGl {
    /// Resolves every GL entry point through `loader`.
    ///
    /// Must be called with a context current on this thread.
    pub fn load<F>(mut loader: F) -> Self
    where
        F: FnMut(&str) -> *const c_void,
    {
        gl::load_with(|symbol| loader(symbol));
        tracing::debug!("OpenGL entry points loaded");
        Self { _loaded: () }
    }
}

fn info_log_to_string(mut buffer: Vec<u8>, written: GLsizei) -> String {
    buffer.truncate(written.max(0) as usize);
    String::from_utf8_lossy(&buffer).trim_end().to_string()
}

impl Gl for NativeGl {
    fn create_shader(&self, stage: ShaderStage) -> GLuint {
        unsafe { gl::CreateShader(stage.as_gl()) }
    }

    fn compile_shader(&self, shader: GLuint, source: &CStr) -> bool {
        let mut status: GLint = 0;
        unsafe {
            gl::ShaderSource(shader, 1, &source.as_ptr(), ptr::null());
            gl::CompileShader(shader);
            gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status);
        }
        status != 0
    }

    fn shader_info_log(&self, shader: GLuint) -> String {
        let mut buffer = vec![0u8; INFO_LOG_CAPACITY];
        let mut written: GLsizei = 0;
        unsafe {
            gl::GetShaderInfoLog(
                shader,
                buffer.len() as GLsizei,
                &mut written,
                buffer.as_mut_ptr() as *mut GLchar,
            );
        }
        info_log_to_string(buffer, written)
    }

    fn delete_shader(&self, shader: GLuint) {
        unsafe { gl::DeleteShader(shader) }
    }

    fn create_program(&self) -> GLuint {
        unsafe { gl::CreateProgram() }
    }

    fn link_program(&self, program: GLuint, shaders: &[GLuint]) -> bool {
        let mut status: GLint = 0;
        unsafe {
            for &shader in shaders {
                gl::AttachShader(program, shader);
            }
            gl::LinkProgram(program);
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);
        }
        status != 0
    }

    fn program_info_log(&self, program: GLuint) -> String {
        let mut buffer = vec![0u8; INFO_LOG_CAPACITY];
        let mut written: GLsizei = 0;
        unsafe {
            gl::GetProgramInfoLog(
                program,
                buffer.len() as GLsizei,
                &mut written,
                buffer.as_mut_ptr() as *mut GLchar,
            );
        }
        info_log_to_string(buffer, written)
    }

    fn delete_program(&self, program: GLuint) {
        unsafe { gl::DeleteProgram(program) }
    }

    fn create_vertex_buffer(&self, vertices: &[Vertex]) -> GLuint {
        let mut vbo: GLuint = 0;
        unsafe {
            gl::GenBuffers(1, &mut vbo);
            gl::BindBuffer(gl::ARRAY_BUFFER, vbo);
            gl::BufferData(
                gl::ARRAY_BUFFER,
                mem::size_of_val(vertices) as GLsizeiptr,
                vertices.as_ptr() as *const c_void,
                gl::STATIC_DRAW,
            );
            gl::BindBuffer(gl::ARRAY_BUFFER, 0);
        }
        vbo
    }

    fn create_vertex_array(&self, buffer: GLuint) -> GLuint {
        let stride = mem::size_of::<Vertex>() as GLsizei;
        let mut vao: GLuint = 0;
        unsafe {
            gl::GenVertexArrays(1, &mut vao);
            gl::BindVertexArray(vao);
            gl::BindBuffer(gl::ARRAY_BUFFER, buffer);

            gl::VertexAttribPointer(
                0,
                2,
                gl::FLOAT,
                gl::FALSE,
                stride,
                mem::offset_of!(Vertex, position) as *const c_void,
            );
            gl::EnableVertexAttribArray(0);

            gl::VertexAttribPointer(
                1,
                4,
                gl::FLOAT,
                gl::FALSE,
                stride,
                mem::offset_of!(Vertex, color) as *const c_void,
            );
            gl::EnableVertexAttribArray(1);

            gl::BindBuffer(gl::ARRAY_BUFFER, 0);
            gl::BindVertexArray(0);
        }
        vao
    }

    fn delete_buffer(&self, buffer: GLuint) {
        unsafe { gl::DeleteBuffers(1, &buffer) }
    }

    fn delete_vertex_array(&self, vertex_array: GLuint) {
        unsafe { gl::DeleteVertexArrays(1, &vertex_array) }
    }

    fn viewport(&self, width: i32, height: i32) {
        unsafe { gl::Viewport(0, 0, width, height) }
    }

    fn clear(&self, [r, g, b, a]: [f32; 4]) {
        unsafe {
            gl::ClearColor(r, g, b, a);
            gl::Clear(gl::COLOR_BUFFER_BIT);
        }
    }

    fn draw_triangles(&self, program: GLuint, vertex_array: GLuint, count: i32) {
        unsafe {
            gl::UseProgram(program);
            gl::BindVertexArray(vertex_array);
            gl::DrawArrays(gl::TRIANGLES, 0, count);
        }
    }

    fn get_error(&self) -> GLenum {
        unsafe { gl::GetError() }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    /// Every call the renderer made, in order.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        CreateShader(ShaderStage),
        CompileShader(GLuint, String),
        DeleteShader(GLuint),
        CreateProgram,
        LinkProgram(GLuint, Vec<GLuint>),
        DeleteProgram(GLuint),
        CreateVertexBuffer(usize),
        CreateVertexArray(GLuint),
        DeleteBuffer(GLuint),
        DeleteVertexArray(GLuint),
        Viewport(i32, i32),
        Clear([f32; 4]),
        DrawTriangles(GLuint, GLuint, i32),
    }

    /// Clones share one call log, so a test can keep a handle while a
    /// renderer owns another.
    #[derive(Debug, Default, Clone)]
    pub struct RecordingGl {
        pub calls: Rc<RefCell<Vec<Call>>>,
        pub fail_compile: Option<ShaderStage>,
        pub fail_link: bool,
        pub no_program: bool,
        pub pending_errors: Rc<RefCell<Vec<GLenum>>>,
        pub(crate) next_name: Rc<Cell<GLuint>>,
        pub(crate) stages: Rc<RefCell<Vec<(GLuint, ShaderStage)>>>,
    }

    impl RecordingGl {
        fn record(&self, call: Call) {
            self.calls.borrow_mut().push(call);
        }

        fn name(&self) -> GLuint {
            let name = self.next_name.get() + 1;
            self.next_name.set(name);
            name
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        pub fn take_calls(&self) -> Vec<Call> {
            self.calls.take()
        }
    }

    impl Gl for RecordingGl {
        fn create_shader(&self, stage: ShaderStage) -> GLuint {
            self.record(Call::CreateShader(stage));
            let name = self.name();
            self.stages.borrow_mut().push((name, stage));
            name
        }

        fn compile_shader(&self, shader: GLuint, source: &CStr) -> bool {
            self.record(Call::CompileShader(
                shader,
                source.to_string_lossy().into_owned(),
            ));
            let stage = self
                .stages
                .borrow()
                .iter()
                .find(|(name, _)| *name == shader)
                .map(|(_, stage)| *stage);
            stage != self.fail_compile
        }

        fn shader_info_log(&self, _shader: GLuint) -> String {
            "0:1(1): error: syntax error".to_string()
        }

        fn delete_shader(&self, shader: GLuint) {
            self.record(Call::DeleteShader(shader));
        }

        fn create_program(&self) -> GLuint {
            self.record(Call::CreateProgram);
            if self.no_program { 0 } else { self.name() }
        }

        fn link_program(&self, program: GLuint, shaders: &[GLuint]) -> bool {
            self.record(Call::LinkProgram(program, shaders.to_vec()));
            !self.fail_link
        }

        fn program_info_log(&self, _program: GLuint) -> String {
            "error: unresolved varying".to_string()
        }

        fn delete_program(&self, program: GLuint) {
            self.record(Call::DeleteProgram(program));
        }

        fn create_vertex_buffer(&self, vertices: &[Vertex]) -> GLuint {
            self.record(Call::CreateVertexBuffer(vertices.len()));
            self.name()
        }

        fn create_vertex_array(&self, buffer: GLuint) -> GLuint {
            self.record(Call::CreateVertexArray(buffer));
            self.name()
        }

        fn delete_buffer(&self, buffer: GLuint) {
            self.record(Call::DeleteBuffer(buffer));
        }

        fn delete_vertex_array(&self, vertex_array: GLuint) {
            self.record(Call::DeleteVertexArray(vertex_array));
        }

        fn viewport(&self, width: i32, height: i32) {
            self.record(Call::Viewport(width, height));
        }

        fn clear(&self, color: [f32; 4]) {
            self.record(Call::Clear(color));
        }

        fn draw_triangles(&self, program: GLuint, vertex_array: GLuint, count: i32) {
            self.record(Call::DrawTriangles(program, vertex_array, count));
        }

        fn get_error(&self) -> GLenum {
            let mut pending = self.pending_errors.borrow_mut();
            if pending.is_empty() {
                gl::NO_ERROR
            } else {
                pending.remove(0)
            }
        }
    }

    #[test]
    fn drain_errors_reports_every_pending_code_in_order() {
        let fake = RecordingGl::default();
        fake.pending_errors
            .borrow_mut()
            .extend([gl::INVALID_ENUM, gl::OUT_OF_MEMORY]);

        let drained = drain_errors(&fake, "renderer.rs", 10);

        assert_eq!(drained, vec![gl::INVALID_ENUM, gl::OUT_OF_MEMORY]);
        assert_eq!(fake.get_error(), gl::NO_ERROR);
    }

    #[test]
    fn drain_errors_stops_on_a_stuck_error_flag() {
        let fake = RecordingGl::default();
        fake.pending_errors
            .borrow_mut()
            .extend(std::iter::repeat_n(gl::INVALID_OPERATION, MAX_DRAINED_ERRORS + 8));

        let drained = drain_errors(&fake, "gpu.rs", 1);

        assert_eq!(drained.len(), MAX_DRAINED_ERRORS);
    }

    #[test]
    fn error_names_cover_the_core_codes() {
        assert_eq!(error_name(gl::INVALID_VALUE), "GL_INVALID_VALUE");
        assert_eq!(error_name(gl::STACK_UNDERFLOW), "GL_STACK_UNDERFLOW");
        assert_eq!(error_name(0x8031), "GL_TABLE_TOO_LARGE");
        assert_eq!(error_name(0x1234), "GL_UNKNOWN_ERROR");
    }
}
