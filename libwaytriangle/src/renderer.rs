use std::path::PathBuf;

use gl::types::GLuint;

use crate::{
    error::{Error, Result},
    file::{FileContents, read_entire_file},
    gl_check,
    gpu::{Gl, ShaderStage},
};

const EMBEDDED_VERTEX_SHADER: &str = include_str!("./shaders/basic.vert");
const EMBEDDED_FRAGMENT_SHADER: &str = include_str!("./shaders/basic.frag");

/// Pure blue, fully opaque.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

/// The only mesh ever uploaded.
pub const TRIANGLE: [Vertex; 3] = [
    Vertex {
        position: [-0.5, -0.5],
        color: [1.0, 1.0, 0.0, 1.0],
    },
    Vertex {
        position: [0.5, -0.5],
        color: [0.0, 1.0, 1.0, 1.0],
    },
    Vertex {
        position: [0.0, 0.5],
        color: [1.0, 0.0, 1.0, 1.0],
    },
];

/// Where the GLSL for the two shader stages comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ShaderSource {
    /// Sources compiled into the library.
    #[default]
    Embedded,
    /// A directory holding `basic.vert` and `basic.frag`.
    Directory(PathBuf),
}

impl ShaderSource {
    pub fn load(&self, stage: ShaderStage) -> Result<FileContents> {
        match self {
            ShaderSource::Embedded => Ok(FileContents::from_text(match stage {
                ShaderStage::Vertex => EMBEDDED_VERTEX_SHADER,
                ShaderStage::Fragment => EMBEDDED_FRAGMENT_SHADER,
            })),
            ShaderSource::Directory(dir) => read_entire_file(dir.join(match stage {
                ShaderStage::Vertex => "basic.vert",
                ShaderStage::Fragment => "basic.frag",
            })),
        }
    }
}

/// Owns the GPU objects needed to draw the triangle.
#[derive(Debug)]
pub struct Renderer<G: Gl> {
    gl: G,
    vertex_buffer: GLuint,
    vertex_array: GLuint,
    program: GLuint,
}

fn compile<G: Gl>(gl: &G, stage: ShaderStage, code: &FileContents) -> Result<GLuint> {
    let shader = gl.create_shader(stage);
    if shader == 0 {
        tracing::error!("glCreateShader failed for the {stage} stage");
        return Err(Error::ShaderCompile {
            stage,
            log: String::new(),
        });
    }

    if !gl.compile_shader(shader, code.as_c_str()) {
        let log = gl.shader_info_log(shader);
        tracing::error!("{stage} shader: {log}");
        gl.delete_shader(shader);
        return Err(Error::ShaderCompile { stage, log });
    }
    gl_check!(gl);

    tracing::debug!("{stage} shader compiled");
    Ok(shader)
}

impl<G: Gl> Renderer<G> {
    /// Compiles and links the shader program and uploads [`TRIANGLE`].
    ///
    /// Both sources are loaded before any GL object exists, and linking is
    /// only attempted once both stages compiled.
    #[tracing::instrument(skip(gl), level = "debug")]
    pub fn new(gl: G, source: &ShaderSource) -> Result<Self> {
        let vertex_code = source.load(ShaderStage::Vertex)?;
        let fragment_code = source.load(ShaderStage::Fragment)?;

        let vertex_shader = compile(&gl, ShaderStage::Vertex, &vertex_code)?;
        let fragment_shader = match compile(&gl, ShaderStage::Fragment, &fragment_code) {
            Ok(shader) => shader,
            Err(e) => {
                gl.delete_shader(vertex_shader);
                return Err(e);
            }
        };
        let shaders = [vertex_shader, fragment_shader];

        let program = gl.create_program();
        if program == 0 {
            tracing::error!("glCreateProgram failed");
            shaders.iter().for_each(|&shader| gl.delete_shader(shader));
            return Err(Error::CreateProgram);
        }

        let linked = gl.link_program(program, &shaders);
        shaders.iter().for_each(|&shader| gl.delete_shader(shader));
        if !linked {
            let log = gl.program_info_log(program);
            tracing::error!("program link: {log}");
            gl.delete_program(program);
            return Err(Error::LinkProgram(log));
        }
        gl_check!(&gl);
        tracing::info!("Successfully linked the program!");

        let vertex_buffer = gl.create_vertex_buffer(&TRIANGLE);
        let vertex_array = gl.create_vertex_array(vertex_buffer);
        gl_check!(&gl);

        Ok(Self {
            gl,
            vertex_buffer,
            vertex_array,
            program,
        })
    }

    pub fn resize(&self, width: i32, height: i32) {
        tracing::trace!("viewport {width}x{height}");
        self.gl.viewport(width, height);
        gl_check!(&self.gl);
    }

    pub fn render(&self) {
        self.gl.clear(CLEAR_COLOR);
        self.gl.draw_triangles(self.program, self.vertex_array, TRIANGLE.len() as i32);
        gl_check!(&self.gl);
    }

    /// Releases the GPU objects. The context must still be current.
    pub fn destroy(self) {
        self.gl.delete_program(self.program);
        self.gl.delete_vertex_array(self.vertex_array);
        self.gl.delete_buffer(self.vertex_buffer);
        gl_check!(&self.gl);
        tracing::debug!("renderer objects released");
    }
}
