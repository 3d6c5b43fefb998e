//! Headless Recording Device
//!
//! A [`RenderDevice`] implementation that performs no GPU work. Every call is
//! recorded so tests can assert on compile counts, draw ordering and pipeline
//! state transitions — in particular the cache invariant that a unique
//! (key, feature set) pair triggers at most one program compile.

use rustc_hash::FxHashMap;

use super::{
    BlendFunc, BufferHandle, CompileDiagnostics, DrawMode, FramebufferHandle, OptionalStages,
    ProgramHandle, RenderDevice, TextureFormat, TextureHandle, UniformValue,
};

/// One recorded draw submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub program: Option<ProgramHandle>,
    pub mode: DrawMode,
    pub count: u32,
    pub offset: u32,
    pub blend_enabled: bool,
    pub depth_write: bool,
    pub target: Option<FramebufferHandle>,
}

/// No-op device that records every call for inspection.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_handle: u32,

    /// Total `create_program` invocations that reached the "compiler".
    pub compile_calls: u32,
    /// Per-label compile counts, for asserting one compile per unique key.
    pub compiles_by_label: FxHashMap<String, u32>,
    /// Draws in submission order.
    pub draws: Vec<RecordedDraw>,
    /// Uniform writes in submission order, as `(program, name)`.
    pub uniform_writes: Vec<(ProgramHandle, String)>,
    /// Programs compiled with at least one optional stage present.
    pub compiles_with_stages: u32,

    /// When set, any program whose vertex or fragment source contains this
    /// substring fails to compile. Used to exercise the fallback path.
    pub fail_source_containing: Option<String>,

    current_program: Option<ProgramHandle>,
    current_target: Option<FramebufferHandle>,
    blend_enabled: bool,
    depth_write: bool,
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Compile count for an exact program label.
    #[must_use]
    pub fn compiles_for(&self, label: &str) -> u32 {
        self.compiles_by_label.get(label).copied().unwrap_or(0)
    }
}

impl RenderDevice for HeadlessDevice {
    fn backend_tag(&self) -> &str {
        "headless-1"
    }

    fn create_program(
        &mut self,
        label: &str,
        vertex_src: &str,
        fragment_src: &str,
        stages: &OptionalStages,
    ) -> std::result::Result<ProgramHandle, CompileDiagnostics> {
        self.compile_calls += 1;
        *self.compiles_by_label.entry(label.to_string()).or_insert(0) += 1;
        if !stages.is_empty() {
            self.compiles_with_stages += 1;
        }

        if let Some(needle) = &self.fail_source_containing {
            if vertex_src.contains(needle.as_str()) || fragment_src.contains(needle.as_str()) {
                return Err(CompileDiagnostics {
                    vertex: format!("0:1: error: forbidden token '{needle}'"),
                    fragment: String::new(),
                    link: "link skipped after stage failure".to_string(),
                });
            }
        }

        Ok(ProgramHandle(self.next()))
    }

    fn create_buffer(&mut self, _label: &str, _byte_len: usize) -> BufferHandle {
        BufferHandle(self.next())
    }

    fn create_texture(
        &mut self,
        _label: &str,
        _width: u32,
        _height: u32,
        _format: TextureFormat,
    ) -> TextureHandle {
        TextureHandle(self.next())
    }

    fn create_framebuffer(
        &mut self,
        _label: &str,
        _color: Option<TextureHandle>,
        _depth: Option<TextureHandle>,
    ) -> FramebufferHandle {
        FramebufferHandle(self.next())
    }

    fn bind_framebuffer(&mut self, target: Option<FramebufferHandle>) {
        self.current_target = target;
    }

    fn clear(&mut self, _color: Option<glam::Vec4>, _depth: bool) {}

    fn set_blend_state(&mut self, enabled: bool, _func: BlendFunc) {
        self.blend_enabled = enabled;
    }

    fn set_depth_state(&mut self, write_enabled: bool, _test_enabled: bool) {
        self.depth_write = write_enabled;
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, _value: UniformValue) {
        self.uniform_writes.push((program, name.to_string()));
    }

    fn bind_texture(&mut self, _unit: u32, _texture: TextureHandle) {}

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
    }

    fn draw(&mut self, mode: DrawMode, count: u32, offset: u32) {
        self.draws.push(RecordedDraw {
            program: self.current_program,
            mode,
            count,
            offset,
            blend_enabled: self.blend_enabled,
            depth_write: self.depth_write,
            target: self.current_target,
        });
    }

    fn blit(&mut self, _src: FramebufferHandle, _dst: Option<FramebufferHandle>) {}
}
