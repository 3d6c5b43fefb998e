//! Backend Device Abstraction
//!
//! The renderer core never talks to a concrete graphics API. Everything it
//! needs from the GPU — program compilation, resource creation, draw and blit
//! submission, pipeline state — goes through the [`RenderDevice`] trait using
//! opaque integer handles.
//!
//! Program compilation reports failure through [`CompileDiagnostics`] (the
//! per-stage log output) rather than a panic; callers log the diagnostics and
//! substitute a fallback program so a bad material cannot take down a frame.

pub mod headless;

pub use headless::HeadlessDevice;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

// ─── Opaque Handles ──────────────────────────────────────────────────────────

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

device_handle!(
    /// Handle to a compiled, linked shader program.
    ProgramHandle
);
device_handle!(
    /// Handle to a GPU buffer (vertex, index or uniform).
    BufferHandle
);
device_handle!(
    /// Handle to a GPU texture.
    TextureHandle
);
device_handle!(
    /// Handle to an offscreen render target.
    FramebufferHandle
);

// ─── Draw & Pipeline State ───────────────────────────────────────────────────

/// Primitive assembly mode for a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Patches,
}

/// Blend factor, matching the fixed-function blend units of every backend
/// this core targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Source/destination blend function pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFunc {
    /// Premultiplied-alpha "normal" blending.
    pub const NORMAL: Self = Self {
        src: BlendFactor::One,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
}

/// Texture storage format, as far as the core needs to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    Rgba16F,
    Depth24,
    R8,
}

// ─── Program Compilation ─────────────────────────────────────────────────────

/// Optional shader stages beyond vertex + fragment.
#[derive(Debug, Clone, Default)]
pub struct OptionalStages {
    pub tess_control: Option<String>,
    pub tess_eval: Option<String>,
    pub geometry: Option<String>,
}

impl OptionalStages {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tess_control.is_none() && self.tess_eval.is_none() && self.geometry.is_none()
    }
}

/// Per-stage compiler/linker output captured on program-creation failure.
#[derive(Debug, Clone, Default)]
pub struct CompileDiagnostics {
    pub vertex: String,
    pub fragment: String,
    pub link: String,
}

// ─── Uniform Values ──────────────────────────────────────────────────────────

/// Value for a named program uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

// ─── The Device Trait ────────────────────────────────────────────────────────

/// Abstract graphics device.
///
/// All methods are called from the single render thread; implementations do
/// not need internal synchronization. Every resource-creating method returns
/// an opaque handle that is only meaningful to the same device.
pub trait RenderDevice {
    /// A short identifier for the backend + driver version, used to tag the
    /// persisted shader cache (a tag mismatch invalidates the whole file).
    fn backend_tag(&self) -> &str;

    /// Compile and link a program. On failure returns the captured per-stage
    /// diagnostics; the device must not keep partially-linked state around.
    fn create_program(
        &mut self,
        label: &str,
        vertex_src: &str,
        fragment_src: &str,
        stages: &OptionalStages,
    ) -> std::result::Result<ProgramHandle, CompileDiagnostics>;

    fn create_buffer(&mut self, label: &str, byte_len: usize) -> BufferHandle;

    fn create_texture(&mut self, label: &str, width: u32, height: u32, format: TextureFormat)
        -> TextureHandle;

    fn create_framebuffer(
        &mut self,
        label: &str,
        color: Option<TextureHandle>,
        depth: Option<TextureHandle>,
    ) -> FramebufferHandle;

    /// Bind `None` to target the presentation back buffer.
    fn bind_framebuffer(&mut self, target: Option<FramebufferHandle>);

    /// Clear the bound target. `color: None` leaves the color buffer alone.
    fn clear(&mut self, color: Option<Vec4>, depth: bool);

    fn set_blend_state(&mut self, enabled: bool, func: BlendFunc);

    fn set_depth_state(&mut self, write_enabled: bool, test_enabled: bool);

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue);

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    fn use_program(&mut self, program: ProgramHandle);

    fn draw(&mut self, mode: DrawMode, count: u32, offset: u32);

    fn blit(&mut self, src: FramebufferHandle, dst: Option<FramebufferHandle>);
}
