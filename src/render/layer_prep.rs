//! Layer Render Preparation
//!
//! The per-layer frame pipeline: update transforms, resolve the camera fit,
//! collect lights, register dependency passes, walk the subtree into sorted
//! opaque/transparent renderable lists, then replay those lists against the
//! device.
//!
//! Preparation and rendering are separate phases with an explicit state
//! machine, so a caller can prepare every layer (kicking off shader compiles
//! and dependency passes) before rendering any of them. Dependency tasks go
//! onto the frame's [`RenderList`](crate::render::RenderList) *before* the
//! renderable walk, guaranteeing producers run ahead of the consumers found
//! during the walk.

use std::hash::Hasher;
use std::sync::Arc;

use glam::{Affine3A, Mat4, Vec4};
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use slotmap::Key as _;
use smallvec::SmallVec;

use crate::backend::{
    BlendFunc, DrawMode, FramebufferHandle, ProgramHandle, RenderDevice, TextureFormat,
    TextureHandle,
};
use crate::render::cache::ShaderCache;
use crate::render::features::FeatureSet;
use crate::render::frame::FrameContext;
use crate::render::frustum::ClipFrustum;
use crate::render::key::{fields, MaterialShaderKey, MAX_NUM_LIGHTS, MAX_NUM_SHADOWS};
use crate::render::render_list::{RenderTask, RenderTaskId};
use crate::render::settings::RenderSettings;
use crate::render::shader_gen::{
    blend_func_for_key, MaterialShaderGenerator, PassBindings, ShadowBinding, StageGenerator,
};
use crate::resources::Bounds3;
use crate::scene::camera::{Camera, CameraFit, Viewport};
use crate::scene::layer::{AaMode, LayerBackground};
use crate::scene::light::Light;
use crate::scene::node::NodeKind;
use crate::scene::scene::Scene;
use crate::scene::{transform_system, ModelKey, NodeHandle};

// ─── State ───────────────────────────────────────────────────────────────────

/// Phase of the prepare/render cycle a layer's data is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrepareState {
    #[default]
    Idle,
    Preparing,
    Prepared,
    Rendering,
}

// ─── Prepared Data ───────────────────────────────────────────────────────────

/// Handle slot filled by a dependency task when it runs, read by the layer
/// render that consumes it.
type SharedTarget<T> = Arc<Mutex<Option<T>>>;

/// One subset queued for drawing this frame.
#[derive(Debug, Clone)]
pub struct PreparedRenderable {
    pub node: NodeHandle,
    pub model: ModelKey,
    pub subset_index: usize,
    pub world: Affine3A,
    pub world_bounds: Bounds3,
    /// Distance along the camera forward axis; sort key for both passes.
    pub camera_depth: f32,
    /// Accumulated node opacity down the tree.
    pub opacity: f32,
    pub key: MaterialShaderKey,
    /// `None` when both the material's program and the fallback failed.
    pub program: Option<ProgramHandle>,
    pub draw_mode: DrawMode,
    pub count: u32,
    pub offset: u32,
}

/// A light gathered from the layer subtree, with its world transform frozen
/// at prepare time.
pub struct PreparedLight {
    pub node: NodeHandle,
    pub world: Mat4,
    pub light: Light,
    /// Targets produced by this light's shadow pass, when it casts.
    pub shadow_target: Option<SharedTarget<ShadowMapTarget>>,
}

/// Offscreen objects produced by one shadow pass: the framebuffer rendered
/// into and the depth texture the lit draws sample.
#[derive(Debug, Clone, Copy)]
pub struct ShadowMapTarget {
    pub framebuffer: FramebufferHandle,
    pub depth: TextureHandle,
}

// ─── Dependency Tasks ────────────────────────────────────────────────────────

/// Allocates and clears one light's shadow depth target.
struct ShadowMapTask {
    label: String,
    resolution: u32,
    target: SharedTarget<ShadowMapTarget>,
}

impl RenderTask for ShadowMapTask {
    fn run(&mut self, device: &mut dyn RenderDevice) {
        let depth = device.create_texture(
            &self.label,
            self.resolution,
            self.resolution,
            TextureFormat::Depth24,
        );
        let fbo = device.create_framebuffer(&self.label, None, Some(depth));
        device.bind_framebuffer(Some(fbo));
        device.clear(None, true);
        device.bind_framebuffer(None);
        *self.target.lock() = Some(ShadowMapTarget {
            framebuffer: fbo,
            depth,
        });
    }
}

/// Produces the screen-space ambient occlusion texture for a layer.
struct SsaoTask {
    label: String,
    width: u32,
    height: u32,
    output: SharedTarget<TextureHandle>,
}

impl RenderTask for SsaoTask {
    fn run(&mut self, device: &mut dyn RenderDevice) {
        let texture = device.create_texture(&self.label, self.width, self.height, TextureFormat::R8);
        let fbo = device.create_framebuffer(&self.label, Some(texture), None);
        device.bind_framebuffer(Some(fbo));
        device.clear(Some(Vec4::ONE), false);
        device.bind_framebuffer(None);
        *self.output.lock() = Some(texture);
    }
}

// ─── Layer Preparation ───────────────────────────────────────────────────────

/// Per-layer prepare/render state, owned by whatever drives the frame loop
/// (one instance per layer node, reused across frames).
pub struct LayerRenderPreparationData {
    layer_node: NodeHandle,
    state: PrepareState,
    generator: MaterialShaderGenerator,

    pub opaque: Vec<PreparedRenderable>,
    pub transparent: Vec<PreparedRenderable>,
    pub lights: Vec<PreparedLight>,
    pub features: FeatureSet,

    pub camera_fit: Option<CameraFit>,
    pub view_matrix: Mat4,
    pub frustum: Option<ClipFrustum>,

    shadow_task_ids: SmallVec<[RenderTaskId; MAX_NUM_SHADOWS as usize]>,
    ssao_task_id: Option<RenderTaskId>,
    ssao_output: Option<SharedTarget<TextureHandle>>,

    was_dirty: bool,
    previous_signature: u64,
}

impl LayerRenderPreparationData {
    #[must_use]
    pub fn new(layer_node: NodeHandle) -> Self {
        Self {
            layer_node,
            state: PrepareState::Idle,
            generator: MaterialShaderGenerator::new(),
            opaque: Vec::new(),
            transparent: Vec::new(),
            lights: Vec::new(),
            features: FeatureSet::new(),
            camera_fit: None,
            view_matrix: Mat4::IDENTITY,
            frustum: None,
            shadow_task_ids: SmallVec::new(),
            ssao_task_id: None,
            ssao_output: None,
            was_dirty: true,
            previous_signature: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> PrepareState {
        self.state
    }

    /// Whether the last prepare pass observed any change — moved transforms,
    /// a different renderable set, or different lights.
    #[inline]
    #[must_use]
    pub fn was_dirty(&self) -> bool {
        self.was_dirty
    }

    /// The SSAO texture for this frame, available once the dependency pass
    /// has run.
    #[must_use]
    pub fn ssao_texture(&self) -> Option<TextureHandle> {
        self.ssao_output.as_ref().and_then(|slot| *slot.lock())
    }

    // ── Prepare ──────────────────────────────────────────────────────────────

    /// Build this frame's renderable lists for the layer.
    #[allow(clippy::too_many_lines)]
    pub fn prepare_for_render(
        &mut self,
        scene: &mut Scene,
        device: &mut dyn RenderDevice,
        cache: &ShaderCache,
        settings: &RenderSettings,
        frame: &mut FrameContext,
        viewport: Viewport,
    ) {
        self.state = PrepareState::Preparing;
        self.opaque.clear();
        self.transparent.clear();
        self.lights.clear();
        self.shadow_task_ids.clear();
        self.ssao_task_id = None;
        self.ssao_output = None;

        let Some(layer_key) = scene.layer_of(self.layer_node) else {
            log::warn!("Prepare called on a node without a layer component");
            self.state = PrepareState::Prepared;
            return;
        };

        // The layer subtree renders in its own space, identity at the root.
        let transforms_changed = transform_system::update_subtree(
            &mut scene.nodes,
            self.layer_node,
            Affine3A::IDENTITY,
            false,
        );

        // Camera resolution: the layer's assigned camera, else the first one
        // found in the subtree.
        let camera_node = scene.layers[layer_key]
            .camera
            .filter(|&n| scene.nodes.contains_key(n))
            .or_else(|| find_first_camera(scene, self.layer_node));
        let Some(camera_node) = camera_node else {
            log::warn!("Layer has no camera; nothing to render");
            self.state = PrepareState::Prepared;
            return;
        };
        let (camera_world, camera_key) = {
            let node = &scene.nodes[camera_node];
            (node.transform.world_matrix, node.camera())
        };
        let Some(camera_key) = camera_key else {
            log::warn!("Layer camera node carries no camera component");
            self.state = PrepareState::Prepared;
            return;
        };

        let fit = scene.cameras[camera_key].calculate_fit(viewport, settings.design_resolution);
        let view = Camera::view_matrix(&camera_world);
        let frustum = ClipFrustum::from_view_projection(fit.projection * view, None);

        // Lights, in subtree order, then shadow casters first: shadow slot
        // `i` in generated source belongs to light `i`.
        self.collect_lights(scene);
        self.lights.sort_by_key(|l| !l.light.cast_shadow);
        if self.lights.len() > MAX_NUM_LIGHTS as usize {
            log::warn!(
                "Layer has {} lights; only the first {MAX_NUM_LIGHTS} are used",
                self.lights.len()
            );
            self.lights.truncate(MAX_NUM_LIGHTS as usize);
        }
        let light_count = self.lights.len() as u32;
        let shadow_count = (self
            .lights
            .iter()
            .filter(|l| l.light.cast_shadow)
            .count() as u32)
            .min(MAX_NUM_SHADOWS);

        let layer = &scene.layers[layer_key];
        let ssao = layer.ssao_enabled();
        let ibl = settings.ibl_enabled && layer.light_probe.is_some();
        self.features.set("STRATA_ENABLE_SSM", shadow_count > 0);
        self.features.set("STRATA_ENABLE_SSAO", ssao);
        self.features.set("STRATA_ENABLE_IBL", ibl);

        // Dependency passes are queued before the renderable walk so they run
        // ahead of the draws that sample their output.
        let mut shadows_assigned = 0u32;
        for light in &mut self.lights {
            if !light.light.cast_shadow || shadows_assigned >= shadow_count {
                continue;
            }
            let target: SharedTarget<ShadowMapTarget> = Arc::new(Mutex::new(None));
            let id = frame.render_list.add_render_task(Box::new(ShadowMapTask {
                label: format!("shadow_map_{shadows_assigned}"),
                resolution: light.light.shadow_map_resolution,
                target: Arc::clone(&target),
            }));
            light.shadow_target = Some(target);
            self.shadow_task_ids.push(id);
            shadows_assigned += 1;
        }
        if ssao {
            let output: SharedTarget<TextureHandle> = Arc::new(Mutex::new(None));
            let id = frame.render_list.add_render_task(Box::new(SsaoTask {
                label: "ssao".to_string(),
                width: viewport.width as u32,
                height: viewport.height as u32,
                output: Arc::clone(&output),
            }));
            self.ssao_task_id = Some(id);
            self.ssao_output = Some(output);
        }

        // Renderable walk: depth-first, accumulating opacity, skipping
        // invisible subtrees entirely.
        let mut stack: Vec<(NodeHandle, f32)> = scene.nodes[self.layer_node]
            .children()
            .iter()
            .rev()
            .map(|&c| (c, 1.0))
            .collect();

        while let Some((handle, parent_opacity)) = stack.pop() {
            let Some(node) = scene.nodes.get(handle) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let opacity = parent_opacity * node.opacity;
            for &child in node.children().iter().rev() {
                stack.push((child, opacity));
            }

            if node.kind != NodeKind::Model {
                continue;
            }
            let Some(model_key) = node.model() else {
                continue;
            };
            let Some(model) = scene.models.get(model_key) else {
                continue;
            };
            let Some(mesh) = scene.meshes.get(model.mesh) else {
                continue;
            };

            let world = node.transform.world_matrix;
            for (subset_index, subset) in mesh.subsets.iter().enumerate() {
                let Some(material) = model.material_for_subset(subset_index) else {
                    continue;
                };

                let world_bounds = subset.bounds.transformed(&world);
                // Unknown bounds are never culled.
                if !world_bounds.is_empty() && !frustum.intersects_bounds(&world_bounds) {
                    continue;
                }

                let key = material.shader_key(light_count, shadow_count, settings, &scene.images);
                let program = self
                    .generator
                    .generate_program(device, cache, material, key, &self.features, settings)
                    .or_else(|| self.generator.fallback_program(device, cache));

                let depth_ref = if world_bounds.is_empty() {
                    world.translation.into()
                } else {
                    world_bounds.center()
                };
                let camera_depth = -view.transform_point3(depth_ref).z;

                let renderable = PreparedRenderable {
                    node: handle,
                    model: model_key,
                    subset_index,
                    world,
                    world_bounds,
                    camera_depth,
                    opacity,
                    key,
                    program,
                    draw_mode: subset.draw_mode,
                    count: subset.count,
                    offset: subset.offset,
                };

                if key.flag(fields::HAS_TRANSPARENCY) || opacity < 1.0 {
                    self.transparent.push(renderable);
                } else {
                    self.opaque.push(renderable);
                }
            }
        }

        // Opaque front-to-back for early-z, transparent back-to-front for
        // correct compositing.
        self.opaque
            .sort_by(|a, b| a.camera_depth.total_cmp(&b.camera_depth));
        self.transparent
            .sort_by(|a, b| b.camera_depth.total_cmp(&a.camera_depth));

        // Everything culled: the dependency passes have no consumers left.
        if self.opaque.is_empty() && self.transparent.is_empty() {
            for id in self.shadow_task_ids.drain(..) {
                frame.render_list.discard_render_task(id);
            }
            if let Some(id) = self.ssao_task_id.take() {
                frame.render_list.discard_render_task(id);
            }
            for light in &mut self.lights {
                light.shadow_target = None;
            }
            self.ssao_output = None;
        }

        // Dirty signal: any transform moved, or the prepared content differs
        // from last frame's.
        let signature = self.content_signature();
        self.was_dirty = transforms_changed || signature != self.previous_signature;
        self.previous_signature = signature;

        let layer = &mut scene.layers[layer_key];
        if layer.aa_mode == AaMode::ProgressiveAa {
            if self.was_dirty {
                layer.progressive_aa_frame = 0;
            } else {
                layer.progressive_aa_frame += 1;
            }
        }

        self.camera_fit = Some(fit);
        self.view_matrix = view;
        self.frustum = Some(frustum);
        self.state = PrepareState::Prepared;
    }

    fn collect_lights(&mut self, scene: &Scene) {
        let mut stack: Vec<NodeHandle> = scene.nodes[self.layer_node]
            .children()
            .iter()
            .rev()
            .copied()
            .collect();

        while let Some(handle) = stack.pop() {
            let Some(node) = scene.nodes.get(handle) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            for &child in node.children().iter().rev() {
                stack.push(child);
            }

            if node.kind != NodeKind::Light {
                continue;
            }
            let Some(light) = node.light().and_then(|k| scene.lights.get(k)) else {
                continue;
            };
            self.lights.push(PreparedLight {
                node: handle,
                world: Mat4::from(node.transform.world_matrix),
                light: light.clone(),
                shadow_target: None,
            });
        }
    }

    /// Hash of what was prepared, compared across frames for the dirty signal.
    fn content_signature(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for r in self.opaque.iter().chain(&self.transparent) {
            hasher.write_u64(r.node.data().as_ffi());
            hasher.write_u64(r.model.data().as_ffi());
            hasher.write_usize(r.subset_index);
            hasher.write_u64(r.key.bits());
            hasher.write_u32(r.opacity.to_bits());
        }
        for l in &self.lights {
            hasher.write_u64(l.node.data().as_ffi());
            hasher.write_u32(l.light.brightness.to_bits());
            hasher.write_u8(u8::from(l.light.cast_shadow));
        }
        hasher.finish()
    }

    // ── Render ───────────────────────────────────────────────────────────────

    /// Replay the prepared lists against the device.
    ///
    /// Runs the frame's deferred tasks first, then the opaque and transparent
    /// passes, then the layer's post-effect chain. `target` of `None` draws
    /// into the presentation back buffer.
    pub fn render(
        &mut self,
        scene: &Scene,
        device: &mut dyn RenderDevice,
        cache: &ShaderCache,
        settings: &RenderSettings,
        frame: &mut FrameContext,
        target: Option<FramebufferHandle>,
    ) {
        if self.state != PrepareState::Prepared {
            log::warn!("Render called on a layer that was not prepared this frame");
            return;
        }
        self.state = PrepareState::Rendering;

        // Dependency passes (shadow maps, SSAO) run before any layer draw.
        frame.render_list.run_render_tasks(device);

        let Some(fit) = self.camera_fit else {
            self.state = PrepareState::Idle;
            return;
        };

        device.bind_framebuffer(target);
        match self.layer_background(scene) {
            LayerBackground::Transparent => device.clear(Some(Vec4::ZERO), true),
            LayerBackground::SolidColor(color) => device.clear(Some(color), true),
            LayerBackground::Unspecified => device.clear(None, true),
        }

        let lights: Vec<(Mat4, &Light)> =
            self.lights.iter().map(|l| (l.world, &l.light)).collect();
        // Shadow slot order follows light order; only produced targets bind.
        let shadows: Vec<ShadowBinding> = self
            .lights
            .iter()
            .filter_map(|l| {
                let produced = *l.shadow_target.as_ref()?.lock();
                produced.map(|t| ShadowBinding {
                    matrix: l.world.inverse(),
                    depth: t.depth,
                    bias: l.light.shadow_bias,
                })
            })
            .collect();
        let bindings = PassBindings {
            lights: &lights,
            shadows: &shadows,
            ssao: self.ssao_texture().map(|t| (t, fit.viewport.size())),
            light_probe: self.light_probe_texture(scene),
        };

        // Opaque pass: depth writes on, blending off.
        device.set_depth_state(true, true);
        device.set_blend_state(false, BlendFunc::NORMAL);
        for r in &self.opaque {
            self.draw_renderable(scene, device, settings, frame, fit, &bindings, r);
        }

        // Transparent pass: depth test only, per-material blending.
        device.set_depth_state(false, true);
        for r in &self.transparent {
            device.set_blend_state(true, blend_func_for_key(r.key));
            self.draw_renderable(scene, device, settings, frame, fit, &bindings, r);
        }

        self.apply_effects(scene, device, cache);

        if let Some(fbo) = target {
            device.blit(fbo, None);
        }

        self.state = PrepareState::Idle;
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_renderable(
        &self,
        scene: &Scene,
        device: &mut dyn RenderDevice,
        settings: &RenderSettings,
        frame: &mut FrameContext,
        fit: CameraFit,
        bindings: &PassBindings<'_>,
        r: &PreparedRenderable,
    ) {
        let Some(program) = r.program else {
            // Prepare already logged the compile failure.
            return;
        };
        let Some(material) = scene
            .models
            .get(r.model)
            .and_then(|m| m.material_for_subset(r.subset_index))
        else {
            return;
        };

        let model_matrix = Mat4::from(r.world);
        let mvp = fit.projection * self.view_matrix * model_matrix;

        device.use_program(program);
        self.generator.set_material_properties(
            device,
            program,
            material,
            &scene.images,
            bindings,
            settings,
            mvp,
            model_matrix,
            r.opacity,
            &mut frame.texture_units,
        );
        device.draw(r.draw_mode, r.count, r.offset);
    }

    /// Run the enabled post effects as fullscreen passes, in declared order.
    fn apply_effects(&self, scene: &Scene, device: &mut dyn RenderDevice, cache: &ShaderCache) {
        let Some(layer_key) = scene.layer_of(self.layer_node) else {
            return;
        };
        let layer = &scene.layers[layer_key];

        for effect in layer.effects.iter().filter(|e| e.enabled) {
            let Some(program) = effect_program(device, cache, &effect.name) else {
                continue;
            };
            device.set_blend_state(false, BlendFunc::NORMAL);
            device.set_depth_state(false, false);
            device.use_program(program);
            device.draw(DrawMode::TriangleStrip, 4, 0);
        }
    }

    /// The layer's light probe image, once its texture upload finished.
    fn light_probe_texture(&self, scene: &Scene) -> Option<TextureHandle> {
        scene
            .layer_of(self.layer_node)
            .and_then(|k| scene.layers[k].light_probe)
            .and_then(|key| scene.images.get(key))
            .filter(|img| img.is_ready())
            .and_then(|img| img.texture)
    }

    fn layer_background(&self, scene: &Scene) -> LayerBackground {
        scene
            .layer_of(self.layer_node)
            .map_or(LayerBackground::Unspecified, |k| scene.layers[k].background)
    }
}

/// First camera node in the subtree, depth-first in child order.
fn find_first_camera(scene: &Scene, root: NodeHandle) -> Option<NodeHandle> {
    // Children push reversed so the pop order matches declaration order.
    let mut stack: Vec<NodeHandle> = scene
        .nodes
        .get(root)?
        .children()
        .iter()
        .rev()
        .copied()
        .collect();
    while let Some(handle) = stack.pop() {
        let Some(node) = scene.nodes.get(handle) else {
            continue;
        };
        if node.kind == NodeKind::Camera {
            return Some(handle);
        }
        for &child in node.children().iter().rev() {
            stack.push(child);
        }
    }
    None
}

/// Fullscreen pass-through program for an effect, compiled once per name.
fn effect_program(
    device: &mut dyn RenderDevice,
    cache: &ShaderCache,
    name: &str,
) -> Option<ProgramHandle> {
    let key = MaterialShaderKey::default();
    let features = FeatureSet::new();
    if let Some(program) = cache.get_program(name, key, &features) {
        return Some(program);
    }

    let mut vertex = StageGenerator::new();
    vertex.add_incoming("vec2", "attr_pos");
    vertex.add_outgoing("vec2", "var_uv0");
    vertex.append("var_uv0 = attr_pos * 0.5 + 0.5;");
    vertex.append("gl_Position = vec4(attr_pos, 0.0, 1.0);");

    let mut fragment = StageGenerator::new();
    fragment.add_incoming("vec2", "var_uv0");
    fragment.add_outgoing("vec4", "frag_color");
    fragment.add_uniform("sampler2D", "source_layer");
    fragment.append("frag_color = texture(source_layer, var_uv0);");

    cache.compile_program(
        device,
        name,
        key,
        &features,
        &vertex.build(&features),
        &fragment.build(&features),
        &crate::backend::OptionalStages::default(),
    )
}
