//! End-to-end layer preparation tests against the headless device.

use glam::Vec3;
use strata::backend::HeadlessDevice;
use strata::render::key::fields;
use strata::render::layer_prep::{LayerRenderPreparationData, PrepareState};
use strata::render::{FrameContext, RenderSettings, ShaderCache};
use strata::resources::{DefaultMaterial, Material, Mesh};
use strata::scene::camera::Viewport;
use strata::scene::{AaMode, Camera, Layer, Light, Model, NodeHandle, Scene};

/// A layer with a camera at z=5 looking down -Z, one directional light, an
/// opaque unit cube at the origin and a half-transparent unit rect.
struct Fixture {
    scene: Scene,
    layer: NodeHandle,
    cube: NodeHandle,
    rect: NodeHandle,
}

fn build_fixture() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut scene = Scene::new();
    let layer = scene.add_layer(Layer::new());

    let camera = scene.add_camera(layer, Camera::default());
    scene.nodes[camera].transform.position = Vec3::new(0.0, 0.0, 5.0);

    scene.add_light(layer, Light::directional());

    let cube_mesh = scene.add_mesh(Mesh::unit_cube());
    let cube = scene.add_model(layer, Model::new(cube_mesh, Material::default()));

    let rect_mesh = scene.add_mesh(Mesh::unit_rect());
    let mut glass = DefaultMaterial::new();
    glass.opacity = 0.5;
    let rect = scene.add_model(layer, Model::new(rect_mesh, Material::Default(glass)));
    scene.nodes[rect].transform.position = Vec3::new(0.0, 0.0, 1.0);

    Fixture {
        scene,
        layer,
        cube,
        rect,
    }
}

fn viewport() -> Viewport {
    Viewport::from_size(1024.0, 768.0)
}

// ==== Bucketing and keying ==================================================

#[test]
fn renderables_bucket_by_transparency() {
    let mut fx = build_fixture();
    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());

    assert_eq!(prep.state(), PrepareState::Prepared);
    assert_eq!(prep.opaque.len(), 1);
    assert_eq!(prep.opaque[0].node, fx.cube);
    assert_eq!(prep.transparent.len(), 1);
    assert_eq!(prep.transparent[0].node, fx.rect);

    // Both resolved to compiled programs.
    assert!(prep.opaque[0].program.is_some());
    assert!(prep.transparent[0].program.is_some());

    // One light in the layer, folded into both keys.
    assert_eq!(prep.opaque[0].key.get(fields::LIGHT_COUNT), 1);
    assert_eq!(prep.transparent[0].key.get(fields::LIGHT_COUNT), 1);
    assert!(prep.transparent[0].key.flag(fields::HAS_TRANSPARENCY));
    assert!(!prep.opaque[0].key.flag(fields::HAS_TRANSPARENCY));
}

#[test]
fn second_prepare_reuses_compiled_programs() {
    let mut fx = build_fixture();
    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());
    assert!(prep.was_dirty(), "first prepare always reports dirty");
    let compiles = device.compile_calls;

    frame.begin_frame();
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());

    assert_eq!(device.compile_calls, compiles, "unchanged scene recompiles nothing");
    assert!(!prep.was_dirty(), "unchanged scene reports clean");
}

// ==== Culling and ordering ==================================================

#[test]
fn object_behind_camera_is_culled() {
    let mut fx = build_fixture();
    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    fx.scene.nodes[fx.cube].transform.position = Vec3::new(0.0, 0.0, 100.0);

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());

    assert!(prep.opaque.is_empty());
}

#[test]
fn first_camera_in_child_order_drives_the_layer() {
    let mut fx = build_fixture();
    // A later sibling camera facing away from everything; picking it would
    // cull the whole layer.
    let behind = fx.scene.add_camera(fx.layer, Camera::default());
    fx.scene.nodes[behind].transform.position = Vec3::new(0.0, 0.0, -100.0);

    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());

    assert_eq!(prep.opaque.len(), 1, "the first camera still sees the cube");
    assert_eq!(prep.transparent.len(), 1);
}

#[test]
fn invisible_subtree_is_skipped() {
    let mut fx = build_fixture();
    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    fx.scene.nodes[fx.cube].visible = false;

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());

    assert!(prep.opaque.is_empty());
    assert_eq!(prep.transparent.len(), 1);
}

#[test]
fn opaque_sorts_front_to_back_transparent_back_to_front() {
    let mut scene = Scene::new();
    let layer = scene.add_layer(Layer::new());
    let camera = scene.add_camera(layer, Camera::default());
    scene.nodes[camera].transform.position = Vec3::new(0.0, 0.0, 5.0);

    let mesh = scene.add_mesh(Mesh::unit_cube());
    let near = scene.add_model(layer, Model::new(mesh, Material::default()));
    let far = scene.add_model(layer, Model::new(mesh, Material::default()));
    scene.nodes[far].transform.position = Vec3::new(0.0, 0.0, -10.0);

    let mut glass = DefaultMaterial::new();
    glass.opacity = 0.5;
    let t_near = scene.add_model(layer, Model::new(mesh, Material::Default(glass.clone())));
    let t_far = scene.add_model(layer, Model::new(mesh, Material::Default(glass)));
    scene.nodes[t_far].transform.position = Vec3::new(0.0, 0.0, -20.0);

    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    let mut prep = LayerRenderPreparationData::new(layer);
    prep.prepare_for_render(&mut scene, &mut device, &cache, &settings, &mut frame, viewport());

    assert_eq!(prep.opaque.len(), 2);
    assert_eq!(prep.opaque[0].node, near, "opaque draws nearest first");
    assert_eq!(prep.opaque[1].node, far);

    assert_eq!(prep.transparent.len(), 2);
    assert_eq!(prep.transparent[0].node, t_far, "transparent draws farthest first");
    assert_eq!(prep.transparent[1].node, t_near);
}

// ==== Dependency tasks ======================================================

#[test]
fn shadow_casting_light_queues_a_task_before_render() {
    let mut fx = build_fixture();
    fx.scene.add_light(fx.layer, Light::directional().with_shadow());

    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());

    assert_eq!(frame.render_list.len(), 1);

    prep.render(&fx.scene, &mut device, &cache, &settings, &mut frame, None);
    assert!(frame.render_list.is_empty(), "render drains the task list");
}

#[test]
fn shadow_targets_bind_to_lit_draws() {
    let mut fx = build_fixture();
    fx.scene.add_light(fx.layer, Light::directional().with_shadow());

    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());
    assert_eq!(prep.opaque[0].key.get(fields::SHADOW_COUNT), 1);

    prep.render(&fx.scene, &mut device, &cache, &settings, &mut frame, None);

    // The depth target the shadow pass produced feeds the lit draws.
    for name in ["shadow_map_0", "shadow_matrix_0", "shadow_bias_0"] {
        assert!(
            device.uniform_writes.iter().any(|(_, n)| n == name),
            "expected a {name} write"
        );
    }
}

#[test]
fn ssao_layer_produces_its_texture_during_render() {
    let mut fx = build_fixture();
    let layer_key = fx.scene.layer_of(fx.layer).unwrap();
    fx.scene.layers[layer_key].ao.strength = 50.0;

    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());
    assert_eq!(frame.render_list.len(), 1);
    assert!(prep.ssao_texture().is_none(), "not produced until the task runs");

    prep.render(&fx.scene, &mut device, &cache, &settings, &mut frame, None);
    assert!(prep.ssao_texture().is_some());
    assert!(
        device.uniform_writes.iter().any(|(_, n)| n == "ssao_map"),
        "produced occlusion texture binds to the lit draws"
    );
}

#[test]
fn fully_culled_layer_discards_its_dependency_tasks() {
    let mut fx = build_fixture();
    fx.scene.add_light(fx.layer, Light::directional().with_shadow());
    fx.scene.nodes[fx.cube].visible = false;
    fx.scene.nodes[fx.rect].visible = false;

    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());

    assert!(frame.render_list.is_empty(), "no consumers, no shadow pass");
}

// ==== Render pass state =====================================================

#[test]
fn passes_use_correct_blend_and_depth_state() {
    let mut fx = build_fixture();
    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());
    prep.render(&fx.scene, &mut device, &cache, &settings, &mut frame, None);

    assert_eq!(device.draws.len(), 2);

    let opaque_draw = &device.draws[0];
    assert_eq!(opaque_draw.count, 36);
    assert!(!opaque_draw.blend_enabled);
    assert!(opaque_draw.depth_write);

    let transparent_draw = &device.draws[1];
    assert_eq!(transparent_draw.count, 6);
    assert!(transparent_draw.blend_enabled);
    assert!(!transparent_draw.depth_write);

    assert_eq!(prep.state(), PrepareState::Idle);
}

#[test]
fn render_without_prepare_draws_nothing() {
    let fx = build_fixture();
    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.render(&fx.scene, &mut device, &cache, &settings, &mut frame, None);

    assert!(device.draws.is_empty());
}

// ==== Progressive AA accumulation ===========================================

#[test]
fn progressive_aa_accumulates_while_clean_and_resets_on_dirt() {
    let mut fx = build_fixture();
    let layer_key = fx.scene.layer_of(fx.layer).unwrap();
    fx.scene.layers[layer_key].aa_mode = AaMode::ProgressiveAa;

    let mut device = HeadlessDevice::new();
    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());
    assert_eq!(fx.scene.layers[layer_key].progressive_aa_frame(), 0);

    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());
    assert_eq!(fx.scene.layers[layer_key].progressive_aa_frame(), 1);

    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());
    assert_eq!(fx.scene.layers[layer_key].progressive_aa_frame(), 2);

    // Any movement resets the accumulation.
    fx.scene.nodes[fx.cube].transform.position = Vec3::new(0.5, 0.0, 0.0);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());
    assert_eq!(fx.scene.layers[layer_key].progressive_aa_frame(), 0);
}

// ==== Compile failure fallback ==============================================

#[test]
fn failed_material_compile_falls_back_instead_of_vanishing() {
    let mut fx = build_fixture();
    let mut device = HeadlessDevice::new();
    // The lighting loop is the only source of light uniforms; poisoning that
    // token fails every lit material while leaving the fallback compilable.
    device.fail_source_containing = Some("lights[0]".to_string());

    let cache = ShaderCache::new();
    let settings = RenderSettings::default();
    let mut frame = FrameContext::new();

    let mut prep = LayerRenderPreparationData::new(fx.layer);
    prep.prepare_for_render(&mut fx.scene, &mut device, &cache, &settings, &mut frame, viewport());

    assert_eq!(prep.opaque.len(), 1);
    let fallback = prep.opaque[0].program.expect("fallback program substitutes");
    assert_eq!(device.compiles_for("fallback"), 1);

    prep.render(&fx.scene, &mut device, &cache, &settings, &mut frame, None);
    assert_eq!(device.draws[0].program, Some(fallback));
}
