//! Material Shader Generation
//!
//! Turns a [`MaterialShaderKey`] plus a [`FeatureSet`] into vertex/fragment
//! source by string assembly, one section at a time, then hands the result to
//! the [`ShaderCache`] for compilation. Generation is deterministic: the same
//! key, features and settings always produce byte-identical source, which is
//! what makes the persisted source cache replayable.
//!
//! Uniform binding is separate from program acquisition. Many renderables
//! share one program; [`MaterialShaderGenerator::set_material_properties`]
//! binds the per-object values (matrices, colors, samplers) right before each
//! draw.

use std::fmt::Write as _;

use glam::{Mat4, Vec2};
use slotmap::SlotMap;

use crate::backend::{
    BlendFactor, BlendFunc, OptionalStages, ProgramHandle, RenderDevice, TextureHandle,
    UniformValue,
};
use crate::render::cache::ShaderCache;
use crate::render::features::FeatureSet;
use crate::render::frame::TextureUnitAllocator;
use crate::render::key::{fields, MaterialShaderKey};
use crate::render::settings::RenderSettings;
use crate::resources::material::{ImageChannel, Material, SpecularModel, TessellationMode};
use crate::resources::{Image, ImageKey};
use crate::scene::light::{Light, LightKind};

// ─── Stage Assembly ──────────────────────────────────────────────────────────

/// Accumulates one shader stage section by section.
///
/// Sections are emitted in a fixed order (defines, type declarations, inputs,
/// outputs, uniforms, helper functions, main body) so that equal inputs
/// produce equal text. Struct types used by uniform declarations must go
/// through [`StageGenerator::add_type`], which orders them before the
/// uniforms section.
#[derive(Debug, Default)]
pub struct StageGenerator {
    types: String,
    incoming: String,
    outgoing: String,
    uniforms: String,
    functions: String,
    body: String,
}

impl StageGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_incoming(&mut self, ty: &str, name: &str) {
        let _ = writeln!(self.incoming, "in {ty} {name};");
    }

    pub fn add_outgoing(&mut self, ty: &str, name: &str) {
        let _ = writeln!(self.outgoing, "out {ty} {name};");
    }

    pub fn add_uniform(&mut self, ty: &str, name: &str) {
        let _ = writeln!(self.uniforms, "uniform {ty} {name};");
    }

    /// Struct or other type declaration; emitted before every uniform.
    pub fn add_type(&mut self, source: &str) {
        self.types.push_str(source);
        self.types.push('\n');
    }

    pub fn add_function(&mut self, source: &str) {
        self.functions.push_str(source);
        self.functions.push('\n');
    }

    pub fn append(&mut self, statement: &str) {
        self.body.push_str("    ");
        self.body.push_str(statement);
        self.body.push('\n');
    }

    /// Assemble the stage with the feature preamble at the top.
    #[must_use]
    pub fn build(&self, features: &FeatureSet) -> String {
        let mut out = String::with_capacity(
            features.len() * 32
                + self.types.len()
                + self.incoming.len()
                + self.outgoing.len()
                + self.uniforms.len()
                + self.functions.len()
                + self.body.len()
                + 64,
        );
        out.push_str(&features.to_define_source());
        out.push_str(&self.types);
        out.push_str(&self.incoming);
        out.push_str(&self.outgoing);
        out.push_str(&self.uniforms);
        out.push_str(&self.functions);
        out.push_str("void main()\n{\n");
        out.push_str(&self.body);
        out.push_str("}\n");
        out
    }
}

// ─── Light Uniform Naming ────────────────────────────────────────────────────

/// Name of a per-light uniform, in the configured convention.
///
/// Packed: `light_<i>_<field>` as flat uniforms. Array: `lights[<i>].<field>`
/// struct members. The convention is a global setting because it must match
/// across every generated stage and every binding site.
#[must_use]
pub fn light_uniform_name(settings: &RenderSettings, index: u32, field: &str) -> String {
    if settings.packed_light_uniforms {
        format!("light_{index}_{field}")
    } else {
        format!("lights[{index}].{field}")
    }
}

// ─── Blend Function Mapping ──────────────────────────────────────────────────

/// Fixed-function blend factors for a key's blend mode.
///
/// Overlay and the color burn/dodge modes need programmable blending; on the
/// fixed-function path they fall back to normal blending.
#[must_use]
pub fn blend_func_for_key(key: MaterialShaderKey) -> BlendFunc {
    match key.get(fields::BLEND_MODE) {
        1 => BlendFunc {
            src: BlendFactor::SrcAlpha,
            dst: BlendFactor::One,
        },
        2 => BlendFunc {
            src: BlendFactor::DstColor,
            dst: BlendFactor::Zero,
        },
        _ => BlendFunc::NORMAL,
    }
}

// ─── Pass Bindings ───────────────────────────────────────────────────────────

/// One shadow slot resolved for drawing: the caster's light-space matrix, the
/// depth texture its offscreen pass produced and the depth-compare bias.
#[derive(Debug, Clone, Copy)]
pub struct ShadowBinding {
    pub matrix: Mat4,
    pub depth: TextureHandle,
    pub bias: f32,
}

/// Frame-constant resources bound alongside every draw of a pass.
///
/// Slot order in `shadows` must match light order: generated source samples
/// `shadow_map_<i>` for light `i`.
#[derive(Debug, Default)]
pub struct PassBindings<'a> {
    pub lights: &'a [(Mat4, &'a Light)],
    pub shadows: &'a [ShadowBinding],
    pub ssao: Option<(TextureHandle, Vec2)>,
    pub light_probe: Option<TextureHandle>,
}

// ─── The Generator ───────────────────────────────────────────────────────────

/// Stateless shader-source generator.
///
/// All state lives in its inputs; one generator instance serves every layer.
#[derive(Debug, Default)]
pub struct MaterialShaderGenerator;

impl MaterialShaderGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Get or build the program for `material` under `key` and `features`.
    ///
    /// The cache is probed first; generation only runs on a miss. Returns
    /// `None` when compilation fails (already logged by the cache).
    pub fn generate_program(
        &self,
        device: &mut dyn RenderDevice,
        cache: &ShaderCache,
        material: &Material,
        key: MaterialShaderKey,
        features: &FeatureSet,
        settings: &RenderSettings,
    ) -> Option<ProgramHandle> {
        let name = material.pipeline_name();
        if let Some(program) = cache.get_program(name, key, features) {
            return Some(program);
        }

        let vertex_src = self.generate_vertex_stage(key, features);
        let fragment_src = self.generate_fragment_stage(key, features, settings);
        let stages = self.optional_stages(key);

        cache.compile_program(
            device,
            name,
            key,
            features,
            &vertex_src,
            &fragment_src,
            &stages,
        )
    }

    /// Flat-color program used when a material's own program fails to
    /// compile. Keyed under the reserved "fallback" name with a zero key.
    pub fn fallback_program(
        &self,
        device: &mut dyn RenderDevice,
        cache: &ShaderCache,
    ) -> Option<ProgramHandle> {
        let key = MaterialShaderKey::default();
        let features = FeatureSet::new();
        if let Some(program) = cache.get_program("fallback", key, &features) {
            return Some(program);
        }

        let mut vertex = StageGenerator::new();
        vertex.add_incoming("vec3", "attr_pos");
        vertex.add_uniform("mat4", "model_view_projection");
        vertex.append("gl_Position = model_view_projection * vec4(attr_pos, 1.0);");

        let mut fragment = StageGenerator::new();
        fragment.add_outgoing("vec4", "frag_color");
        fragment.append("frag_color = vec4(1.0, 0.0, 1.0, 1.0);");

        cache.compile_program(
            device,
            "fallback",
            key,
            &features,
            &vertex.build(&features),
            &fragment.build(&features),
            &OptionalStages::default(),
        )
    }

    // ── Vertex stage ─────────────────────────────────────────────────────────

    fn generate_vertex_stage(&self, key: MaterialShaderKey, features: &FeatureSet) -> String {
        let lit = key.flag(fields::HAS_LIGHTING);
        let any_image = key.get(fields::IMAGE_CHANNELS) != 0;
        let normal_mapped = key.bit_at(fields::IMAGE_CHANNELS, ImageChannel::Normal.index())
            || key.bit_at(fields::IMAGE_CHANNELS, ImageChannel::Bump.index());
        let displaced = key.bit_at(fields::IMAGE_CHANNELS, ImageChannel::Displacement.index());

        let mut gen = StageGenerator::new();
        gen.add_incoming("vec3", "attr_pos");
        gen.add_uniform("mat4", "model_view_projection");
        gen.add_uniform("mat4", "model_matrix");

        if lit {
            gen.add_incoming("vec3", "attr_norm");
            gen.add_uniform("mat3", "normal_matrix");
            gen.add_outgoing("vec3", "var_normal");
            gen.add_outgoing("vec3", "var_world_pos");
        }
        if any_image {
            gen.add_incoming("vec2", "attr_uv0");
            gen.add_outgoing("vec2", "var_uv0");
        }
        if normal_mapped {
            gen.add_incoming("vec3", "attr_textan");
            gen.add_incoming("vec3", "attr_binormal");
            gen.add_outgoing("vec3", "var_tangent");
            gen.add_outgoing("vec3", "var_binormal");
        }
        if key.flag(fields::VERTEX_COLORS) {
            gen.add_incoming("vec4", "attr_color");
            gen.add_outgoing("vec4", "var_color");
        }
        if displaced {
            if !lit {
                // Displacement pushes along the normal even on unlit materials.
                gen.add_incoming("vec3", "attr_norm");
            }
            gen.add_uniform("sampler2D", ImageChannel::Displacement.sampler_name());
            gen.add_uniform("float", "displace_amount");
        }

        gen.append("vec3 local_pos = attr_pos;");
        if displaced {
            gen.append(&format!(
                "local_pos += attr_norm * (texture({}, attr_uv0).r - 0.5) * displace_amount;",
                ImageChannel::Displacement.sampler_name()
            ));
        }
        if lit {
            gen.append("var_normal = normalize(normal_matrix * attr_norm);");
            gen.append("var_world_pos = (model_matrix * vec4(local_pos, 1.0)).xyz;");
        }
        if any_image {
            gen.append("var_uv0 = attr_uv0;");
        }
        if normal_mapped {
            gen.append("var_tangent = normalize(normal_matrix * attr_textan);");
            gen.append("var_binormal = normalize(normal_matrix * attr_binormal);");
        }
        if key.flag(fields::VERTEX_COLORS) {
            gen.append("var_color = attr_color;");
        }
        gen.append("gl_Position = model_view_projection * vec4(local_pos, 1.0);");

        gen.build(features)
    }

    // ── Fragment stage ───────────────────────────────────────────────────────

    fn generate_fragment_stage(
        &self,
        key: MaterialShaderKey,
        features: &FeatureSet,
        settings: &RenderSettings,
    ) -> String {
        let lit = key.flag(fields::HAS_LIGHTING);
        let any_image = key.get(fields::IMAGE_CHANNELS) != 0;
        let normal_mapped = key.bit_at(fields::IMAGE_CHANNELS, ImageChannel::Normal.index())
            || key.bit_at(fields::IMAGE_CHANNELS, ImageChannel::Bump.index());

        let mut gen = StageGenerator::new();
        gen.add_outgoing("vec4", "frag_color");
        gen.add_uniform("vec4", "material_diffuse");
        gen.add_uniform("float", "object_opacity");

        if lit {
            gen.add_incoming("vec3", "var_normal");
            gen.add_incoming("vec3", "var_world_pos");
            gen.add_uniform("vec3", "eye_position");
        }
        if any_image {
            gen.add_incoming("vec2", "var_uv0");
        }
        if normal_mapped {
            gen.add_incoming("vec3", "var_tangent");
            gen.add_incoming("vec3", "var_binormal");
        }
        if key.flag(fields::VERTEX_COLORS) {
            gen.add_incoming("vec4", "var_color");
        }

        for channel in ImageChannel::ALL {
            if channel != ImageChannel::Displacement
                && key.bit_at(fields::IMAGE_CHANNELS, channel.index())
            {
                gen.add_uniform("sampler2D", channel.sampler_name());
            }
        }

        // Per-light uniforms, unrolled to the keyed count.
        let light_count = u32::try_from(key.get(fields::LIGHT_COUNT)).unwrap_or(0);
        if lit {
            if settings.packed_light_uniforms {
                for i in 0..light_count {
                    gen.add_uniform("vec4", &light_uniform_name(settings, i, "diffuse"));
                    gen.add_uniform("vec3", &light_uniform_name(settings, i, "position"));
                    gen.add_uniform("vec3", &light_uniform_name(settings, i, "direction"));
                    gen.add_uniform("float", &light_uniform_name(settings, i, "brightness"));
                }
            } else if light_count > 0 {
                gen.add_type(
                    "struct SceneLight {\n    vec4 diffuse;\n    vec3 position;\n    vec3 direction;\n    float brightness;\n};",
                );
                gen.add_uniform("SceneLight", &format!("lights[{light_count}]"));
            }
        }

        // Shadow slots follow light order: the first `shadow_count` lights
        // are the casters.
        let shadow_count = u32::try_from(key.get(fields::SHADOW_COUNT))
            .unwrap_or(0)
            .min(light_count);
        if lit && shadow_count > 0 {
            for s in 0..shadow_count {
                gen.add_uniform("sampler2D", &format!("shadow_map_{s}"));
                gen.add_uniform("mat4", &format!("shadow_matrix_{s}"));
                gen.add_uniform("float", &format!("shadow_bias_{s}"));
            }
        }
        let ssao = lit && features.enabled("STRATA_ENABLE_SSAO");
        if ssao {
            gen.add_uniform("sampler2D", "ssao_map");
            gen.add_uniform("vec2", "screen_size");
        }
        let ibl = lit && key.flag(fields::HAS_IBL) && features.enabled("STRATA_ENABLE_IBL");
        if ibl {
            gen.add_uniform("sampler2D", "light_probe");
        }

        if key.flag(fields::SPECULAR_ENABLED) {
            gen.add_uniform("vec3", "specular_tint");
            gen.add_uniform("float", "specular_amount");
            gen.add_uniform("float", "specular_roughness");
            gen.add_function(match key.get(fields::SPECULAR_MODEL) {
                x if x == SpecularModel::KGgx as u64 => SPECULAR_GGX_FN,
                x if x == SpecularModel::KWard as u64 => SPECULAR_WARD_FN,
                _ => SPECULAR_PHONG_FN,
            });
        }
        // Fresnel needs the shading normal, so it only exists on lit materials.
        let fresnel = lit && key.flag(fields::FRESNEL_ENABLED);
        if fresnel {
            gen.add_uniform("float", "fresnel_power");
        }
        if key.flag(fields::FOG_ENABLED) {
            gen.add_uniform("vec4", "fog_color");
            gen.add_uniform("vec2", "fog_range");
        }

        // Base color.
        gen.append("vec4 base_color = material_diffuse;");
        if key.bit_at(fields::IMAGE_CHANNELS, ImageChannel::Diffuse0.index()) {
            gen.append(&format!(
                "base_color *= texture({}, var_uv0);",
                ImageChannel::Diffuse0.sampler_name()
            ));
        }
        for layered in [ImageChannel::Diffuse1, ImageChannel::Diffuse2] {
            if key.bit_at(fields::IMAGE_CHANNELS, layered.index()) {
                gen.append(&format!(
                    "{{ vec4 layer = texture({}, var_uv0); base_color.rgb = mix(base_color.rgb, layer.rgb, layer.a); }}",
                    layered.sampler_name()
                ));
            }
        }
        if key.flag(fields::VERTEX_COLORS) {
            gen.append("base_color *= var_color;");
        }

        // Shading normal.
        if lit {
            if normal_mapped {
                let map = if key.bit_at(fields::IMAGE_CHANNELS, ImageChannel::Normal.index()) {
                    ImageChannel::Normal
                } else {
                    ImageChannel::Bump
                };
                gen.append(&format!(
                    "vec3 tangent_normal = texture({}, var_uv0).xyz * 2.0 - 1.0;",
                    map.sampler_name()
                ));
                gen.append(
                    "vec3 world_normal = normalize(mat3(var_tangent, var_binormal, var_normal) * tangent_normal);",
                );
            } else {
                gen.append("vec3 world_normal = normalize(var_normal);");
            }
            gen.append("vec3 view_dir = normalize(eye_position - var_world_pos);");
        }

        // Lighting accumulation, one unrolled block per light.
        if lit && light_count > 0 {
            gen.append("vec3 accumulated = vec3(0.0);");
            for i in 0..light_count {
                let diffuse = light_uniform_name(settings, i, "diffuse");
                let position = light_uniform_name(settings, i, "position");
                let direction = light_uniform_name(settings, i, "direction");
                let brightness = light_uniform_name(settings, i, "brightness");

                gen.append("{");
                gen.append(&format!(
                    "    vec3 to_light = {direction}.xyz != vec3(0.0) ? -{direction} : normalize({position} - var_world_pos);"
                ));
                gen.append("    float n_dot_l = max(dot(world_normal, to_light), 0.0);");
                gen.append("    float shadow_factor = 1.0;");
                if i < shadow_count {
                    gen.append(&format!(
                        "    vec4 cast_pos = shadow_matrix_{i} * vec4(var_world_pos, 1.0);"
                    ));
                    gen.append("    vec3 cast_uvz = cast_pos.xyz / cast_pos.w * 0.5 + 0.5;");
                    gen.append(&format!(
                        "    if (texture(shadow_map_{i}, cast_uvz.xy).r < cast_uvz.z - shadow_bias_{i}) {{ shadow_factor = 0.0; }}"
                    ));
                }
                gen.append(&format!(
                    "    accumulated += base_color.rgb * {diffuse}.rgb * {brightness} * n_dot_l * shadow_factor;"
                ));
                if key.flag(fields::SPECULAR_ENABLED) {
                    gen.append(&format!(
                        "    accumulated += specular_tint * specular_amount * {diffuse}.rgb * shadow_factor * specular_term(world_normal, to_light, view_dir, specular_roughness);"
                    ));
                }
                gen.append("}");
            }
            gen.append("vec4 shaded = vec4(accumulated, base_color.a);");
        } else if lit {
            gen.append("vec4 shaded = vec4(vec3(0.0), base_color.a);");
        } else {
            gen.append("vec4 shaded = base_color;");
        }

        if lit && key.bit_at(fields::IMAGE_CHANNELS, ImageChannel::Emissive.index()) {
            gen.append(&format!(
                "shaded.rgb += texture({}, var_uv0).rgb;",
                ImageChannel::Emissive.sampler_name()
            ));
        }
        if ibl {
            gen.append(
                "shaded.rgb += base_color.rgb * texture(light_probe, world_normal.xy * 0.5 + 0.5).rgb;",
            );
        }
        if ssao {
            gen.append("shaded.rgb *= texture(ssao_map, gl_FragCoord.xy / screen_size).r;");
        }
        if fresnel {
            gen.append(
                "shaded.rgb *= 1.0 - pow(1.0 - max(dot(world_normal, view_dir), 0.0), fresnel_power) * 0.5;",
            );
        }

        // Opacity resolution.
        gen.append("float alpha = shaded.a * object_opacity;");
        if key.bit_at(fields::IMAGE_CHANNELS, ImageChannel::Opacity.index()) {
            gen.append(&format!(
                "alpha *= texture({}, var_uv0).r;",
                ImageChannel::Opacity.sampler_name()
            ));
        }

        if key.flag(fields::FOG_ENABLED) {
            gen.append(
                "float fog = clamp((gl_FragCoord.z / gl_FragCoord.w - fog_range.x) / (fog_range.y - fog_range.x), 0.0, 1.0);",
            );
            gen.append("shaded.rgb = mix(shaded.rgb, fog_color.rgb, fog);");
        }

        // Premultiplied output for the normal blend equation. Opaque draws
        // carry alpha 1.0 through, with blending disabled.
        gen.append("frag_color = vec4(shaded.rgb * alpha, alpha);");

        gen.build(features)
    }

    fn optional_stages(&self, key: MaterialShaderKey) -> OptionalStages {
        let mut stages = OptionalStages::default();
        let mode = key.get(fields::TESSELLATION_MODE);
        if mode != TessellationMode::None as u64 {
            let variant = match mode {
                x if x == TessellationMode::Phong as u64 => "phong",
                x if x == TessellationMode::NPatch as u64 => "npatch",
                _ => "linear",
            };
            stages.tess_control = Some(format!(
                "layout(vertices = 3) out;\n// {variant} patch distribution\nvoid main() {{ }}\n"
            ));
            stages.tess_eval = Some(format!(
                "layout(triangles, equal_spacing, ccw) in;\n// {variant} evaluation\nvoid main() {{ }}\n"
            ));
        }
        stages
    }

    // ── Uniform binding ──────────────────────────────────────────────────────

    /// Bind the per-object uniform values for one draw.
    ///
    /// Texture units come from the frame allocator so a frame never reuses a
    /// unit across simultaneously-bound programs.
    #[allow(clippy::too_many_arguments)]
    pub fn set_material_properties(
        &self,
        device: &mut dyn RenderDevice,
        program: ProgramHandle,
        material: &Material,
        images: &SlotMap<ImageKey, Image>,
        bindings: &PassBindings<'_>,
        settings: &RenderSettings,
        mvp: Mat4,
        model: Mat4,
        opacity: f32,
        units: &mut TextureUnitAllocator,
    ) {
        device.set_uniform(program, "model_view_projection", UniformValue::Mat4(mvp));
        device.set_uniform(program, "model_matrix", UniformValue::Mat4(model));
        device.set_uniform(program, "object_opacity", UniformValue::Float(opacity));

        match material {
            Material::Default(m) => {
                device.set_uniform(
                    program,
                    "material_diffuse",
                    UniformValue::Vec4(m.diffuse_color),
                );
                if m.specular_amount > 0.0 {
                    device.set_uniform(
                        program,
                        "specular_tint",
                        UniformValue::Vec3(m.specular_tint),
                    );
                    device.set_uniform(
                        program,
                        "specular_amount",
                        UniformValue::Float(m.specular_amount),
                    );
                    device.set_uniform(
                        program,
                        "specular_roughness",
                        UniformValue::Float(m.specular_roughness),
                    );
                }
                if m.fresnel_power > 0.0 {
                    device.set_uniform(
                        program,
                        "fresnel_power",
                        UniformValue::Float(m.fresnel_power),
                    );
                }

                for channel in ImageChannel::ALL {
                    let Some(image_key) = m.channel(channel) else {
                        continue;
                    };
                    let Some(texture) = images
                        .get(image_key)
                        .filter(|img| img.is_ready())
                        .and_then(|img| img.texture)
                    else {
                        continue;
                    };
                    let unit = units.next_unit();
                    device.bind_texture(unit, texture);
                    device.set_uniform(
                        program,
                        channel.sampler_name(),
                        UniformValue::Int(unit as i32),
                    );
                }
            }
            Material::Custom(_) => {
                device.set_uniform(
                    program,
                    "material_diffuse",
                    UniformValue::Vec4(glam::Vec4::ONE),
                );
            }
        }

        for (i, (world, light)) in bindings.lights.iter().enumerate() {
            let i = i as u32;
            let color = light.color * light.brightness;
            device.set_uniform(
                program,
                &light_uniform_name(settings, i, "diffuse"),
                UniformValue::Vec4(color.extend(1.0)),
            );
            device.set_uniform(
                program,
                &light_uniform_name(settings, i, "position"),
                UniformValue::Vec3(world.w_axis.truncate()),
            );
            let direction = if light.kind == LightKind::Directional {
                -world.z_axis.truncate().normalize_or_zero()
            } else {
                glam::Vec3::ZERO
            };
            device.set_uniform(
                program,
                &light_uniform_name(settings, i, "direction"),
                UniformValue::Vec3(direction),
            );
            device.set_uniform(
                program,
                &light_uniform_name(settings, i, "brightness"),
                UniformValue::Float(light.brightness),
            );
        }

        for (s, shadow) in bindings.shadows.iter().enumerate() {
            let unit = units.next_unit();
            device.bind_texture(unit, shadow.depth);
            device.set_uniform(
                program,
                &format!("shadow_map_{s}"),
                UniformValue::Int(unit as i32),
            );
            device.set_uniform(
                program,
                &format!("shadow_matrix_{s}"),
                UniformValue::Mat4(shadow.matrix),
            );
            device.set_uniform(
                program,
                &format!("shadow_bias_{s}"),
                UniformValue::Float(shadow.bias),
            );
        }
        if let Some((texture, size)) = bindings.ssao {
            let unit = units.next_unit();
            device.bind_texture(unit, texture);
            device.set_uniform(program, "ssao_map", UniformValue::Int(unit as i32));
            device.set_uniform(program, "screen_size", UniformValue::Vec2(size));
        }
        if let Some(texture) = bindings.light_probe {
            let unit = units.next_unit();
            device.bind_texture(unit, texture);
            device.set_uniform(program, "light_probe", UniformValue::Int(unit as i32));
        }
    }
}

// ─── Specular helper functions ───────────────────────────────────────────────

const SPECULAR_PHONG_FN: &str = "\
float specular_term(vec3 n, vec3 l, vec3 v, float roughness)
{
    vec3 r = reflect(-l, n);
    return pow(max(dot(r, v), 0.0), max(roughness, 1.0));
}";

const SPECULAR_GGX_FN: &str = "\
float specular_term(vec3 n, vec3 l, vec3 v, float roughness)
{
    vec3 h = normalize(l + v);
    float a = clamp(roughness / 100.0, 0.01, 1.0);
    float a2 = a * a;
    float ndh = max(dot(n, h), 0.0);
    float denom = ndh * ndh * (a2 - 1.0) + 1.0;
    return a2 / (3.14159265 * denom * denom);
}";

const SPECULAR_WARD_FN: &str = "\
float specular_term(vec3 n, vec3 l, vec3 v, float roughness)
{
    vec3 h = normalize(l + v);
    float a = clamp(roughness / 100.0, 0.01, 1.0);
    float ndh = max(dot(n, h), 0.001);
    float ndl = max(dot(n, l), 0.001);
    float ndv = max(dot(n, v), 0.001);
    float tan2 = (1.0 - ndh * ndh) / (ndh * ndh);
    return exp(-tan2 / (a * a)) / (4.0 * 3.14159265 * a * a * sqrt(ndl * ndv));
}";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;
    use crate::resources::material::DefaultMaterial;

    fn keyed_material(light_count: u32) -> (Material, MaterialShaderKey) {
        let settings = RenderSettings::default();
        let images = SlotMap::with_key();
        let material = Material::Default(DefaultMaterial::new());
        let key = material.shader_key(light_count, 0, &settings, &images);
        (material, key)
    }

    #[test]
    fn generation_is_deterministic() {
        let generator = MaterialShaderGenerator::new();
        let settings = RenderSettings::default();
        let (_, key) = keyed_material(2);
        let features = FeatureSet::new();

        let a = generator.generate_fragment_stage(key, &features, &settings);
        let b = generator.generate_fragment_stage(key, &features, &settings);
        assert_eq!(a, b);
    }

    #[test]
    fn light_loop_unrolls_to_keyed_count() {
        let generator = MaterialShaderGenerator::new();
        let settings = RenderSettings {
            packed_light_uniforms: true,
            ..RenderSettings::default()
        };
        let (_, key) = keyed_material(3);

        let src = generator.generate_fragment_stage(key, &FeatureSet::new(), &settings);
        assert!(src.contains("light_0_diffuse"));
        assert!(src.contains("light_2_diffuse"));
        assert!(!src.contains("light_3_diffuse"));
    }

    #[test]
    fn array_naming_convention_switches_output() {
        let generator = MaterialShaderGenerator::new();
        let settings = RenderSettings {
            packed_light_uniforms: false,
            ..RenderSettings::default()
        };
        let (_, key) = keyed_material(2);

        let src = generator.generate_fragment_stage(key, &FeatureSet::new(), &settings);
        assert!(src.contains("lights[0].diffuse"));
        assert!(src.contains("lights[1].diffuse"));
        assert!(!src.contains("light_0_diffuse"));
    }

    #[test]
    fn light_struct_is_declared_before_its_uniform() {
        let generator = MaterialShaderGenerator::new();
        let settings = RenderSettings::default();
        let (_, key) = keyed_material(2);

        let src = generator.generate_fragment_stage(key, &FeatureSet::new(), &settings);
        let struct_at = src.find("struct SceneLight").expect("struct emitted");
        let uniform_at = src.find("uniform SceneLight").expect("uniform emitted");
        assert!(struct_at < uniform_at);
    }

    #[test]
    fn output_alpha_carries_object_opacity() {
        let generator = MaterialShaderGenerator::new();
        let settings = RenderSettings::default();
        let (_, key) = keyed_material(0);
        assert!(!key.flag(fields::HAS_TRANSPARENCY));

        let src = generator.generate_fragment_stage(key, &FeatureSet::new(), &settings);
        assert!(src.contains("float alpha = shaded.a * object_opacity;"));
        assert!(src.contains("frag_color = vec4(shaded.rgb * alpha, alpha);"));
        assert!(!src.contains("vec4(shaded.rgb, 1.0)"));
    }

    #[test]
    fn shadow_slots_unroll_to_keyed_count() {
        let generator = MaterialShaderGenerator::new();
        let settings = RenderSettings::default();
        let images = SlotMap::with_key();
        let material = Material::Default(DefaultMaterial::new());
        let key = material.shader_key(2, 1, &settings, &images);

        let src = generator.generate_fragment_stage(key, &FeatureSet::new(), &settings);
        assert!(src.contains("uniform sampler2D shadow_map_0;"));
        assert!(src.contains("uniform mat4 shadow_matrix_0;"));
        // Only the first keyed light samples its map.
        assert!(!src.contains("shadow_map_1"));
    }

    #[test]
    fn ibl_sampling_needs_key_bit_and_layer_feature() {
        let generator = MaterialShaderGenerator::new();
        let settings = RenderSettings {
            ibl_enabled: true,
            ..RenderSettings::default()
        };
        let images = SlotMap::with_key();
        let material = Material::Default(DefaultMaterial::new());
        let key = material.shader_key(1, 0, &settings, &images);
        assert!(key.flag(fields::HAS_IBL));

        let plain = generator.generate_fragment_stage(key, &FeatureSet::new(), &settings);
        assert!(!plain.contains("light_probe"));

        let mut features = FeatureSet::new();
        features.set("STRATA_ENABLE_IBL", true);
        let with_ibl = generator.generate_fragment_stage(key, &features, &settings);
        assert!(with_ibl.contains("uniform sampler2D light_probe;"));
    }

    #[test]
    fn feature_defines_appear_in_both_stages() {
        let generator = MaterialShaderGenerator::new();
        let settings = RenderSettings::default();
        let (_, key) = keyed_material(1);
        let mut features = FeatureSet::new();
        features.set("STRATA_ENABLE_SSAO", true);

        let vs = generator.generate_vertex_stage(key, &features);
        let fs = generator.generate_fragment_stage(key, &features, &settings);
        assert!(vs.starts_with("#define STRATA_ENABLE_SSAO 1"));
        assert!(fs.starts_with("#define STRATA_ENABLE_SSAO 1"));
    }

    #[test]
    fn generate_program_hits_cache_on_second_call() {
        let generator = MaterialShaderGenerator::new();
        let cache = ShaderCache::new();
        let mut device = HeadlessDevice::new();
        let settings = RenderSettings::default();
        let (material, key) = keyed_material(1);
        let features = FeatureSet::new();

        let a = generator.generate_program(&mut device, &cache, &material, key, &features, &settings);
        let b = generator.generate_program(&mut device, &cache, &material, key, &features, &settings);

        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(device.compiles_for("default"), 1);
    }

    #[test]
    fn advanced_blend_modes_fall_back_to_normal() {
        let mut key = MaterialShaderKey::default();
        key.set(fields::BLEND_MODE, 3); // overlay
        assert_eq!(blend_func_for_key(key), BlendFunc::NORMAL);

        key.set(fields::BLEND_MODE, 1); // screen
        assert_eq!(
            blend_func_for_key(key),
            BlendFunc {
                src: BlendFactor::SrcAlpha,
                dst: BlendFactor::One,
            }
        );
    }
}
