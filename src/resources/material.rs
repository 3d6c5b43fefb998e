//! Materials
//!
//! A material never owns a compiled program. It owns the *description* of one:
//! its [`Material::shader_key`] packs every shader-affecting toggle into a
//! [`MaterialShaderKey`], and the generator turns key + feature set into
//! source. Uniform values (colors, opacity) are bound separately after
//! program acquisition so that many objects can share one program.

use std::borrow::Cow;

use glam::{Vec3, Vec4};
use slotmap::SlotMap;

use crate::render::key::{fields, MaterialShaderKey, MAX_NUM_LIGHTS, MAX_NUM_SHADOWS};
use crate::render::settings::RenderSettings;
use crate::resources::image::Image;
use crate::resources::ImageKey;

// ─── Feature Enums ───────────────────────────────────────────────────────────

/// Composite blend mode. Values are the `blend_mode` key-field encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BlendMode {
    #[default]
    Normal = 0,
    Screen = 1,
    Multiply = 2,
    Overlay = 3,
    ColorBurn = 4,
    ColorDodge = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightingModel {
    NoLighting,
    VertexLighting,
    #[default]
    FragmentLighting,
}

/// Specular BRDF variant. Values are the `specular_model` key-field encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SpecularModel {
    #[default]
    Default = 0,
    KGgx = 1,
    KWard = 2,
}

/// Values are the `tessellation_mode` key-field encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TessellationMode {
    #[default]
    None = 0,
    Linear = 1,
    Phong = 2,
    NPatch = 3,
}

/// Texture channels of the default material. The discriminant doubles as the
/// bit index inside the key's `image_channels` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ImageChannel {
    Diffuse0 = 0,
    Diffuse1 = 1,
    Diffuse2 = 2,
    Emissive = 3,
    Specular = 4,
    Opacity = 5,
    Bump = 6,
    Normal = 7,
    Displacement = 8,
    Translucency = 9,
}

impl ImageChannel {
    pub const COUNT: usize = 10;

    pub const ALL: [ImageChannel; Self::COUNT] = [
        ImageChannel::Diffuse0,
        ImageChannel::Diffuse1,
        ImageChannel::Diffuse2,
        ImageChannel::Emissive,
        ImageChannel::Specular,
        ImageChannel::Opacity,
        ImageChannel::Bump,
        ImageChannel::Normal,
        ImageChannel::Displacement,
        ImageChannel::Translucency,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Uniform/sampler name the generator emits for this channel.
    #[must_use]
    pub const fn sampler_name(self) -> &'static str {
        match self {
            ImageChannel::Diffuse0 => "diffuse_map0",
            ImageChannel::Diffuse1 => "diffuse_map1",
            ImageChannel::Diffuse2 => "diffuse_map2",
            ImageChannel::Emissive => "emissive_map",
            ImageChannel::Specular => "specular_map",
            ImageChannel::Opacity => "opacity_map",
            ImageChannel::Bump => "bump_map",
            ImageChannel::Normal => "normal_map",
            ImageChannel::Displacement => "displacement_map",
            ImageChannel::Translucency => "translucency_map",
        }
    }
}

// ─── Default Material ────────────────────────────────────────────────────────

/// The standard lit material.
#[derive(Debug, Clone)]
pub struct DefaultMaterial {
    pub diffuse_color: Vec4,
    pub specular_tint: Vec3,
    /// Specular contribution; zero disables the specular term entirely
    /// (and its key bit).
    pub specular_amount: f32,
    pub specular_roughness: f32,
    pub specular_model: SpecularModel,
    /// Fresnel rim term; zero disables.
    pub fresnel_power: f32,
    pub lighting: LightingModel,
    pub blend_mode: BlendMode,
    pub tessellation: TessellationMode,
    pub vertex_colors: bool,
    pub opacity: f32,
    channels: [Option<ImageKey>; ImageChannel::COUNT],
}

impl Default for DefaultMaterial {
    fn default() -> Self {
        Self {
            diffuse_color: Vec4::ONE,
            specular_tint: Vec3::ONE,
            specular_amount: 0.0,
            specular_roughness: 50.0,
            specular_model: SpecularModel::Default,
            fresnel_power: 0.0,
            lighting: LightingModel::FragmentLighting,
            blend_mode: BlendMode::Normal,
            tessellation: TessellationMode::None,
            vertex_colors: false,
            opacity: 1.0,
            channels: [None; ImageChannel::COUNT],
        }
    }
}

impl DefaultMaterial {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn channel(&self, channel: ImageChannel) -> Option<ImageKey> {
        self.channels[channel.index() as usize]
    }

    #[inline]
    pub fn set_channel(&mut self, channel: ImageChannel, image: Option<ImageKey>) {
        self.channels[channel.index() as usize] = image;
    }

    /// Normal or bump map present — gates tangent/binormal generation.
    #[inline]
    #[must_use]
    pub fn is_normal_mapped(&self) -> bool {
        self.channel(ImageChannel::Normal).is_some() || self.channel(ImageChannel::Bump).is_some()
    }
}

// ─── Custom Material ─────────────────────────────────────────────────────────

/// A hand-written shader with author-declared properties. The core does not
/// inspect its source; it only needs the facts that drive keying, bucketing
/// and blending.
#[derive(Debug, Clone)]
pub struct CustomMaterial {
    /// Program-cache name; doubles as the generator pipeline name.
    pub shader_name: Cow<'static, str>,
    pub has_lighting: bool,
    pub has_transparency: bool,
    pub blend_mode: BlendMode,
}

// ─── Material ────────────────────────────────────────────────────────────────

/// Closed material variant set.
#[derive(Debug, Clone)]
pub enum Material {
    Default(DefaultMaterial),
    Custom(CustomMaterial),
}

impl Material {
    #[inline]
    #[must_use]
    pub fn blend_mode(&self) -> BlendMode {
        match self {
            Material::Default(m) => m.blend_mode,
            Material::Custom(m) => m.blend_mode,
        }
    }

    /// Cache/pipeline name used for program lookup.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        match self {
            Material::Default(_) => "default",
            Material::Custom(m) => &m.shader_name,
        }
    }

    #[inline]
    #[must_use]
    pub fn opacity(&self) -> f32 {
        match self {
            Material::Default(m) => m.opacity,
            Material::Custom(_) => 1.0,
        }
    }

    /// Whether drawing this material requires the transparent (blended) pass.
    ///
    /// Depends only on static asset data — object opacity, an opacity map, or
    /// a diffuse map with a live alpha channel — never per-frame state.
    #[must_use]
    pub fn has_transparency(&self, images: &SlotMap<ImageKey, Image>) -> bool {
        match self {
            Material::Default(m) => {
                if m.opacity < 1.0 || m.channel(ImageChannel::Opacity).is_some() {
                    return true;
                }
                m.channel(ImageChannel::Diffuse0)
                    .and_then(|key| images.get(key))
                    .is_some_and(|img| img.has_transparency)
            }
            Material::Custom(m) => m.has_transparency,
        }
    }

    /// Pack the shader key for this material under the given prepared light
    /// counts and global settings.
    ///
    /// Counts are clamped to [`MAX_NUM_LIGHTS`] / [`MAX_NUM_SHADOWS`] here so
    /// the key-field width contract holds no matter what the scene contains.
    #[must_use]
    pub fn shader_key(
        &self,
        light_count: u32,
        shadow_count: u32,
        settings: &RenderSettings,
        images: &SlotMap<ImageKey, Image>,
    ) -> MaterialShaderKey {
        let mut key = MaterialShaderKey::default();
        let light_count = light_count.min(MAX_NUM_LIGHTS);
        let shadow_count = shadow_count.min(MAX_NUM_SHADOWS);

        match self {
            Material::Default(m) => {
                let lit = m.lighting != LightingModel::NoLighting;
                key.set_flag(fields::HAS_LIGHTING, lit);
                if lit {
                    key.set(fields::LIGHT_COUNT, u64::from(light_count));
                    key.set(fields::SHADOW_COUNT, u64::from(shadow_count));
                    key.set_flag(fields::HAS_IBL, settings.ibl_enabled);
                }

                let specular = m.specular_amount > 0.0;
                key.set_flag(fields::SPECULAR_ENABLED, specular);
                if specular {
                    key.set(fields::SPECULAR_MODEL, m.specular_model as u64);
                }

                key.set_flag(fields::FRESNEL_ENABLED, m.fresnel_power > 0.0);
                key.set_flag(fields::VERTEX_COLORS, m.vertex_colors);
                key.set_flag(fields::FOG_ENABLED, settings.fog_enabled);
                key.set(fields::TESSELLATION_MODE, m.tessellation as u64);
                key.set(fields::BLEND_MODE, m.blend_mode as u64);

                for channel in ImageChannel::ALL {
                    if m.channel(channel).is_some() {
                        key.set_bit_at(fields::IMAGE_CHANNELS, channel.index(), true);
                    }
                }
            }
            Material::Custom(m) => {
                key.set_flag(fields::HAS_LIGHTING, m.has_lighting);
                if m.has_lighting {
                    key.set(fields::LIGHT_COUNT, u64::from(light_count));
                    key.set(fields::SHADOW_COUNT, u64::from(shadow_count));
                }
                key.set(fields::BLEND_MODE, m.blend_mode as u64);
            }
        }

        key.set_flag(fields::HAS_TRANSPARENCY, self.has_transparency(images));
        key
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::Default(DefaultMaterial::default())
    }
}
