pub mod cache;
pub mod features;
pub mod frame;
pub mod frustum;
pub mod key;
pub mod layer_prep;
pub mod render_list;
pub mod settings;
pub mod shader_gen;

pub use cache::{ShaderCache, SHADER_CACHE_VERSION};
pub use features::FeatureSet;
pub use frame::FrameContext;
pub use frustum::ClipFrustum;
pub use key::{MaterialShaderKey, MAX_NUM_LIGHTS, MAX_NUM_SHADOWS};
pub use layer_prep::{LayerRenderPreparationData, PreparedRenderable, ShadowMapTarget};
pub use render_list::{RenderList, RenderTask, RenderTaskId};
pub use settings::RenderSettings;
pub use shader_gen::MaterialShaderGenerator;
