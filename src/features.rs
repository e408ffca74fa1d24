//! Device & Scene Capability Snapshot
//!
//! [`PipelineFeatures`] is resolved once per frame from two collaborators the
//! host provides:
//!
//! - a [`DeviceCapabilities`] implementation (graphics API, platform flags,
//!   per-format support)
//! - the [`PipelineSceneData`] record (HDR, shadows, skin)
//!
//! Capability shortfalls never fail; they select a lower-capability fallback.

use glam::{UVec2, Vec4};
use wgpu::{TextureFormat, TextureFormatFeatureFlags, TextureFormatFeatures, TextureUsages};

/// Format used for shadow maps when float render targets are unavailable.
pub const FALLBACK_SHADOW_MAP_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Graphics backend reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphicsApi {
    Vulkan,
    Metal,
    Dx12,
    Gles,
    WebGl1,
    WebGl2,
    WebGpu,
}

/// Device queries consulted once per frame.
pub trait DeviceCapabilities {
    fn graphics_api(&self) -> GraphicsApi;

    /// `false` on web builds.
    fn is_native(&self) -> bool;

    fn is_mobile(&self) -> bool;

    /// `+1` when screen-space Y points up, `-1` otherwise.
    fn screen_space_sign_y(&self) -> f32;

    /// `+1` when clip-space Y points up, `-1` otherwise.
    fn clip_space_sign_y(&self) -> f32;

    fn format_features(&self, format: TextureFormat) -> TextureFormatFeatures;
}

/// Capability stub with fixed answers.
///
/// Every format is fully supported unless listed in `unsupported`.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticDevice {
    pub api: GraphicsApi,
    pub native: bool,
    pub mobile: bool,
    pub screen_space_sign_y: f32,
    pub clip_space_sign_y: f32,
    pub unsupported: Vec<TextureFormat>,
}

impl StaticDevice {
    #[must_use]
    pub fn desktop() -> Self {
        Self {
            api: GraphicsApi::Vulkan,
            native: true,
            mobile: false,
            screen_space_sign_y: 1.0,
            clip_space_sign_y: 1.0,
            unsupported: Vec::new(),
        }
    }

    #[must_use]
    pub fn webgl1() -> Self {
        Self {
            api: GraphicsApi::WebGl1,
            native: false,
            mobile: false,
            screen_space_sign_y: 1.0,
            clip_space_sign_y: 1.0,
            unsupported: vec![TextureFormat::R32Float],
        }
    }

    #[must_use]
    pub fn with_api(mut self, api: GraphicsApi) -> Self {
        self.api = api;
        self
    }

    #[must_use]
    pub fn mobile(mut self) -> Self {
        self.mobile = true;
        self
    }

    #[must_use]
    pub fn with_screen_space_sign_y(mut self, sign: f32) -> Self {
        self.screen_space_sign_y = sign;
        self
    }

    #[must_use]
    pub fn without_format(mut self, format: TextureFormat) -> Self {
        self.unsupported.push(format);
        self
    }
}

impl DeviceCapabilities for StaticDevice {
    fn graphics_api(&self) -> GraphicsApi {
        self.api
    }

    fn is_native(&self) -> bool {
        self.native
    }

    fn is_mobile(&self) -> bool {
        self.mobile
    }

    fn screen_space_sign_y(&self) -> f32 {
        self.screen_space_sign_y
    }

    fn clip_space_sign_y(&self) -> f32 {
        self.clip_space_sign_y
    }

    fn format_features(&self, format: TextureFormat) -> TextureFormatFeatures {
        if self.unsupported.contains(&format) {
            TextureFormatFeatures {
                allowed_usages: TextureUsages::empty(),
                flags: TextureFormatFeatureFlags::empty(),
            }
        } else {
            TextureFormatFeatures {
                allowed_usages: TextureUsages::RENDER_ATTACHMENT
                    | TextureUsages::TEXTURE_BINDING
                    | TextureUsages::COPY_SRC
                    | TextureUsages::COPY_DST,
                flags: TextureFormatFeatureFlags::FILTERABLE,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scene data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowType {
    Planar,
    #[default]
    ShadowMap,
}

/// Global shadow configuration of the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowInfo {
    pub enabled: bool,
    pub kind: ShadowType,
    /// Atlas / spot shadow-map size in pixels.
    pub size: UVec2,
    /// Cap on per-spot-light shadow maps.
    pub max_spot_shadow_maps: u32,
}

impl Default for ShadowInfo {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: ShadowType::ShadowMap,
            size: UVec2::splat(1024),
            max_spot_shadow_maps: 1,
        }
    }
}

/// Scene-wide render state supplied by the host.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineSceneData {
    pub is_hdr: bool,
    /// Tone-mapping curve, written to the tone-mapping pass as `toneMappingType`.
    pub tone_mapping_type: u32,
    pub csm_supported: bool,
    pub shadows: ShadowInfo,
    /// Screen-space subsurface scattering for skin materials.
    pub skin_enabled: bool,
}

// ---------------------------------------------------------------------------
// PipelineFeatures
// ---------------------------------------------------------------------------

/// Per-frame capability snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineFeatures {
    api: GraphicsApi,
    is_web: bool,
    is_mobile: bool,
    is_hdr: bool,
    tone_mapping_type: u32,
    ssss_enabled: bool,
    shadow_enabled: bool,
    csm_supported: bool,
    shadow_map_format: TextureFormat,
    shadow_map_size: UVec2,
    use_planar_shadow: bool,
    max_spot_shadow_maps: u32,
    screen_space_sign_y: f32,
    platform: Vec4,
}

impl Default for PipelineFeatures {
    fn default() -> Self {
        Self {
            api: GraphicsApi::Vulkan,
            is_web: false,
            is_mobile: false,
            is_hdr: false,
            tone_mapping_type: 0,
            ssss_enabled: false,
            shadow_enabled: false,
            csm_supported: false,
            shadow_map_format: FALLBACK_SHADOW_MAP_FORMAT,
            shadow_map_size: UVec2::splat(1024),
            use_planar_shadow: false,
            max_spot_shadow_maps: 1,
            screen_space_sign_y: 1.0,
            platform: Vec4::ZERO,
        }
    }
}

impl PipelineFeatures {
    /// Re-resolves every flag from the device and scene data.
    pub fn reset(&mut self, device: &dyn DeviceCapabilities, scene: &PipelineSceneData) {
        let api = device.graphics_api();
        self.api = api;
        self.is_web = !device.is_native();
        self.is_mobile = device.is_mobile();

        self.is_hdr = scene.is_hdr;
        self.tone_mapping_type = scene.tone_mapping_type;
        self.ssss_enabled = scene.skin_enabled;
        self.csm_supported = scene.csm_supported;

        let shadows = &scene.shadows;
        self.shadow_enabled = shadows.enabled;
        self.shadow_map_size = shadows.size.max(UVec2::ONE);
        self.use_planar_shadow = shadows.enabled && shadows.kind == ShadowType::Planar;
        self.max_spot_shadow_maps = shadows.max_spot_shadow_maps;

        let render_and_sample = TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING;
        let r32 = device.format_features(TextureFormat::R32Float);
        self.shadow_map_format =
            if r32.allowed_usages.contains(render_and_sample) && api != GraphicsApi::WebGl1 {
                TextureFormat::R32Float
            } else {
                FALLBACK_SHADOW_MAP_FORMAT
            };

        self.screen_space_sign_y = device.screen_space_sign_y();
        self.platform = Vec4::new(
            if self.is_mobile { 1.0 } else { 0.0 },
            0.0,
            0.0,
            pack_sign_bits(self.screen_space_sign_y, device.clip_space_sign_y()) as f32,
        );
    }

    #[inline]
    #[must_use]
    pub fn graphics_api(&self) -> GraphicsApi {
        self.api
    }

    #[inline]
    #[must_use]
    pub fn is_web(&self) -> bool {
        self.is_web
    }

    #[inline]
    #[must_use]
    pub fn is_webgl1(&self) -> bool {
        self.api == GraphicsApi::WebGl1
    }

    #[inline]
    #[must_use]
    pub fn is_webgpu(&self) -> bool {
        self.api == GraphicsApi::WebGpu
    }

    #[inline]
    #[must_use]
    pub fn is_mobile(&self) -> bool {
        self.is_mobile
    }

    #[inline]
    #[must_use]
    pub fn is_hdr(&self) -> bool {
        self.is_hdr
    }

    #[inline]
    #[must_use]
    pub fn tone_mapping_type(&self) -> u32 {
        self.tone_mapping_type
    }

    #[inline]
    #[must_use]
    pub fn ssss_enabled(&self) -> bool {
        self.ssss_enabled
    }

    #[inline]
    #[must_use]
    pub fn shadow_enabled(&self) -> bool {
        self.shadow_enabled
    }

    #[inline]
    #[must_use]
    pub fn csm_supported(&self) -> bool {
        self.csm_supported
    }

    #[inline]
    #[must_use]
    pub fn shadow_map_format(&self) -> TextureFormat {
        self.shadow_map_format
    }

    #[inline]
    #[must_use]
    pub fn shadow_map_size(&self) -> UVec2 {
        self.shadow_map_size
    }

    #[inline]
    #[must_use]
    pub fn use_planar_shadow(&self) -> bool {
        self.use_planar_shadow
    }

    #[inline]
    #[must_use]
    pub fn max_spot_shadow_maps(&self) -> u32 {
        self.max_spot_shadow_maps
    }

    #[inline]
    #[must_use]
    pub fn screen_space_sign_y(&self) -> f32 {
        self.screen_space_sign_y
    }

    /// `g_platform`: `x` = mobile flag, `w` = packed Y-convention bits.
    #[inline]
    #[must_use]
    pub fn platform(&self) -> Vec4 {
        self.platform
    }
}

/// `bit 1` = screen-space Y up, `bit 0` = clip-space Y up.
fn pack_sign_bits(screen_space_sign_y: f32, clip_space_sign_y: f32) -> u32 {
    let screen = (screen_space_sign_y * 0.5 + 0.5) as u32;
    let clip = (clip_space_sign_y * 0.5 + 0.5) as u32;
    (screen << 1) | clip
}
