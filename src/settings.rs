//! Pipeline Settings
//!
//! Read-only configuration consumed by the pass builders. A settings object is
//! resolved per camera (see [`ForwardPipeline`](crate::pipeline::ForwardPipeline)):
//!
//! 1. editor-preview override, for `SceneView` / `Preview` cameras
//! 2. the camera's own override
//! 3. the pipeline default
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use forward_pipeline::settings::PipelineSettings;
//!
//! let settings = PipelineSettings::from_json_str(r#"{
//!     "enable_shading_scale": true,
//!     "shading_scale": 0.5,
//!     "msaa": { "enabled": true, "sample_count": 4 }
//! }"#)?;
//! ```
//!
//! Live editing goes through [`ObservableSettings`], which notifies an explicit
//! observer list instead of relying on property reflection.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Asset handles
// ---------------------------------------------------------------------------

/// Host-side material identity. The pipeline only forwards it to
/// fullscreen-quad draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialHandle(pub u64);

/// Host-side 2D texture asset (LUTs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureHandle {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

impl TextureHandle {
    #[inline]
    #[must_use]
    pub const fn new(id: u64, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    /// Square LUTs are 3D tables unrolled as 8x8 tiles; non-square ones are a
    /// horizontal strip of N slices.
    #[inline]
    #[must_use]
    pub const fn is_square(&self) -> bool {
        self.width == self.height
    }
}

// ---------------------------------------------------------------------------
// Per-effect settings
// ---------------------------------------------------------------------------

/// Hardware multisampling for the forward pass.
///
/// | Field          | Default |
/// |----------------|---------|
/// | `enabled`      | `false` |
/// | `sample_count` | `4`     |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsaaSettings {
    pub enabled: bool,
    pub sample_count: u32,
}

impl Default for MsaaSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sample_count: 4,
        }
    }
}

/// Bloom filter family. The discriminant is the material pass index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BloomType {
    #[default]
    KawaseDualFilter = 0,
    MipmapFilter = 1,
}

/// Bloom stage.
///
/// The filter material follows `kind` (`kawase_filter_material` or
/// `mipmap_filter_material`) and falls back to `material`.
///
/// | Field             | Default            |
/// |-------------------|--------------------|
/// | `enabled`         | `false`            |
/// | `kind`            | `KawaseDualFilter` |
/// | `iterations`      | `3`                |
/// | `threshold`       | `0.8`              |
/// | `intensity`       | `1.0`              |
/// | `render_order`    | `0`                |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub enabled: bool,
    pub kind: BloomType,
    pub material: Option<MaterialHandle>,
    pub kawase_filter_material: Option<MaterialHandle>,
    pub mipmap_filter_material: Option<MaterialHandle>,
    pub enable_alpha_mask: bool,
    pub iterations: u32,
    pub threshold: f32,
    pub intensity: f32,
    pub render_order: i32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: BloomType::KawaseDualFilter,
            material: None,
            kawase_filter_material: None,
            mipmap_filter_material: None,
            enable_alpha_mask: false,
            iterations: 3,
            threshold: 0.8,
            intensity: 1.0,
            render_order: 0,
        }
    }
}

impl BloomSettings {
    /// Material drawing the bloom filter of the selected `kind`.
    #[must_use]
    pub fn filter_material(&self) -> Option<MaterialHandle> {
        let specific = match self.kind {
            BloomType::KawaseDualFilter => self.kawase_filter_material,
            BloomType::MipmapFilter => self.mipmap_filter_material,
        };
        specific.or(self.material)
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.filter_material().is_some()
    }
}

/// LUT color grading. Replaces plain tone mapping when active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorGradingSettings {
    pub enabled: bool,
    pub material: Option<MaterialHandle>,
    /// Blend weight of the graded color, `1.0` by default.
    pub contribute: f32,
    pub color_grading_map: Option<TextureHandle>,
    pub render_order: i32,
}

impl Default for ColorGradingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            material: None,
            contribute: 1.0,
            color_grading_map: None,
            render_order: 100,
        }
    }
}

impl ColorGradingSettings {
    /// Enabled with both a material and a LUT.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.material.is_some() && self.color_grading_map.is_some()
    }
}

/// HDR tone mapping. Falls back to the utility material when no custom
/// material is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingSettings {
    pub material: Option<MaterialHandle>,
    pub render_order: i32,
}

impl Default for ToneMappingSettings {
    fn default() -> Self {
        Self {
            material: None,
            render_order: 100,
        }
    }
}

/// FXAA, applied after TAA on LDR color.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxaaSettings {
    pub enabled: bool,
    pub material: Option<MaterialHandle>,
    pub render_order: i32,
}

impl FxaaSettings {
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.material.is_some()
    }
}

/// FSR-style upscale + sharpen to native resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsrSettings {
    pub enabled: bool,
    pub material: Option<MaterialHandle>,
    pub sharpness: f32,
}

impl Default for FsrSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            material: None,
            sharpness: 0.8,
        }
    }
}

impl FsrSettings {
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.material.is_some()
    }
}

/// Temporal anti-aliasing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaaSettings {
    pub enabled: bool,
}

/// Blur kernel quality of screen-space subsurface scattering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SssQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl SssQuality {
    /// Shader-side value written to `sssInfo.x`.
    #[inline]
    #[must_use]
    pub const fn as_f32(self) -> f32 {
        match self {
            Self::Low => 0.0,
            Self::Medium => 1.0,
            Self::High => 2.0,
        }
    }
}

/// Screen-space subsurface scattering (skin).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SssSettings {
    pub quality: SssQuality,
    /// Diffusion profile kernel LUT, bound as `sssKernelLut` when present.
    pub lut_texture: Option<TextureHandle>,
}

// ---------------------------------------------------------------------------
// PipelineSettings
// ---------------------------------------------------------------------------

/// Complete pipeline configuration.
///
/// | Field                  | Default |
/// |------------------------|---------|
/// | `enable_shading_scale` | `false` |
/// | `shading_scale`        | `0.7`   |
/// | every effect           | off     |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub enable_shading_scale: bool,
    /// Render-resolution multiplier in `(0, 1]`.
    pub shading_scale: f32,
    pub msaa: MsaaSettings,
    pub bloom: BloomSettings,
    pub color_grading: ColorGradingSettings,
    pub tone_mapping: ToneMappingSettings,
    pub fxaa: FxaaSettings,
    pub fsr: FsrSettings,
    pub taa: TaaSettings,
    pub sss: SssSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            enable_shading_scale: false,
            shading_scale: 0.7,
            msaa: MsaaSettings::default(),
            bloom: BloomSettings::default(),
            color_grading: ColorGradingSettings::default(),
            tone_mapping: ToneMappingSettings::default(),
            fxaa: FxaaSettings::default(),
            fsr: FsrSettings::default(),
            taa: TaaSettings::default(),
            sss: SssSettings::default(),
        }
    }
}

impl PipelineSettings {
    /// Parses and validates settings from JSON. Missing fields take their
    /// defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.shading_scale > 0.0 && self.shading_scale <= 1.0) {
            return Err(PipelineError::InvalidSettings(format!(
                "shading_scale must be in (0, 1], got {}",
                self.shading_scale
            )));
        }
        if !matches!(self.msaa.sample_count, 2 | 4 | 8) {
            return Err(PipelineError::InvalidSettings(format!(
                "msaa.sample_count must be 2, 4 or 8, got {}",
                self.msaa.sample_count
            )));
        }
        let floats = [
            self.fsr.sharpness,
            self.bloom.threshold,
            self.bloom.intensity,
            self.color_grading.contribute,
        ];
        if floats.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidSettings(
                "effect parameters must be finite".to_owned(),
            ));
        }
        if self.bloom.iterations == 0 {
            return Err(PipelineError::InvalidSettings(
                "bloom.iterations must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    /// Scale actually applied to the render resolution.
    #[inline]
    #[must_use]
    pub fn effective_shading_scale(&self) -> f32 {
        if self.enable_shading_scale {
            self.shading_scale
        } else {
            1.0
        }
    }
}

// ---------------------------------------------------------------------------
// ObservableSettings
// ---------------------------------------------------------------------------

/// Handle returned by [`ObservableSettings::on_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn Fn(&PipelineSettings, &str)>;

/// Settings with an explicit change-notification list.
///
/// Cameras hold [`snapshot`](Self::snapshot)s; a modification produces a new
/// snapshot (copy-on-write) so frames already recorded are unaffected.
pub struct ObservableSettings {
    current: Arc<PipelineSettings>,
    observers: Vec<(ObserverId, Observer)>,
    next_id: u64,
}

impl fmt::Debug for ObservableSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableSettings")
            .field("current", &self.current)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for ObservableSettings {
    fn default() -> Self {
        Self::new(PipelineSettings::default())
    }
}

impl ObservableSettings {
    #[must_use]
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            current: Arc::new(settings),
            observers: Vec::new(),
            next_id: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> &PipelineSettings {
        &self.current
    }

    /// Shared handle to the current settings.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<PipelineSettings> {
        Arc::clone(&self.current)
    }

    pub fn on_changed(&mut self, observer: impl Fn(&PipelineSettings, &str) + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    #[inline]
    #[must_use]
    pub fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    /// Applies `edit`, validates the result and notifies every observer with
    /// `property`. An edit that fails validation is rolled back.
    pub fn modify(&mut self, property: &str, edit: impl FnOnce(&mut PipelineSettings)) -> Result<()> {
        let mut next = (*self.current).clone();
        edit(&mut next);
        next.validate()?;
        self.current = Arc::new(next);
        log::debug!("Pipeline setting changed: {property}");
        for (_, observer) in &self.observers {
            observer(&self.current, property);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn defaults_are_valid_and_everything_is_off() {
        let s = PipelineSettings::default();
        assert!(s.validate().is_ok());
        assert!(!s.bloom.is_active());
        assert!(!s.color_grading.is_active());
        assert!(!s.fxaa.is_active());
        assert!(!s.fsr.is_active());
        assert!(!s.taa.enabled);
        assert_eq!(s.effective_shading_scale(), 1.0);
    }

    #[test]
    fn json_partial_document_fills_defaults() {
        let s = PipelineSettings::from_json_str(
            r#"{ "enable_shading_scale": true, "shading_scale": 0.5, "bloom": { "enabled": true } }"#,
        )
        .unwrap();
        assert_eq!(s.effective_shading_scale(), 0.5);
        assert!(s.bloom.enabled);
        assert_eq!(s.bloom.iterations, 3);
        assert_eq!(s.msaa.sample_count, 4);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = PipelineSettings::from_json_str(r#"{ "shading_scale": 0.0 }"#).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSettings(_)));
        let err = PipelineSettings::from_json_str(r#"{ "msaa": { "sample_count": 3 } }"#).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSettings(_)));
        let err = PipelineSettings::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, PipelineError::SettingsParse(_)));
    }

    #[test]
    fn non_finite_and_degenerate_parameters_are_rejected() {
        let mut s = PipelineSettings::default();
        s.shading_scale = f32::NAN;
        assert!(s.validate().is_err());

        let mut s = PipelineSettings::default();
        s.bloom.intensity = f32::INFINITY;
        assert!(s.validate().is_err());

        let mut s = PipelineSettings::default();
        s.bloom.iterations = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn bloom_material_follows_filter_kind() {
        let mut bloom = BloomSettings {
            enabled: true,
            kawase_filter_material: Some(MaterialHandle(4)),
            mipmap_filter_material: Some(MaterialHandle(5)),
            ..Default::default()
        };
        assert_eq!(bloom.filter_material(), Some(MaterialHandle(4)));
        bloom.kind = BloomType::MipmapFilter;
        assert_eq!(bloom.filter_material(), Some(MaterialHandle(5)));

        bloom.mipmap_filter_material = None;
        assert!(!bloom.is_active());
        bloom.material = Some(MaterialHandle(6));
        assert_eq!(bloom.filter_material(), Some(MaterialHandle(6)));
        assert!(bloom.is_active());
    }

    #[test]
    fn color_grading_needs_material_and_lut() {
        let mut cg = ColorGradingSettings {
            enabled: true,
            material: Some(MaterialHandle(1)),
            ..Default::default()
        };
        assert!(!cg.is_active());
        cg.color_grading_map = Some(TextureHandle::new(2, 256, 16));
        assert!(cg.is_active());
    }

    #[test]
    fn observers_see_modifications() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut settings = ObservableSettings::default();
        let sink = Rc::clone(&seen);
        let id = settings.on_changed(move |s, prop| {
            sink.borrow_mut().push((prop.to_owned(), s.fxaa.enabled));
        });

        let before = settings.snapshot();
        settings.modify("fxaa.enabled", |s| s.fxaa.enabled = true).unwrap();
        assert!(!before.fxaa.enabled);
        assert!(settings.get().fxaa.enabled);
        assert_eq!(seen.borrow().as_slice(), &[("fxaa.enabled".to_owned(), true)]);

        assert!(settings.remove_observer(id));
        settings.modify("fxaa.enabled", |s| s.fxaa.enabled = false).unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn failed_modification_rolls_back() {
        let mut settings = ObservableSettings::default();
        assert!(settings.modify("shading_scale", |s| s.shading_scale = 2.0).is_err());
        assert_eq!(settings.get().shading_scale, 0.7);
    }
}
