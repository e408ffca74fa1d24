//! Per-window dimension cache.
//!
//! Every camera rendering into the same window shares one [`WindowInfo`].
//! The registry is process-scoped state with a single writer (the pipeline
//! scheduler); it is deliberately `!Sync`.

use std::cell::Cell;
use std::marker::PhantomData;

use rustc_hash::FxHashMap;

use crate::camera::RenderWindow;

/// Native and scaled render dimensions of one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowInfo {
    id: u32,
    width: u32,
    height: u32,
    native_width: u32,
    native_height: u32,
    shading_scale: f32,
}

impl Default for WindowInfo {
    fn default() -> Self {
        Self {
            id: u32::MAX,
            width: 0,
            height: 0,
            native_width: 0,
            native_height: 0,
            shading_scale: 1.0,
        }
    }
}

impl WindowInfo {
    #[must_use]
    pub fn new(id: u32, native_width: u32, native_height: u32, shading_scale: f32) -> Self {
        let mut info = Self::default();
        info.set(id, native_width, native_height, shading_scale);
        info
    }

    /// Scaled size is `max(floor(native * scale), 1)` on both axes.
    pub fn set(&mut self, id: u32, native_width: u32, native_height: u32, shading_scale: f32) {
        self.id = id;
        self.native_width = native_width;
        self.native_height = native_height;
        self.shading_scale = shading_scale;
        self.width = scaled_dimension(native_width, shading_scale);
        self.height = scaled_dimension(native_height, shading_scale);
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn native_width(&self) -> u32 {
        self.native_width
    }

    #[inline]
    #[must_use]
    pub fn native_height(&self) -> u32 {
        self.native_height
    }

    #[inline]
    #[must_use]
    pub fn shading_scale(&self) -> f32 {
        self.shading_scale
    }
}

#[inline]
fn scaled_dimension(native: u32, scale: f32) -> u32 {
    ((f64::from(native) * f64::from(scale)).floor() as u32).max(1)
}

/// Lazily populated window cache keyed by render-window id.
#[derive(Debug, Default)]
pub struct WindowInfoRegistry {
    windows: FxHashMap<u32, WindowInfo>,
    _not_sync: PhantomData<Cell<()>>,
}

impl WindowInfoRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry, creating it on first sight of the window.
    pub fn get_or_insert(&mut self, window: &RenderWindow, shading_scale: f32) -> &WindowInfo {
        self.windows.entry(window.id).or_insert_with(|| {
            WindowInfo::new(
                window.id,
                window.width.max(1),
                window.height.max(1),
                shading_scale,
            )
        })
    }

    /// Like [`get_or_insert`](Self::get_or_insert), but rewrites the entry
    /// when the native size changed since it was cached.
    pub fn update(&mut self, window: &RenderWindow, shading_scale: f32) -> &WindowInfo {
        let native_width = window.width.max(1);
        let native_height = window.height.max(1);
        let info = self
            .windows
            .entry(window.id)
            .or_insert_with(|| WindowInfo::new(window.id, native_width, native_height, shading_scale));
        if info.native_width != native_width || info.native_height != native_height {
            log::debug!(
                "Window {} resized: {}x{} -> {native_width}x{native_height}",
                window.id,
                info.native_width,
                info.native_height
            );
            info.set(window.id, native_width, native_height, shading_scale);
        }
        info
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&WindowInfo> {
        self.windows.get(&id)
    }

    pub fn remove(&mut self, id: u32) -> Option<WindowInfo> {
        self.windows.remove(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
