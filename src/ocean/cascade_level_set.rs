use cgmath::Vector2;

use crate::ocean::cascade::{RectXZ, RenderData};
use crate::ocean::error::{OceanError, Result};
use crate::ocean::ocean_parameters::{OceanParameters, MAX_LOD_COUNT};
use crate::ocean::utils::snap_to_texel;
use crate::ocean::viewpoint::{scale_could_decrease, scale_could_increase, ViewerScale};

/// Texels per wave used when picking a cascade for sampling a region.
const SAMPLING_TEXELS_PER_WAVE: f32 = 4.0;

/// Viewpoint centered nested grids, index 0 is the finest.
pub struct CascadeLevelSet {
  lod_count: usize,
  resolution: u32,
  min_texels_per_wave: f32,

  render_data: Vec<RenderData>,
  render_data_prev: Vec<RenderData>,
  update_frame: Option<u64>,

  scale: f32,
  prev_scale: f32,
  altitude_alpha: f32,
  scale_change_exponent: i32,
  scale_could_decrease: bool,
  scale_could_increase: bool,
}

impl CascadeLevelSet {
  pub fn new(params: &OceanParameters) -> Result<Self> {
    if params.lod_count == 0 || params.lod_count > MAX_LOD_COUNT {
      return Err(OceanError::TooManyCascades {
        requested: params.lod_count,
        max: MAX_LOD_COUNT,
      });
    }
    if params.lod_resolution == 0 || params.lod_resolution % 8 != 0 {
      return Err(OceanError::InvalidResolution(params.lod_resolution));
    }

    Ok(Self {
      lod_count: params.lod_count,
      resolution: params.lod_resolution,
      min_texels_per_wave: params.min_texels_per_wave,
      render_data: vec![RenderData::default(); params.lod_count],
      render_data_prev: vec![RenderData::default(); params.lod_count],
      update_frame: None,
      scale: 0.0,
      prev_scale: 0.0,
      altitude_alpha: 0.0,
      scale_change_exponent: 0,
      scale_could_decrease: false,
      scale_could_increase: false,
    })
  }

  /// Recomputes every cascade for `frame`. Calling again for the same frame is a no-op.
  pub fn update(
    &mut self,
    frame: u64,
    viewpoint_xz: Vector2<f32>,
    viewer_scale: ViewerScale,
    params: &OceanParameters,
  ) {
    if self.update_frame == Some(frame) {
      return;
    }
    let first_update = self.update_frame.is_none();
    self.update_frame = Some(frame);

    self.prev_scale = if first_update { viewer_scale.scale } else { self.scale };
    self.scale = viewer_scale.scale;
    self.altitude_alpha = viewer_scale.altitude_alpha;
    self.scale_change_exponent = (self.scale / self.prev_scale).log2().round() as i32;
    self.scale_could_decrease = scale_could_decrease(params, self.scale);
    self.scale_could_increase = scale_could_increase(params, self.scale);

    for lod in 0..self.lod_count {
      self.render_data_prev[lod] = self.render_data[lod];

      let texel_width = self.texel_width_for_scale(lod);
      self.render_data[lod] = RenderData {
        texel_width,
        texture_res: self.resolution,
        pos_snapped: snap_to_texel(viewpoint_xz, texel_width),
        frame,
      };

      if first_update {
        self.render_data_prev[lod] = self.render_data[lod];
      }
    }
  }

  fn texel_width_for_scale(&self, lod: usize) -> f32 {
    let lod_scale = self.scale * (1u32 << lod) as f32;
    2.0 * (2.0 * lod_scale) / self.resolution as f32
  }

  pub fn lod_count(&self) -> usize {
    self.lod_count
  }

  pub fn resolution(&self) -> u32 {
    self.resolution
  }

  pub fn scale(&self) -> f32 {
    self.scale
  }

  pub fn altitude_alpha(&self) -> f32 {
    self.altitude_alpha
  }

  pub fn scale_change_exponent(&self) -> i32 {
    self.scale_change_exponent
  }

  pub fn scale_could_decrease(&self) -> bool {
    self.scale_could_decrease
  }

  pub fn scale_could_increase(&self) -> bool {
    self.scale_could_increase
  }

  pub fn current_frame(&self) -> Option<u64> {
    self.update_frame
  }

  pub fn render_data(&self, lod: usize) -> &RenderData {
    &self.render_data[lod]
  }

  pub fn render_data_prev(&self, lod: usize) -> &RenderData {
    &self.render_data_prev[lod]
  }

  /// Render data for `lod`, warning when it was not computed for `frame`.
  pub fn validated_render_data(&self, lod: usize, frame: u64) -> &RenderData {
    self.render_data[lod].validate(frame, "CascadeLevelSet");
    &self.render_data[lod]
  }

  pub fn texel_width(&self, lod: usize) -> f32 {
    self.render_data[lod].texel_width
  }

  pub fn min_wavelength(&self, lod: usize) -> f32 {
    self.render_data[lod].texel_width * self.min_texels_per_wave
  }

  pub fn max_wavelength(&self, lod: usize) -> f32 {
    2.0 * self.min_wavelength(lod)
  }

  /// Smallest cascade that fully contains `rect` while still resolving it.
  pub fn suggest_lod_for_area(&self, rect: &RectXZ) -> Option<usize> {
    let min_spatial_length = rect.width().min(rect.height());

    for lod in 0..self.lod_count {
      let rd = &self.render_data[lod];

      // one texel border keeps finite differences inside the cascade
      let lod_rect = rd.rect_xz().shrink(rd.texel_width);
      if !lod_rect.contains_rect(rect) {
        continue;
      }

      let min_wavelength = rd.texel_width * SAMPLING_TEXELS_PER_WAVE;
      if min_wavelength > min_spatial_length / 2.0 && lod < self.lod_count - 1 {
        continue;
      }

      return Some(lod);
    }

    None
  }

  pub fn set_origin(&mut self, delta: Vector2<f32>) {
    for lod in 0..self.lod_count {
      self.render_data[lod].pos_snapped -= delta;
      self.render_data_prev[lod].pos_snapped -= delta;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ocean::utils::{approx_eq, repeat};

  fn level_set(lod_count: usize, resolution: u32) -> (CascadeLevelSet, OceanParameters) {
    let params = OceanParameters {
      lod_count,
      lod_resolution: resolution,
      ..Default::default()
    };
    (CascadeLevelSet::new(&params).unwrap(), params)
  }

  fn scale(scale: f32) -> ViewerScale {
    ViewerScale {
      scale,
      altitude_alpha: 0.25,
    }
  }

  #[test]
  fn rejects_too_many_cascades() {
    let params = OceanParameters {
      lod_count: 17,
      ..Default::default()
    };
    assert!(matches!(
      CascadeLevelSet::new(&params),
      Err(OceanError::TooManyCascades { requested: 17, max: 16 })
    ));
  }

  #[test]
  fn texel_width_doubles_and_centers_snap() {
    let (mut ls, params) = level_set(7, 64);
    ls.update(1, Vector2::new(123.456, -78.9), scale(8.0), &params);

    assert!(approx_eq(ls.texel_width(0), 4.0 * 8.0 / 64.0, 1e-6));
    for lod in 0..ls.lod_count() - 1 {
      assert_eq!(ls.texel_width(lod + 1), 2.0 * ls.texel_width(lod));
    }
    for lod in 0..ls.lod_count() {
      let rd = ls.render_data(lod);
      for v in [rd.pos_snapped.x, rd.pos_snapped.y] {
        let r = repeat(v, rd.texel_width);
        assert!(r.min(rd.texel_width - r) < 1e-4);
      }
    }
  }

  #[test]
  fn update_is_idempotent_within_a_frame() {
    let (mut ls, params) = level_set(4, 32);
    ls.update(5, Vector2::new(1.3, 2.7), scale(8.0), &params);
    let before: Vec<RenderData> = (0..4).map(|i| *ls.render_data(i)).collect();
    let prev_before: Vec<RenderData> = (0..4).map(|i| *ls.render_data_prev(i)).collect();

    ls.update(5, Vector2::new(99.0, -50.0), scale(32.0), &params);
    for i in 0..4 {
      assert_eq!(*ls.render_data(i), before[i]);
      assert_eq!(*ls.render_data_prev(i), prev_before[i]);
    }
    assert_eq!(ls.scale(), 8.0);
  }

  #[test]
  fn scale_change_exponent_tracks_tier_shifts() {
    let (mut ls, params) = level_set(4, 32);
    ls.update(1, Vector2::new(0.0, 0.0), scale(8.0), &params);
    assert_eq!(ls.scale_change_exponent(), 0);
    ls.update(2, Vector2::new(0.0, 0.0), scale(16.0), &params);
    assert_eq!(ls.scale_change_exponent(), 1);
    ls.update(3, Vector2::new(0.0, 0.0), scale(4.0), &params);
    assert_eq!(ls.scale_change_exponent(), -2);
    assert_eq!(ls.render_data_prev(0).texel_width, 4.0 * 16.0 / 32.0);
  }

  #[test]
  fn suggest_lod_prefers_smallest_containing_cascade() {
    let (mut ls, params) = level_set(4, 32);
    ls.update(1, Vector2::new(0.0, 0.0), scale(8.0), &params);
    // lod 0 covers 32m with 1m texels

    // 20m area fits lod 0 after the one texel border and resolves 4m waves
    assert_eq!(ls.suggest_lod_for_area(&RectXZ::new(-10.0, -10.0, 20.0, 20.0)), Some(0));

    // 40m needs lod 1
    assert_eq!(ls.suggest_lod_for_area(&RectXZ::new(-20.0, -20.0, 40.0, 40.0)), Some(1));

    // a 4m area cannot resolve its waves at lod 0..2, falls through to the last lod
    assert_eq!(ls.suggest_lod_for_area(&RectXZ::new(0.0, 0.0, 4.0, 4.0)), Some(3));

    // nothing contains a 1km area
    assert_eq!(ls.suggest_lod_for_area(&RectXZ::new(0.0, 0.0, 1000.0, 1000.0)), None);
  }

  #[test]
  fn set_origin_shifts_current_and_previous() {
    let (mut ls, params) = level_set(2, 32);
    ls.update(1, Vector2::new(10.0, 10.0), scale(8.0), &params);
    let before = ls.render_data(1).pos_snapped;
    ls.set_origin(Vector2::new(4.0, -2.0));
    assert_eq!(ls.render_data(1).pos_snapped, before - Vector2::new(4.0, -2.0));
    assert_eq!(ls.render_data_prev(1).pos_snapped, before - Vector2::new(4.0, -2.0));
  }
}
