use cgmath::Vector3;

use crate::ocean::ocean_parameters::OceanParameters;

/// Provides the world position the cascades are centered on.
pub trait Viewpoint {
  fn position(&self) -> Vector3<f32>;

  /// Explicit ocean scale. When `None` the scale is derived from altitude.
  fn ocean_scale(&self) -> Option<f32> {
    None
  }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedViewpoint {
  pub position: Vector3<f32>,
  pub scale: Option<f32>,
}

impl FixedViewpoint {
  pub fn new(x: f32, y: f32, z: f32) -> Self {
    Self {
      position: Vector3::new(x, y, z),
      scale: None,
    }
  }

  pub fn with_scale(mut self, scale: f32) -> Self {
    self.scale = Some(scale);
    self
  }
}

impl Viewpoint for FixedViewpoint {
  fn position(&self) -> Vector3<f32> {
    self.position
  }

  fn ocean_scale(&self) -> Option<f32> {
    self.scale
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerScale {
  /// Power of two ocean scale.
  pub scale: f32,
  /// Progress through the current scale tier, in [0, 1).
  pub altitude_alpha: f32,
}

pub fn viewer_scale(
  params: &OceanParameters,
  viewpoint: &dyn Viewpoint,
  max_vertical_displacement: f32,
) -> ViewerScale {
  if let Some(scale) = viewpoint.ocean_scale() {
    return ViewerScale {
      scale: scale.max(f32::MIN_POSITIVE),
      altitude_alpha: 0.0,
    };
  }

  let mut level = (viewpoint.position().y - params.sea_level).abs();
  if params.drop_detail_height_based_on_waves {
    level = (level - max_vertical_displacement).max(0.0);
  }

  // offset level so that scale stays at the minimum close to the surface
  level = (level - 4.0).max(0.0);

  let min_scale = if params.min_scale < 0.0 {
    f32::MIN_POSITIVE
  } else {
    params.min_scale
  };
  let max_scale = if params.max_scale < 0.0 {
    f32::MAX
  } else {
    1.99 * params.max_scale
  };
  level = level.max(min_scale).min(max_scale).max(f32::MIN_POSITIVE);

  let l2 = level.log2();
  let l2f = l2.floor();

  return ViewerScale {
    scale: 2f32.powf(l2f),
    altitude_alpha: l2 - l2f,
  };
}

pub fn scale_could_decrease(params: &OceanParameters, scale: f32) -> bool {
  params.min_scale == -1.0 || scale > params.min_scale * 1.01
}

pub fn scale_could_increase(params: &OceanParameters, scale: f32) -> bool {
  params.max_scale == -1.0 || scale < params.max_scale * 0.99
}
