use cgmath::Vector2;

/// Axis aligned rectangle on the XZ plane. `min.y` and `max.y` are Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectXZ {
  pub min: Vector2<f32>,
  pub max: Vector2<f32>,
}

impl RectXZ {
  pub fn new(x: f32, z: f32, width: f32, height: f32) -> Self {
    Self {
      min: Vector2::new(x, z),
      max: Vector2::new(x + width, z + height),
    }
  }

  pub fn from_center(center: Vector2<f32>, half_extent: f32) -> Self {
    Self {
      min: Vector2::new(center.x - half_extent, center.y - half_extent),
      max: Vector2::new(center.x + half_extent, center.y + half_extent),
    }
  }

  pub fn width(&self) -> f32 {
    self.max.x - self.min.x
  }

  pub fn height(&self) -> f32 {
    self.max.y - self.min.y
  }

  pub fn contains(&self, point: Vector2<f32>) -> bool {
    point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
  }

  pub fn contains_rect(&self, other: &RectXZ) -> bool {
    self.contains(other.min) && self.contains(other.max)
  }

  pub fn overlaps(&self, other: &RectXZ) -> bool {
    self.min.x < other.max.x
      && other.min.x < self.max.x
      && self.min.y < other.max.y
      && other.min.y < self.max.y
  }

  pub fn shrink(&self, amount: f32) -> Self {
    Self {
      min: Vector2::new(self.min.x + amount, self.min.y + amount),
      max: Vector2::new(self.max.x - amount, self.max.y - amount),
    }
  }
}

/// Transform bookkeeping for one cascade in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderData {
  pub texel_width: f32,
  pub texture_res: u32,
  pub pos_snapped: Vector2<f32>,
  pub frame: u64,
}

impl RenderData {
  pub fn world_width(&self) -> f32 {
    self.texel_width * self.texture_res as f32
  }

  pub fn rect_xz(&self) -> RectXZ {
    RectXZ::from_center(self.pos_snapped, self.world_width() / 2.0)
  }

  /// World position of the center of texel (x, y).
  pub fn texel_to_world(&self, x: u32, y: u32) -> Vector2<f32> {
    let half = self.world_width() / 2.0;
    Vector2::new(
      self.pos_snapped.x - half + (x as f32 + 0.5) * self.texel_width,
      self.pos_snapped.y - half + (y as f32 + 0.5) * self.texel_width,
    )
  }

  /// Continuous texel coordinate of a world position, texel centers at `i + 0.5`.
  pub fn world_to_texel(&self, world: Vector2<f32>) -> Vector2<f32> {
    let half = self.world_width() / 2.0;
    Vector2::new(
      (world.x - self.pos_snapped.x + half) / self.texel_width,
      (world.y - self.pos_snapped.y + half) / self.texel_width,
    )
  }

  /// Returns false and warns when the data was computed for a frame other than `frame`.
  pub fn validate(&self, frame: u64, context: &str) -> bool {
    // frame 0 has not been written yet
    if self.frame > 0 && self.frame != frame {
      log::warn!(
        "{}: render data of frame {} read in frame {}, update functions may be called out of order",
        context,
        self.frame,
        frame
      );
      return false;
    }
    true
  }
}

impl Default for RenderData {
  fn default() -> Self {
    Self {
      texel_width: 0.0,
      texture_res: 0,
      pos_snapped: Vector2::new(0.0, 0.0),
      frame: 0,
    }
  }
}
