use cgmath::Vector2;

pub const TWO_PI: f32 = 2.0 * std::f32::consts::PI;

pub fn compute_work_group_count(
  (width, height): (u32, u32),
  (workgroup_width, workgroup_height): (u32, u32),
) -> (u32, u32) {
  let x = (width + workgroup_width - 1) / workgroup_width;
  let y = (height + workgroup_height - 1) / workgroup_height;

  return (x, y);
}

#[inline]
pub fn clamp<T: PartialOrd>(input: T, min: T, max: T) -> T {
  debug_assert!(min <= max, "min must be less than or equal to max");
  if input < min {
    min
  } else if input > max {
    max
  } else {
    input
  }
}

/// Wraps `t` into `[0, length)`, also for negative inputs.
#[inline]
pub fn repeat(t: f32, length: f32) -> f32 {
  let r = t - (t / length).floor() * length;
  // floor rounding can land exactly on `length` for tiny negative inputs
  if r >= length {
    0.0
  } else {
    r
  }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
  a + (b - a) * t
}

#[inline]
pub fn saturate(v: f32) -> f32 {
  clamp(v, 0.0, 1.0)
}

#[inline]
pub fn snap_to_texel(position: Vector2<f32>, texel_width: f32) -> Vector2<f32> {
  Vector2::new(
    position.x - repeat(position.x, texel_width),
    position.y - repeat(position.y, texel_width),
  )
}

#[cfg(test)]
pub fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
  (a - b).abs() <= epsilon
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn work_group_count_rounds_up() {
    assert_eq!(compute_work_group_count((256, 256), (8, 8)), (32, 32));
    assert_eq!(compute_work_group_count((10, 3), (8, 8)), (2, 1));
  }

  #[test]
  fn repeat_wraps_negative_values() {
    assert!(approx_eq(repeat(-0.25, 1.0), 0.75, 1e-6));
    assert!(approx_eq(repeat(7.0, TWO_PI), 7.0 - TWO_PI, 1e-5));
    assert_eq!(repeat(2.0, 2.0), 0.0);
  }

  #[test]
  fn snapping_is_texel_aligned() {
    let snapped = snap_to_texel(Vector2::new(13.37, -5.2), 0.5);
    assert!(approx_eq(snapped.x, 13.0, 1e-5));
    assert!(approx_eq(snapped.y, -5.5, 1e-5));
  }
}
