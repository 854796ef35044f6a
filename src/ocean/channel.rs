use cgmath::Vector2;

use crate::ocean::cascade::RenderData;

/// Depth written into cleared sea floor depth texels, far from any shoreline.
pub const DEEP_WATER_DEPTH: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
  AnimatedWaves,
  DynamicWaves,
  Foam,
  Flow,
  SeaFloorDepth,
  Shadow,
}

impl ChannelKind {
  pub const ALL: [ChannelKind; 6] = [
    ChannelKind::AnimatedWaves,
    ChannelKind::DynamicWaves,
    ChannelKind::Foam,
    ChannelKind::Flow,
    ChannelKind::SeaFloorDepth,
    ChannelKind::Shadow,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      ChannelKind::AnimatedWaves => "animated_waves",
      ChannelKind::DynamicWaves => "dynamic_waves",
      ChannelKind::Foam => "foam",
      ChannelKind::Flow => "flow",
      ChannelKind::SeaFloorDepth => "sea_floor_depth",
      ChannelKind::Shadow => "shadow",
    }
  }

  pub fn format(&self) -> ChannelFormat {
    let components = match self {
      // displacement xyz, w is the variance of unresolved waves
      ChannelKind::AnimatedWaves => 4,
      // height now and height at the previous substep
      ChannelKind::DynamicWaves => 2,
      ChannelKind::Foam => 1,
      ChannelKind::Flow => 2,
      ChannelKind::SeaFloorDepth => 1,
      ChannelKind::Shadow => 2,
    };
    ChannelFormat { components }
  }

  pub fn needs_read_write(&self) -> bool {
    matches!(self, ChannelKind::DynamicWaves | ChannelKind::Foam)
  }

  pub fn clear_value(&self) -> f32 {
    match self {
      ChannelKind::SeaFloorDepth => DEEP_WATER_DEPTH,
      _ => 0.0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFormat {
  pub components: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
  Uninitialized,
  Active,
  Disabled,
}

/// One value slice per cascade, each `resolution * resolution * components` floats.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeArray {
  resolution: u32,
  components: usize,
  slices: Vec<Vec<f32>>,
}

impl CascadeArray {
  pub fn new(count: usize, resolution: u32, components: usize) -> Self {
    let len = (resolution * resolution) as usize * components;
    Self {
      resolution,
      components,
      slices: vec![vec![0.0; len]; count],
    }
  }

  pub fn resolution(&self) -> u32 {
    self.resolution
  }

  pub fn components(&self) -> usize {
    self.components
  }

  pub fn count(&self) -> usize {
    self.slices.len()
  }

  pub fn slice(&self, index: usize) -> &[f32] {
    &self.slices[index]
  }

  pub fn slice_mut(&mut self, index: usize) -> &mut [f32] {
    &mut self.slices[index]
  }

  /// Mutable slice `index` together with read access to the slice above it.
  pub fn slice_and_coarser(&mut self, index: usize) -> (&mut [f32], Option<&[f32]>) {
    let (lower, upper) = self.slices.split_at_mut(index + 1);
    (lower[index].as_mut_slice(), upper.first().map(|s| s.as_slice()))
  }

  pub fn texel(&self, index: usize, x: u32, y: u32) -> &[f32] {
    let offset = ((y * self.resolution + x) as usize) * self.components;
    &self.slices[index][offset..offset + self.components]
  }

  pub fn fill_slice(&mut self, index: usize, value: f32) {
    self.slices[index].iter_mut().for_each(|v| *v = value);
  }

  pub fn fill(&mut self, value: f32) {
    for slice in self.slices.iter_mut() {
      slice.iter_mut().for_each(|v| *v = value);
    }
  }
}

/// Bilinear fetch at a continuous texel coordinate (texel centers at `i + 0.5`), clamped to the edge.
pub fn sample_bilinear(data: &[f32], resolution: u32, components: usize, coord: Vector2<f32>) -> [f32; 4] {
  let max = (resolution - 1) as f32;
  let fx = (coord.x - 0.5).max(0.0).min(max);
  let fy = (coord.y - 0.5).max(0.0).min(max);
  let x0 = fx.floor() as u32;
  let y0 = fy.floor() as u32;
  let x1 = (x0 + 1).min(resolution - 1);
  let y1 = (y0 + 1).min(resolution - 1);
  let tx = fx - x0 as f32;
  let ty = fy - y0 as f32;

  let fetch = |x: u32, y: u32, c: usize| data[((y * resolution + x) as usize) * components + c];

  let mut out = [0.0; 4];
  for c in 0..components.min(4) {
    let top = fetch(x0, y0, c) * (1.0 - tx) + fetch(x1, y0, c) * tx;
    let bottom = fetch(x0, y1, c) * (1.0 - tx) + fetch(x1, y1, c) * tx;
    out[c] = top * (1.0 - ty) + bottom * ty;
  }
  out
}

/// Bilinear fetch from a tile that repeats every `resolution` texels in both axes.
pub fn sample_periodic(data: &[f32], resolution: u32, components: usize, coord: Vector2<f32>) -> [f32; 4] {
  let res = resolution as f32;
  let fx = coord.x - 0.5;
  let fy = coord.y - 0.5;
  let x0f = fx.floor();
  let y0f = fy.floor();
  let tx = fx - x0f;
  let ty = fy - y0f;
  let wrap = |v: f32| (v.rem_euclid(res) as u32).min(resolution - 1);
  let x0 = wrap(x0f);
  let y0 = wrap(y0f);
  let x1 = (x0 + 1) % resolution;
  let y1 = (y0 + 1) % resolution;

  let fetch = |x: u32, y: u32, c: usize| data[((y * resolution + x) as usize) * components + c];

  let mut out = [0.0; 4];
  for c in 0..components.min(4) {
    let top = fetch(x0, y0, c) * (1.0 - tx) + fetch(x1, y0, c) * tx;
    let bottom = fetch(x0, y1, c) * (1.0 - tx) + fetch(x1, y1, c) * tx;
    out[c] = top * (1.0 - ty) + bottom * ty;
  }
  out
}

/// Samples a cascade slice at a world position. Positions outside the cascade footprint read zero.
pub fn sample_world(data: &[f32], render_data: &RenderData, components: usize, world: Vector2<f32>) -> [f32; 4] {
  if !render_data.rect_xz().contains(world) {
    return [0.0; 4];
  }
  let coord = render_data.world_to_texel(world);
  sample_bilinear(data, render_data.texture_res, components, coord)
}

/// Storage for one channel. Read/write channels keep two slots and flip between them.
#[derive(Debug)]
pub struct ChannelBuffer {
  format: ChannelFormat,
  needs_read_write: bool,
  slots: Vec<CascadeArray>,
  current: usize,
}

impl ChannelBuffer {
  pub fn new(kind: ChannelKind, lod_count: usize, resolution: u32) -> Self {
    let format = kind.format();
    let needs_read_write = kind.needs_read_write();
    let slot_count = if needs_read_write { 2 } else { 1 };
    let mut slots: Vec<CascadeArray> = (0..slot_count)
      .map(|_| CascadeArray::new(lod_count, resolution, format.components))
      .collect();
    for slot in slots.iter_mut() {
      slot.fill(kind.clear_value());
    }

    Self {
      format,
      needs_read_write,
      slots,
      current: 0,
    }
  }

  pub fn format(&self) -> ChannelFormat {
    self.format
  }

  pub fn needs_read_write(&self) -> bool {
    self.needs_read_write
  }

  pub fn current(&self) -> &CascadeArray {
    &self.slots[self.current]
  }

  pub fn current_mut(&mut self) -> &mut CascadeArray {
    &mut self.slots[self.current]
  }

  pub fn previous(&self) -> Option<&CascadeArray> {
    if self.needs_read_write {
      Some(&self.slots[1 - self.current])
    } else {
      None
    }
  }

  pub fn current_slot(&self) -> usize {
    self.current
  }

  /// Flips which slot is current. No data moves.
  pub fn swap(&mut self) {
    if self.needs_read_write {
      self.current = 1 - self.current;
    }
  }

  /// The previous slot to read from and the current slot to write into.
  pub fn source_and_target(&mut self) -> Option<(&CascadeArray, &mut CascadeArray)> {
    if !self.needs_read_write {
      return None;
    }
    let (first, second) = self.slots.split_at_mut(1);
    if self.current == 0 {
      Some((&second[0], &mut first[0]))
    } else {
      Some((&first[0], &mut second[0]))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ocean::utils::approx_eq;

  #[test]
  fn swap_flips_slots_without_copying() {
    let mut buffer = ChannelBuffer::new(ChannelKind::Foam, 2, 8);
    assert_eq!(buffer.current_slot(), 0);
    {
      let (_, target) = buffer.source_and_target().unwrap();
      target.fill_slice(1, 3.0);
    }
    assert_eq!(buffer.current().slice(1)[0], 3.0);

    buffer.swap();
    assert_eq!(buffer.current_slot(), 1);
    assert_eq!(buffer.current().slice(1)[0], 0.0);
    assert_eq!(buffer.previous().unwrap().slice(1)[0], 3.0);
  }

  #[test]
  fn single_slot_channels_do_not_swap() {
    let mut buffer = ChannelBuffer::new(ChannelKind::SeaFloorDepth, 1, 8);
    buffer.swap();
    assert_eq!(buffer.current_slot(), 0);
    assert!(buffer.previous().is_none());
    assert!(buffer.source_and_target().is_none());
    assert_eq!(buffer.current().slice(0)[5], DEEP_WATER_DEPTH);
  }

  #[test]
  fn bilinear_sampling_interpolates_between_centers() {
    // 2x2 single component tile
    let data = [0.0, 1.0, 2.0, 3.0];
    let v = sample_bilinear(&data, 2, 1, Vector2::new(1.0, 1.0));
    assert!(approx_eq(v[0], 1.5, 1e-6));
    let corner = sample_bilinear(&data, 2, 1, Vector2::new(-4.0, -4.0));
    assert_eq!(corner[0], 0.0);

    let wrapped = sample_periodic(&data, 2, 1, Vector2::new(2.0, 0.5));
    assert!(approx_eq(wrapped[0], 0.5, 1e-6));
  }

  #[test]
  fn world_sampling_reads_zero_outside_footprint() {
    let rd = RenderData {
      texel_width: 1.0,
      texture_res: 4,
      pos_snapped: Vector2::new(0.0, 0.0),
      frame: 1,
    };
    let data = vec![2.0; 16];
    assert_eq!(sample_world(&data, &rd, 1, Vector2::new(0.3, -1.2))[0], 2.0);
    assert_eq!(sample_world(&data, &rd, 1, Vector2::new(10.0, 0.0))[0], 0.0);
  }
}
