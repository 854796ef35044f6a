use std::rc::Rc;

use cgmath::Vector2;

use crate::ocean::cascade::{RectXZ, RenderData};

/// The cascade slice a contributor draws into.
pub struct DrawTarget<'a> {
  pub lod: usize,
  pub render_data: RenderData,
  pub components: usize,
  pub time: f32,
  pub data: &'a mut [f32],
}

impl<'a> DrawTarget<'a> {
  pub fn resolution(&self) -> u32 {
    self.render_data.texture_res
  }

  pub fn texel_mut(&mut self, x: u32, y: u32) -> &mut [f32] {
    let offset = ((y * self.render_data.texture_res + x) as usize) * self.components;
    &mut self.data[offset..offset + self.components]
  }

  /// Visits every texel with its world position.
  pub fn for_each_texel(&mut self, mut f: impl FnMut(Vector2<f32>, &mut [f32])) {
    let res = self.render_data.texture_res;
    let rd = self.render_data;
    for (i, texel) in self.data.chunks_mut(self.components).enumerate() {
      let x = i as u32 % res;
      let y = i as u32 / res;
      f(rd.texel_to_world(x, y), texel);
    }
  }
}

/// Something that injects data into a channel.
pub trait DrawContributor {
  fn is_enabled(&self) -> bool {
    true
  }

  /// Preferred wavelength, 0 for no preference.
  fn wavelength(&self) -> f32 {
    0.0
  }

  /// World footprint, `None` for unbounded.
  fn bounds(&self) -> Option<RectXZ> {
    None
  }

  fn draw(&self, target: &mut DrawTarget<'_>, weight: f32, is_transition: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputHandle(u64);

struct RegisteredInput {
  handle: InputHandle,
  queue: i32,
  contributor: Rc<dyn DrawContributor>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterResult {
  pub weight: f32,
  pub is_transition: bool,
}

impl FilterResult {
  const SKIP: FilterResult = FilterResult {
    weight: 0.0,
    is_transition: false,
  };
}

/// Wavelength band of the cascade being drawn.
#[derive(Debug, Clone, Copy)]
pub struct WavelengthFilter {
  pub lod: usize,
  pub lod_count: usize,
  pub lod_min_wavelength: f32,
  pub lod_max_wavelength: f32,
  pub global_max_wavelength: f32,
  pub altitude_alpha: f32,
}

impl WavelengthFilter {
  pub fn filter(&self, wavelength: f32) -> FilterResult {
    // drawn in the no preference pass instead
    if wavelength == 0.0 {
      return FilterResult::SKIP;
    }

    if wavelength < self.lod_min_wavelength {
      return FilterResult::SKIP;
    }

    // the largest waves feather across the last two cascades so they do not pop on a scale change
    if wavelength >= self.global_max_wavelength / 2.0 {
      if self.lod_count == 1 {
        return FilterResult {
          weight: 1.0,
          is_transition: false,
        };
      }
      if self.lod + 2 == self.lod_count {
        return FilterResult {
          weight: 1.0 - self.altitude_alpha,
          is_transition: true,
        };
      }
      if self.lod + 1 == self.lod_count {
        return FilterResult {
          weight: self.altitude_alpha,
          is_transition: false,
        };
      }
    } else if wavelength < self.lod_max_wavelength {
      return FilterResult {
        weight: 1.0,
        is_transition: false,
      };
    }

    FilterResult::SKIP
  }
}

/// Contributors registered against one channel, kept in draw order.
#[derive(Default)]
pub struct InputRegistry {
  inputs: Vec<RegisteredInput>,
  next_id: u64,
}

impl InputRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Lower queues draw first. Within a queue, earlier registrations draw first.
  pub fn register(&mut self, queue: i32, contributor: Rc<dyn DrawContributor>) -> InputHandle {
    let handle = InputHandle(self.next_id);
    self.next_id += 1;

    let position = self.inputs.iter().position(|i| i.queue > queue).unwrap_or(self.inputs.len());
    self.inputs.insert(
      position,
      RegisteredInput {
        handle,
        queue,
        contributor,
      },
    );
    handle
  }

  pub fn deregister(&mut self, handle: InputHandle) -> bool {
    let before = self.inputs.len();
    self.inputs.retain(|i| i.handle != handle);
    self.inputs.len() != before
  }

  pub fn len(&self) -> usize {
    self.inputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inputs.is_empty()
  }

  fn visible<'s>(&'s self, rect: RectXZ) -> impl Iterator<Item = &'s Rc<dyn DrawContributor>> + 's {
    self.inputs.iter().map(|i| &i.contributor).filter(move |c| {
      c.is_enabled() && c.bounds().map_or(true, |b| b.overlaps(&rect))
    })
  }

  /// Draws contributors with a wavelength preference, weighted by `filter`. Returns the draw count.
  pub fn draw_filtered(&self, target: &mut DrawTarget<'_>, filter: &WavelengthFilter) -> usize {
    let mut count = 0;
    for contributor in self.visible(target.render_data.rect_xz()) {
      let result = filter.filter(contributor.wavelength());
      if result.weight > 0.0 {
        contributor.draw(target, result.weight, result.is_transition);
        count += 1;
      }
    }
    count
  }

  /// Draws contributors without a wavelength preference at full weight.
  pub fn draw_no_preference(&self, target: &mut DrawTarget<'_>) -> usize {
    let mut count = 0;
    for contributor in self.visible(target.render_data.rect_xz()) {
      if contributor.wavelength() == 0.0 {
        contributor.draw(target, 1.0, false);
        count += 1;
      }
    }
    count
  }

  /// Draws every contributor at full weight regardless of wavelength.
  pub fn draw_all(&self, target: &mut DrawTarget<'_>) -> usize {
    let mut count = 0;
    for contributor in self.visible(target.render_data.rect_xz()) {
      contributor.draw(target, 1.0, false);
      count += 1;
    }
    count
  }
}

/// Adds a constant value over an axis aligned region, or everywhere when unbounded.
pub struct RectInput {
  pub value: [f32; 4],
  pub rect: Option<RectXZ>,
  pub wavelength: f32,
  /// Overwrite instead of adding.
  pub replace: bool,
}

impl RectInput {
  pub fn new(value: [f32; 4]) -> Self {
    Self {
      value,
      rect: None,
      wavelength: 0.0,
      replace: false,
    }
  }

  pub fn with_rect(mut self, rect: RectXZ) -> Self {
    self.rect = Some(rect);
    self
  }

  pub fn with_wavelength(mut self, wavelength: f32) -> Self {
    self.wavelength = wavelength;
    self
  }

  pub fn replacing(mut self) -> Self {
    self.replace = true;
    self
  }
}

impl DrawContributor for RectInput {
  fn wavelength(&self) -> f32 {
    self.wavelength
  }

  fn bounds(&self) -> Option<RectXZ> {
    self.rect
  }

  fn draw(&self, target: &mut DrawTarget<'_>, weight: f32, _is_transition: bool) {
    let rect = self.rect;
    let value = self.value;
    let replace = self.replace;
    target.for_each_texel(|world, texel| {
      if rect.map_or(true, |r| r.contains(world)) {
        for (c, v) in texel.iter_mut().enumerate() {
          let input = value.get(c).copied().unwrap_or(0.0) * weight;
          *v = if replace { input } else { *v + input };
        }
      }
    });
  }
}
