use std::cell::RefCell;
use std::rc::Rc;

use cgmath::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ocean::backend::{FrameRecorder, ResourceRef};
use crate::ocean::channel::{sample_periodic, CascadeArray};
use crate::ocean::error::OceanError;
use crate::ocean::input_registry::{DrawContributor, DrawTarget};
use crate::ocean::ocean_parameters::{OceanParameters, WaveParameters};
use crate::ocean::spectrum::{octave_index, WaveSpectrum, NUM_OCTAVES};
use crate::ocean::utils::{repeat, TWO_PI};

/// Number of wavelength buckets in the wave buffer, independent of the lod count.
pub const WAVE_CASCADE_COUNT: usize = 16;
/// Lane budget shared by all wave cascades, padding included.
pub const MAX_WAVE_COMPONENTS: usize = 1024;
pub const LANES: usize = 4;
const AMPLITUDE_EPSILON: f32 = 0.001;

const WAVE_BUFFER: &str = "wave_buffer";
const WAVE_DATA: &str = "wave_data";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveComponent {
  pub wavelength: f32,
  pub amplitude_forward: f32,
  pub amplitude_reverse: f32,
  pub direction_degrees: f32,
  pub phase_forward: f32,
  pub phase_reverse: f32,
  pub chop_scale: f32,
  pub gravity_scale: f32,
}

/// Four wave components laid out structure-of-arrays.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct WaveLanes {
  pub two_pi_over_wavelength: [f32; 4],
  pub amp: [f32; 4],
  pub wave_dir_x: [f32; 4],
  pub wave_dir_z: [f32; 4],
  pub omega: [f32; 4],
  pub phase: [f32; 4],
  pub chop_amp: [f32; 4],
  pub amp2: [f32; 4],
  pub chop_amp2: [f32; 4],
  pub phase2: [f32; 4],
}

impl WaveLanes {
  fn empty() -> Self {
    Self {
      // keeps the wave number non-zero in unused lanes
      two_pi_over_wavelength: [1.0; 4],
      amp: [0.0; 4],
      wave_dir_x: [0.0; 4],
      wave_dir_z: [0.0; 4],
      omega: [0.0; 4],
      phase: [0.0; 4],
      chop_amp: [0.0; 4],
      amp2: [0.0; 4],
      chop_amp2: [0.0; 4],
      phase2: [0.0; 4],
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WaveCascadeParams {
  /// First lane group of this cascade.
  pub start_index: usize,
  pub cumulative_variance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CascadeWaveBatches {
  pub lanes: Vec<WaveLanes>,
  pub cascades: [WaveCascadeParams; WAVE_CASCADE_COUNT + 1],
  pub first_cascade: Option<usize>,
  pub last_cascade: Option<usize>,
  /// Wave cascade of each component, `None` when it was skipped.
  pub assignments: Vec<Option<usize>>,
  pub dropped: usize,
}

impl CascadeWaveBatches {
  fn empty(component_count: usize) -> Self {
    Self {
      lanes: Vec::new(),
      cascades: [WaveCascadeParams::default(); WAVE_CASCADE_COUNT + 1],
      first_cascade: None,
      last_cascade: None,
      assignments: vec![None; component_count],
      dropped: 0,
    }
  }

  pub fn cascade_lanes(&self, cascade: usize) -> &[WaveLanes] {
    let start = self.cascades[cascade].start_index;
    let end = self.cascades[cascade + 1].start_index;
    &self.lanes[start..end]
  }

  pub fn lane_count(&self) -> usize {
    self.lanes.len() * LANES
  }

  pub fn is_active(&self, cascade: usize) -> bool {
    match (self.first_cascade, self.last_cascade) {
      (Some(first), Some(last)) => cascade >= first && cascade <= last,
      _ => false,
    }
  }
}

/// Geometry of the periodic wave cascades.
#[derive(Debug, Clone, Copy)]
pub struct WaveCascadeLayout {
  pub resolution: u32,
  pub min_texels_per_wave: f32,
}

impl WaveCascadeLayout {
  /// World size covered by one tile of a wave cascade.
  pub fn diameter(&self, cascade: usize) -> f32 {
    0.5 * (1u32 << cascade) as f32
  }

  /// Smallest wavelength a wave cascade resolves. Does not depend on the viewpoint.
  pub fn min_wavelength(&self, cascade: usize) -> f32 {
    let texel_size = self.diameter(cascade) / self.resolution as f32;
    texel_size * self.min_texels_per_wave
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxDisplacement {
  pub horizontal: f32,
  pub vertical: f32,
  pub vertical_static: f32,
}

impl Default for MaxDisplacement {
  fn default() -> Self {
    Self {
      horizontal: 0.0,
      vertical: 0.0,
      vertical_static: 0.0,
    }
  }
}

/// Samples the spectrum into components, wavelengths ascending. Deterministic for a seed.
pub fn generate_components(
  spectrum: &WaveSpectrum,
  params: &WaveParameters,
  gravity: f32,
) -> Vec<WaveComponent> {
  let mut rng = StdRng::seed_from_u64(params.random_seed);
  let cpo = params.components_per_octave;

  let (wavelengths, angles) = spectrum.generate_wave_data(cpo, &mut rng);

  let mut amplitudes = Vec::with_capacity(wavelengths.len());
  for wl in wavelengths.iter() {
    // always draw so the sequence does not depend on early outs
    let rand0 = rng.gen::<f32>();
    let a = spectrum.amplitude(*wl, cpo as f32, params.wind_speed, gravity, rand0);
    let forward = rng.gen::<f32>() * a;
    let reverse = rng.gen::<f32>() * a * params.reverse_wave_weight;
    amplitudes.push((forward, reverse));
  }

  let mut components = Vec::with_capacity(wavelengths.len());
  for octave in 0..NUM_OCTAVES {
    for i in 0..cpo {
      let index = octave * cpo + i;
      let phase_forward = TWO_PI * (i as f32 + rng.gen::<f32>()) / cpo as f32;
      let phase_reverse = TWO_PI * (i as f32 + rng.gen::<f32>()) / cpo as f32;

      components.push(WaveComponent {
        wavelength: wavelengths[index],
        amplitude_forward: amplitudes[index].0,
        amplitude_reverse: amplitudes[index].1,
        direction_degrees: params.wind_direction_deg + angles[index],
        phase_forward,
        phase_reverse,
        chop_scale: spectrum.chop_scales[octave],
        gravity_scale: spectrum.gravity_scales[octave],
      });
    }
  }

  components
}

/// Snaps a wave vector so it repeats a whole number of times across `diameter`.
fn constrain_wave_vector(k: f32, dx: f32, dz: f32, diameter: f32) -> (f32, f32, f32) {
  let cycle = TWO_PI / diameter;
  let mut n = (k * dx / cycle).round();
  let m = (k * dz / cycle).round();
  if n == 0.0 && m == 0.0 {
    // too long to tile even once, keep a single cycle along x
    n = if dx < 0.0 { -1.0 } else { 1.0 };
  }
  let kx = cycle * n;
  let kz = cycle * m;
  let k = (kx * kx + kz * kz).sqrt();
  (k, kx / k, kz / k)
}

/// Packs components into per cascade lane groups, single pass in wavelength order.
pub fn bucket_components(
  components: &[WaveComponent],
  spectrum: &WaveSpectrum,
  layout: &WaveCascadeLayout,
  gravity: f32,
  wind_speed: f32,
) -> CascadeWaveBatches {
  let mut batches = CascadeWaveBatches::empty(components.len());
  let mut cascade = 0;
  let mut output = 0;
  let mut min_wl = layout.min_wavelength(0);

  let pad = |lanes: &mut Vec<WaveLanes>, output: &mut usize| {
    while *output % LANES != 0 {
      *output += 1;
    }
    debug_assert_eq!(lanes.len() * LANES, *output);
  };

  let start = components
    .iter()
    .position(|c| c.wavelength >= min_wl)
    .unwrap_or(components.len());

  for (index, component) in components.iter().enumerate().skip(start) {
    if component.amplitude_forward < AMPLITUDE_EPSILON {
      continue;
    }

    while cascade < WAVE_CASCADE_COUNT && component.wavelength >= 2.0 * min_wl {
      pad(&mut batches.lanes, &mut output);
      cascade += 1;
      batches.cascades[cascade].start_index = output / LANES;
      min_wl *= 2.0;
    }
    if cascade == WAVE_CASCADE_COUNT {
      break;
    }

    if output >= MAX_WAVE_COMPONENTS {
      batches.dropped += 1;
      continue;
    }

    let lane = output % LANES;
    if lane == 0 {
      batches.lanes.push(WaveLanes::empty());
    }
    let group = batches.lanes.len() - 1;
    let lanes = &mut batches.lanes[group];

    let amp = component.amplitude_forward;
    let amp2 = component.amplitude_reverse;
    lanes.amp[lane] = amp;
    lanes.amp2[lane] = amp2;
    lanes.chop_amp[lane] = -component.chop_scale * spectrum.chop * amp;
    lanes.chop_amp2[lane] = -component.chop_scale * spectrum.chop * amp2;

    let angle = component.direction_degrees.to_radians();
    let g = gravity * spectrum.gravity_scale * component.gravity_scale;
    let c = (component.wavelength * g / TWO_PI).sqrt();
    let (k, dx, dz) = constrain_wave_vector(
      TWO_PI / component.wavelength,
      angle.cos(),
      angle.sin(),
      layout.diameter(cascade),
    );

    lanes.two_pi_over_wavelength[lane] = k;
    lanes.wave_dir_x[lane] = dx;
    lanes.wave_dir_z[lane] = dz;
    lanes.omega[lane] = k * c;
    lanes.phase[lane] = repeat(component.phase_forward, TWO_PI);
    lanes.phase2[lane] = repeat(component.phase_reverse, TWO_PI);

    batches.assignments[index] = Some(cascade);
    if batches.first_cascade.is_none() {
      batches.first_cascade = Some(cascade);
    }
    batches.last_cascade = Some(cascade);
    output += 1;
  }

  pad(&mut batches.lanes, &mut output);
  for c in (cascade + 1)..=WAVE_CASCADE_COUNT {
    batches.cascades[c].start_index = output / LANES;
  }

  // horizontal displacement is roughly amp * chop, divided by wavelength to normalise
  for c in 0..WAVE_CASCADE_COUNT {
    let below = if c > 0 {
      batches.cascades[c - 1].cumulative_variance
    } else {
      0.0
    };
    let wl = layout.min_wavelength(c) * 1.5;
    let amp = spectrum.amplitude(wl, 1.0, wind_speed, gravity, 1.0);
    let chop = spectrum.chop_scales[octave_index(wl)];
    batches.cascades[c].cumulative_variance = below + chop * amp / wl;
  }
  batches.cascades[WAVE_CASCADE_COUNT].cumulative_variance =
    batches.cascades[WAVE_CASCADE_COUNT - 1].cumulative_variance;

  batches
}

/// Periodic displacement tiles, one per wave cascade.
pub struct WaveBuffers {
  layout: WaveCascadeLayout,
  tiles: CascadeArray,
  first_cascade: Option<usize>,
  last_cascade: Option<usize>,
}

impl WaveBuffers {
  fn new(layout: WaveCascadeLayout) -> Self {
    Self {
      layout,
      tiles: CascadeArray::new(WAVE_CASCADE_COUNT, layout.resolution, 4),
      first_cascade: None,
      last_cascade: None,
    }
  }

  pub fn is_active(&self, cascade: usize) -> bool {
    match (self.first_cascade, self.last_cascade) {
      (Some(first), Some(last)) => cascade >= first && cascade <= last,
      _ => false,
    }
  }

  pub fn tiles(&self) -> &CascadeArray {
    &self.tiles
  }

  pub fn layout(&self) -> &WaveCascadeLayout {
    &self.layout
  }

  /// Displacement of `cascade` at a world position, tiled.
  pub fn sample(&self, cascade: usize, world: Vector2<f32>) -> [f32; 4] {
    let res = self.layout.resolution as f32;
    let diameter = self.layout.diameter(cascade);
    let coord = Vector2::new(world.x / diameter * res, world.y / diameter * res);
    sample_periodic(self.tiles.slice(cascade), self.layout.resolution, 4, coord)
  }
}

fn evaluate_gerstner(tile: &mut [f32], resolution: u32, diameter: f32, lanes: &[WaveLanes], variance_below: f32) {
  let texel = diameter / resolution as f32;

  for (i, out) in tile.chunks_mut(4).enumerate() {
    let px = ((i as u32 % resolution) as f32 + 0.5) * texel;
    let pz = ((i as u32 / resolution) as f32 + 0.5) * texel;
    let mut disp = [0.0f32; 3];

    for group in lanes {
      for l in 0..LANES {
        let k = group.two_pi_over_wavelength[l];
        let dx = group.wave_dir_x[l];
        let dz = group.wave_dir_z[l];
        let x = k * (dx * px + dz * pz);

        let (s, c) = (x - group.phase[l]).sin_cos();
        disp[0] += group.chop_amp[l] * dx * s;
        disp[1] += group.amp[l] * c;
        disp[2] += group.chop_amp[l] * dz * s;

        // counter travelling wave
        let (s2, c2) = (-x - group.phase2[l]).sin_cos();
        disp[0] -= group.chop_amp2[l] * dx * s2;
        disp[1] += group.amp2[l] * c2;
        disp[2] -= group.chop_amp2[l] * dz * s2;
      }
    }

    out[0] = disp[0];
    out[1] = disp[1];
    out[2] = disp[2];
    out[3] = variance_below;
  }
}

/// Draws one wave cascade into the lods whose band matches its wavelength.
pub struct WaveCascadeInput {
  buffers: Rc<RefCell<WaveBuffers>>,
  cascade: usize,
}

impl DrawContributor for WaveCascadeInput {
  fn is_enabled(&self) -> bool {
    self.buffers.borrow().is_active(self.cascade)
  }

  fn wavelength(&self) -> f32 {
    self.buffers.borrow().layout.min_wavelength(self.cascade)
  }

  fn draw(&self, target: &mut DrawTarget<'_>, weight: f32, _is_transition: bool) {
    let buffers = self.buffers.borrow();
    let cascade = self.cascade;
    target.for_each_texel(|world, texel| {
      let value = buffers.sample(cascade, world);
      for (v, s) in texel.iter_mut().zip(value.iter()) {
        *v += s * weight;
      }
    });
  }
}

/// Turns a spectrum into wave components and keeps the per cascade wave tiles current.
pub struct WaveSpectrumSynthesizer {
  spectrum: Option<WaveSpectrum>,
  params: WaveParameters,
  layout: WaveCascadeLayout,
  gravity: f32,

  enabled: bool,
  spectrum_changed: bool,
  wind_speed_when_generated: Option<f32>,
  seed_when_generated: Option<u64>,

  components: Vec<WaveComponent>,
  batches: CascadeWaveBatches,
  buffers: Rc<RefCell<WaveBuffers>>,

  time: f32,
  origin_offset: Vector2<f32>,
}

impl WaveSpectrumSynthesizer {
  pub fn new(spectrum: Option<WaveSpectrum>, params: WaveParameters, ocean: &OceanParameters) -> Self {
    let layout = WaveCascadeLayout {
      resolution: params.wave_resolution.max(1),
      min_texels_per_wave: ocean.min_texels_per_wave,
    };

    let mut synthesizer = Self {
      spectrum,
      params,
      layout,
      gravity: ocean.gravity,
      enabled: false,
      spectrum_changed: true,
      wind_speed_when_generated: None,
      seed_when_generated: None,
      components: Vec::new(),
      batches: CascadeWaveBatches::empty(0),
      buffers: Rc::new(RefCell::new(WaveBuffers::new(layout))),
      time: 0.0,
      origin_offset: Vector2::new(0.0, 0.0),
    };
    synthesizer.validate();
    synthesizer
  }

  fn validate(&mut self) {
    let problem = if self.spectrum.is_none() {
      Some(OceanError::MissingSpectrum)
    } else if self.params.components_per_octave == 0 {
      Some(OceanError::ZeroComponentsPerOctave)
    } else {
      None
    };

    match problem {
      Some(error) => {
        log::warn!("wave synthesis disabled: {}", error);
        self.enabled = false;
        self.clear();
      }
      None => self.enabled = true,
    }
  }

  fn clear(&mut self) {
    self.components.clear();
    self.batches = CascadeWaveBatches::empty(0);
    let mut buffers = self.buffers.borrow_mut();
    buffers.tiles.fill(0.0);
    buffers.first_cascade = None;
    buffers.last_cascade = None;
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  pub fn set_spectrum(&mut self, spectrum: Option<WaveSpectrum>) {
    self.spectrum = spectrum;
    self.spectrum_changed = true;
    self.validate();
  }

  pub fn set_parameters(&mut self, params: WaveParameters) {
    if params.components_per_octave != self.params.components_per_octave
      || params.reverse_wave_weight != self.params.reverse_wave_weight
      || params.wind_direction_deg != self.params.wind_direction_deg
    {
      self.spectrum_changed = true;
    }
    if params.wave_resolution != self.params.wave_resolution {
      self.layout.resolution = params.wave_resolution.max(1);
      *self.buffers.borrow_mut() = WaveBuffers::new(self.layout);
      self.spectrum_changed = true;
    }
    self.params = params;
    self.validate();
  }

  pub fn parameters(&self) -> &WaveParameters {
    &self.params
  }

  pub fn layout(&self) -> &WaveCascadeLayout {
    &self.layout
  }

  pub fn components(&self) -> &[WaveComponent] {
    &self.components
  }

  pub fn batches(&self) -> &CascadeWaveBatches {
    &self.batches
  }

  pub fn buffers(&self) -> Rc<RefCell<WaveBuffers>> {
    self.buffers.clone()
  }

  /// One input per wave cascade, registered against the displacement channel.
  pub fn contributors(&self) -> Vec<Rc<dyn DrawContributor>> {
    (0..WAVE_CASCADE_COUNT)
      .map(|cascade| {
        Rc::new(WaveCascadeInput {
          buffers: self.buffers.clone(),
          cascade,
        }) as Rc<dyn DrawContributor>
      })
      .collect()
  }

  fn needs_rebuild(&self) -> bool {
    let wind_changed = !self.params.wind_speed_locked
      && self.wind_speed_when_generated != Some(self.params.wind_speed);
    self.spectrum_changed
      || wind_changed
      || self.wind_speed_when_generated.is_none()
      || self.seed_when_generated != Some(self.params.random_seed)
      || !self.params.spectrum_fixed_at_runtime
  }

  /// Rebuilds the components when needed, otherwise advances their phases by `dt`.
  /// Returns the new displacement bounds when the components were rebuilt.
  pub fn update(&mut self, dt: f32) -> Option<MaxDisplacement> {
    if !self.enabled {
      return None;
    }
    self.time += dt;

    if self.needs_rebuild() {
      return Some(self.rebuild());
    }
    self.advance_phases(dt);
    None
  }

  fn rebuild(&mut self) -> MaxDisplacement {
    let spectrum = match self.spectrum.as_ref() {
      Some(spectrum) => spectrum,
      None => return MaxDisplacement::default(),
    };

    self.components = generate_components(spectrum, &self.params, self.gravity);
    self.batches = bucket_components(
      &self.components,
      spectrum,
      &self.layout,
      self.gravity,
      self.params.wind_speed,
    );
    if self.batches.dropped > 0 {
      log::warn!(
        "wave component budget of {} exceeded, dropped {} components",
        MAX_WAVE_COMPONENTS,
        self.batches.dropped
      );
    }
    log::debug!(
      "rebuilt {} wave components into cascades {:?}..={:?}",
      self.components.len(),
      self.batches.first_cascade,
      self.batches.last_cascade
    );

    // keep the waves continuous with time and origin shifts applied so far
    let time = self.time;
    self.advance_phases(time);
    let offset = self.origin_offset;
    self.shift_phases(offset);

    self.spectrum_changed = false;
    self.wind_speed_when_generated = Some(self.params.wind_speed);
    self.seed_when_generated = Some(self.params.random_seed);

    {
      let mut buffers = self.buffers.borrow_mut();
      buffers.tiles.fill(0.0);
      buffers.first_cascade = self.batches.first_cascade;
      buffers.last_cascade = self.batches.last_cascade;
    }

    self.max_displacement()
  }

  fn advance_phases(&mut self, dt: f32) {
    for group in self.batches.lanes.iter_mut() {
      for l in 0..LANES {
        let advance = repeat(group.omega[l] * dt, TWO_PI);
        group.phase[l] = repeat(group.phase[l] + advance, TWO_PI);
        group.phase2[l] = repeat(group.phase2[l] + advance, TWO_PI);
      }
    }
  }

  fn shift_phases(&mut self, delta: Vector2<f32>) {
    for group in self.batches.lanes.iter_mut() {
      for l in 0..LANES {
        let k = group.two_pi_over_wavelength[l];
        let along = k * (group.wave_dir_x[l] * delta.x + group.wave_dir_z[l] * delta.y);
        group.phase[l] = repeat(group.phase[l] - along, TWO_PI);
        group.phase2[l] = repeat(group.phase2[l] + along, TWO_PI);
      }
    }
  }

  /// Rebases the waves onto a shifted world origin.
  pub fn set_origin(&mut self, delta: Vector2<f32>) {
    self.origin_offset += delta;
    self.shift_phases(delta);
  }

  /// Evaluates the wave tiles of every cascade that received components.
  pub fn generate(&mut self, recorder: &mut FrameRecorder) {
    let (first, last) = match (self.batches.first_cascade, self.batches.last_cascade) {
      (Some(first), Some(last)) => (first, last),
      _ => return,
    };

    let mut buffers = self.buffers.borrow_mut();
    let resolution = self.layout.resolution;
    for cascade in first..=last {
      let variance_below = if cascade > 0 {
        self.batches.cascades[cascade - 1].cumulative_variance
      } else {
        0.0
      };
      evaluate_gerstner(
        buffers.tiles.slice_mut(cascade),
        resolution,
        self.layout.diameter(cascade),
        self.batches.cascade_lanes(cascade),
        variance_below,
      );
      recorder.dispatch(
        "gerstner",
        vec![ResourceRef::whole(WAVE_DATA)],
        vec![ResourceRef::slice(WAVE_BUFFER, cascade)],
        resolution,
      );
    }
  }

  /// Bounds of the synthesized displacement.
  pub fn max_displacement(&self) -> MaxDisplacement {
    let chop = self.spectrum.as_ref().map_or(1.0, |s| s.chop);
    let amp_sum: f32 = self
      .components
      .iter()
      .zip(self.batches.assignments.iter())
      .filter(|(_, assigned)| assigned.is_some())
      .map(|(c, _)| (c.amplitude_forward + c.amplitude_reverse) * c.chop_scale)
      .sum();

    MaxDisplacement {
      horizontal: amp_sum * chop,
      vertical: amp_sum,
      vertical_static: amp_sum,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ocean::spectrum::MIN_POWER_LOG;
  use crate::ocean::utils::approx_eq;

  fn layout() -> WaveCascadeLayout {
    WaveCascadeLayout {
      resolution: 32,
      min_texels_per_wave: 3.0,
    }
  }

  fn params(seed: u64) -> WaveParameters {
    WaveParameters {
      random_seed: seed,
      wave_resolution: 32,
      ..Default::default()
    }
  }

  #[test]
  fn components_are_sorted_by_wavelength() {
    let components = generate_components(&WaveSpectrum::default(), &params(3), 9.81);
    assert_eq!(components.len(), NUM_OCTAVES * 8);
    assert!(components.windows(2).all(|w| w[0].wavelength <= w[1].wavelength));
  }

  #[test]
  fn every_kept_component_lands_in_its_band() {
    let spectrum = WaveSpectrum::default();
    let components = generate_components(&spectrum, &params(11), 9.81);
    let batches = bucket_components(&components, &spectrum, &layout(), 9.81, 10.0);

    let mut assigned = 0;
    for (component, cascade) in components.iter().zip(batches.assignments.iter()) {
      if let Some(c) = cascade {
        let min = layout().min_wavelength(*c);
        assert!(component.wavelength >= min && component.wavelength < 2.0 * min);
        assert!(component.amplitude_forward >= AMPLITUDE_EPSILON);
        assigned += 1;
      }
    }
    assert!(assigned > 0);
    assert!(batches.lane_count() <= MAX_WAVE_COMPONENTS);
    assert_eq!(batches.lane_count() % LANES, 0);

    let first = batches.first_cascade.unwrap();
    let last = batches.last_cascade.unwrap();
    assert!(first <= last);
    for c in 0..WAVE_CASCADE_COUNT {
      if c < first || c > last {
        assert!(batches.cascade_lanes(c).is_empty());
      }
    }
  }

  #[test]
  fn padding_lanes_are_inert() {
    let spectrum = WaveSpectrum::default();
    let components = generate_components(&spectrum, &params(5), 9.81);
    let batches = bucket_components(&components, &spectrum, &layout(), 9.81, 10.0);
    for group in batches.lanes.iter() {
      for l in 0..LANES {
        if group.amp[l] == 0.0 && group.amp2[l] == 0.0 {
          assert_eq!(group.two_pi_over_wavelength[l], 1.0);
          assert_eq!(group.chop_amp[l], 0.0);
        }
      }
    }
  }

  #[test]
  fn bucketing_is_deterministic() {
    let spectrum = WaveSpectrum::default();
    let a = bucket_components(&generate_components(&spectrum, &params(42), 9.81), &spectrum, &layout(), 9.81, 10.0);
    let b = bucket_components(&generate_components(&spectrum, &params(42), 9.81), &spectrum, &layout(), 9.81, 10.0);
    assert_eq!(a, b);

    let c = bucket_components(&generate_components(&spectrum, &params(43), 9.81), &spectrum, &layout(), 9.81, 10.0);
    assert_ne!(a.lanes, c.lanes);
  }

  #[test]
  fn wave_vectors_tile_their_cascade() {
    let spectrum = WaveSpectrum::default();
    let components = generate_components(&spectrum, &params(1), 9.81);
    let batches = bucket_components(&components, &spectrum, &layout(), 9.81, 10.0);
    for c in 0..WAVE_CASCADE_COUNT {
      let cycle = TWO_PI / layout().diameter(c);
      for group in batches.cascade_lanes(c) {
        for l in 0..LANES {
          if group.amp[l] == 0.0 {
            continue;
          }
          let kx = group.two_pi_over_wavelength[l] * group.wave_dir_x[l] / cycle;
          let kz = group.two_pi_over_wavelength[l] * group.wave_dir_z[l] / cycle;
          assert!(approx_eq(kx, kx.round(), 1e-2));
          assert!(approx_eq(kz, kz.round(), 1e-2));
        }
      }
    }
  }

  #[test]
  fn budget_overflow_drops_components() {
    let spectrum = WaveSpectrum::default();
    let dense = WaveParameters {
      components_per_octave: 256,
      ..params(9)
    };
    let components = generate_components(&spectrum, &dense, 9.81);
    let batches = bucket_components(&components, &spectrum, &layout(), 9.81, 10.0);
    assert!(batches.dropped > 0);
    assert_eq!(batches.lane_count(), MAX_WAVE_COMPONENTS);
  }

  #[test]
  fn silent_spectrum_produces_no_cascades() {
    let spectrum = WaveSpectrum::single_octave(5, MIN_POWER_LOG);
    let calm = WaveParameters {
      wind_speed: 0.0,
      ..params(2)
    };
    let components = generate_components(&spectrum, &calm, 9.81);
    assert!(components.iter().all(|c| c.amplitude_forward < AMPLITUDE_EPSILON));
    let batches = bucket_components(&components, &spectrum, &layout(), 9.81, 0.0);
    assert_eq!(batches.first_cascade, None);
    assert_eq!(batches.last_cascade, None);
    assert!(batches.lanes.is_empty());
  }

  #[test]
  fn missing_spectrum_disables_synthesis() {
    let mut synthesizer = WaveSpectrumSynthesizer::new(None, params(0), &OceanParameters::default());
    assert!(!synthesizer.is_enabled());
    assert!(synthesizer.update(0.1).is_none());

    synthesizer.set_spectrum(Some(WaveSpectrum::default()));
    assert!(synthesizer.is_enabled());

    let zero = WaveParameters {
      components_per_octave: 0,
      ..params(0)
    };
    synthesizer.set_parameters(zero);
    assert!(!synthesizer.is_enabled());
  }

  #[test]
  fn rebuild_only_on_trigger() {
    let mut synthesizer =
      WaveSpectrumSynthesizer::new(Some(WaveSpectrum::default()), params(4), &OceanParameters::default());
    let first = synthesizer.update(0.016);
    assert!(first.map_or(false, |d| d.vertical > 0.0));
    assert!(synthesizer.update(0.016).is_none());

    let mut windier = *synthesizer.parameters();
    windier.wind_speed = 15.0;
    synthesizer.set_parameters(windier);
    assert!(synthesizer.update(0.016).is_some());

    let mut locked = *synthesizer.parameters();
    locked.wind_speed_locked = true;
    locked.wind_speed = 4.0;
    synthesizer.set_parameters(locked);
    assert!(synthesizer.update(0.016).is_none());
  }

  #[test]
  fn phases_advance_and_stay_wrapped() {
    let mut synthesizer =
      WaveSpectrumSynthesizer::new(Some(WaveSpectrum::default()), params(8), &OceanParameters::default());
    synthesizer.update(0.0);
    let before = synthesizer.batches().lanes.clone();
    for _ in 0..100 {
      synthesizer.update(0.5);
    }
    let after = &synthesizer.batches().lanes;
    for (b, a) in before.iter().zip(after.iter()) {
      for l in 0..LANES {
        assert!(a.phase[l] >= 0.0 && a.phase[l] < TWO_PI);
        let expected = repeat(b.phase[l] + repeat(a.omega[l] * 0.5, TWO_PI) * 100.0, TWO_PI);
        let diff = (a.phase[l] - expected).abs();
        assert!(diff < 1e-2 || (TWO_PI - diff) < 1e-2);
      }
    }
  }

  #[test]
  fn origin_shift_preserves_surface() {
    let mut recorder = FrameRecorder::default();
    let mut synthesizer =
      WaveSpectrumSynthesizer::new(Some(WaveSpectrum::default()), params(12), &OceanParameters::default());
    synthesizer.update(0.0);
    synthesizer.generate(&mut recorder);
    assert!(recorder.position("gerstner").is_some());
    let c = synthesizer.batches().first_cascade.unwrap();
    let diameter = synthesizer.layout().diameter(c);
    let texel = diameter / 32.0;

    // a texel center before the shift
    let world = Vector2::new(3.5 * texel, 7.5 * texel);
    let before = synthesizer.buffers().borrow().sample(c, world);

    let delta = Vector2::new(2.0 * texel, -texel);
    synthesizer.set_origin(delta);
    synthesizer.update(0.0);
    synthesizer.generate(&mut recorder);
    let after = synthesizer.buffers().borrow().sample(c, world - delta);

    for i in 0..3 {
      assert!(approx_eq(before[i], after[i], 1e-3));
    }
  }
}
