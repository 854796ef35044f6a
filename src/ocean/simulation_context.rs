use std::rc::Rc;

use cgmath::Vector2;

use crate::ocean::backend::{DispatchRecord, FrameRecorder, ResourceRef};
use crate::ocean::cascade::RectXZ;
use crate::ocean::cascade_level_set::CascadeLevelSet;
use crate::ocean::channel::{ChannelKind, ChannelState};
use crate::ocean::channel_store::ChannelStore;
use crate::ocean::combine::{DynamicWavesFold, FlowFold};
use crate::ocean::error::Result;
use crate::ocean::input_registry::{DrawContributor, InputHandle};
use crate::ocean::ocean_parameters::{
  DynamicWaveParameters, FlowParameters, FoamParameters, OceanParameters, WaveParameters,
};
use crate::ocean::persistent_sim::SimInputs;
use crate::ocean::spectrum::WaveSpectrum;
use crate::ocean::viewpoint::{viewer_scale, Viewpoint};
use crate::ocean::wave_synthesizer::{MaxDisplacement, WaveSpectrumSynthesizer};

/// Receives the displacement bounds after every frame.
pub trait MaxDisplacementListener {
  fn report_max_displacement(&self, horizontal: f32, vertical: f32, vertical_static: f32);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimulationSettings {
  pub ocean: OceanParameters,
  pub waves: WaveParameters,
  pub foam: FoamParameters,
  pub dynamic_waves: DynamicWaveParameters,
  pub flow: FlowParameters,
}

/// Runs the whole per frame pipeline for one ocean.
pub struct SimulationContext {
  settings: SimulationSettings,
  level_set: CascadeLevelSet,
  synthesizer: WaveSpectrumSynthesizer,
  channels: ChannelStore,
  recorder: FrameRecorder,
  listeners: Vec<Rc<dyn MaxDisplacementListener>>,

  frame: u64,
  time: f32,
  max_displacement: MaxDisplacement,
}

impl SimulationContext {
  pub fn new(settings: SimulationSettings, spectrum: Option<WaveSpectrum>) -> Result<Self> {
    let level_set = CascadeLevelSet::new(&settings.ocean)?;
    let synthesizer = WaveSpectrumSynthesizer::new(spectrum, settings.waves, &settings.ocean);
    let mut channels = ChannelStore::new(&settings.ocean, settings.dynamic_waves, settings.foam);

    for contributor in synthesizer.contributors() {
      channels.animated_waves.registry_mut().register(0, contributor);
    }

    log::info!(
      "ocean with {} cascades of {}x{}",
      settings.ocean.lod_count,
      settings.ocean.lod_resolution,
      settings.ocean.lod_resolution
    );

    Ok(Self {
      settings,
      level_set,
      synthesizer,
      channels,
      recorder: FrameRecorder::default(),
      listeners: Vec::new(),
      frame: 0,
      time: 0.0,
      max_displacement: MaxDisplacement::default(),
    })
  }

  pub fn update(&mut self, viewpoint: &dyn Viewpoint, dt: f32) {
    let dt = dt.max(0.0);
    self.frame += 1;
    self.time += dt;
    self.recorder.begin_frame(self.frame);

    let ocean = self.settings.ocean;
    let scale = viewer_scale(&ocean, viewpoint, self.max_displacement.vertical);
    let position = viewpoint.position();
    self
      .level_set
      .update(self.frame, Vector2::new(position.x, position.z), scale, &ocean);
    self.recorder.marker("update_level_set", Vec::new());

    if let Some(report) = self.synthesizer.update(dt) {
      self.max_displacement = report;
    }

    let level_set = &self.level_set;
    let recorder = &mut self.recorder;
    let time = self.time;
    let ChannelStore {
      animated_waves,
      dynamic_waves,
      foam,
      flow,
      sea_floor_depth,
      shadow,
    } = &mut self.channels;

    sea_floor_depth.update(level_set, time, recorder);
    flow.update(level_set, time, recorder);
    shadow.update(level_set, time, recorder);

    self.synthesizer.generate(recorder);

    let inputs = SimInputs {
      level_set,
      displacement: Some(animated_waves.current()),
      depth: sea_floor_depth.current(),
    };
    let substeps = dynamic_waves.update(dt, &inputs, recorder);
    foam.update(dt, &inputs, recorder);
    log::debug!("frame {}: {} dynamic wave substeps", self.frame, substeps);

    animated_waves.draw_lod_inputs(level_set, time, recorder);

    let dynamic_fold = dynamic_waves.current().map(|data| DynamicWavesFold {
      data,
      active: (0..level_set.lod_count()).map(|lod| dynamic_waves.is_lod_active(lod)).collect(),
      params: *dynamic_waves.kernel().parameters(),
    });
    let flow_fold = flow.current().map(|data| FlowFold {
      data,
      period: self.settings.flow.flow_period.max(f32::EPSILON),
      time,
    });
    animated_waves.combine(level_set, dynamic_fold, flow_fold, recorder);
    animated_waves.draw_no_preference(level_set, time, recorder);

    let d = self.max_displacement;
    for listener in self.listeners.iter() {
      listener.report_max_displacement(d.horizontal, d.vertical, d.vertical_static);
    }
    recorder.marker("report_max_displacement", vec![ResourceRef::whole("max_displacement")]);
  }

  /// Rebases every stored world position after a floating origin shift.
  pub fn set_origin(&mut self, delta: Vector2<f32>) {
    self.level_set.set_origin(delta);
    self.synthesizer.set_origin(delta);
  }

  pub fn data_buffer(&self, kind: ChannelKind, lod: usize) -> Option<&[f32]> {
    self.channels.data_buffer(kind, lod)
  }

  pub fn suggest_lod_for_area(&self, rect: &RectXZ) -> Option<usize> {
    self.level_set.suggest_lod_for_area(rect)
  }

  pub fn max_displacement(&self) -> MaxDisplacement {
    self.max_displacement
  }

  pub fn add_listener(&mut self, listener: Rc<dyn MaxDisplacementListener>) {
    self.listeners.push(listener);
  }

  pub fn register_input(&mut self, kind: ChannelKind, queue: i32, contributor: Rc<dyn DrawContributor>) -> InputHandle {
    self.channels.registry_mut(kind).register(queue, contributor)
  }

  pub fn deregister_input(&mut self, kind: ChannelKind, handle: InputHandle) -> bool {
    self.channels.registry_mut(kind).deregister(handle)
  }

  pub fn set_channel_enabled(&mut self, kind: ChannelKind, enabled: bool) {
    self.channels.set_enabled(kind, enabled);
  }

  pub fn channel_state(&self, kind: ChannelKind) -> ChannelState {
    self.channels.state(kind)
  }

  pub fn set_spectrum(&mut self, spectrum: Option<WaveSpectrum>) {
    self.synthesizer.set_spectrum(spectrum);
  }

  pub fn set_wave_parameters(&mut self, params: WaveParameters) {
    self.settings.waves = params;
    self.synthesizer.set_parameters(params);
  }

  pub fn set_foam_parameters(&mut self, params: FoamParameters) {
    self.settings.foam = params;
    self.channels.foam.kernel_mut().set_parameters(params);
  }

  pub fn set_dynamic_wave_parameters(&mut self, params: DynamicWaveParameters) {
    self.settings.dynamic_waves = params;
    self.channels.dynamic_waves.kernel_mut().set_parameters(params);
  }

  pub fn set_flow_parameters(&mut self, params: FlowParameters) {
    self.settings.flow = params;
  }

  pub fn settings(&self) -> &SimulationSettings {
    &self.settings
  }

  pub fn level_set(&self) -> &CascadeLevelSet {
    &self.level_set
  }

  pub fn synthesizer(&self) -> &WaveSpectrumSynthesizer {
    &self.synthesizer
  }

  pub fn channels(&self) -> &ChannelStore {
    &self.channels
  }

  pub fn frame(&self) -> u64 {
    self.frame
  }

  pub fn time(&self) -> f32 {
    self.time
  }

  /// Passes issued by the last frame, in order.
  pub fn frame_record(&self) -> &[DispatchRecord] {
    self.recorder.records()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ocean::input_registry::RectInput;
  use crate::ocean::ocean_parameters::CombineStrategy;
  use crate::ocean::spectrum::MIN_POWER_LOG;
  use crate::ocean::utils::approx_eq;
  use crate::ocean::viewpoint::FixedViewpoint;
  use crate::ocean::wave_synthesizer::WAVE_CASCADE_COUNT;
  use std::cell::Cell;

  fn settings(strategy: CombineStrategy) -> SimulationSettings {
    let mut settings = SimulationSettings::default();
    settings.ocean.lod_count = 4;
    settings.ocean.lod_resolution = 16;
    settings.ocean.combine_strategy = strategy;
    settings.waves.wave_resolution = 16;
    settings.waves.random_seed = 21;
    settings
  }

  #[test]
  fn rejects_invalid_cascade_count() {
    let mut s = settings(CombineStrategy::Direct);
    s.ocean.lod_count = 17;
    assert!(SimulationContext::new(s, Some(WaveSpectrum::default())).is_err());
  }

  #[test]
  fn frame_runs_passes_in_order() {
    let mut ctx = SimulationContext::new(settings(CombineStrategy::PingPong), Some(WaveSpectrum::default())).unwrap();
    for kind in [ChannelKind::DynamicWaves, ChannelKind::Foam, ChannelKind::SeaFloorDepth, ChannelKind::Flow] {
      ctx.set_channel_enabled(kind, true);
    }
    ctx.update(&FixedViewpoint::new(0.0, 10.0, 0.0), 1.0 / 30.0);

    let record = ctx.frame_record();
    let position = |kernel: &str| record.iter().position(|r| r.kernel == kernel).unwrap();
    let last = |kernel: &str| record.iter().rposition(|r| r.kernel == kernel).unwrap();

    assert_eq!(position("update_level_set"), 0);
    assert!(position("sea_floor_depth") < position("gerstner"));
    assert!(last("gerstner") < position("update_dyn_waves"));
    assert!(last("update_dyn_waves") < position("update_foam"));
    assert!(last("update_foam") < position("anim_waves_inputs"));
    assert!(last("anim_waves_inputs") < position("combine"));
    assert_eq!(last("report_max_displacement"), record.len() - 1);

    // combine runs from the largest cascade down
    let combines: Vec<Option<usize>> = record
      .iter()
      .filter(|r| r.kernel == "copy")
      .map(|r| r.outputs[0].slice)
      .collect();
    assert_eq!(combines, vec![Some(3), Some(2), Some(1), Some(0)]);
  }

  #[test]
  fn strategies_produce_the_same_displacement() {
    let viewpoint = FixedViewpoint::new(3.0, 12.0, -7.0);
    let mut a = SimulationContext::new(settings(CombineStrategy::PingPong), Some(WaveSpectrum::default())).unwrap();
    let mut b = SimulationContext::new(settings(CombineStrategy::Direct), Some(WaveSpectrum::default())).unwrap();
    for _ in 0..3 {
      a.update(&viewpoint, 0.02);
      b.update(&viewpoint, 0.02);
    }
    for lod in 0..4 {
      assert_eq!(
        a.data_buffer(ChannelKind::AnimatedWaves, lod),
        b.data_buffer(ChannelKind::AnimatedWaves, lod)
      );
    }
    let any_motion = a
      .data_buffer(ChannelKind::AnimatedWaves, 0)
      .unwrap()
      .chunks(4)
      .any(|t| t[1].abs() > 1e-4);
    assert!(any_motion);
  }

  #[test]
  fn no_preference_inputs_draw_on_top() {
    let mut ctx = SimulationContext::new(settings(CombineStrategy::Direct), None).unwrap();
    ctx.register_input(ChannelKind::AnimatedWaves, 0, Rc::new(RectInput::new([0.0, 2.0, 0.0, 0.0])));
    ctx.update(&FixedViewpoint::new(0.0, 0.0, 0.0), 0.016);

    // without a spectrum there are no waves, only the flat input
    for lod in 0..4 {
      let data = ctx.data_buffer(ChannelKind::AnimatedWaves, lod).unwrap();
      assert!(data.chunks(4).all(|t| approx_eq(t[1], 2.0, 1e-6)));
    }
  }

  #[test]
  fn silent_spectrum_leaves_displacement_flat() {
    let mut s = settings(CombineStrategy::PingPong);
    s.waves.wind_speed = 0.0;
    let mut ctx = SimulationContext::new(s, Some(WaveSpectrum::single_octave(5, MIN_POWER_LOG))).unwrap();
    ctx.update(&FixedViewpoint::new(0.0, 10.0, 0.0), 0.016);

    assert_eq!(ctx.synthesizer().batches().first_cascade, None);
    for lod in 0..4 {
      let data = ctx.data_buffer(ChannelKind::AnimatedWaves, lod).unwrap();
      assert!(data.iter().all(|v| *v == 0.0));
    }
  }

  #[test]
  fn largest_waves_split_across_last_two_lods() {
    // 256m to 512m waves, all longer than half the largest cascade's band at scale 16
    let spectrum = WaveSpectrum::single_octave(10, 1.0);
    let mut ctx = SimulationContext::new(settings(CombineStrategy::Direct), Some(spectrum)).unwrap();
    ctx.update(&FixedViewpoint::new(0.0, 28.0, 0.0), 0.016);

    let level_set = ctx.level_set();
    let alpha = level_set.altitude_alpha();
    assert_eq!(level_set.scale(), 16.0);
    assert!(alpha > 0.1 && alpha < 0.9);

    let buffers = ctx.synthesizer().buffers();
    let buffers = buffers.borrow();
    let top_band = level_set.max_wavelength(3) / 2.0;
    let active: Vec<usize> = (0..WAVE_CASCADE_COUNT).filter(|c| buffers.is_active(*c)).collect();
    assert!(!active.is_empty());
    assert!(active.iter().all(|c| buffers.layout().min_wavelength(*c) >= top_band));

    let lod_inputs = ctx.channels().animated_waves.lod_inputs();
    for lod in 0..2 {
      assert!(lod_inputs.slice(lod).iter().all(|v| *v == 0.0));
    }

    let res = level_set.resolution();
    let mut peaks = [0.0f32; 2];
    for (i, (lod, weight)) in [(2, 1.0 - alpha), (3, alpha)].into_iter().enumerate() {
      let rd = level_set.render_data(lod);
      let slice = lod_inputs.slice(lod);
      for y in 0..res {
        for x in 0..res {
          let world = rd.texel_to_world(x, y);
          let offset = ((y * res + x) * 4) as usize;
          for c in 0..4 {
            let full: f32 = active.iter().map(|cascade| buffers.sample(*cascade, world)[c]).sum();
            assert!(approx_eq(slice[offset + c], full * weight, 1e-4));
          }
          peaks[i] = peaks[i].max(slice[offset + 1].abs());
        }
      }
    }
    assert!(peaks[0] > 0.0 && peaks[1] > 0.0);
  }

  struct Listener {
    vertical: Cell<f32>,
  }

  impl MaxDisplacementListener for Listener {
    fn report_max_displacement(&self, _horizontal: f32, vertical: f32, _vertical_static: f32) {
      self.vertical.set(vertical);
    }
  }

  #[test]
  fn reports_max_displacement() {
    let mut ctx = SimulationContext::new(settings(CombineStrategy::Direct), Some(WaveSpectrum::default())).unwrap();
    let listener = Rc::new(Listener { vertical: Cell::new(0.0) });
    ctx.add_listener(listener.clone());
    ctx.update(&FixedViewpoint::new(0.0, 5.0, 0.0), 0.016);

    assert!(listener.vertical.get() > 0.0);
    assert_eq!(listener.vertical.get(), ctx.max_displacement().vertical);
    assert!(ctx.max_displacement().horizontal > ctx.max_displacement().vertical);
  }

  #[test]
  fn origin_shift_moves_cascades() {
    let mut ctx = SimulationContext::new(settings(CombineStrategy::Direct), Some(WaveSpectrum::default())).unwrap();
    let viewpoint = FixedViewpoint::new(0.0, 5.0, 0.0).with_scale(8.0);
    ctx.update(&viewpoint, 0.016);
    let before = ctx.level_set().render_data(0).pos_snapped;
    ctx.set_origin(Vector2::new(100.0, -50.0));
    let after = ctx.level_set().render_data(0).pos_snapped;
    assert_eq!(after, before - Vector2::new(100.0, -50.0));
  }

  #[test]
  fn suggests_lods_for_areas() {
    let mut ctx = SimulationContext::new(settings(CombineStrategy::Direct), None).unwrap();
    ctx.update(&FixedViewpoint::new(0.0, 0.0, 0.0).with_scale(8.0), 0.016);
    // lod 0 spans 32m with 2m texels
    assert_eq!(ctx.suggest_lod_for_area(&RectXZ::new(-10.0, -10.0, 20.0, 20.0)), Some(0));
    assert_eq!(ctx.suggest_lod_for_area(&RectXZ::new(-20.0, -20.0, 40.0, 40.0)), Some(1));
    assert_eq!(ctx.suggest_lod_for_area(&RectXZ::new(-1.0e5, -1.0e5, 1.0, 1.0)), None);
  }
}
