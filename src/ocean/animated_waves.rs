use crate::ocean::backend::{FrameRecorder, ResourceRef};
use crate::ocean::cascade_level_set::CascadeLevelSet;
use crate::ocean::channel::{CascadeArray, ChannelBuffer, ChannelKind};
use crate::ocean::combine::{combine_cascades, CombineSources, DynamicWavesFold, FlowFold, DISPLACEMENT, LOD_INPUTS};
use crate::ocean::input_registry::{DrawTarget, InputRegistry, WavelengthFilter};
use crate::ocean::ocean_parameters::CombineStrategy;

/// The displacement channel: per cascade wave inputs, combined into the final displacement.
pub struct AnimatedWavesChannel {
  buffer: ChannelBuffer,
  lod_inputs: CascadeArray,
  aux: Vec<f32>,
  registry: InputRegistry,
  strategy: CombineStrategy,
}

impl AnimatedWavesChannel {
  pub fn new(lod_count: usize, resolution: u32, strategy: CombineStrategy) -> Self {
    let components = ChannelKind::AnimatedWaves.format().components;
    Self {
      buffer: ChannelBuffer::new(ChannelKind::AnimatedWaves, lod_count, resolution),
      lod_inputs: CascadeArray::new(lod_count, resolution, components),
      aux: Vec::new(),
      registry: InputRegistry::new(),
      strategy,
    }
  }

  pub fn registry(&self) -> &InputRegistry {
    &self.registry
  }

  pub fn registry_mut(&mut self) -> &mut InputRegistry {
    &mut self.registry
  }

  pub fn strategy(&self) -> CombineStrategy {
    self.strategy
  }

  pub fn set_strategy(&mut self, strategy: CombineStrategy) {
    self.strategy = strategy;
  }

  pub fn current(&self) -> &CascadeArray {
    self.buffer.current()
  }

  pub fn data(&self, lod: usize) -> &[f32] {
    self.buffer.current().slice(lod)
  }

  pub fn lod_inputs(&self) -> &CascadeArray {
    &self.lod_inputs
  }

  /// Clears and redraws each cascade's own band of wave inputs, largest cascade first.
  pub fn draw_lod_inputs(&mut self, level_set: &CascadeLevelSet, time: f32, recorder: &mut FrameRecorder) {
    let lod_count = level_set.lod_count();
    let components = self.lod_inputs.components();
    let global_max_wavelength = level_set.max_wavelength(lod_count - 1);

    for lod in (0..lod_count).rev() {
      self.lod_inputs.fill_slice(lod, 0.0);

      let filter = WavelengthFilter {
        lod,
        lod_count,
        lod_min_wavelength: level_set.min_wavelength(lod),
        lod_max_wavelength: level_set.max_wavelength(lod),
        global_max_wavelength,
        altitude_alpha: level_set.altitude_alpha(),
      };
      let mut target = DrawTarget {
        lod,
        render_data: *level_set.validated_render_data(lod, level_set.current_frame().unwrap_or(0)),
        components,
        time,
        data: self.lod_inputs.slice_mut(lod),
      };
      let drawn = self.registry.draw_filtered(&mut target, &filter);
      log::trace!("lod {}: {} wave inputs", lod, drawn);

      recorder.dispatch("anim_waves_inputs", Vec::new(), vec![ResourceRef::slice(LOD_INPUTS, lod)], level_set.resolution());
    }
  }

  /// Builds the final displacement from the lod inputs and the optional folds.
  pub fn combine(
    &mut self,
    level_set: &CascadeLevelSet,
    dynamic_waves: Option<DynamicWavesFold<'_>>,
    flow: Option<FlowFold<'_>>,
    recorder: &mut FrameRecorder,
  ) {
    let sources = CombineSources {
      level_set,
      lod_inputs: &self.lod_inputs,
      dynamic_waves,
      flow,
    };
    combine_cascades(self.strategy, &sources, self.buffer.current_mut(), &mut self.aux, recorder);
  }

  /// Draws inputs without a wavelength preference on top of the combined result.
  pub fn draw_no_preference(&mut self, level_set: &CascadeLevelSet, time: f32, recorder: &mut FrameRecorder) {
    let components = self.lod_inputs.components();
    let array = self.buffer.current_mut();

    for lod in (0..level_set.lod_count()).rev() {
      let mut target = DrawTarget {
        lod,
        render_data: *level_set.render_data(lod),
        components,
        time,
        data: array.slice_mut(lod),
      };
      if self.registry.draw_no_preference(&mut target) > 0 {
        recorder.dispatch(
          "anim_waves_no_preference",
          Vec::new(),
          vec![ResourceRef::slice(DISPLACEMENT, lod)],
          level_set.resolution(),
        );
      }
    }
  }
}
