use crate::ocean::animated_waves::AnimatedWavesChannel;
use crate::ocean::backend::{FrameRecorder, ResourceRef};
use crate::ocean::cascade_level_set::CascadeLevelSet;
use crate::ocean::channel::{CascadeArray, ChannelBuffer, ChannelKind, ChannelState};
use crate::ocean::dynamic_waves::DynamicWavesKernel;
use crate::ocean::foam::FoamKernel;
use crate::ocean::input_registry::{DrawTarget, InputRegistry};
use crate::ocean::ocean_parameters::{DynamicWaveParameters, FoamParameters, OceanParameters};
use crate::ocean::persistent_sim::PersistentSimStepper;

/// A channel redrawn from its inputs every frame, with no state carried over.
pub struct LodChannel {
  kind: ChannelKind,
  state: ChannelState,
  buffer: Option<ChannelBuffer>,
  registry: InputRegistry,
  lod_count: usize,
  resolution: u32,
}

impl LodChannel {
  pub fn new(kind: ChannelKind, lod_count: usize, resolution: u32) -> Self {
    Self {
      kind,
      state: ChannelState::Uninitialized,
      buffer: None,
      registry: InputRegistry::new(),
      lod_count,
      resolution,
    }
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    if enabled {
      if self.buffer.is_none() {
        self.buffer = Some(ChannelBuffer::new(self.kind, self.lod_count, self.resolution));
      }
      self.state = ChannelState::Active;
    } else {
      self.buffer = None;
      self.state = ChannelState::Disabled;
    }
  }

  pub fn state(&self) -> ChannelState {
    self.state
  }

  pub fn registry_mut(&mut self) -> &mut InputRegistry {
    &mut self.registry
  }

  pub fn current(&self) -> Option<&CascadeArray> {
    match self.state {
      ChannelState::Active => self.buffer.as_ref().map(|b| b.current()),
      _ => None,
    }
  }

  /// Clears every cascade and draws all inputs into it at full weight.
  pub fn update(&mut self, level_set: &CascadeLevelSet, time: f32, recorder: &mut FrameRecorder) {
    if self.state != ChannelState::Active {
      return;
    }
    let buffer = match self.buffer.as_mut() {
      Some(buffer) => buffer,
      None => return,
    };
    let components = buffer.format().components;
    let clear = self.kind.clear_value();
    let array = buffer.current_mut();

    for lod in 0..level_set.lod_count() {
      array.fill_slice(lod, clear);
      let mut target = DrawTarget {
        lod,
        render_data: *level_set.render_data(lod),
        components,
        time,
        data: array.slice_mut(lod),
      };
      self.registry.draw_all(&mut target);
      recorder.dispatch(
        self.kind.name(),
        Vec::new(),
        vec![ResourceRef::slice(self.kind.name(), lod)],
        self.resolution,
      );
    }
  }
}

/// Owns every channel's buffers and input registries.
pub struct ChannelStore {
  pub animated_waves: AnimatedWavesChannel,
  pub dynamic_waves: PersistentSimStepper<DynamicWavesKernel>,
  pub foam: PersistentSimStepper<FoamKernel>,
  pub flow: LodChannel,
  pub sea_floor_depth: LodChannel,
  pub shadow: LodChannel,
}

impl ChannelStore {
  pub fn new(ocean: &OceanParameters, dynamic_waves: DynamicWaveParameters, foam: FoamParameters) -> Self {
    let lods = ocean.lod_count;
    let res = ocean.lod_resolution;
    Self {
      animated_waves: AnimatedWavesChannel::new(lods, res, ocean.combine_strategy),
      dynamic_waves: PersistentSimStepper::new(
        ChannelKind::DynamicWaves,
        DynamicWavesKernel::new(dynamic_waves, ocean.gravity, ocean.min_texels_per_wave, lods),
        lods,
        res,
      ),
      foam: PersistentSimStepper::new(ChannelKind::Foam, FoamKernel::new(foam), lods, res),
      flow: LodChannel::new(ChannelKind::Flow, lods, res),
      sea_floor_depth: LodChannel::new(ChannelKind::SeaFloorDepth, lods, res),
      shadow: LodChannel::new(ChannelKind::Shadow, lods, res),
    }
  }

  pub fn state(&self, kind: ChannelKind) -> ChannelState {
    match kind {
      ChannelKind::AnimatedWaves => ChannelState::Active,
      ChannelKind::DynamicWaves => self.dynamic_waves.state(),
      ChannelKind::Foam => self.foam.state(),
      ChannelKind::Flow => self.flow.state(),
      ChannelKind::SeaFloorDepth => self.sea_floor_depth.state(),
      ChannelKind::Shadow => self.shadow.state(),
    }
  }

  /// Displacement is always on and ignores this.
  pub fn set_enabled(&mut self, kind: ChannelKind, enabled: bool) {
    match kind {
      ChannelKind::AnimatedWaves => {}
      ChannelKind::DynamicWaves => self.dynamic_waves.set_enabled(enabled),
      ChannelKind::Foam => self.foam.set_enabled(enabled),
      ChannelKind::Flow => self.flow.set_enabled(enabled),
      ChannelKind::SeaFloorDepth => self.sea_floor_depth.set_enabled(enabled),
      ChannelKind::Shadow => self.shadow.set_enabled(enabled),
    }
  }

  pub fn registry_mut(&mut self, kind: ChannelKind) -> &mut InputRegistry {
    match kind {
      ChannelKind::AnimatedWaves => self.animated_waves.registry_mut(),
      ChannelKind::DynamicWaves => self.dynamic_waves.registry_mut(),
      ChannelKind::Foam => self.foam.registry_mut(),
      ChannelKind::Flow => self.flow.registry_mut(),
      ChannelKind::SeaFloorDepth => self.sea_floor_depth.registry_mut(),
      ChannelKind::Shadow => self.shadow.registry_mut(),
    }
  }

  pub fn current(&self, kind: ChannelKind) -> Option<&CascadeArray> {
    match kind {
      ChannelKind::AnimatedWaves => Some(self.animated_waves.current()),
      ChannelKind::DynamicWaves => self.dynamic_waves.current(),
      ChannelKind::Foam => self.foam.current(),
      ChannelKind::Flow => self.flow.current(),
      ChannelKind::SeaFloorDepth => self.sea_floor_depth.current(),
      ChannelKind::Shadow => self.shadow.current(),
    }
  }

  /// Current data of one cascade, `None` when the channel is not active.
  pub fn data_buffer(&self, kind: ChannelKind, lod: usize) -> Option<&[f32]> {
    self
      .current(kind)
      .filter(|array| lod < array.count())
      .map(|array| array.slice(lod))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ocean::channel::DEEP_WATER_DEPTH;
  use crate::ocean::input_registry::RectInput;
  use crate::ocean::viewpoint::ViewerScale;
  use cgmath::Vector2;
  use std::rc::Rc;

  fn params() -> OceanParameters {
    OceanParameters {
      lod_count: 2,
      lod_resolution: 8,
      ..Default::default()
    }
  }

  #[test]
  fn channels_start_uninitialized_except_displacement() {
    let store = ChannelStore::new(&params(), DynamicWaveParameters::default(), FoamParameters::default());
    assert_eq!(store.state(ChannelKind::AnimatedWaves), ChannelState::Active);
    for kind in ChannelKind::ALL.iter().skip(1) {
      assert_eq!(store.state(*kind), ChannelState::Uninitialized);
      assert!(store.data_buffer(*kind, 0).is_none());
    }
    assert!(store.data_buffer(ChannelKind::AnimatedWaves, 1).is_some());
    assert!(store.data_buffer(ChannelKind::AnimatedWaves, 2).is_none());
  }

  #[test]
  fn disabling_releases_buffers() {
    let mut store = ChannelStore::new(&params(), DynamicWaveParameters::default(), FoamParameters::default());
    store.set_enabled(ChannelKind::Foam, true);
    assert_eq!(store.data_buffer(ChannelKind::Foam, 0).map(|d| d.len()), Some(64));
    store.set_enabled(ChannelKind::Foam, false);
    assert_eq!(store.state(ChannelKind::Foam), ChannelState::Disabled);
    assert!(store.data_buffer(ChannelKind::Foam, 0).is_none());
  }

  #[test]
  fn kinematic_channels_redraw_every_frame() {
    let p = params();
    let mut ls = CascadeLevelSet::new(&p).unwrap();
    let scale = ViewerScale {
      scale: 8.0,
      altitude_alpha: 0.0,
    };
    ls.update(1, Vector2::new(0.0, 0.0), scale, &p);

    let mut store = ChannelStore::new(&p, DynamicWaveParameters::default(), FoamParameters::default());
    store.set_enabled(ChannelKind::SeaFloorDepth, true);
    store
      .registry_mut(ChannelKind::SeaFloorDepth)
      .register(0, Rc::new(RectInput::new([-DEEP_WATER_DEPTH + 5.0, 0.0, 0.0, 0.0])));

    let mut recorder = FrameRecorder::default();
    store.sea_floor_depth.update(&ls, 0.0, &mut recorder);
    store.sea_floor_depth.update(&ls, 0.0, &mut recorder);
    let depth = store.data_buffer(ChannelKind::SeaFloorDepth, 1).unwrap();
    assert!(depth.iter().all(|d| *d == 5.0));
    assert_eq!(recorder.position("sea_floor_depth"), Some(0));
  }
}
