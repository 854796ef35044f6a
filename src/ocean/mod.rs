mod animated_waves;
mod backend;
mod cascade;
mod cascade_level_set;
mod channel;
mod channel_store;
mod combine;
mod dynamic_waves;
mod error;
mod foam;
mod input_registry;
mod ocean_parameters;
mod persistent_sim;
mod simulation_context;
mod spectrum;
mod utils;
mod viewpoint;
mod wave_synthesizer;

pub mod pipelines;

pub use animated_waves::AnimatedWavesChannel;
pub use backend::{DispatchRecord, FrameRecorder, ResourceRef};
pub use cascade::{RectXZ, RenderData};
pub use cascade_level_set::CascadeLevelSet;
pub use channel::{CascadeArray, ChannelBuffer, ChannelFormat, ChannelKind, ChannelState, DEEP_WATER_DEPTH};
pub use channel_store::{ChannelStore, LodChannel};
pub use combine::{combine_cascades, CombineSources, DynamicWavesFold, FlowFold};
pub use dynamic_waves::DynamicWavesKernel;
pub use error::{OceanError, Result};
pub use foam::FoamKernel;
pub use input_registry::{DrawContributor, DrawTarget, FilterResult, InputHandle, InputRegistry, RectInput, WavelengthFilter};
pub use ocean_parameters::*;
pub use persistent_sim::{PersistentSimStepper, SimInputs, SimKernel, SourceData, StepContext, SubstepPlan, SubstepPolicy};
pub use simulation_context::{MaxDisplacementListener, SimulationContext, SimulationSettings};
pub use spectrum::WaveSpectrum;
pub use viewpoint::{FixedViewpoint, Viewpoint, ViewerScale};
pub use wave_synthesizer::{MaxDisplacement, WaveComponent, WaveSpectrumSynthesizer};
