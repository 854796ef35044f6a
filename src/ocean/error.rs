use thiserror::Error;

#[derive(Debug, Error)]
pub enum OceanError {
  #[error("lod count {requested} is out of range, must be in 1..={max}")]
  TooManyCascades { requested: usize, max: usize },

  #[error("lod resolution {0} must be a non-zero multiple of 8")]
  InvalidResolution(u32),

  #[error("components per octave must be greater than zero")]
  ZeroComponentsPerOctave,

  #[error("no wave spectrum assigned")]
  MissingSpectrum,

  #[error("kernel '{kernel}' failed to load: {reason}")]
  KernelLoad { kernel: &'static str, reason: String },

  #[error("no suitable graphics adapter found")]
  NoAdapter,

  #[error("failed to request device: {0}")]
  RequestDevice(#[from] wgpu::RequestDeviceError),

  #[error("failed to map readback buffer: {0}")]
  BufferMap(#[from] wgpu::BufferAsyncError),

  #[error("gpu error: {0}")]
  Gpu(String),
}

pub type Result<T> = std::result::Result<T, OceanError>;
