use instant::Instant;
use wgpu_ocean_cascades::ocean::pipelines::{CombinePipeline, GpuContext};
use wgpu_ocean_cascades::ocean::{
  ChannelKind, FixedViewpoint, OceanParameters, Result, SimulationContext, SimulationSettings, WaveSpectrum,
};

const FRAME_COUNT: u32 = 240;
const FRAME_DT: f32 = 1.0 / 60.0;

fn main() {
  env_logger::init();

  if let Err(err) = pollster::block_on(run()) {
    log::error!("{}", err);
  }
}

pub async fn run() -> Result<()> {
  let settings = SimulationSettings {
    ocean: OceanParameters {
      lod_count: 5,
      lod_resolution: 64,
      ..Default::default()
    },
    ..Default::default()
  };

  let mut spectrum = WaveSpectrum::default();
  spectrum.apply_pierson_moskowitz(settings.waves.wind_speed, settings.ocean.gravity);

  let mut context = SimulationContext::new(settings, Some(spectrum))?;
  context.set_channel_enabled(ChannelKind::SeaFloorDepth, true);
  context.set_channel_enabled(ChannelKind::Foam, true);

  let start_instant = Instant::now();
  for frame in 0..FRAME_COUNT {
    // climb slowly while drifting downwind
    let t = frame as f32 * FRAME_DT;
    let viewpoint = FixedViewpoint::new(t * 5.0, 10.0 + t * 20.0, 0.0);
    context.update(&viewpoint, FRAME_DT);

    if frame % 60 == 0 {
      let max = context.max_displacement();
      log::info!(
        "frame {}: scale {:.1}, {} passes, max displacement {:.2} / {:.2}",
        context.frame(),
        context.level_set().scale(),
        context.frame_record().len(),
        max.horizontal,
        max.vertical
      );
    }
  }
  log::info!(
    "simulated {} frames in {:.1} ms",
    FRAME_COUNT,
    start_instant.elapsed().as_secs_f32() * 1000.0
  );

  if !CombinePipeline::covers(context.channels()) {
    log::warn!("skipping gpu combine: folded channels are only combined on the cpu");
    return Ok(());
  }

  let gpu = match GpuContext::new().await {
    Ok(gpu) => gpu,
    Err(err) => {
      log::warn!("skipping gpu combine: {}", err);
      return Ok(());
    }
  };

  let level_set = context.level_set();
  let pipeline = CombinePipeline::init(&gpu.device, level_set.resolution(), level_set.lod_count() as u32);
  let displacement = pipeline.run(&gpu, level_set, context.channels().animated_waves.lod_inputs())?;

  let cpu = context.channels().animated_waves.current();
  let mut max_error: f32 = 0.0;
  for lod in 0..level_set.lod_count() {
    for (a, b) in displacement.slice(lod).iter().zip(cpu.slice(lod)) {
      max_error = max_error.max((a - b).abs());
    }
  }
  log::info!("gpu combine on {} differs by at most {:.5}", gpu.adapter_name, max_error);

  Ok(())
}
