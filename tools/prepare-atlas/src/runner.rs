//! 程序运行函数.

use arg_berry::atlas::{prepare_atlas_dir, AtlasConfig};
use arg_berry::AtlasVolume;
use std::error::Error;
use std::fs;
use std::time::Instant;
use utils::loader;

/// 实际运行.
pub fn run() -> Result<(), Box<dyn Error>> {
    let volumes = loader::reference_volumes_from_env_or_home().ok_or("cannot locate reference volumes")?;
    let structures =
        loader::reference_structures_from_env_or_home().ok_or("cannot locate structures.json")?;
    let out_dir = loader::atlas_dir_from_env_or_home().ok_or("cannot locate atlas directory")?;
    let cfg = match loader::atlas_config_from_env() {
        Some(p) => AtlasConfig::from_json_file(p)?,
        None => AtlasConfig::default(),
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(utils::cpus())
        .build_global()?;

    log::info!("loading atlas from {}", volumes.display());
    let atlas = AtlasVolume::open(&volumes, &structures)?;
    fs::create_dir_all(&out_dir)?;

    utils::sep();
    let start = Instant::now();
    let written = prepare_atlas_dir(&atlas, &cfg, &out_dir, loader::force_from_env(), &mut rand::rng())?;
    if written {
        log::info!(
            "{} regions prepared into {} in {:.1}s",
            cfg.regions.len(),
            out_dir.display(),
            start.elapsed().as_secs_f64()
        );
    }
    utils::sep();
    Ok(())
}
