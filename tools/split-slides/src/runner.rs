//! 程序运行函数.

use arg_berry::dataset::{SlideManifest, MANIFEST_FILE};
use arg_berry::section::{read_slide, segment_slide, SegmentConfig};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use utils::loader;

/// 实际运行.
///
/// 单张玻片失败时记录错误并继续处理其余玻片; 只要有失败, 最终返回错误.
pub fn run() -> Result<(), Box<dyn Error>> {
    let input_dir = loader::slides_dir_from_env().ok_or("ARG_SLIDES_DIR is not set")?;
    let output_dir = loader::output_dir_from_env().ok_or("ARG_OUTPUT_DIR is not set")?;
    let cfg: SegmentConfig = match loader::segment_config_from_env() {
        Some(p) => serde_json::from_reader(BufReader::new(File::open(p)?))?,
        None => SegmentConfig::default(),
    };
    let manifest = SlideManifest::open(input_dir.join(MANIFEST_FILE))?;

    let total = manifest.len();
    let mut failed = 0;
    for (i, entry) in manifest.layouts(&input_dir).enumerate() {
        let (path, layout) = entry?;
        log::info!("({} / {total}) splitting {}", i + 1, path.display());
        let result = read_slide(&path)
            .and_then(|img| segment_slide(img.view(), &layout, &cfg))
            .and_then(|slide| slide.save(&output_dir, &layout));
        match result {
            Ok(written) => log::info!("{}: {} sections written", layout.base, written.len()),
            Err(e) => {
                failed += 1;
                log::error!("{}: {e}", path.display());
            }
        }
    }
    utils::sep();
    if failed > 0 {
        return Err(format!("{failed} of {total} slides failed").into());
    }
    log::info!("all {total} slides split into {}", output_dir.display());
    Ok(())
}
