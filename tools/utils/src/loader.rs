//! 对 `arg-berry` 的路径约定的一层封装. 所有路径都可以由环境变量覆盖.

use std::env;
use std::path::PathBuf;

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// 获取图谱产物目录.
///
/// 1. 若环境变量 `$ARG_ATLAS_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/.arg-berry/atlas`;
/// 3. 无法确定用户主目录时返回 `None`.
pub fn atlas_dir_from_env_or_home() -> Option<PathBuf> {
    env_path("ARG_ATLAS_DIR").or_else(arg_berry::dataset::home_atlas_dir)
}

/// 获取参考图谱的体数据归档 (`reference.npy`, `annotation.npy`).
///
/// 1. 若环境变量 `$ARG_REFERENCE_VOLUMES` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/.arg-berry/atlas/reference/volumes.npz`.
pub fn reference_volumes_from_env_or_home() -> Option<PathBuf> {
    env_path("ARG_REFERENCE_VOLUMES")
        .or_else(|| arg_berry::dataset::home_atlas_dir_with(["reference", "volumes.npz"]))
}

/// 获取参考图谱的结构层级文件.
///
/// 1. 若环境变量 `$ARG_REFERENCE_STRUCTURES` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/.arg-berry/atlas/reference/structures.json`.
pub fn reference_structures_from_env_or_home() -> Option<PathBuf> {
    env_path("ARG_REFERENCE_STRUCTURES")
        .or_else(|| arg_berry::dataset::home_atlas_dir_with(["reference", "structures.json"]))
}

/// 图谱准备配置文件 (`$ARG_ATLAS_CONFIG`), 未设置时使用默认配置.
#[inline]
pub fn atlas_config_from_env() -> Option<PathBuf> {
    env_path("ARG_ATLAS_CONFIG")
}

/// 玻片切分参数文件 (`$ARG_SEGMENT_CONFIG`), 未设置时使用默认参数.
#[inline]
pub fn segment_config_from_env() -> Option<PathBuf> {
    env_path("ARG_SEGMENT_CONFIG")
}

/// 玻片输入目录 (`$ARG_SLIDES_DIR`), 其下应有清单文件.
#[inline]
pub fn slides_dir_from_env() -> Option<PathBuf> {
    env_path("ARG_SLIDES_DIR")
}

/// 切分输出目录 (`$ARG_OUTPUT_DIR`).
#[inline]
pub fn output_dir_from_env() -> Option<PathBuf> {
    env_path("ARG_OUTPUT_DIR")
}

/// 是否强制重新准备图谱 (`$ARG_FORCE` 非空且不为 `0`).
pub fn force_from_env() -> bool {
    env::var("ARG_FORCE").map_or(false, |v| !v.is_empty() && v != "0")
}
