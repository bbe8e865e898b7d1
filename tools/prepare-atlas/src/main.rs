//! 离线图谱准备: 读取参考图谱, 写出分析阶段使用的表格与体数据.
//!
//! 输入输出路径见 `utils::loader`; 设置 `ARG_FORCE=1` 以覆盖已有产物.

mod runner;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::init_with_level(log::Level::Info)?;
    runner::run()
}
