//! 批量玻片切分: 按输入目录下的清单切分每张玻片并写入输出目录.

mod runner;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::init_with_level(log::Level::Info)?;
    runner::run()
}
