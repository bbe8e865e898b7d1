//! 通用常量.

/// 画布相关常量.
pub mod canvas {
    /// 画布边长. 所有切片与图谱平面都被规范到 `CANVAS_SIZE * CANVAS_SIZE`.
    pub const CANVAS_SIZE: usize = 600;

    /// 图谱平面的面内放大倍数 (100um 图谱 -> 25um 切片像素).
    pub const UPSCALE: usize = 4;

    /// 双侧区域切分所用的中线列.
    pub const MIDLINE_X: usize = 300;
}

/// 图谱准备相关常量.
pub mod atlas {
    /// 全脑区域在层级结构中的 id.
    pub const BRAIN_REGION_ID: u32 = 8;

    /// 区域栅格化时, 面积小于该值的 4-连通域会被移除.
    pub const MIN_OBJECT_SIZE: usize = 64;

    /// 图谱多边形的默认简化容差 (像素).
    pub const SIMPLIFY_TOLERANCE: f64 = 4.0;

    /// 区域颜色的透明度.
    pub const ROI_ALPHA: f64 = 0.2;

    /// 持久化表格的版本号. 读取时必须与之相等.
    pub const TABLE_VERSION: u32 = 1;

    /// 需要做中线切分的双侧区域.
    pub const BILATERAL_REGIONS: [&str; 1] = ["Isocortex"];

    /// 默认的区域列表, 顺序即区域的序号 (从 1 开始).
    pub const SELECTED_REGIONS: [&str; 13] = [
        "CB",
        "MY",
        "P",
        "MB",
        "HY",
        "TH",
        "PAL",
        "STR",
        "OLF",
        "Isocortex",
        "HIP",
        "RHP",
        "CTXsp",
    ];

    /// 区域颜色表文件名.
    pub const ROI_COLORS_FILE: &str = "roi_colors.json";

    /// 切片质心表文件名.
    pub const SLICE_CENTROIDS_FILE: &str = "slice_centroids.json";

    /// 区域多边形表文件名.
    pub const ROI_SHAPES_FILE: &str = "roi_shapes.json";

    /// 解剖参考体与区域叠加体的归档文件名.
    pub const VOLUMES_FILE: &str = "atlas_volumes.npz";

    /// 归档中解剖参考体的条目名.
    pub const ANATOMICAL_ENTRY: &str = "anatomical.npy";

    /// 归档中区域叠加体的条目名.
    pub const ROIS_ENTRY: &str = "rois.npy";
}

/// 玻片切分相关常量.
pub mod segment {
    /// 中值滤波窗口边长.
    pub const MEDIAN_SIZE: usize = 11;

    /// 开运算方形结构元边长.
    pub const OPENING_SIZE: usize = 5;

    /// 面积小于该值的组织连通域会被移除.
    pub const MIN_SECTION_SIZE: usize = 6000;

    /// 局部极大值搜索的方形邻域边长.
    pub const PEAK_FOOTPRINT: usize = 350;

    /// 种子之间的最小间距 (切比雪夫距离).
    pub const PEAK_MIN_DISTANCE: usize = 200;

    /// Otsu 直方图的箱数.
    pub const OTSU_BINS: usize = 256;
}

/// 背景测量相关常量.
pub mod background {
    /// 默认背景矩形的高.
    pub const RECT_HEIGHT: usize = 800;

    /// 默认背景矩形的宽.
    pub const RECT_WIDTH: usize = 400;
}

/// 结果表相关常量.
pub mod results {
    /// 结果文件名, 位于数据目录下.
    pub const RESULTS_FILE: &str = "results.csv";

    /// 键列名.
    pub const IMAGE_FILENAME: &str = "image_filename";

    /// 所有区域并集的列名.
    pub const ALL_ROIS: &str = "All_ROIs";
}
