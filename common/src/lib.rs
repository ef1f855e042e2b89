use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

//常用结构体

/// 点坐标
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    #[schemars(title = "X 坐标")]
    pub x: i32,
    #[schemars(title = "Y 坐标")]
    pub y: i32,
}

/// 区域
///
/// 左上角坐标为 `start`，右下角坐标为 `end` (不包含)
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    #[schemars(title = "区域左上角坐标")]
    pub start: Point,
    #[schemars(title = "区域右下角坐标")]
    pub end: Point,
}

impl Region {
    /// 通过左上角与右下角坐标创建区域
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Region {
            start: Point { x: x1, y: y1 },
            end: Point { x: x2, y: y2 },
        }
    }

    pub fn width(&self) -> i32 {
        self.end.x - self.start.x
    }

    pub fn height(&self) -> i32 {
        self.end.y - self.start.y
    }

    /// 较短边长度
    pub fn min_side(&self) -> i32 {
        self.width().min(self.height())
    }
}

/// 为点增加偏移量
///
/// # 参数
///
/// - `point` - 点坐标
/// - `offset_x` - X 轴偏移量
/// - `offset_y` - Y 轴偏移量
pub fn point_offset(point: &Point, offset_x: Option<i32>, offset_y: Option<i32>) -> Point {
    let mut point = *point;
    if let Some(x) = offset_x {
        point.x += x;
    }
    if let Some(y) = offset_y {
        point.y += y;
    }
    point
}

/// 向四周扩张区域
///
/// # 参数
///
/// - `region` - 区域
/// - `distance` - 每条边向外扩张的距离
pub fn region_expand(region: &Region, distance: i32) -> Region {
    Region {
        start: point_offset(&region.start, Some(-distance), Some(-distance)),
        end: point_offset(&region.end, Some(distance), Some(distance)),
    }
}

/// 将区域限制在 `[0, width] x [0, height]` 范围内
///
/// # 参数
///
/// - `region` - 区域
/// - `width` - 最大宽度
/// - `height` - 最大高度
pub fn region_clamp(region: &Region, width: i32, height: i32) -> Region {
    Region::new(
        region.start.x.clamp(0, width),
        region.start.y.clamp(0, height),
        region.end.x.clamp(0, width),
        region.end.y.clamp(0, height),
    )
}

/// 区域转为四边形顶点
///
/// 顺序为左上, 右上, 右下, 左下
pub fn region_to_quad(region: &Region) -> [Point; 4] {
    [
        region.start,
        Point {
            x: region.end.x,
            y: region.start.y,
        },
        region.end,
        Point {
            x: region.start.x,
            y: region.end.y,
        },
    ]
}
