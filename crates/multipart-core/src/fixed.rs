use fixed::types::I32F32;

/// Q32.32 fixed-point coordinate in cell-local space. A cell spans `0..1` on
/// every axis.
pub type Coord = I32F32;

/// Convert an f64 to a coordinate. Use only for initialization and content
/// loading.
#[inline]
pub fn f64_to_coord(v: f64) -> Coord {
    Coord::from_num(v)
}

/// Convert a coordinate to f64. Use only for display and renderer hand-off.
#[inline]
pub fn coord_to_f64(v: Coord) -> f64 {
    v.to_num::<f64>()
}

/// Coordinate of `n` sixteenths of a cell, the resolution content files use.
#[inline]
pub fn sixteenths(n: i32) -> Coord {
    Coord::from_num(n) / Coord::from_num(16)
}
