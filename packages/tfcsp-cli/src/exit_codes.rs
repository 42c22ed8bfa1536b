pub const SUCCESS: i32 = 0;
/// Output could not be written or an analysis step failed outright
pub const EXECUTION_ERROR: i32 = 1;
/// Bad configuration, paths or arguments
pub const INPUT_ERROR: i32 = 2;
/// Some decoding tasks failed
pub const PARTIAL_FAILURE: i32 = 3;
pub const ALL_FAILED: i32 = 4;
