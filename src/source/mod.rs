pub mod create;
pub mod interval;
pub mod iter;
pub mod range;
