pub mod browser;
pub mod memory;
pub mod storage;
