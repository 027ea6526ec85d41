#[cfg(test)]
pub(crate) mod fixtures;
pub mod server;
pub mod tab;
pub mod topics;
pub mod window_storage;

pub use tab::{GroupId, Tab, TabGroup, TabId, Window, WindowId};
