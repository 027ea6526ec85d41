//! Pure decisions about where tabs belong. Nothing in here talks to the
//! browser.

mod partition;

pub use partition::{Partition, partition};
