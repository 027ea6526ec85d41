use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::tab::GroupId;

/// Published after every command that may have changed browser state, so
/// views know to read it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastEvent {
    TabsChanged,
    MainGroupChanged(Option<GroupId>),
}

pub type BroadcastSender = broadcast::Sender<BroadcastEvent>;
pub type BroadcastReceiver = broadcast::Receiver<BroadcastEvent>;

const CAPACITY: usize = 32;

pub fn channel() -> (BroadcastSender, BroadcastReceiver) { broadcast::channel(CAPACITY) }
