//! Actors own a piece of state and run on their own thread. Everyone else
//! talks to them through these channels.

pub mod broadcast;
pub mod tab_service;

use tokio::sync::mpsc;
use tracing::Span;

/// Sending half of an actor's queue. Every message carries the sender's
/// span so the actor can log under it.
pub struct Sender<Event>(mpsc::UnboundedSender<(Span, Event)>);

pub type Receiver<Event> = mpsc::UnboundedReceiver<(Span, Event)>;

pub fn channel<Event>() -> (Sender<Event>, Receiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Sender(tx), rx)
}

impl<Event> Clone for Sender<Event> {
    fn clone(&self) -> Self { Sender(self.0.clone()) }
}

impl<Event> Sender<Event> {
    /// Sends, dropping the event if the actor has exited.
    pub fn send(&self, event: Event) { let _ = self.try_send(event); }

    pub fn try_send(&self, event: Event) -> Result<(), mpsc::error::SendError<(Span, Event)>> {
        self.0.send((Span::current(), event))
    }
}
