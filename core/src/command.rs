//! The engine's single command queue (§5: "all mutations flow through a single command
//! queue drained at tick boundaries").
//!
//! Every client-issued write, whether it arrives over the client protocol, from a scene
//! recall in progress, or from an input receiver's normalized frame, is turned into a
//! [`Command`] and pushed onto one `mpsc` channel. The engine task is the only consumer,
//! so it can apply every mutation without taking a lock across the tick.

use tokio::sync::mpsc;

use crate::input::InputFrame;
use crate::model::scene::TransitionType;

/// Sending half of the engine's command queue.
pub type CommandSender = mpsc::Sender<Command>;

/// Receiving half of the engine's command queue; owned solely by the engine task.
pub type CommandReceiver = mpsc::Receiver<Command>;

/// Builds a bounded command channel. The depth matches the per-client queue depth
/// ([`crate::protocol_constants::CLIENT_QUEUE_DEPTH`]) since in the worst case every
/// connected client could have one command in flight.
pub fn command_channel(depth: usize) -> (CommandSender, CommandReceiver) {
    mpsc::channel(depth)
}

/// One mutation destined for the engine task, tagged with the client that caused it
/// where that matters for attribution or permission checks already applied by the caller.
#[derive(Debug, Clone)]
pub enum Command {
    /// A single operator-layer channel write (`set_channel`, §6).
    SetChannel {
        universe_id: u32,
        channel: u16,
        value: u8,
        client_id: u32,
    },
    /// A batch operator-layer write (`set_channels`, §6).
    SetChannels {
        universe_id: u32,
        values: Vec<(u16, u8)>,
        client_id: u32,
    },
    /// A normalized frame from an Art-Net or sACN input receiver, already through the
    /// Channel Mapper by the time it reaches the queue is NOT assumed; the engine applies
    /// mapping itself so the mapper can react to the most recent configuration snapshot.
    InputFrame(InputFrame),
    /// Recall a scene, optionally overriding its configured transition. Issued only by
    /// the authoritative HTTP recall endpoint (§6); the WebSocket `set_active_scene`
    /// message is informational and never produces this command.
    RecallScene {
        scene_id: u64,
        transition_override: Option<TransitionType>,
        client_id: u32,
    },
    /// Cancel whatever scene transition is currently running, freezing in place (§4.H).
    CancelSceneTransition { client_id: u32 },
    SetGlobalGrandmaster { value: u8, client_id: u32 },
    SetUniverseGrandmaster {
        universe_id: u32,
        value: u8,
        client_id: u32,
    },
    /// Explicit client write to a group's master value, independent of its
    /// `master_location` channel (§4.E).
    SetGroupMaster {
        group_id: u64,
        value: u8,
        client_id: u32,
    },
    Park {
        universe_id: u32,
        channel: u16,
        value: u8,
        client_id: u32,
    },
    Unpark {
        universe_id: u32,
        channel: u16,
        client_id: u32,
    },
    SetHighlight {
        active: bool,
        dim_level: u8,
        channels: Vec<(u32, u16)>,
        client_id: u32,
    },
    SetBlackout { active: bool, client_id: u32 },
    SetInputBypass {
        universe_id: u32,
        active: bool,
        client_id: u32,
    },
    /// The HTTP collaborator validated and atomically swapped in a new configuration
    /// snapshot; the engine must reconcile any state keyed by ids that no longer exist
    /// (§7: "the previous snapshot stays active" only applies to *rejected* swaps, this
    /// variant is only ever sent for an already-accepted one).
    ConfigSnapshotChanged,
    /// A client disconnected; any park entries or highlight state attributed solely to it
    /// are left in place (§4.F: modifier state outlives the connection that set it),
    /// this variant exists purely so the engine can drop any per-client bookkeeping.
    ClientDisconnected { client_id: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn command_channel_delivers_in_order() {
        let (tx, mut rx) = command_channel(8);
        tx.send(Command::SetBlackout {
            active: true,
            client_id: 1,
        })
        .await
        .unwrap();
        tx.send(Command::SetBlackout {
            active: false,
            client_id: 1,
        })
        .await
        .unwrap();

        let Command::SetBlackout { active: first, .. } = rx.recv().await.unwrap() else {
            panic!("expected SetBlackout");
        };
        let Command::SetBlackout { active: second, .. } = rx.recv().await.unwrap() else {
            panic!("expected SetBlackout");
        };
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn dropping_every_sender_closes_the_queue() {
        let (tx, mut rx) = command_channel(1);
        drop(tx);
        assert!(rx.recv().await.is_none());
    }
}
