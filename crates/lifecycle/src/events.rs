use folder_mcp_protocol::{FolderLifecycleState, Progress};

/// Events emitted by a `FolderLifecycleManager` over the lifetime of a
/// folder. Delivered over a broadcast channel; subscribers that lag behind
/// simply miss older events rather than blocking the manager.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    StateChange(FolderLifecycleState),
    ScanComplete(FolderLifecycleState),
    ProgressUpdate(Progress),
    IndexComplete(FolderLifecycleState),
    Error(String),
}

pub const EVENT_CHANNEL_CAPACITY: usize = 256;
