mod session;

pub use session::{
    AgentStatus, SessionBoard, SessionOverview, SessionRecord, StatusSnapshot, WindowRef,
};
