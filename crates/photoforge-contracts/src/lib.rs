pub mod choices;
pub mod errors;
pub mod events;
pub mod flow;
pub mod session;

pub use choices::{Choice, Mode, OutputFormat, StatusBarStyle};
pub use errors::EditError;
pub use events::{EventLog, EventPayload};
pub use flow::{ConversationController, FlowEvent, FlowStep};
pub use session::{ImageConfiguration, Session, SessionId, SessionStore, Stage};
