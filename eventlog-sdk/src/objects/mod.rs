pub mod events;
pub mod ws;

pub use events::{EventResponse, ListEventsQuery, WelcomeResponse};
pub use ws::{Acknowledgment, InboundEvent};
