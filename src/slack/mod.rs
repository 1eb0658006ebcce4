pub mod client;
pub mod listener;

pub use client::{upload_file_external, SlackChannel};
pub use listener::{error_handler, handle_push_event, ListenerState};
