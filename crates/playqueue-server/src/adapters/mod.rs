//! Process-backed implementations of the core collaborator traits.

pub mod player;
pub mod ytdlp;

pub use player::PlayerTransportFactory;
pub use ytdlp::YtDlp;
