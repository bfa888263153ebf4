pub mod manager;
pub mod player;
pub mod queue;
pub mod track;
pub mod transport;

pub use manager::PlayerManager;
pub use player::{GuildPlayer, PlayOutcome, PlayerError, PlayerNotifier, PlayerState};
pub use queue::{MusicQueue, QueueError, QueueSnapshot};
pub use track::{Track, TrackOrigin};
pub use transport::{SongbirdGateway, VoiceConnection, VoiceGateway};
