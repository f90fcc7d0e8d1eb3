pub mod assets;
pub mod editing;
pub mod error;
pub mod history;
pub mod playback;
pub mod session;
pub mod types;

pub use assets::{AssetKind, AssetRecord, Manifest};
pub use editing::ClipEdit;
pub use error::{CoreError, Result};
pub use history::History;
pub use playback::{Clocked, PlaybackClock};
pub use session::{ActionResult, EditorAction, EditorSession, ExportState};
pub use types::*;
