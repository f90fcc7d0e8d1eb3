use cutroom_core::session::EditorSession;
use cutroom_render::export::CancelFlag;
use cutroom_render::transcode::Transcoder;
use std::sync::Mutex;

pub struct AppState {
    pub session: Mutex<EditorSession>,
    pub transcoder: Transcoder,
    pub cancel: CancelFlag,
}

impl AppState {
    pub fn new(session: EditorSession, transcoder: Transcoder) -> Self {
        Self {
            session: Mutex::new(session),
            transcoder,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_session<T>(&self, f: impl FnOnce(&mut EditorSession) -> T) -> anyhow::Result<T> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("editor session lock poisoned"))?;
        Ok(f(&mut session))
    }
}
