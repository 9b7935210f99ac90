use thiserror::Error;

/// Why a session command was turned down. Shown to the user verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("You must be in a voice channel to play music.")]
    AuthorNotInVoice,
    #[error("Bot is already playing music in another channel.")]
    OtherChannel,
    #[error("I'm not in a voice channel.")]
    NotInVoice,
    #[error("I'm not currently in a voice channel.")]
    NotConnected,
    #[error("Can't skip in loop state.")]
    SkipWhileLooping,
    #[error("Can't prev in loop state.")]
    PrevWhileLooping,
    #[error("No next song.")]
    NoNext,
    #[error("No previous song.")]
    NoPrevious,
    #[error("I'm not currently playing any audio.")]
    NotPlaying,
    #[error("I'm not currently paused.")]
    NotPaused,
    #[error("The playlist is empty.")]
    EmptyQueue,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid media url: {0}")]
    InvalidInput(String),

    #[error("media could not be resolved")]
    ResolutionFailed,

    #[error(transparent)]
    Refused(#[from] Refusal),

    #[error("audio device fault: {0}")]
    DeviceFault(String),

    #[error("session is no longer running")]
    SessionClosed,
}

impl SessionError {
    /// The single message a user sees for a failed command.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::InvalidInput(_) => "Invalid URL".to_string(),
            SessionError::ResolutionFailed => {
                "Can't add this to the playlist, please check your url".to_string()
            }
            SessionError::Refused(refusal) => refusal.to_string(),
            SessionError::DeviceFault(_) => "Something went wrong with the audio stream.".to_string(),
            SessionError::SessionClosed => "The player for this server is not available.".to_string(),
        }
    }

    pub fn is_refusal(&self) -> bool {
        matches!(self, SessionError::Refused(_))
    }
}
