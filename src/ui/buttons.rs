use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

use super::PlayerView;

/// Custom ids of the player buttons.
pub mod button_ids {
    pub const PREVIOUS: &str = "player_prev";
    pub const PLAY_PAUSE: &str = "player_play_pause";
    pub const SKIP: &str = "player_skip";
    pub const LOOP: &str = "player_loop";
    pub const STOP: &str = "player_stop";
}

/// A pressed player button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerButton {
    Previous,
    PlayPause,
    Skip,
    Loop,
    Stop,
}

impl PlayerButton {
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        match custom_id {
            button_ids::PREVIOUS => Some(PlayerButton::Previous),
            button_ids::PLAY_PAUSE => Some(PlayerButton::PlayPause),
            button_ids::SKIP => Some(PlayerButton::Skip),
            button_ids::LOOP => Some(PlayerButton::Loop),
            button_ids::STOP => Some(PlayerButton::Stop),
            _ => None,
        }
    }
}

/// One row: previous, play/pause, skip, loop, stop.
///
/// The play/pause button shows the action it will perform; the loop button
/// turns green while looping.
pub fn player_controls(view: PlayerView) -> Vec<CreateActionRow> {
    let play_pause_emoji = if view.paused { '▶' } else { '⏸' };
    let loop_style = if view.looping {
        ButtonStyle::Success
    } else {
        ButtonStyle::Secondary
    };

    let row = CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::PREVIOUS)
            .emoji('⏮')
            .style(ButtonStyle::Primary),
        CreateButton::new(button_ids::PLAY_PAUSE)
            .emoji(play_pause_emoji)
            .style(ButtonStyle::Primary),
        CreateButton::new(button_ids::SKIP)
            .emoji('⏭')
            .style(ButtonStyle::Primary),
        CreateButton::new(button_ids::LOOP)
            .emoji('🔁')
            .style(loop_style),
        CreateButton::new(button_ids::STOP)
            .emoji('⏹')
            .style(ButtonStyle::Danger),
    ]);

    vec![row]
}
