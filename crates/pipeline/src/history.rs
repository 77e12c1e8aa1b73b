//! Bounded history window for the synthesizer.

use parley_core::conversation::ConversationTurn;
use parley_core::message::{Message, Role};

/// Build the history window from turns in creation order.
///
/// The message being answered is usually already persisted as the last turn;
/// when `drop_duplicate` is set and the last turn is a user turn with the same
/// trimmed content as `current_input`, it is excluded. The most recent
/// `window` turns are kept.
pub fn window(
    turns: &[ConversationTurn],
    current_input: &str,
    window: usize,
    drop_duplicate: bool,
) -> Vec<Message> {
    let mut slice = turns;
    if drop_duplicate
        && let Some(last) = slice.last()
        && last.role == Role::User
        && last.content.trim() == current_input.trim()
    {
        slice = &slice[..slice.len() - 1];
    }

    let start = slice.len().saturating_sub(window);
    slice[start..].iter().map(ConversationTurn::to_message).collect()
}
