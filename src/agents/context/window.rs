//! Turn-based windowing of conversation history

use crate::agents::domain::{Message, Role};

/// Keep the most recent `turns` turns of `history`
///
/// A turn starts at a user message and runs until the next one. Leading
/// system messages are always kept. Non-user messages before the first user
/// message form a turn of their own.
pub fn window_turns(history: &[Message], turns: usize) -> Vec<Message> {
    let system_end = history
        .iter()
        .position(|m| m.role != Role::System)
        .unwrap_or(history.len());
    let (system, rest) = history.split_at(system_end);

    let mut result: Vec<Message> = system.to_vec();
    if turns == 0 || rest.is_empty() {
        return result;
    }

    // Turn start offsets within `rest`
    let mut starts: Vec<usize> = rest
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::User)
        .map(|(i, _)| i)
        .collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    let keep_from = if starts.len() > turns {
        starts[starts.len() - turns]
    } else {
        0
    };

    result.extend(rest[keep_from..].iter().cloned());
    result
}
