#![forbid(unsafe_code)]

pub mod confetti;
pub mod game_service;

pub use quest_core::Clock;

pub use confetti::ConfettiTimer;
pub use game_service::{GameService, SAVE_FAILED_MESSAGE};
