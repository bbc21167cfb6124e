pub mod board;
pub mod config;
pub mod extract;
pub mod game;
pub mod llm;
pub mod negotiate;
pub mod output;
pub mod players;
pub mod render;
pub mod state;
pub mod stats;
