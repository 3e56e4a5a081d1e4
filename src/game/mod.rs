pub mod board;
pub mod chess_match;
pub mod rules;
