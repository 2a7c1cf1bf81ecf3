pub mod input;
pub mod setup;
pub mod tiles;
pub mod ui;

