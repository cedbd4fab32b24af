pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod events;
pub mod relay;
pub mod sessions;
pub mod state;
