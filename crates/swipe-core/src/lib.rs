//! Core of the spotiswipe client: wire types, configuration, the backend
//! client, and the interaction state machines driven by [`core::SwipeCore`].

pub mod client;
pub mod config;
pub mod core;
pub mod flow;
pub mod gesture;
pub mod platform;
pub mod playback;
pub mod protocol;
pub mod session;
