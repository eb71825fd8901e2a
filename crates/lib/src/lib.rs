//! Quip core library: controller dispatch for turn-based chat games, with localized command
//! matching, per-player navigation, sessions, and outbound channels.

pub mod answer;
pub mod channels;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod init;
pub mod localization;
pub mod message;
pub mod server;
pub mod session;
pub mod starter;

pub use answer::{ControllerAnswer, GameAnswer};
pub use controller::{Controller, ControllerRegistry, Extension, Outcome, Reply};
pub use dispatch::{DispatchError, DispatchOutcome, Dispatcher, Route};
pub use localization::{Localization, Localizer};
pub use message::{IncomingMessage, PlayerInfo};
pub use session::{NavigationStack, SessionData};
