//! Controllers and their handlers.
//!
//! A [`Controller`] is declared once at startup with its actions in priority order and an
//! optional default handler; a [`ControllerRegistry`] validates and owns them.

mod handler;
mod registry;

pub use handler::{
    AsyncHandler, BindingError, BoxedHandler, Extension, Extensions, FromContext, Handler,
    HandlerContext, IntoReply, Outcome, Reply,
};
pub use registry::{
    Action, Controller, ControllerRegistry, NotFoundError, RegistryBuilder, RegistryError,
};
