//! Dispatch pipeline: one incoming message in, zero or one answer out.
//!
//! The active controller is the top of the player's navigation stack (or the main controller).
//! Its actions are tried in declared order against the player's locale; the first match wins,
//! otherwise the controller's default handler runs, otherwise there is no answer. The handler's
//! answer is addressed to the player and handed to the outbound channel.

use std::sync::Arc;

use crate::answer::GameAnswer;
use crate::channels::{AnswerChannel, ChannelError};
use crate::controller::{
    BindingError, BoxedHandler, Controller, ControllerRegistry, Extensions, HandlerContext,
    NotFoundError, Outcome, Reply,
};
use crate::localization::{LocalizationError, Localizer};
use crate::message::{IncomingMessage, PlayerInfo};
use crate::session::SessionData;

/// Why a turn was aborted. No answer is sent for an aborted turn.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    ControllerNotFound(#[from] NotFoundError),
    #[error("controller {controller}: {source}")]
    Binding {
        controller: String,
        #[source]
        source: BindingError,
    },
    #[error("controller {controller}: unsupported handler signature: {reason}")]
    UnsupportedHandlerSignature {
        controller: String,
        reason: &'static str,
    },
    #[error(transparent)]
    Localization(#[from] LocalizationError),
    #[error("controller {controller}: handler failed: {error}")]
    Handler {
        controller: String,
        error: anyhow::Error,
    },
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Which handler of the controller ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Index into the controller's actions, with the matched localization path.
    Action { index: usize, path: String },
    Default,
    /// Nothing matched and the controller has no default handler.
    Unhandled,
}

/// Result of one turn.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub controller: String,
    pub route: Route,
    /// The answer handed to the channel, if any.
    pub answer: Option<GameAnswer>,
    /// Session to persist: the handler's returned copy, or the input unchanged.
    pub session: SessionData,
}

/// Routes messages to controller handlers. Immutable after construction; share it via `Arc`.
pub struct Dispatcher {
    registry: Arc<ControllerRegistry>,
    localizer: Arc<dyn Localizer>,
    channel: Arc<dyn AnswerChannel>,
    extensions: Extensions,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ControllerRegistry>,
        localizer: Arc<dyn Localizer>,
        channel: Arc<dyn AnswerChannel>,
    ) -> Self {
        Self {
            registry,
            localizer,
            channel,
            extensions: Extensions::new(),
        }
    }

    /// Make `value` available to handlers through `Extension<T>`.
    pub fn with_extension<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    /// Run one turn. The navigation stack is read once, before any handler runs.
    pub async fn dispatch(
        &self,
        message: &IncomingMessage,
        player: &PlayerInfo,
        session: SessionData,
    ) -> Result<DispatchOutcome, DispatchError> {
        let controller_name = session
            .navigation
            .peek()
            .unwrap_or_else(|| self.registry.main_controller_name())
            .to_string();
        let controller = self.registry.resolve(&controller_name)?;

        let (route, handler) = self.select(controller, message, player)?;
        let Some(handler) = handler else {
            log::debug!(
                "dispatch: {} in {}: no action matched and no default",
                player.key,
                controller_name
            );
            return Ok(DispatchOutcome {
                controller: controller_name,
                route,
                answer: None,
                session,
            });
        };
        log::debug!("dispatch: {} in {} -> {:?}", player.key, controller_name, route);

        let reply = {
            let ctx = HandlerContext {
                message,
                player,
                session: &session,
                extensions: &self.extensions,
            };
            handler.call(&ctx).map_err(|source| DispatchError::Binding {
                controller: controller_name.clone(),
                source,
            })?
        };
        let outcome = settle(reply, &controller_name).await?;

        let session = outcome.session.unwrap_or(session);
        let answer = match outcome.answer {
            Some(answer) => {
                let game_answer = GameAnswer::for_player(player.key.clone(), answer);
                self.channel.answer(game_answer.clone()).await?;
                Some(game_answer)
            }
            None => None,
        };
        Ok(DispatchOutcome {
            controller: controller_name,
            route,
            answer,
            session,
        })
    }

    /// First action whose localization matches, else the default handler.
    fn select<'c>(
        &self,
        controller: &'c Controller,
        message: &IncomingMessage,
        player: &PlayerInfo,
    ) -> Result<(Route, Option<&'c BoxedHandler>), DispatchError> {
        for (index, action) in controller.actions().iter().enumerate() {
            let phrases = self.localizer.get_string(action.path(), &player.locale)?;
            if phrases.matches(message) {
                let route = Route::Action {
                    index,
                    path: action.path().to_string(),
                };
                return Ok((route, Some(action.handler())));
            }
        }
        Ok(match controller.fallback() {
            Some(handler) => (Route::Default, Some(handler)),
            None => (Route::Unhandled, None),
        })
    }
}

/// Await a deferred reply once. A deferred reply must settle to a ready one.
async fn settle(reply: Reply, controller: &str) -> Result<Outcome, DispatchError> {
    let result = match reply {
        Reply::Ready(result) => result,
        Reply::Deferred(pending) => match pending.await {
            Reply::Ready(result) => result,
            Reply::Deferred(_) => {
                return Err(DispatchError::UnsupportedHandlerSignature {
                    controller: controller.to_string(),
                    reason: "deferred reply resolved to another deferred reply",
                })
            }
        },
    };
    result.map_err(|error| DispatchError::Handler {
        controller: controller.to_string(),
        error,
    })
}
