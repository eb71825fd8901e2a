//! Handler contract: parameters are bound from the turn context by type, results are one
//! [`Reply`] sum type whether the handler is synchronous or not.
//!
//! A handler is any `Fn` whose parameters implement [`FromContext`] and whose return value
//! implements [`IntoReply`] (or, for async handlers, a future resolving to one). Each
//! parameter type knows its single source in the context pool, so declaration order does not
//! matter and a parameter that cannot be satisfied fails with [`BindingError`].

use futures_util::future::BoxFuture;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::answer::ControllerAnswer;
use crate::message::{IncomingMessage, PlayerInfo};
use crate::session::{NavigationStack, SessionData};

/// Everything a handler may ask for during one turn.
pub struct HandlerContext<'a> {
    pub message: &'a IncomingMessage,
    pub player: &'a PlayerInfo,
    pub session: &'a SessionData,
    pub extensions: &'a Extensions,
}

/// Typed values shared with every handler (services, settings, ...). One value per type.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions").field("len", &self.map.len()).finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("cannot bind handler parameter {parameter}: {reason}")]
pub struct BindingError {
    pub parameter: &'static str,
    pub reason: String,
}

impl BindingError {
    pub fn missing<T>() -> Self {
        Self {
            parameter: std::any::type_name::<T>(),
            reason: "no value of this type in the handler context".to_string(),
        }
    }
}

/// A handler parameter that can be produced from the turn context.
pub trait FromContext: Sized {
    fn from_context(ctx: &HandlerContext<'_>) -> Result<Self, BindingError>;
}

impl FromContext for IncomingMessage {
    fn from_context(ctx: &HandlerContext<'_>) -> Result<Self, BindingError> {
        Ok(ctx.message.clone())
    }
}

impl FromContext for PlayerInfo {
    fn from_context(ctx: &HandlerContext<'_>) -> Result<Self, BindingError> {
        Ok(ctx.player.clone())
    }
}

/// A copy of the session; return it inside an [`Outcome`] to persist changes.
impl FromContext for SessionData {
    fn from_context(ctx: &HandlerContext<'_>) -> Result<Self, BindingError> {
        Ok(ctx.session.clone())
    }
}

impl FromContext for NavigationStack {
    fn from_context(ctx: &HandlerContext<'_>) -> Result<Self, BindingError> {
        Ok(ctx.session.navigation.clone())
    }
}

/// Extracts a value registered with `Dispatcher::with_extension`.
#[derive(Debug, Clone)]
pub struct Extension<T>(pub T);

impl<T: Clone + Send + Sync + 'static> FromContext for Extension<T> {
    fn from_context(ctx: &HandlerContext<'_>) -> Result<Self, BindingError> {
        ctx.extensions
            .get::<T>()
            .cloned()
            .map(Extension)
            .ok_or_else(BindingError::missing::<T>)
    }
}

/// Optional extension: `None` when nothing of type `T` was registered.
impl<T: Clone + Send + Sync + 'static> FromContext for Option<Extension<T>> {
    fn from_context(ctx: &HandlerContext<'_>) -> Result<Self, BindingError> {
        Ok(ctx.extensions.get::<T>().cloned().map(Extension))
    }
}

/// What a handler produced: an optional answer and, when it changed anything, the new session.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub answer: Option<ControllerAnswer>,
    pub session: Option<SessionData>,
}

impl Outcome {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn answer(answer: ControllerAnswer) -> Self {
        Self {
            answer: Some(answer),
            session: None,
        }
    }

    pub fn with_session(mut self, session: SessionData) -> Self {
        self.session = Some(session);
        self
    }
}

/// Result of calling a handler: ready now, or a future the dispatcher awaits once.
pub enum Reply {
    Ready(anyhow::Result<Outcome>),
    Deferred(BoxFuture<'static, Reply>),
}

impl Reply {
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future + Send + 'static,
        F::Output: IntoReply,
    {
        Reply::Deferred(Box::pin(async move { future.await.into_reply() }))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ready(r) => f.debug_tuple("Ready").field(r).finish(),
            Reply::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Return types a handler may use.
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Reply {
        self
    }
}

impl IntoReply for Outcome {
    fn into_reply(self) -> Reply {
        Reply::Ready(Ok(self))
    }
}

impl IntoReply for ControllerAnswer {
    fn into_reply(self) -> Reply {
        Outcome::answer(self).into_reply()
    }
}

impl IntoReply for Option<ControllerAnswer> {
    fn into_reply(self) -> Reply {
        Outcome {
            answer: self,
            session: None,
        }
        .into_reply()
    }
}

impl IntoReply for (ControllerAnswer, SessionData) {
    fn into_reply(self) -> Reply {
        Outcome::answer(self.0).with_session(self.1).into_reply()
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<anyhow::Error>,
{
    fn into_reply(self) -> Reply {
        match self {
            Ok(v) => v.into_reply(),
            Err(e) => Reply::Ready(Err(e.into())),
        }
    }
}

/// Synchronous handler taking extractor parameters `Args`.
pub trait Handler<Args>: Send + Sync + 'static {
    fn call(&self, ctx: &HandlerContext<'_>) -> Result<Reply, BindingError>;
}

/// Handler returning a future; the dispatcher awaits it.
pub trait AsyncHandler<Args>: Send + Sync + 'static {
    fn call(&self, ctx: &HandlerContext<'_>) -> Result<Reply, BindingError>;
}

macro_rules! impl_handlers {
    ($($ty:ident),*) => {
        impl<F, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: IntoReply,
            $($ty: FromContext,)*
        {
            #[allow(non_snake_case, unused_variables)]
            fn call(&self, ctx: &HandlerContext<'_>) -> Result<Reply, BindingError> {
                $(let $ty = $ty::from_context(ctx)?;)*
                Ok((self)($($ty),*).into_reply())
            }
        }

        impl<F, Fut, $($ty,)*> AsyncHandler<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> Fut + Send + Sync + 'static,
            Fut: Future + Send + 'static,
            Fut::Output: IntoReply,
            $($ty: FromContext,)*
        {
            #[allow(non_snake_case, unused_variables)]
            fn call(&self, ctx: &HandlerContext<'_>) -> Result<Reply, BindingError> {
                $(let $ty = $ty::from_context(ctx)?;)*
                Ok(Reply::deferred((self)($($ty),*)))
            }
        }
    };
}

impl_handlers!();
impl_handlers!(T1);
impl_handlers!(T1, T2);
impl_handlers!(T1, T2, T3);
impl_handlers!(T1, T2, T3, T4);
impl_handlers!(T1, T2, T3, T4, T5);
impl_handlers!(T1, T2, T3, T4, T5, T6);

type ErasedHandler =
    dyn for<'a, 'b> Fn(&'a HandlerContext<'b>) -> Result<Reply, BindingError> + Send + Sync;

/// Type-erased handler stored in a controller.
#[derive(Clone)]
pub struct BoxedHandler(Arc<ErasedHandler>);

impl BoxedHandler {
    pub fn from_sync<H, Args>(handler: H) -> Self
    where
        H: Handler<Args>,
    {
        let f: Arc<ErasedHandler> = Arc::new(move |ctx: &HandlerContext<'_>| handler.call(ctx));
        Self(f)
    }

    pub fn from_async<H, Args>(handler: H) -> Self
    where
        H: AsyncHandler<Args>,
    {
        let f: Arc<ErasedHandler> =
            Arc::new(move |ctx: &HandlerContext<'_>| AsyncHandler::call(&handler, ctx));
        Self(f)
    }

    /// Bind parameters and start the handler. Binding happens before any handler code runs.
    pub fn call(&self, ctx: &HandlerContext<'_>) -> Result<Reply, BindingError> {
        (self.0)(ctx)
    }
}

impl fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedHandler(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        message: IncomingMessage,
        player: PlayerInfo,
        session: SessionData,
        extensions: Extensions,
    }

    impl Fixture {
        fn new() -> Self {
            let mut session = SessionData::new("P1");
            session.navigation.push("Lobby");
            Self {
                message: IncomingMessage::new("begin"),
                player: PlayerInfo::new("P1", "en"),
                session,
                extensions: Extensions::new(),
            }
        }

        fn ctx(&self) -> HandlerContext<'_> {
            HandlerContext {
                message: &self.message,
                player: &self.player,
                session: &self.session,
                extensions: &self.extensions,
            }
        }
    }

    fn ready(reply: Reply) -> Outcome {
        match reply {
            Reply::Ready(r) => r.unwrap(),
            Reply::Deferred(_) => panic!("expected a ready reply"),
        }
    }

    #[test]
    fn binding_ignores_declaration_order() {
        let fx = Fixture::new();
        let h = BoxedHandler::from_sync(|player: PlayerInfo, message: IncomingMessage| {
            ControllerAnswer::new(format!("{}:{}", player.key, message.text))
        });
        let out = ready(h.call(&fx.ctx()).unwrap());
        assert_eq!(out.answer.unwrap().text, "P1:begin");
    }

    #[test]
    fn binding_is_deterministic() {
        let fx = Fixture::new();
        let h = BoxedHandler::from_sync(|nav: NavigationStack, s: SessionData| {
            ControllerAnswer::new(format!("{:?}/{}", nav.peek(), s.player_key))
        });
        let a = ready(h.call(&fx.ctx()).unwrap()).answer.unwrap();
        let b = ready(h.call(&fx.ctx()).unwrap()).answer.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.text, "Some(\"Lobby\")/P1");
    }

    #[derive(Clone)]
    struct Prices(u32);

    #[test]
    fn missing_extension_fails_binding() {
        let fx = Fixture::new();
        let h = BoxedHandler::from_sync(|Extension(p): Extension<Prices>| {
            ControllerAnswer::new(p.0.to_string())
        });
        let err = h.call(&fx.ctx()).unwrap_err();
        assert!(err.parameter.contains("Prices"));
    }

    #[test]
    fn registered_extension_binds() {
        let mut fx = Fixture::new();
        fx.extensions.insert(Prices(5));
        let h = BoxedHandler::from_sync(|Extension(p): Extension<Prices>| {
            ControllerAnswer::new(p.0.to_string())
        });
        assert_eq!(ready(h.call(&fx.ctx()).unwrap()).answer.unwrap().text, "5");
    }

    #[test]
    fn optional_extension_binds_none() {
        let fx = Fixture::new();
        let h = BoxedHandler::from_sync(|p: Option<Extension<Prices>>| {
            ControllerAnswer::new(if p.is_some() { "some" } else { "none" })
        });
        assert_eq!(ready(h.call(&fx.ctx()).unwrap()).answer.unwrap().text, "none");
    }

    #[test]
    fn optional_extension_binds_registered_value() {
        let mut fx = Fixture::new();
        fx.extensions.insert(Prices(7));
        let h = BoxedHandler::from_sync(|p: Option<Extension<Prices>>| {
            ControllerAnswer::new(p.map(|Extension(p)| p.0.to_string()).unwrap_or_default())
        });
        assert_eq!(ready(h.call(&fx.ctx()).unwrap()).answer.unwrap().text, "7");
    }

    #[test]
    fn async_handler_yields_deferred() {
        let fx = Fixture::new();
        let h = BoxedHandler::from_async(|m: IncomingMessage| async move {
            ControllerAnswer::new(m.text)
        });
        assert!(matches!(h.call(&fx.ctx()).unwrap(), Reply::Deferred(_)));
    }

    #[test]
    fn handler_error_becomes_failed_reply() {
        let fx = Fixture::new();
        let h = BoxedHandler::from_sync(|| -> anyhow::Result<ControllerAnswer> {
            anyhow::bail!("boom")
        });
        match h.call(&fx.ctx()).unwrap() {
            Reply::Ready(Err(e)) => assert_eq!(e.to_string(), "boom"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn extensions_replace_by_type() {
        let mut ext = Extensions::new();
        assert!(ext.insert(Prices(1)).is_none());
        assert_eq!(ext.insert(Prices(2)).map(|p| p.0), Some(1));
        assert_eq!(ext.get::<Prices>().map(|p| p.0), Some(2));
        assert_eq!(ext.len(), 1);
    }
}
