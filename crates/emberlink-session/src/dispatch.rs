//! Handler registry: routes each decoded message to the one handler
//! registered for its concrete type.
//!
//! Handlers are registered explicitly at startup:
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::builder()
//!     .on::<C2SClientLogin, _>(ClientLoginHandler::new(players.clone()))
//!     .on::<C2SHeartbeat, _>(HeartbeatHandler::new(players))
//!     .build()?;
//! ```
//!
//! A message type with no handler is not an error: dispatching it is a
//! no-op, so one side can ship a new message before the other handles it.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use emberlink_protocol::{AnyProtocol, Protocol};
use futures_util::future::BoxFuture;

use crate::{DispatchError, HandlerError, SessionHandle};

/// Handles every incoming message of type `P`.
///
/// Implement it with `async fn`:
///
/// ```rust,ignore
/// impl ProtocolHandler<C2SHeartbeat> for HeartbeatHandler {
///     async fn handle(
///         &self,
///         session: &SessionHandle,
///         _message: C2SHeartbeat,
///     ) -> Result<(), HandlerError> {
///         session.send(&S2CHeartbeat {}).await?;
///         Ok(())
///     }
/// }
/// ```
pub trait ProtocolHandler<P: Protocol>: Send + Sync + 'static {
    fn handle(
        &self,
        session: &SessionHandle,
        message: P,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send;
}

type ErasedHandler = Box<
    dyn Fn(SessionHandle, Box<dyn AnyProtocol>) -> BoxFuture<'static, Result<(), DispatchError>>
        + Send
        + Sync,
>;

fn erase<P, H>(handler: H) -> ErasedHandler
where
    P: Protocol,
    H: ProtocolHandler<P>,
{
    let handler = Arc::new(handler);
    Box::new(move |session, message| {
        let handler = Arc::clone(&handler);
        Box::pin(async move {
            let message = message
                .downcast::<P>()
                .ok_or(DispatchError::TypeMismatch(P::TAG))?;
            handler
                .handle(&session, message)
                .await
                .map_err(|source| DispatchError::Handler { tag: P::TAG, source })
        })
    })
}

struct Route {
    tag: &'static str,
    handler: ErasedHandler,
}

/// Immutable map from message type to handler.
pub struct Dispatcher {
    routes: HashMap<TypeId, Route>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// A dispatcher with no handlers; every dispatch is a no-op.
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Returns `true` if a handler is registered for `P`.
    pub fn handles<P: Protocol>(&self) -> bool {
        self.routes.contains_key(&TypeId::of::<P>())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Runs the handler registered for the message's runtime type.
    ///
    /// Completes when the handler does. Without a matching handler this
    /// returns `Ok(())` and does nothing.
    ///
    /// # Errors
    /// Returns [`DispatchError::Handler`] if the handler fails.
    pub async fn dispatch(
        &self,
        session: &SessionHandle,
        message: Box<dyn AnyProtocol>,
    ) -> Result<(), DispatchError> {
        match self.routes.get(&message.as_any().type_id()) {
            Some(route) => {
                tracing::trace!(conn_id = %session.id(), tag = route.tag, "routing message");
                (route.handler)(session.clone(), message).await
            }
            None => {
                tracing::debug!(
                    conn_id = %session.id(),
                    message_type = message.type_name(),
                    "no handler registered, ignoring"
                );
                Ok(())
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.routes.values().map(|r| r.tag).collect();
        tags.sort_unstable();
        f.debug_struct("Dispatcher").field("handlers", &tags).finish()
    }
}

/// Collects handlers; [`build`](Self::build) rejects duplicates.
#[derive(Default)]
pub struct DispatcherBuilder {
    routes: Vec<(TypeId, Route)>,
}

impl DispatcherBuilder {
    /// Registers `handler` for messages of type `P`.
    pub fn on<P, H>(mut self, handler: H) -> Self
    where
        P: Protocol,
        H: ProtocolHandler<P>,
    {
        self.routes.push((
            TypeId::of::<P>(),
            Route {
                tag: P::TAG,
                handler: erase::<P, H>(handler),
            },
        ));
        self
    }

    /// # Errors
    /// Returns [`DispatchError::DuplicateHandler`] if a message type was
    /// registered twice.
    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        let mut routes = HashMap::with_capacity(self.routes.len());
        for (type_id, route) in self.routes {
            let tag = route.tag;
            if routes.insert(type_id, route).is_some() {
                return Err(DispatchError::DuplicateHandler(tag));
            }
        }
        Ok(Dispatcher { routes })
    }
}
