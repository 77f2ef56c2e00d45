pub mod error;
pub(crate) mod handlers;

use livemap_editor::{LiveEditor, LiveObserver};

use crate::ServerConfig;
use crate::broadcast::Lagging;
use crate::registry::SessionRegistry;

/// Server state a handler may touch while processing one packet.
pub(crate) struct HandlerContext<'a> {
    pub config: &'a ServerConfig,
    pub registry: &'a mut SessionRegistry,
    pub editor: &'a mut dyn LiveEditor,
    pub observer: &'a mut dyn LiveObserver,
    /// Other connections that overflowed while handling this packet.
    pub lagging: &'a mut Lagging,
}
