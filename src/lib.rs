//! Synchronized multi-viewport previews of a single web page.
//!
//! A [`preview::Preview`] renders a page either as a reel of breakpoint
//! views or as a packed wall of device views, keeps every view's document
//! in step with the one the user interacts with, and switches between the
//! two layouts as the application state changes.

pub mod animate;
pub mod catalog;
pub mod context;
pub mod deferred;
pub mod dimension;
pub mod emitter;
pub mod error;
pub mod frame;
pub mod layout;
pub mod mode;
pub mod preview;
pub mod protocol;
pub mod readiness;
pub mod settings;
pub mod sim;
pub mod state;
pub mod sync;
pub mod timer;
pub mod viewport;

pub mod event_source;
pub mod panic_handler;
pub mod tui;

pub use context::{ContextEvent, ContextId, RenderContext};
pub use error::{ViewError, ViewResult};
pub use preview::Preview;
pub use state::{AppState, DisplayMode, Options, Snapshot, ViewSpec};
