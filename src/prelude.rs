//! Imports for syntax extensions.

pub use crate::client::{AsyncClient as _, SimpleClient as _, SyncClient as _};
pub use crate::factory::RequestFactory as _;
pub use crate::stream::IntoByteStream as _;
pub use crate::uri::IntoUri as _;
