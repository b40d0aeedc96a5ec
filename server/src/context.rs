use std::convert::Infallible;
use std::sync::Arc;

use engine::{BroadcastHandle, Canvas};
use warp::Filter;

pub struct AppContext {
    pub canvas: Arc<Canvas>,
    pub broadcast: BroadcastHandle,
    /// Shared secret checked on `/admin` routes (`x-api-key` header).
    pub admin_key: String,
}

pub type AppContextRef = Arc<AppContext>;

pub fn with_context(
    context: AppContextRef,
) -> impl Filter<Extract = (AppContextRef,), Error = Infallible> + Clone {
    warp::any().map(move || context.clone())
}
