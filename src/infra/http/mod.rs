mod delivery;
mod middleware;

pub use delivery::{HttpState, build_router};
