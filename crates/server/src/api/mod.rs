pub mod dispatch;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod stream;

pub use routes::create_router;
