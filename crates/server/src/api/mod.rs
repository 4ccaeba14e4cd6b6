pub mod handlers;
pub mod middleware;
pub mod multipart;
pub mod options;
pub mod process;
pub mod routes;

pub use routes::create_router;
