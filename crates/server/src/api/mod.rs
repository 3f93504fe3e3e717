pub mod channels;
pub mod handlers;
pub mod middleware;
pub mod programs;
pub mod routes;
pub mod terms;
pub mod update;

pub use routes::create_router;
