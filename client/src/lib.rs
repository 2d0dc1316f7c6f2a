mod actions;
mod app;
mod dom;
mod geometry;
mod handle;
mod history;
mod net;
mod persistence;
mod prompt;
mod raster;
mod render;
mod session;
mod state;
mod store;
mod util;

pub use app::run;
