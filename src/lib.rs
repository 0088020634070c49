pub mod aggregate;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod geom;
pub mod learning;
pub mod loss;
pub mod prng;
pub mod router;
pub mod state;
pub mod update;
