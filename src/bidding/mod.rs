pub mod dsp_client;
pub mod engine;
pub mod targeting;
