pub mod context;
pub mod id_alloc;
pub mod log;
pub mod queue;
pub mod sync;
