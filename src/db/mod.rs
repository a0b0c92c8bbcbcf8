pub mod mongo;
pub mod schemas;
