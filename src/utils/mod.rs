pub mod cluster;

pub mod time;

pub(crate) mod scoped_timer;
