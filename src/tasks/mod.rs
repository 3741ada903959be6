//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is alive.
//!
//! # Tasks
//! - Expiration sweep: removes expired cache entries at the configured interval

mod sweeper;

pub(crate) use sweeper::spawn_sweeper;
