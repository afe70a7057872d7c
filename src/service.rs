pub mod game;
pub mod pool_cache;
pub mod question_source;
pub mod sheets;
