mod common;

mod token_cache_behaviour;
