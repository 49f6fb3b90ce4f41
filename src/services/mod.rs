pub mod ai_service;
pub mod content_shaper;
pub mod dedup;
pub mod delivery;
pub mod news_pipeline;
pub mod news_service;
pub mod price_history;
pub mod relevance;
pub mod scheduler;
pub mod technical_indicators;
