//! Icebox: freeze ideas with triggers, rank them for waking, merge them with
//! lineage, and discover dormant ones in Notion.

pub mod config;
pub mod discovery;
pub mod error;
pub mod ideas;
pub mod llm;
pub mod notion;
pub mod proxy;
pub mod store;
pub mod wake;
