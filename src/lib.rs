//! chatgate: a chat gateway that runs every inbound message through a
//! fixed pipeline (security, memory, capability selection) and replies on
//! the channel it came from.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod gateway;
pub mod layers;
pub mod llm;
pub mod logger;
pub mod memory;
pub mod message;
pub mod subsystems;
