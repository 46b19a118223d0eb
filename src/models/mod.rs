pub mod chat;
pub mod content;
pub mod feature;
pub mod websocket;
