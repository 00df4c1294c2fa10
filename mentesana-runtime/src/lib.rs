pub mod config_store;
#[cfg(feature = "audio-io")]
pub mod cpal_device;
pub mod defaults;
pub mod responder;
pub mod runtime_chat;
pub mod secrets;
pub mod voice;
