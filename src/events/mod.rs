//! # Events Module
//!
//! Progress reporting for provenance requests.
//!
//! ## Design
//! The engine emits events through channels, allowing any caller
//! (service, worker, UI) to subscribe and display progress.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Search(SearchEvent::BackendCompleted(run)) = event {
//!             println!("{} -> {:?}", run.backend, run.status);
//!         }
//!     }
//! });
//!
//! engine.analyze_bytes_with_events(bytes, None, &sender).await?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
