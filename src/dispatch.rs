//! Outbound command dispatch with flow control.
//!
//! Two disciplines share one queue:
//!
//! * **Command lines** (G-code) are written one line at a time with a trailing
//!   `\n`. After each line the engine waits for the board to answer `ok`
//!   before writing anything else.
//! * **Special blocks** start with one of the [`SENTINELS`] (`#`, `%`, `$`) and
//!   end at the next occurrence of the same byte. They are written raw, in
//!   chunks of at most [`MAX_CHUNK`] bytes, back-to-back and without waiting
//!   for acknowledgments. Once a block is started it is streamed to the end
//!   before any command line goes out.
//!
//! Only one buffer is in flight at any time and buffers are dispatched in
//! submission order.
//!
//! The following state diagram summarizes the engine states and transitions:
//!
//! ```text
//!                        submit
//!          .------.  (queue non-empty)   .--------------------------.
//!   START->| Idle |--------------------->| dispatch next write      |
//!          '------'                      '--------------------------'
//!             ^  ^      block closed,         |                |
//!             |  '----- nothing left ---------|   leading      | line
//!             |                               |   sentinel     | written
//!             |            .------------------v--.             |
//!             |            | StreamingSpecialBlock|<--. chunk  |
//!             |            |   { delimiter }      |---' <= 64  |
//!             |            '----------------------'            v
//!             |   ok, nothing left                     .-------------.
//!             '----------------------------------------| AwaitingAck |
//!                    ok, more data -> dispatch next    '-------------'
//! ```
//!
//! **Example**
//! ```ignore
//! let mut engine = DispatchEngine::new();
//! engine.submit(b"G1 X1\nG1 Y1\n".to_vec(), &mut transport)?; // writes "G1 X1\n"
//! engine.on_acknowledgment(&mut transport)?; // writes "G1 Y1\n"
//! ```

mod engine;
mod queue;
mod states;

pub use engine::DispatchEngine;
pub use queue::CommandQueue;
pub use states::{is_sentinel, DispatchState, DispatchStats, MAX_CHUNK, SENTINELS};
